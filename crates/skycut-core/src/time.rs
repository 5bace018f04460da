//! Time handling for UWS services.
//!
//! UWS exchanges timestamps as `YYYY-MM-DDTHH:MM:SSZ` with whole-second
//! precision and a mandatory trailing `Z`. All timestamps generated by the
//! engine are truncated to whole seconds so that stored and serialized
//! values round-trip exactly.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

/// Format a UTC timestamp in the UWS ISO date format.
pub fn isodatetime(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse a string in the UWS ISO date format.
///
/// Returns `None` if the string is not UTC (no trailing `Z`) or is not a
/// valid timestamp. Seconds may be omitted.
pub fn parse_isodatetime(time_string: &str) -> Option<DateTime<Utc>> {
    let rest = time_string.strip_suffix('Z')?;
    let naive = NaiveDateTime::parse_from_str(rest, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(rest, "%Y-%m-%dT%H:%M"))
        .ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// The current time, truncated to whole-second precision.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Serde support for the UWS ISO date format.
pub mod serde_isodatetime {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::{isodatetime, parse_isodatetime};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&isodatetime(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse_isodatetime(&value).ok_or_else(|| {
            de::Error::custom(format!(
                "invalid date {}: must be in YYYY-MM-DDTHH:MM[:SS]Z format",
                value
            ))
        })
    }

    /// Variant for `Option<DateTime<Utc>>` fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        use super::super::{isodatetime, parse_isodatetime};

        pub fn serialize<S>(
            timestamp: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match timestamp {
                Some(timestamp) => serializer.serialize_some(&isodatetime(timestamp)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<String>::deserialize(deserializer)?;
            match value {
                Some(value) => parse_isodatetime(&value)
                    .map(Some)
                    .ok_or_else(|| {
                        de::Error::custom(format!(
                            "invalid date {}: must be in YYYY-MM-DDTHH:MM[:SS]Z format",
                            value
                        ))
                    }),
                None => Ok(None),
            }
        }
    }
}
