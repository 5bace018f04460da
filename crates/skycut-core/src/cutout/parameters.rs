//! Representation of request parameters for cutouts.

use serde::{Deserialize, Serialize};

use super::stencils::Stencil;

/// The parameters to a cutout request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutParameters {
    /// Dataset IDs on which to operate
    #[serde(deserialize_with = "non_empty_ids")]
    pub ids: Vec<String>,

    /// The cutout stencils to apply
    #[serde(deserialize_with = "non_empty_stencils")]
    pub stencils: Vec<Stencil>,
}

fn non_empty_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ids = Vec::<String>::deserialize(deserializer)?;
    if ids.is_empty() {
        return Err(serde::de::Error::custom("ids must be non-empty"));
    }
    Ok(ids)
}

fn non_empty_stencils<'de, D>(deserializer: D) -> Result<Vec<Stencil>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let stencils = Vec::<Stencil>::deserialize(deserializer)?;
    if stencils.is_empty() {
        return Err(serde::de::Error::custom("stencils must be non-empty"));
    }
    Ok(stencils)
}
