//! Signed result URLs.
//!
//! Result rows store a persistent internal URL (typically an object-store
//! location). Read paths rewrite it to a time-limited user-facing URL so
//! clients can fetch the bytes directly from the store.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::config::SigningConfig;
use crate::{time, Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Mints user-facing URLs from persistent internal URLs.
pub trait UrlSigner: Send + Sync {
    /// Produce a signed, time-limited URL for an internal result URL.
    fn sign(&self, url: &str, mime_type: Option<&str>) -> Result<String>;
}

/// HMAC-based signer serving results from a public base URL.
///
/// The signature covers the object path, the expiration time, and the
/// response MIME type, keyed by the configured secret; the serving layer
/// verifies the same construction before streaming bytes.
pub struct HmacUrlSigner {
    base_url: String,
    service_account: String,
    secret: String,
    lifetime: i64,
}

impl HmacUrlSigner {
    pub fn new(config: &SigningConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_account: config.service_account.clone(),
            secret: config.secret.clone(),
            lifetime: config.url_lifetime,
        }
    }
}

impl UrlSigner for HmacUrlSigner {
    fn sign(&self, url: &str, mime_type: Option<&str>) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::Other(format!("Invalid result URL {}: {}", url, e)))?;
        let path = parsed.path().trim_start_matches('/');
        let expires = (time::now() + chrono::Duration::seconds(self.lifetime)).timestamp();

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Other(format!("Invalid signing key: {}", e)))?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac.update(b"\n");
        mac.update(mime_type.unwrap_or("").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!(
            "{}/{}?signer={}&expires={}&signature={}",
            self.base_url, path, self.service_account, expires, signature
        ))
    }
}
