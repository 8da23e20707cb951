//! Request and URL signing
//!
//! The signature base is the canonical serialization of the sorted
//! parameter map: `k1=v1&k2=v2&...` with the shared secret appended, then
//! hashed with SHA-1 to a lowercase hex digest. SHA-1 here is the pinned
//! protocol constant the remote service verifies against.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha1::{Digest, Sha1};

use crate::auth::Clock;
use crate::config::CloudConfig;
use crate::params::{ParamMap, signing_base};

/// Keys never included in a signature base: the payload itself, the
/// public key, the routing-only resource type, and the signature field.
pub const SIGNED_PARAM_EXCLUSIONS: &[&str] = &["file", "api_key", "resource_type", "signature"];

/// Compute the request signature over a canonical parameter map.
///
/// Deterministic: the same map and secret always produce the same digest.
pub fn sign_parameters(params: &ParamMap, api_secret: &str) -> String {
    let base = signing_base(params, SIGNED_PARAM_EXCLUSIONS);
    let mut hasher = Sha1::new();
    hasher.update(base.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Authenticate a request in place: stamps the current time, signs the
/// map, and attaches the `(api_key, timestamp, signature)` triplet.
pub fn sign_request(params: &mut ParamMap, config: &CloudConfig, clock: &dyn Clock) {
    params.insert("timestamp".into(), clock.now_unix().into());
    let signature = sign_parameters(params, config.api_secret());
    params.insert("api_key".into(), config.api_key.clone().into());
    params.insert("signature".into(), signature.into());
    tracing::debug!(api_key = %key_hint(&config.api_key), "signed request parameters");
}

/// Truncated key prefix, enough to correlate log lines without
/// reproducing the credential.
fn key_hint(key: &str) -> &str {
    key.get(..4).unwrap_or(key)
}

/// Short signature embedded in delivery URL paths as `s--xxxxxxxx--`:
/// the first 8 characters of the URL-safe base64 SHA-1 over
/// `<path-to-sign><secret>`.
pub fn url_signature(to_sign: &str, api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(hasher.finalize());
    format!("s--{}--", &encoded[..8])
}
