//! Delivery tokens
//!
//! Stateless, time-bounded credentials embedded in client-facing URLs and
//! verified entirely by the delivery edge. The token payload is a
//! `~`-joined canonical string over the present fields; the digest is
//! HMAC-SHA-256 keyed with the hex-decoded token key. The emitted token
//! carries only the fields that were set, in the fixed order
//! `st`, `exp`, `acl`, `hmac`. An `ip` restriction participates in the
//! digest but is not echoed into the token.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::auth::{Clock, SystemClock};
use crate::error::{MediaError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Builder for signed delivery tokens
#[derive(Clone)]
pub struct AuthToken {
    key: Vec<u8>,
    start_time: Option<u64>,
    expiration: Option<u64>,
    ttl: Option<u64>,
    ip: Option<String>,
    acl: Option<String>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("key", &"<redacted>")
            .field("start_time", &self.start_time)
            .field("expiration", &self.expiration)
            .field("ttl", &self.ttl)
            .field("ip", &self.ip)
            .field("acl", &self.acl)
            .finish()
    }
}

impl AuthToken {
    /// Create a token builder from the account's token key.
    ///
    /// The key must be hex-encoded; a malformed key is rejected here, not
    /// at generation time.
    pub fn new(key: &str) -> Result<Self> {
        let key = hex::decode(key)
            .map_err(|_| MediaError::ConfigurationError("token key must be hex-encoded".into()))?;
        Ok(Self {
            key,
            start_time: None,
            expiration: None,
            ttl: None,
            ip: None,
            acl: None,
            clock: Arc::new(SystemClock),
        })
    }

    /// Unix time at which the token becomes valid (defaults to now)
    pub fn start_time(mut self, start: u64) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Absolute unix expiration time
    pub fn expiration(mut self, expiration: u64) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Validity window in seconds; converted to an absolute expiration at
    /// generation time (`start`, or the injected clock's now, plus `ttl`)
    pub fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Restrict the token to one client IP
    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Access-control pattern the token grants, e.g. `/image/authenticated/*`
    pub fn acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = Some(acl.into());
        self
    }

    /// Replace the wall clock (tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Generate a token scoped by this builder's ACL
    pub fn generate(&self) -> Result<String> {
        let acl = self.acl.as_deref().ok_or_else(|| {
            MediaError::AuthError("delivery token requires an acl (or use generate_for_url)".into())
        })?;
        self.build(Some(acl), None)
    }

    /// Generate a token bound to one exact URL path instead of an ACL
    pub fn generate_for_url(&self, url: &str) -> Result<String> {
        if self.acl.is_some() {
            return self.generate();
        }
        self.build(None, Some(url))
    }

    fn build(&self, acl: Option<&str>, url: Option<&str>) -> Result<String> {
        let expiration = self.resolve_expiration()?;

        let mut payload: Vec<String> = Vec::new();
        if let Some(ip) = self.ip.as_deref() {
            payload.push(format!("ip={ip}"));
        }
        if let Some(st) = self.start_time {
            payload.push(format!("st={st}"));
        }
        payload.push(format!("exp={expiration}"));
        if let Some(acl) = acl {
            payload.push(format!("acl={}", escape_to_lower(acl)));
        }
        if let Some(url) = url {
            payload.push(format!("url={}", escape_to_lower(url)));
        }
        let digest = self.digest(&payload.join("~"))?;

        let mut token: Vec<String> = Vec::new();
        if let Some(st) = self.start_time {
            token.push(format!("st={st}"));
        }
        token.push(format!("exp={expiration}"));
        if let Some(acl) = acl {
            token.push(format!("acl={}", escape_to_lower(acl)));
        }
        token.push(format!("hmac={digest}"));
        Ok(token.join("~"))
    }

    fn resolve_expiration(&self) -> Result<u64> {
        if let Some(exp) = self.expiration {
            return Ok(exp);
        }
        let ttl = self.ttl.ok_or_else(|| {
            MediaError::AuthError("delivery token requires an expiration or a ttl".into())
        })?;
        let start = self.start_time.unwrap_or_else(|| self.clock.now_unix());
        Ok(start + ttl)
    }

    fn digest(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| MediaError::AuthError("token key has an invalid length".into()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Percent-encode with lowercase hex, keeping unreserved characters.
/// The edge verifier compares the escaped form byte-for-byte, so the
/// casing is part of the protocol.
fn escape_to_lower(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02x}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::FixedClock;

    const KEY: &str = "00112233445566778899aabbccddeeff";

    #[test]
    fn non_hex_key_is_rejected_at_construction() {
        assert!(AuthToken::new("not-hex").is_err());
    }

    #[test]
    fn token_fields_appear_in_fixed_order() {
        let token = AuthToken::new(KEY)
            .unwrap()
            .start_time(1_111_111_111)
            .expiration(1_111_111_411)
            .acl("/image/*")
            .generate()
            .unwrap();

        let fields: Vec<&str> = token.split('~').map(|f| f.split('=').next().unwrap()).collect();
        assert_eq!(fields, vec!["st", "exp", "acl", "hmac"]);
        assert!(token.contains("acl=%2fimage%2f%2a"));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let token = AuthToken::new(KEY)
            .unwrap()
            .expiration(1_111_111_411)
            .acl("/video/*")
            .generate()
            .unwrap();
        assert!(!token.contains("st="));
        assert!(token.starts_with("exp=1111111411~acl="));
    }

    #[test]
    fn generation_is_deterministic() {
        let build = || {
            AuthToken::new(KEY)
                .unwrap()
                .expiration(1_111_111_411)
                .acl("/image/*")
                .generate()
                .unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn ip_restriction_changes_the_digest_without_appearing() {
        let base = AuthToken::new(KEY)
            .unwrap()
            .expiration(1_111_111_411)
            .acl("/image/*");
        let with_ip = base.clone().ip("203.0.113.7");
        let t1 = base.generate().unwrap();
        let t2 = with_ip.generate().unwrap();
        assert!(!t2.contains("ip="));
        assert_ne!(t1, t2);
    }

    #[test]
    fn ttl_uses_the_injected_clock() {
        let token = AuthToken::new(KEY)
            .unwrap()
            .ttl(300)
            .acl("/image/*")
            .with_clock(Arc::new(FixedClock(1_000_000)))
            .generate()
            .unwrap();
        assert!(token.contains("exp=1000300"));
    }

    #[test]
    fn ttl_or_expiration_is_required() {
        let err = AuthToken::new(KEY).unwrap().acl("/image/*").generate().unwrap_err();
        assert!(err.to_string().contains("expiration"));
    }

    #[test]
    fn url_bound_token_omits_acl_field() {
        let token = AuthToken::new(KEY)
            .unwrap()
            .expiration(1_111_111_411)
            .generate_for_url("/demo/image/authenticated/sample.jpg")
            .unwrap();
        assert!(!token.contains("acl="));
        assert!(token.contains("hmac="));
    }
}
