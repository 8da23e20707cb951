//! Delivery URL builder
//!
//! Assembles `{base}/{cloud}/{resource_type}/{type}/[s--sig--/]
//! [transformation/][v<version>/]{public_id}[.format]` and optionally
//! appends a delivery token. The transformation string is produced by the
//! compiler and embedded verbatim; the public id is percent-encoded with
//! folder slashes preserved.

use crate::auth::{AuthToken, url_signature};
use crate::config::CloudConfig;
use crate::error::{MediaError, Result};
use crate::transformation::Transformation;

/// Query parameter carrying a delivery token
const TOKEN_QUERY_KEY: &str = "__token__";

/// Builder for client-facing delivery URLs
#[derive(Debug, Clone)]
pub struct DeliveryUrl {
    config: CloudConfig,
    resource_type: String,
    delivery_type: String,
    transformation: Option<Transformation>,
    version: Option<u64>,
    format: Option<String>,
    signed: bool,
    token: Option<AuthToken>,
}

impl DeliveryUrl {
    /// URL builder for the given account
    pub fn new(config: CloudConfig) -> Self {
        Self {
            config,
            resource_type: "image".into(),
            delivery_type: "upload".into(),
            transformation: None,
            version: None,
            format: None,
            signed: false,
            token: None,
        }
    }

    /// Resource type path segment (default `image`)
    pub fn resource_type(mut self, rt: impl Into<String>) -> Self {
        self.resource_type = rt.into();
        self
    }

    /// Delivery type path segment (default `upload`)
    pub fn delivery_type(mut self, t: impl Into<String>) -> Self {
        self.delivery_type = t.into();
        self
    }

    /// Transformation to apply on delivery
    pub fn transformation(mut self, t: Transformation) -> Self {
        self.transformation = Some(t);
        self
    }

    /// Pin a resource version
    pub fn version(mut self, v: u64) -> Self {
        self.version = Some(v);
        self
    }

    /// Convert to this format on delivery
    pub fn format(mut self, fmt: impl Into<String>) -> Self {
        self.format = Some(fmt.into());
        self
    }

    /// Embed an `s--...--` URL signature computed over the
    /// transformation and public id
    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Append a delivery token bound to this URL's path
    pub fn token(mut self, token: AuthToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Build the URL for a public id
    pub fn build(&self, public_id: &str) -> Result<String> {
        if public_id.is_empty() {
            return Err(MediaError::validation("public_id", "must not be empty"));
        }

        let transformation = match &self.transformation {
            Some(t) => t.generate()?,
            None => String::new(),
        };
        let mut target = encode_public_id(public_id);
        if let Some(fmt) = &self.format {
            target = format!("{target}.{fmt}");
        }

        let mut segments: Vec<String> = vec![
            self.config.delivery_base.trim_end_matches('/').to_string(),
            self.config.cloud_name.clone(),
            self.resource_type.clone(),
            self.delivery_type.clone(),
        ];
        if self.signed {
            let to_sign = if transformation.is_empty() {
                target.clone()
            } else {
                format!("{transformation}/{target}")
            };
            segments.push(url_signature(&to_sign, self.config.api_secret()));
        }
        if !transformation.is_empty() {
            segments.push(transformation);
        }
        if let Some(v) = self.version {
            segments.push(format!("v{v}"));
        }
        segments.push(target);

        let mut url = segments.join("/");
        if let Some(token) = &self.token {
            let path = format!("/{}", url.splitn(4, '/').nth(3).unwrap_or_default());
            let token = token.generate_for_url(&path)?;
            url = format!("{url}?{TOKEN_QUERY_KEY}={token}");
        }
        Ok(url)
    }
}

/// Percent-encode a public id, keeping folder separators readable
fn encode_public_id(public_id: &str) -> String {
    public_id
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
