//! # Mediaflow - Media Delivery SDK for Rust
//!
//! Client SDK for a media delivery platform: compile chained
//! transformations into delivery URLs, sign requests and delivery
//! tokens deterministically, and upload arbitrarily large payloads in
//! bounded chunks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediaflow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let config = CloudConfig::from_env()?;
//!
//!     // Upload with an incoming transformation
//!     let uploader = Uploader::new(config.clone());
//!     let response = uploader
//!         .upload(
//!             UploadSource::path("photos/cat.jpg"),
//!             &UploadOptions {
//!                 transformation: Some(Transformation::new().width(1600).crop("limit")),
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!
//!     // Build a delivery URL for it
//!     let url = DeliveryUrl::new(config)
//!         .transformation(
//!             Transformation::new()
//!                 .width(300)
//!                 .height(300)
//!                 .crop("fill")
//!                 .chain()
//!                 .overlay(TextLayer::new("Hello").font_family("Arial").font_size(18)),
//!         )
//!         .version(response.version)
//!         .build(&response.public_id)?;
//!     println!("{url}");
//!     Ok(())
//! }
//! ```
//!
//! Compilation is pure and synchronous; only the uploader touches the
//! network, and only token/TTL signing reads the clock (through an
//! injectable [`auth::Clock`]).

pub mod auth;
pub mod config;
pub mod error;
pub mod expression;
pub mod params;
pub mod transformation;
pub mod upload;
pub mod url;

pub use error::{MediaError, Result};

/// Common imports for SDK users
pub mod prelude {
    pub use crate::auth::AuthToken;
    pub use crate::config::CloudConfig;
    pub use crate::error::{MediaError, Result};
    pub use crate::expression::{Expression, Predefined};
    pub use crate::transformation::{
        ImageLayer, Layer, SubtitlesLayer, TextLayer, Transformation, Var, VideoLayer,
    };
    pub use crate::upload::{UploadOptions, UploadSource, Uploader};
    pub use crate::url::DeliveryUrl;
}
