//! Upload Client
//!
//! Builds the canonical parameter map for an upload, signs it, and hands
//! it to `reqwest` as a multipart body. Transport policy (retries,
//! timeouts) stays with the HTTP client the caller supplies; this module
//! only guarantees that what is signed is byte-identical to what is sent.
//!
//! `upload_large` streams the payload in fixed-size windows through the
//! chunk primitive, finalizing on the window whose [`ChunkData`] reports
//! last.

pub mod chunk;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::auth::{Clock, SystemClock, sign_request};
use crate::config::CloudConfig;
use crate::error::{MediaError, Result};
use crate::params::{ParamMap, ParamValue, multipart_fields};
use crate::transformation::Transformation;

pub use chunk::{ChunkData, ReadSeek, StreamWindow};

/// Default window size for chunked uploads (20 MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;

/// What to upload
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// A local file; the multipart filename is derived from the path
    Path(PathBuf),
    /// An in-memory buffer with an explicit filename
    Bytes {
        /// Raw payload
        data: Vec<u8>,
        /// Filename reported in the multipart part
        filename: String,
    },
    /// A remote URL fetched server-side
    Url(String),
}

impl UploadSource {
    /// Upload a local file
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

/// Optional parameters attached to an upload
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Identifier to assign to the uploaded resource
    pub public_id: Option<String>,
    /// Folder prefix for the public id
    pub folder: Option<String>,
    /// Tags to assign, expanded to repeated `tags[]` fields
    pub tags: Vec<String>,
    /// Incoming transformation applied before storing
    pub transformation: Option<Transformation>,
    /// Whether an existing resource with the same id may be replaced
    pub overwrite: Option<bool>,
    /// Resource type routing segment (`image`, `video`, `raw`, `auto`)
    pub resource_type: Option<String>,
    /// Contextual metadata, rendered as `key=value|key2=value2`
    pub context: BTreeMap<String, String>,
    /// Ad-hoc parameters merged in verbatim, bypassing validation
    pub extra: ParamMap,
}

impl UploadOptions {
    /// Render the options into the canonical parameter map
    pub fn to_params(&self) -> Result<ParamMap> {
        let mut params = ParamMap::new();
        if let Some(id) = &self.public_id {
            params.insert("public_id".into(), id.as_str().into());
        }
        if let Some(folder) = &self.folder {
            params.insert("folder".into(), folder.as_str().into());
        }
        if !self.tags.is_empty() {
            params.insert("tags".into(), self.tags.clone().into());
        }
        if let Some(t) = &self.transformation {
            params.insert("transformation".into(), t.generate()?.into());
        }
        if let Some(overwrite) = self.overwrite {
            params.insert("overwrite".into(), overwrite.into());
        }
        if !self.context.is_empty() {
            params.insert("context".into(), ParamValue::Map(self.context.clone()));
        }
        for (key, value) in &self.extra {
            params.insert(key.clone(), value.clone());
        }
        Ok(params)
    }

    fn resource_type_segment(&self) -> &str {
        self.resource_type.as_deref().unwrap_or("image")
    }
}

/// Response DTO for a completed upload
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// Assigned public id
    pub public_id: String,
    /// Resource version, usable in delivery URLs
    pub version: u64,
    /// Server-computed signature of the stored resource
    #[serde(default)]
    pub signature: Option<String>,
    /// Stored format
    #[serde(default)]
    pub format: Option<String>,
    /// Resource type the server filed this under
    #[serde(default)]
    pub resource_type: Option<String>,
    /// Payload size in bytes
    #[serde(default)]
    pub bytes: u64,
    /// Canonical delivery URL
    #[serde(default)]
    pub secure_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorMessage {
    message: String,
}

/// Signed multipart uploader
#[derive(Clone)]
pub struct Uploader {
    config: CloudConfig,
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl Uploader {
    /// Uploader with a default HTTP client and the system clock
    pub fn new(config: CloudConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a caller-constructed HTTP client (timeouts, proxies, ...)
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    /// Replace the wall clock (tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upload a payload in a single request
    pub async fn upload(
        &self,
        source: UploadSource,
        options: &UploadOptions,
    ) -> Result<UploadResponse> {
        let mut params = options.to_params()?;
        sign_request(&mut params, &self.config, self.clock.as_ref());

        let mut form = param_form(&params);
        form = match source {
            UploadSource::Path(path) => {
                let filename = filename_of(&path)?;
                let data = tokio::fs::read(&path).await?;
                form.part(
                    "file",
                    reqwest::multipart::Part::bytes(data).file_name(filename),
                )
            }
            UploadSource::Bytes { data, filename } => form.part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(filename),
            ),
            UploadSource::Url(url) => form.text("file", url),
        };

        let url = self.upload_url(options.resource_type_segment());
        tracing::debug!(%url, "uploading");
        let response = self.http_client.post(&url).multipart(form).send().await?;
        parse_response(response).await
    }

    /// Upload a large file in bounded windows. Every request carries the
    /// same signed parameter set plus a shared upload id; the server
    /// assembles the chunks and answers the final one with the full
    /// response DTO.
    pub async fn upload_large(
        &self,
        path: &Path,
        options: &UploadOptions,
        chunk_size: u64,
    ) -> Result<UploadResponse> {
        if chunk_size == 0 {
            return Err(MediaError::validation("chunk_size", "must be positive"));
        }
        let total = tokio::fs::metadata(path).await?.len();
        if total == 0 {
            return Err(MediaError::validation("file", "must not be empty"));
        }
        let filename = filename_of(path)?;

        let mut params = options.to_params()?;
        sign_request(&mut params, &self.config, self.clock.as_ref());
        let upload_id = uuid::Uuid::new_v4().simple().to_string();
        let url = self.upload_url(options.resource_type_segment());

        let file = std::fs::File::open(path)?;
        let source: Arc<Mutex<dyn ReadSeek>> = Arc::new(Mutex::new(file));

        let mut start = 0u64;
        let mut last_response = None;
        while start < total {
            let len = chunk_size.min(total - start);
            let chunk = ChunkData::new(start, start + len - 1, Some(total));
            let mut window = StreamWindow::seekable(source.clone(), start, len);
            let buffer = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
                let mut buffer = Vec::with_capacity(len as usize);
                std::io::Read::read_to_end(&mut window, &mut buffer)?;
                Ok(buffer)
            })
            .await
            .map_err(|e| MediaError::IoError(std::io::Error::other(e)))??;

            let form = param_form(&params).part(
                "file",
                reqwest::multipart::Part::bytes(buffer).file_name(filename.clone()),
            );
            tracing::debug!(
                range = %chunk.content_range(),
                last = chunk.is_last(),
                "uploading chunk"
            );
            let response = self
                .http_client
                .post(&url)
                .header("X-Unique-Upload-Id", &upload_id)
                .header("Content-Range", chunk.content_range())
                .multipart(form)
                .send()
                .await?;

            if chunk.is_last() {
                last_response = Some(parse_response(response).await?);
            } else if !response.status().is_success() {
                return Err(error_from(response).await);
            }
            start += len;
        }

        // total > 0 guarantees at least one iteration, and the final
        // iteration's chunk always reports last.
        last_response.ok_or_else(|| MediaError::validation("file", "must not be empty"))
    }

    fn upload_url(&self, resource_type: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.config.upload_base.trim_end_matches('/'),
            self.config.cloud_name,
            resource_type
        )
    }
}

fn param_form(params: &ParamMap) -> reqwest::multipart::Form {
    let mut form = reqwest::multipart::Form::new();
    for (key, value) in multipart_fields(params) {
        form = form.text(key, value);
    }
    form
}

fn filename_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MediaError::validation("file", "path has no filename"))
}

async fn parse_response(response: reqwest::Response) -> Result<UploadResponse> {
    if response.status().is_success() {
        Ok(response.json::<UploadResponse>().await?)
    } else {
        Err(error_from(response).await)
    }
}

async fn error_from(response: reqwest::Response) -> MediaError {
    let status = response.status().as_u16();
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body.error.message,
        Err(_) => "unrecognized error response".to_string(),
    };
    tracing::warn!(status, %message, "api error");
    MediaError::ApiError { status, message }
}
