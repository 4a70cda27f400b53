//! Gemini Files API client.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::metrics::record_remote_call;

use super::{ApiContext, RemoteAsset, RemoteAssetClient, RemoteAssetState, RemoteServiceError};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const LIST_PAGE_SIZE: u32 = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini Files API client implementation.
pub struct GeminiFilesClient {
    client: Client,
    api_base: String,
}

impl GeminiFilesClient {
    /// Create a new client.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteServiceError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteServiceError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.api_base, name.trim_start_matches('/'))
    }

    async fn begin_upload(
        &self,
        ctx: &ApiContext,
        size: u64,
        display_name: &str,
        mime_type: &str,
    ) -> Result<String, RemoteServiceError> {
        let request = StartUploadRequest {
            file: StartUploadFile { display_name },
        };

        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.api_base))
            .header(API_KEY_HEADER, ctx.api_key())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let response = check_status(response, display_name).await?;
        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                RemoteServiceError::InvalidResponse("missing x-goog-upload-url header".to_string())
            })
    }

    async fn upload_bytes(
        &self,
        upload_url: &str,
        path: &Path,
        size: u64,
    ) -> Result<RemoteAsset, RemoteServiceError> {
        let file = tokio::fs::File::open(path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .client
            .post(upload_url)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let response = check_status(response, upload_url).await?;
        let envelope: FileEnvelope = parse_json(response).await?;
        envelope.file.into_asset()
    }
}

#[async_trait]
impl RemoteAssetClient for GeminiFilesClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn submit(
        &self,
        ctx: &ApiContext,
        path: &Path,
        display_name: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteAsset, RemoteServiceError> {
        let start = Instant::now();
        let result = async {
            let size = tokio::fs::metadata(path).await?.len();
            let mime_type = mime_type.unwrap_or("application/octet-stream");
            debug!(path = %path.display(), size, mime_type, "Starting resumable upload");

            let upload_url = self.begin_upload(ctx, size, display_name, mime_type).await?;
            self.upload_bytes(&upload_url, path, size).await
        }
        .await;
        record_remote_call("submit", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn get(&self, ctx: &ApiContext, name: &str) -> Result<RemoteAsset, RemoteServiceError> {
        let start = Instant::now();
        let result = async {
            let response = self
                .client
                .get(self.resource_url(name))
                .header(API_KEY_HEADER, ctx.api_key())
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let response = check_status(response, name).await?;
            let file: GeminiFile = parse_json(response).await?;
            file.into_asset()
        }
        .await;
        record_remote_call("get", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn delete(&self, ctx: &ApiContext, name: &str) -> Result<(), RemoteServiceError> {
        let start = Instant::now();
        let result = async {
            let response = self
                .client
                .delete(self.resource_url(name))
                .header(API_KEY_HEADER, ctx.api_key())
                .send()
                .await
                .map_err(map_reqwest_error)?;
            check_status(response, name).await.map(|_| ())
        }
        .await;
        record_remote_call("delete", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn rename(
        &self,
        ctx: &ApiContext,
        name: &str,
        display_name: &str,
    ) -> Result<RemoteAsset, RemoteServiceError> {
        let start = Instant::now();
        let result = async {
            let response = self
                .client
                .patch(self.resource_url(name))
                .query(&[("updateMask", "displayName")])
                .header(API_KEY_HEADER, ctx.api_key())
                .json(&RenameRequest { display_name })
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let response = check_status(response, name).await?;
            let file: GeminiFile = parse_json(response).await?;
            file.into_asset()
        }
        .await;
        record_remote_call("rename", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn list(&self, ctx: &ApiContext) -> Result<Vec<RemoteAsset>, RemoteServiceError> {
        let start = Instant::now();
        let result = async {
            let mut assets = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let mut request = self
                    .client
                    .get(format!("{}/v1beta/files", self.api_base))
                    .query(&[("pageSize", LIST_PAGE_SIZE.to_string())])
                    .header(API_KEY_HEADER, ctx.api_key());
                if let Some(token) = &page_token {
                    request = request.query(&[("pageToken", token)]);
                }

                let response = request.send().await.map_err(map_reqwest_error)?;
                let response = check_status(response, "files").await?;
                let page: ListFilesResponse = parse_json(response).await?;

                for file in page.files {
                    assets.push(file.into_asset()?);
                }

                match page.next_page_token {
                    Some(token) if !token.is_empty() => page_token = Some(token),
                    _ => break,
                }
            }

            Ok::<_, RemoteServiceError>(assets)
        }
        .await;
        record_remote_call("list", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct StartUploadRequest<'a> {
    file: StartUploadFile<'a>,
}

#[derive(Debug, Serialize)]
struct StartUploadFile<'a> {
    display_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesResponse {
    #[serde(default)]
    files: Vec<GeminiFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    /// int64 fields arrive as JSON strings.
    #[serde(default)]
    size_bytes: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    expiration_time: Option<DateTime<Utc>>,
}

impl GeminiFile {
    fn into_asset(self) -> Result<RemoteAsset, RemoteServiceError> {
        let size_bytes = self
            .size_bytes
            .as_deref()
            .map(|s| {
                s.parse::<u64>().map_err(|e| {
                    RemoteServiceError::InvalidResponse(format!("sizeBytes {:?}: {}", s, e))
                })
            })
            .transpose()?;

        Ok(RemoteAsset {
            name: self.name,
            state: parse_state(self.state.as_deref()),
            display_name: self.display_name,
            mime_type: self.mime_type,
            size_bytes,
            uri: self.uri,
            create_time: self.create_time,
            expiration_time: self.expiration_time,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

/// Map a wire state to the asset state; unspecified counts as still uploading.
fn parse_state(state: Option<&str>) -> RemoteAssetState {
    match state {
        Some("PROCESSING") => RemoteAssetState::Processing,
        Some("ACTIVE") => RemoteAssetState::Active,
        Some("FAILED") => RemoteAssetState::Failed,
        _ => RemoteAssetState::Uploading,
    }
}

fn map_reqwest_error(e: reqwest::Error) -> RemoteServiceError {
    if e.is_timeout() {
        RemoteServiceError::Timeout
    } else {
        RemoteServiceError::Http(e.to_string())
    }
}

async fn check_status(response: Response, subject: &str) -> Result<Response, RemoteServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GoogleErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    if status == StatusCode::NOT_FOUND {
        return Err(RemoteServiceError::NotFound(subject.to_string()));
    }
    Err(RemoteServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, RemoteServiceError> {
    let body = response.text().await.map_err(map_reqwest_error)?;
    serde_json::from_str(&body).map_err(|e| RemoteServiceError::InvalidResponse(e.to_string()))
}
