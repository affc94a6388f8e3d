//! Gemini model client: file upload and multi-turn generation

use super::config::GeminiConfig;
use super::models::*;
use crate::metrics::METRICS;
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Gemini error types
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Upstream error: status {status}: {message}")]
    UpstreamError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Conversation has no turns")]
    EmptyConversation,

    #[error("Failed to read asset: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the relay needs from a hosted multimodal model
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Upload a local file and return the provider's reference to it
    async fn upload_asset(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<AssetReference, GeminiError>;

    /// Begin an empty conversation
    fn start_conversation(&self) -> Conversation {
        Conversation::new()
    }

    /// Send the conversation, whose last turn carries the new prompt, and
    /// return the model's text reply
    async fn send_message(&self, conversation: &Conversation) -> Result<String, GeminiError>;
}

/// Gemini REST client
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
    api_key: SecretString,
}

impl GeminiClient {
    /// Create a new Gemini client; fails without an API key
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        if !config.has_api_key() {
            return Err(GeminiError::MissingApiKey);
        }
        let api_key = config.api_key.clone().ok_or(GeminiError::MissingApiKey)?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GeminiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/v1beta/files", self.config.base_url())
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            self.config.model_name()
        )
    }

    /// Start a resumable upload and return the session URL
    async fn start_upload(
        &self,
        display_name: &str,
        mime_type: &str,
        size: usize,
    ) -> Result<String, GeminiError> {
        let response = self
            .http
            .post(self.upload_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStartRequest {
                file: UploadFileMetadata { display_name },
            })
            .send()
            .await
            .map_err(transport_error)?;

        let response = ensure_success(response).await?;

        response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| GeminiError::InvalidResponse("missing x-goog-upload-url header".to_string()))
    }

    async fn upload_bytes(&self, path: &Path, mime_type: &str) -> Result<AssetReference, GeminiError> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image.jpg")
            .to_string();

        debug!("Uploading {} bytes to Gemini: {}", bytes.len(), display_name);

        let session_url = self.start_upload(&display_name, mime_type, bytes.len()).await?;

        let response = self
            .http
            .post(&session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(transport_error)?;

        let uploaded: UploadResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(decode_error)?;

        let file = uploaded.file;
        info!(
            "Uploaded file '{}' as: {}",
            file.display_name.as_deref().unwrap_or(&display_name),
            file.uri
        );

        Ok(AssetReference {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type.unwrap_or_else(|| mime_type.to_string()),
            display_name: file.display_name.or(Some(display_name)),
        })
    }

    async fn generate(&self, conversation: &Conversation) -> Result<String, GeminiError> {
        if conversation.is_empty() {
            return Err(GeminiError::EmptyConversation);
        }

        let body = GenerateContentRequest {
            contents: &conversation.turns,
            generation_config: &self.config.generation,
        };

        debug!(
            "Calling Gemini generateContent: model={}, turns={}",
            self.config.model_name(),
            conversation.len()
        );

        let response = self
            .http
            .post(self.generate_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let generated: GenerateContentResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(decode_error)?;

        generated
            .text()
            .ok_or_else(|| GeminiError::EmptyResponse(generated.empty_reason()))
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn upload_asset(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<AssetReference, GeminiError> {
        let start = Instant::now();
        let result = self.upload_bytes(path, mime_type).await;

        METRICS.record_gemini("upload", result.is_ok(), start.elapsed());
        if let Err(e) = &result {
            error!("Gemini upload failed: {}", e);
        }
        result
    }

    async fn send_message(&self, conversation: &Conversation) -> Result<String, GeminiError> {
        let start = Instant::now();
        let result = self.generate(conversation).await;

        METRICS.record_gemini("generate", result.is_ok(), start.elapsed());
        if let Err(e) = &result {
            error!("Gemini generateContent failed: {}", e);
        }
        result
    }
}

fn transport_error(e: reqwest::Error) -> GeminiError {
    if e.is_timeout() {
        GeminiError::Timeout(e.to_string())
    } else {
        GeminiError::RequestFailed(e.to_string())
    }
}

/// Body read failures; the client timeout also fires while reading
fn decode_error(e: reqwest::Error) -> GeminiError {
    if e.is_timeout() {
        GeminiError::Timeout(e.to_string())
    } else {
        GeminiError::InvalidResponse(e.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, GeminiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(GeminiError::UpstreamError {
        status: status.as_u16(),
        message,
    })
}
