//! Submit form extraction
//!
//! `POST /api/process` accepts either `multipart/form-data` (file field
//! `image` or text field `image_url`) or a urlencoded form carrying
//! `image_url`.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    Form, Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use super::models::{error_codes, non_empty, ApiError};
use crate::error::{RelayError, Result};
use crate::image::ImageSource;

const REQUIRED_MESSAGE: &str = "Image and prompt are required.";

/// Image file taken from the multipart `image` field
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Raw submit fields, before validation
#[derive(Debug, Clone, Default)]
pub struct SubmitForm {
    pub prompt: Option<String>,
    pub session_id: Option<String>,
    pub image: Option<UploadedImage>,
    pub image_url: Option<String>,
}

/// Validated submit request
#[derive(Debug, Clone)]
pub struct Submission {
    pub prompt: String,
    pub session_id: Option<String>,
    pub source: ImageSource,
}

#[derive(Debug, Deserialize)]
struct UrlEncodedSubmit {
    prompt: Option<String>,
    session_id: Option<String>,
    image_url: Option<String>,
}

impl From<UrlEncodedSubmit> for SubmitForm {
    fn from(form: UrlEncodedSubmit) -> Self {
        Self {
            prompt: form.prompt,
            session_id: form.session_id,
            image: None,
            image_url: form.image_url,
        }
    }
}

impl SubmitForm {
    /// Check required fields and pick the image source
    pub fn into_submission(self) -> Result<Submission> {
        let prompt = non_empty(self.prompt).ok_or_else(|| RelayError::validation(REQUIRED_MESSAGE))?;
        let image = self.image.filter(|image| !image.bytes.is_empty());
        let image_url = non_empty(self.image_url);

        let source = match (image, image_url) {
            (Some(_), Some(_)) => {
                return Err(RelayError::validation(
                    "Provide either an image file or an image_url, not both.",
                ))
            }
            (Some(image), None) => ImageSource::Upload {
                bytes: image.bytes,
                content_type: image.content_type,
            },
            (None, Some(url)) => ImageSource::Url(url.trim().to_string()),
            (None, None) => return Err(RelayError::validation(REQUIRED_MESSAGE)),
        };

        Ok(Submission {
            prompt,
            session_id: non_empty(self.session_id),
            source,
        })
    }

    async fn from_multipart(mut multipart: Multipart) -> std::result::Result<Self, (StatusCode, Json<ApiError>)> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_form(format!("Failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| bad_form(format!("Failed to read image: {}", e)))?;
                    form.image = Some(UploadedImage {
                        bytes,
                        content_type,
                    });
                }
                "prompt" | "session_id" | "image_url" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| bad_form(format!("Failed to read field {}: {}", name, e)))?;
                    match name.as_str() {
                        "prompt" => form.prompt = Some(value),
                        "session_id" => form.session_id = Some(value),
                        _ => form.image_url = Some(value),
                    }
                }
                _ => debug!("Ignoring multipart field: {}", name),
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for SubmitForm
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| bad_form(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(form) = Form::<UrlEncodedSubmit>::from_request(req, state)
                .await
                .map_err(|e| bad_form(e.body_text()))?;
            Ok(form.into())
        } else {
            Err(bad_form(
                "Expected multipart/form-data or application/x-www-form-urlencoded body",
            ))
        }
    }
}

fn bad_form(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(error_codes::VALIDATION_ERROR, message)),
    )
}
