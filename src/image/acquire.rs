//! Image acquisition from uploads or remote URLs

use super::temp::TempImage;
use crate::config::ImageConfig;
use crate::metrics::METRICS;
use bytes::{Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

/// MIME type used when the source does not name an image type
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Image acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to download image: {0}")]
    RequestFailed(String),

    #[error("Failed to download image: status {0}")]
    BadStatus(u16),

    #[error("Image is empty")]
    Empty,

    #[error("Image too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the image for a submit request comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes from a multipart file field
    Upload {
        bytes: Bytes,
        content_type: Option<String>,
    },
    /// Remote URL to fetch
    Url(String),
}

impl ImageSource {
    fn label(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::Url(_) => "url",
        }
    }
}

/// Materializes image sources to temp files
pub struct ImageAcquirer {
    http: Client,
    config: ImageConfig,
}

impl ImageAcquirer {
    pub fn new(config: ImageConfig) -> Result<Self, ImageError> {
        let http = Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| ImageError::RequestFailed(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Obtain the image bytes and write them to a scoped temp file
    pub async fn acquire(&self, source: ImageSource) -> Result<TempImage, ImageError> {
        let label = source.label();
        let result = match source {
            ImageSource::Upload {
                bytes,
                content_type,
            } => self.store_upload(bytes, content_type).await,
            ImageSource::Url(url) => self.download(&url).await,
        };

        METRICS.record_image(label, result.is_ok());
        if let Err(e) = &result {
            warn!("Image acquisition failed: source={}, error={}", label, e);
        }
        result
    }

    async fn store_upload(
        &self,
        bytes: Bytes,
        content_type: Option<String>,
    ) -> Result<TempImage, ImageError> {
        self.check_size(bytes.len() as u64)?;
        let mime_type = content_type
            .as_deref()
            .and_then(image_mime_type)
            .unwrap_or(DEFAULT_MIME_TYPE);

        debug!("Storing uploaded image: {} bytes, {}", bytes.len(), mime_type);
        Ok(TempImage::write(self.config.temp_dir.as_deref(), &bytes, mime_type).await?)
    }

    /// Fetch the URL once; only a 200 response counts as success
    async fn download(&self, url: &str) -> Result<TempImage, ImageError> {
        let url = Url::parse(url).map_err(|e| ImageError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ImageError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        debug!("Downloading image: url={}", url);

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::RequestFailed(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(ImageError::BadStatus(response.status().as_u16()));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(image_mime_type)
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        // Chunked responses carry no Content-Length; stop reading once the cap is crossed.
        let mut bytes = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ImageError::RequestFailed(e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > self.config.max_bytes {
                return Err(ImageError::TooLarge {
                    size: bytes.len() as u64,
                    limit: self.config.max_bytes as u64,
                });
            }
        }
        self.check_size(bytes.len() as u64)?;

        Ok(TempImage::write(self.config.temp_dir.as_deref(), &bytes, mime_type).await?)
    }

    fn check_size(&self, size: u64) -> Result<(), ImageError> {
        if size == 0 {
            return Err(ImageError::Empty);
        }
        let limit = self.config.max_bytes as u64;
        if size > limit {
            return Err(ImageError::TooLarge { size, limit });
        }
        Ok(())
    }
}

/// The `image/*` essence of a Content-Type value
fn image_mime_type(content_type: &str) -> Option<&str> {
    let essence = content_type.split(';').next()?.trim();
    let is_image = essence
        .get(..6)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("image/"));
    if is_image && essence.len() > 6 {
        Some(essence)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acquirer(dir: &std::path::Path) -> ImageAcquirer {
        ImageAcquirer::new(ImageConfig {
            temp_dir: Some(dir.to_path_buf()),
            max_bytes: 16,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type("image/png"), Some("image/png"));
        assert_eq!(image_mime_type("image/webp; q=1"), Some("image/webp"));
        assert_eq!(image_mime_type("text/html"), None);
        assert_eq!(image_mime_type("image/"), None);
        assert_eq!(image_mime_type(""), None);
    }

    #[tokio::test]
    async fn test_upload_uses_part_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let image = acquirer(dir.path())
            .acquire(ImageSource::Upload {
                bytes: Bytes::from_static(b"png bytes"),
                content_type: Some("image/png".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(image.mime_type(), "image/png");
        assert!(image.path().starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_upload_defaults_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let image = acquirer(dir.path())
            .acquire(ImageSource::Upload {
                bytes: Bytes::from_static(b"raw"),
                content_type: Some("application/octet-stream".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(image.mime_type(), DEFAULT_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let result = acquirer(dir.path())
            .acquire(ImageSource::Upload {
                bytes: Bytes::from(vec![0u8; 17]),
                content_type: None,
            })
            .await;

        assert!(matches!(result, Err(ImageError::TooLarge { size: 17, limit: 16 })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let result = acquirer(dir.path())
            .acquire(ImageSource::Url("file:///etc/passwd".to_string()))
            .await;

        assert!(matches!(result, Err(ImageError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_download_once_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/img.jpg")
            .with_status(200)
            .with_header("content-type", "image/gif")
            .with_body("gif bytes")
            .expect(1)
            .create_async()
            .await;

        let image = acquirer(dir.path())
            .acquire(ImageSource::Url(format!("{}/img.jpg", server.url())))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(image.mime_type(), "image/gif");
        assert_eq!(std::fs::read(image.path()).unwrap(), b"gif bytes");
    }

    #[tokio::test]
    async fn test_download_non_200_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.jpg")
            .with_status(404)
            .create_async()
            .await;

        let result = acquirer(dir.path())
            .acquire(ImageSource::Url(format!("{}/missing.jpg", server.url())))
            .await;

        assert!(matches!(result, Err(ImageError::BadStatus(404))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_partial_content_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/partial.jpg")
            .with_status(206)
            .with_body("partial")
            .create_async()
            .await;

        let result = acquirer(dir.path())
            .acquire(ImageSource::Url(format!("{}/partial.jpg", server.url())))
            .await;

        assert!(matches!(result, Err(ImageError::BadStatus(206))));
    }

    #[tokio::test]
    async fn test_chunked_download_cut_off_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let total = 4 * 1024 * 1024;
        let _mock = server
            .mock("GET", "/stream.jpg")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_chunked_body(move |w| {
                let chunk = [0u8; 1024];
                for _ in 0..total / chunk.len() {
                    w.write_all(&chunk)?;
                }
                Ok(())
            })
            .create_async()
            .await;

        let result = acquirer(dir.path())
            .acquire(ImageSource::Url(format!("{}/stream.jpg", server.url())))
            .await;

        match result {
            Err(ImageError::TooLarge { size, limit }) => {
                assert_eq!(limit, 16);
                assert!(size > 16);
                assert!(size < total as u64);
            }
            other => panic!("Expected TooLarge, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
