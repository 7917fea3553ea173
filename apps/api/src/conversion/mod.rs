//! Conversion client: the single outbound path to the HTML-to-PDF service.
//!
//! Gotenberg's Chromium route takes a multipart form whose `files` field holds
//! an `index.html`, and answers 200 with the PDF as the raw body.
//!
//! One attempt per call. Retrying is the caller's decision.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

const CONVERT_HTML_PATH: &str = "/forms/chromium/convert/html";
const FORM_FIELD: &str = "files";
const FORM_FILENAME: &str = "index.html";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("conversion service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("conversion service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Anything that can turn an HTML page into document bytes.
///
/// Carried in `AppState` as `Arc<dyn DocumentConverter>`.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, html: Bytes) -> Result<Bytes, ConversionError>;
}

/// Client for a Gotenberg instance.
#[derive(Clone)]
pub struct GotenbergClient {
    client: Client,
    endpoint: String,
}

impl GotenbergClient {
    /// `base_url` is the service root, e.g. `http://gotenberg:3000`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConversionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{CONVERT_HTML_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DocumentConverter for GotenbergClient {
    async fn convert(&self, html: Bytes) -> Result<Bytes, ConversionError> {
        let html_len = html.len();
        let part = multipart::Part::bytes(html.to_vec())
            .file_name(FORM_FILENAME)
            .mime_str("text/html")?;
        let form = multipart::Form::new().part(FORM_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .bytes()
                .await
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default();
            warn!("Conversion service returned {status}: {body}");
            return Err(ConversionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let document = response.bytes().await?;

        debug!(
            "Converted {html_len} bytes of HTML into {} byte document",
            document.len()
        );

        Ok(document)
    }
}
