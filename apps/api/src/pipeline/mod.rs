// Render Pipeline
// validate → HTML → convert → store → descriptor. Each step short-circuits, and
// nothing is written to the store until conversion has fully succeeded.

pub mod handlers;

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::artifacts::{ArtifactKind, ArtifactStore};
use crate::conversion::DocumentConverter;
use crate::errors::AppError;
use crate::models::resume::ResumeRecord;
use crate::render::render_resume_html;

/// What the client gets back after a successful render or export.
#[derive(Debug, Clone, Serialize)]
pub struct RenderResult {
    pub download_link: String,
    /// Base64 of the PDF, for inline preview without a second round trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_preview: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub include_preview: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_preview: true,
        }
    }
}

pub struct RenderPipeline {
    store: Arc<ArtifactStore>,
    converter: Arc<dyn DocumentConverter>,
}

impl RenderPipeline {
    pub fn new(store: Arc<ArtifactStore>, converter: Arc<dyn DocumentConverter>) -> Self {
        Self { store, converter }
    }

    /// Renders `record` to PDF and stages it for download.
    pub async fn render(
        &self,
        record: &ResumeRecord,
        options: RenderOptions,
    ) -> Result<RenderResult, AppError> {
        record.validate()?;

        let html = render_resume_html(record).map_err(|e| AppError::Render(e.to_string()))?;

        let document = self.converter.convert(Bytes::from(html)).await?;

        let pdf_preview = options
            .include_preview
            .then(|| STANDARD.encode(&document));

        let id = self
            .store
            .put(document, ArtifactKind::Document)
            .await
            .map_err(AppError::StoreWrite)?;

        info!("Rendered CV as artifact {id}");

        Ok(RenderResult {
            download_link: ArtifactKind::Document.download_link(id),
            pdf_preview,
        })
    }

    /// Stages the record itself as a pretty-printed JSON download.
    pub async fn export_json(&self, record: &ResumeRecord) -> Result<RenderResult, AppError> {
        record.validate()?;

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

        let id = self
            .store
            .put(Bytes::from(json), ArtifactKind::DataExport)
            .await
            .map_err(AppError::StoreWrite)?;

        info!("Exported CV data as artifact {id}");

        Ok(RenderResult {
            download_link: ArtifactKind::DataExport.download_link(id),
            pdf_preview: None,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::conversion::{ConversionError, DocumentConverter};

    /// Converter that answers every call with a fixed outcome.
    pub struct StubConverter {
        outcome: Result<Bytes, u16>,
        pub calls: AtomicUsize,
    }

    impl StubConverter {
        pub fn returning(bytes: &'static [u8]) -> Self {
            Self {
                outcome: Ok(Bytes::from_static(bytes)),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(status: u16) -> Self {
            Self {
                outcome: Err(status),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentConverter for StubConverter {
        async fn convert(&self, _html: Bytes) -> Result<Bytes, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Ok(bytes) => Ok(bytes.clone()),
                Err(status) => Err(ConversionError::Status {
                    status: *status,
                    body: "upstream failure".to_string(),
                }),
            }
        }
    }
}
