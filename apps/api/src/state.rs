use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::pipeline::RenderPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The one artifact store for this process. The sweeper holds the same `Arc`.
    pub store: Arc<ArtifactStore>,
    pub pipeline: Arc<RenderPipeline>,
    pub config: Config,
}
