use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::recommend::feedback::FeedbackLog;
use crate::recommend::model::ModelHandle;
use crate::tracker::store::TrackerStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Match model loaded at startup. Swapped only by an explicit reload.
    pub models: Arc<ModelHandle>,
    pub feedback: Arc<dyn FeedbackLog>,
    pub tracker: Arc<dyn TrackerStore>,
}
