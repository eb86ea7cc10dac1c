use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;

/// Shared handles for the worker tasks.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
}

impl AppState {
    pub fn new(settings: Settings, db: PgPool) -> Self {
        Self { inner: Arc::new(InnerState { settings, db }) }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }
}
