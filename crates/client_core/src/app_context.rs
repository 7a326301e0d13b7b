//! Dashboard-wide UI state, passed explicitly to whatever needs it.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use storage::DocumentStore;
use tokio::sync::Mutex;
use tracing::warn;

pub const PREFERENCES_DOCUMENT: &str = "app-preferences";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub sidebar_open: bool,
}

pub struct AppContext {
    store: Arc<dyn DocumentStore>,
    state: Mutex<AppState>,
}

impl AppContext {
    /// Loads persisted preferences; anything unreadable falls back to defaults.
    pub async fn init(store: Arc<dyn DocumentStore>) -> Self {
        let state = match store.load_document(PREFERENCES_DOCUMENT).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!("ignoring unreadable preferences: {err}");
                AppState::default()
            }),
            Ok(None) => AppState::default(),
            Err(err) => {
                warn!("failed to read preferences: {err:#}");
                AppState::default()
            }
        };
        Self {
            store,
            state: Mutex::new(state),
        }
    }

    pub async fn state(&self) -> AppState {
        *self.state.lock().await
    }

    pub async fn sidebar_open(&self) -> bool {
        self.state.lock().await.sidebar_open
    }

    pub async fn set_sidebar_open(&self, open: bool) {
        let mut state = self.state.lock().await;
        state.sidebar_open = open;
        self.persist(*state).await;
    }

    /// Flips the sidebar and returns the new value.
    pub async fn toggle_sidebar(&self) -> bool {
        let mut state = self.state.lock().await;
        state.sidebar_open = !state.sidebar_open;
        self.persist(*state).await;
        state.sidebar_open
    }

    /// Writes the final state; unlike intermediate saves, failure is reported.
    pub async fn teardown(self) -> Result<()> {
        let state = self.state.into_inner();
        self.store
            .save_document(PREFERENCES_DOCUMENT, &serde_json::to_value(state)?)
            .await
    }

    async fn persist(&self, state: AppState) {
        let result = match serde_json::to_value(state) {
            Ok(value) => self.store.save_document(PREFERENCES_DOCUMENT, &value).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            warn!("failed to save preferences: {err:#}");
        }
    }
}
