//! Shared application state for the Signalbox server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. It holds the server configuration, the settings
//! store, and the admin user directory.

use std::sync::Arc;

use signalbox_store::SettingsStore;

use crate::auth::UserDirectory;
use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Server configuration snapshot.
    pub config: ServerConfig,
    /// Per-tenant settings records.
    pub store: Arc<dyn SettingsStore>,
    /// CRM user directory backing admin authorization.
    pub directory: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
