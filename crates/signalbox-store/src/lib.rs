//! Settings storage for Signalbox.
//!
//! This crate defines the [`SettingsStore`] trait: the single-row-per-tenant
//! configuration record behind a landing page: event date, redirect URL,
//! embedded-form URL, and the ordered list of configured tracking pixels.
//! The tracking engine in `signalbox-core` treats this record as read-only;
//! the admin API in `signalbox-server` is the only writer.
//!
//! Two implementations are provided:
//!
//! - [`PostgresSettingsStore`]: production, backed by `sqlx`/Postgres
//!   (feature `postgres-backend`)
//! - [`MemorySettingsStore`]: in-memory, for tests and local development
//!
//! A missing row is not an error: [`SettingsStore::fetch`] returns
//! `Ok(None)` and callers fall back to the hardcoded defaults on
//! [`PageSettings`].

mod error;
mod memory;
#[cfg(feature = "postgres-backend")]
mod postgres;
mod settings;

pub use error::SettingsError;
pub use memory::MemorySettingsStore;
#[cfg(feature = "postgres-backend")]
pub use postgres::PostgresSettingsStore;
pub use settings::{DEFAULT_TENANT_ID, PageSettings, PixelConfig, Vendor, default_event_date};

use uuid::Uuid;

/// Per-tenant landing-page settings storage.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// Look up the settings record for a tenant.
    ///
    /// Returns `Ok(None)` if no record exists; callers treat this as the
    /// "use defaults" condition, not a failure.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Read`] if the underlying backend fails.
    async fn fetch(&self, tenant_id: Uuid) -> Result<Option<PageSettings>, SettingsError>;

    /// Store the settings record for a tenant, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Write`] if the underlying backend fails.
    async fn save(&self, tenant_id: Uuid, settings: &PageSettings) -> Result<(), SettingsError>;
}
