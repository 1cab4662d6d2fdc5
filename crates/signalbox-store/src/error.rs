//! Error type for settings storage backends.

/// Failure talking to a settings backend.
///
/// A missing record is NOT an error; `fetch` returns `Ok(None)` for that.
/// These variants cover genuine backend failures only.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading from the backend failed.
    #[error("settings read failed: {reason}")]
    Read { reason: String },

    /// Writing to the backend failed.
    #[error("settings write failed: {reason}")]
    Write { reason: String },

    /// A stored record could not be decoded into [`crate::PageSettings`].
    #[error("stored settings are malformed: {reason}")]
    Malformed { reason: String },
}
