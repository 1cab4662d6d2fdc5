//! Error types for `signalbox-core`.
//!
//! Tracking failures stop at the session boundary, where they are logged and
//! swallowed so the page keeps rendering whatever the tracking health. Each
//! variant carries enough context to diagnose the failure from logs alone,
//! and never a credential.

use crate::script::ScriptKind;

/// Errors from vendor script loading and pixel initialization.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The vendor script never reported ready within the polling ceiling.
    #[error("{kind} script not ready after {attempts} attempts")]
    NeverReady { kind: ScriptKind, attempts: u32 },

    /// The vendor global handle is missing at dispatch time.
    #[error("{kind} handle unavailable")]
    HandleMissing { kind: ScriptKind },

    /// Injecting the script resource into the host failed.
    #[error("injecting {kind} script failed: {reason}")]
    Injection { kind: ScriptKind, reason: String },

    /// A single pixel's `init` call failed. The remaining pixels still
    /// initialize.
    #[error("init failed for pixel {external_id}: {reason}")]
    Init { external_id: String, reason: String },
}

/// Errors from the conversions-mirror transport.
///
/// These never escape [`crate::mirror::ConversionsMirror::submit`]; the
/// mirror logs them and resolves anyway.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The ingestion endpoint answered with a non-success status.
    #[error("conversions endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never completed.
    #[error("conversions request failed: {reason}")]
    Network { reason: String },
}

/// Errors from building a [`crate::page::PageContext`].
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// The page URL could not be parsed.
    #[error("invalid page url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A bounded retry budget ran out before the condition held.
#[derive(Debug, thiserror::Error)]
#[error("condition not met after {attempts} attempts")]
pub struct RetryExhausted {
    pub attempts: u32,
}
