//! Vendor script handles and the ensure-once loader.
//!
//! The engine never talks to a vendor library directly. It goes through the
//! [`ScriptHost`] capability, which hands out the social tracker handle and
//! the tag handle once their bootstrap scripts are in place. Embedders supply
//! the real bindings; tests supply recording fakes.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::ScriptError;
use crate::event::CustomData;

const SOCIAL_SRC: &str = "https://connect.facebook.net/en_US/fbevents.js";
const TAG_SRC_BASE: &str = "https://www.googletagmanager.com/gtag/js";

/// The two bootstrap scripts the engine knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Social vendor event library. The handle appears asynchronously once
    /// the script has executed.
    Social,
    /// Tag vendor loader. Injection installs a queueing stub, so the handle
    /// is usable immediately.
    Tag,
}

impl ScriptKind {
    /// Source URL for the bootstrap script. Only the tag loader embeds the
    /// bootstrap pixel id in its URL.
    pub fn src(self, bootstrap_id: &str) -> String {
        match self {
            Self::Social => SOCIAL_SRC.to_owned(),
            Self::Tag => format!("{TAG_SRC_BASE}?id={bootstrap_id}"),
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Social => f.write_str("social"),
            Self::Tag => f.write_str("tag"),
        }
    }
}

/// Handle to the social vendor's event library.
pub trait ScriptClient: Send + Sync {
    /// Whether the library has finished booting and accepts init calls.
    fn loaded(&self) -> bool;

    /// Register a pixel id with the library.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Init`] when the library rejects the pixel.
    fn init(&self, external_id: &str) -> Result<(), ScriptError>;

    /// Fire a standard event with a deduplication id.
    fn track(&self, name: &str, data: &CustomData, dedupe_id: &str);

    /// Fire a custom event with a deduplication id.
    fn track_custom(&self, name: &str, data: &CustomData, dedupe_id: &str);
}

/// Handle to the tag vendors' shared command queue.
pub trait TagClient: Send + Sync {
    /// Bind a pixel id with its configuration parameters.
    fn config(&self, external_id: &str, params: &CustomData);

    /// Fire an event through the queue.
    fn event(&self, name: &str, params: &CustomData);
}

/// Capability surface the engine runs against.
pub trait ScriptHost: Send + Sync {
    /// Append a bootstrap script to the document.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Injection`] when the document refuses the tag.
    fn inject(&self, kind: ScriptKind, bootstrap_id: &str) -> Result<(), ScriptError>;

    /// The social tracker handle, if its script has installed one.
    fn script(&self) -> Option<Arc<dyn ScriptClient>>;

    /// The tag queue handle, if its stub has been installed.
    fn tag(&self) -> Option<Arc<dyn TagClient>>;
}

/// Ensures each bootstrap script is injected at most once per document.
///
/// Any number of configured pixels of the same kind share one script tag.
/// A handle that already exists on the host counts as injected, so reloading
/// the engine against a warm document never duplicates the tag.
#[derive(Debug, Default)]
pub struct ScriptLoader {
    injected: HashSet<ScriptKind>,
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject `kind` unless the document already carries it. Returns `true`
    /// when this call performed the injection.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Injection`] when the host rejects the tag.
    pub fn ensure(
        &mut self,
        host: &dyn ScriptHost,
        kind: ScriptKind,
        bootstrap_id: &str,
    ) -> Result<bool, ScriptError> {
        let handle_present = match kind {
            ScriptKind::Social => host.script().is_some(),
            ScriptKind::Tag => host.tag().is_some(),
        };
        if handle_present {
            self.injected.insert(kind);
            return Ok(false);
        }
        if !self.injected.insert(kind) {
            return Ok(false);
        }

        host.inject(kind, bootstrap_id)?;
        tracing::debug!(kind = %kind, src = %kind.src(bootstrap_id), "bootstrap script injected");
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, HostCall};

    #[test]
    fn tag_src_embeds_the_bootstrap_id_and_social_src_does_not() {
        assert_eq!(
            ScriptKind::Tag.src("G-ABC123"),
            "https://www.googletagmanager.com/gtag/js?id=G-ABC123"
        );
        assert_eq!(
            ScriptKind::Social.src("1234567890"),
            "https://connect.facebook.net/en_US/fbevents.js"
        );
    }

    #[test]
    fn repeated_ensure_injects_each_kind_once() {
        let host = FakeHost::new();
        let mut loader = ScriptLoader::new();

        assert!(loader.ensure(&host, ScriptKind::Social, "111").unwrap());
        assert!(!loader.ensure(&host, ScriptKind::Social, "222").unwrap());
        assert!(loader.ensure(&host, ScriptKind::Tag, "G-1").unwrap());
        assert!(!loader.ensure(&host, ScriptKind::Tag, "G-2").unwrap());

        let injections: Vec<_> = host
            .calls()
            .into_iter()
            .filter(|call| matches!(call, HostCall::Inject { .. }))
            .collect();
        assert_eq!(injections.len(), 2);
    }

    #[test]
    fn existing_handle_suppresses_injection() {
        let host = FakeHost::new();
        host.install_tag_stub();
        let mut loader = ScriptLoader::new();

        assert!(!loader.ensure(&host, ScriptKind::Tag, "G-1").unwrap());
        assert!(host.calls().is_empty());
    }
}
