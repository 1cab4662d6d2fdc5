//! Once-only guards for engagement events.
//!
//! Every engagement fire is gated on a guard key. The first `try_fire` for a
//! key claims it and returns `true`; later attempts return `false`. Keys are
//! scoped so a click key can never collide with a video key built from the
//! same element text.

use std::collections::HashSet;

/// Namespace for a guard condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardScope {
    Scroll,
    Click,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GuardKey {
    scope: GuardScope,
    condition: String,
}

/// Registry of engagement conditions that have already fired.
#[derive(Debug, Default)]
pub struct GuardRegistry {
    fired: HashSet<GuardKey>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a condition. Returns `true` exactly once per `(scope, condition)`
    /// pair; the caller fires only on `true`.
    pub fn try_fire(&mut self, scope: GuardScope, condition: &str) -> bool {
        self.fired.insert(GuardKey {
            scope,
            condition: condition.to_owned(),
        })
    }

    /// Whether a condition has already been claimed.
    pub fn has_fired(&self, scope: GuardScope, condition: &str) -> bool {
        self.fired.contains(&GuardKey {
            scope,
            condition: condition.to_owned(),
        })
    }

    /// Forget every claimed condition. Called when the page identity changes
    /// so the new route gets its own engagement budget.
    pub fn clear(&mut self) {
        self.fired.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_wins_and_repeats_lose() {
        let mut guards = GuardRegistry::new();
        assert!(guards.try_fire(GuardScope::Scroll, "scroll_75"));
        assert!(!guards.try_fire(GuardScope::Scroll, "scroll_75"));
    }

    #[test]
    fn scopes_do_not_collide() {
        let mut guards = GuardRegistry::new();
        assert!(guards.try_fire(GuardScope::Click, "cta_0"));
        assert!(guards.try_fire(GuardScope::Video, "cta_0"));
    }

    #[test]
    fn clear_releases_every_condition() {
        let mut guards = GuardRegistry::new();
        assert!(guards.try_fire(GuardScope::Video, "video_0_play"));
        guards.clear();
        assert!(guards.try_fire(GuardScope::Video, "video_0_play"));
        assert!(!guards.has_fired(GuardScope::Scroll, "scroll_75"));
    }
}
