//! Tracking events and their per-dispatch deduplication ids.

use chrono::Utc;
use uuid::Uuid;

/// Open JSON map of vendor-specific event parameters.
pub type CustomData = serde_json::Map<String, serde_json::Value>;

/// Canonical event names fired by the engine.
///
/// Each name has two wire spellings: the social vendor's PascalCase form and
/// the tag vendors' snake_case form. Only `PageView` is a standard social
/// event (sent through the `track` primitive); everything else goes through
/// `track_custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    PageView,
    Scroll75,
    Click,
    VideoPlay,
    VideoView25,
    VideoView50,
    VideoView75,
    VideoComplete,
}

impl EventName {
    /// Spelling used for the social vendor's `track`/`trackCustom` calls and
    /// for the conversions-mirror `event_name`.
    pub fn social_name(self) -> &'static str {
        match self {
            Self::PageView => "PageView",
            Self::Scroll75 => "Scroll75",
            Self::Click => "Click",
            Self::VideoPlay => "VideoPlay",
            Self::VideoView25 => "VideoView25",
            Self::VideoView50 => "VideoView50",
            Self::VideoView75 => "VideoView75",
            Self::VideoComplete => "VideoComplete",
        }
    }

    /// Spelling used for the tag vendors' `event` calls.
    pub fn tag_name(self) -> &'static str {
        match self {
            Self::PageView => "page_view",
            Self::Scroll75 => "scroll",
            Self::Click => "click",
            Self::VideoPlay => "video_start",
            Self::VideoView25 | Self::VideoView50 | Self::VideoView75 => "video_progress",
            Self::VideoComplete => "video_complete",
        }
    }

    /// Whether the social vendor treats this as a standard event.
    pub fn is_standard(self) -> bool {
        matches!(self, Self::PageView)
    }
}

/// An event about to be dispatched, with its deduplication id already fixed.
///
/// The same `dedupe_id` travels with the client-side fire and every
/// server-side mirror of the dispatch, letting the vendor backend suppress
/// double counting.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingEvent {
    pub name: EventName,
    pub custom_data: CustomData,
    pub dedupe_id: String,
}

impl TrackingEvent {
    /// Build an event with a fresh `{name}_{millis}_{suffix}` dedupe id.
    pub fn new(name: EventName, custom_data: CustomData) -> Self {
        let dedupe_id = dedupe_id(name);
        Self {
            name,
            custom_data,
            dedupe_id,
        }
    }
}

/// Generate a per-dispatch deduplication id: the event name, the current
/// timestamp in milliseconds, and a 9-character random suffix.
pub fn dedupe_id(name: EventName) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("{}_{millis}_{suffix}", name.social_name())
}
