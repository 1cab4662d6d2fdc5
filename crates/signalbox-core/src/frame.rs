//! Cross-document bridge between the page and its embedded form frame.
//!
//! The embedded frame cannot read the parent's URL or cookies, so it asks
//! over `postMessage` and the page answers. Independently of requests, the
//! page pushes a full tracking snapshot on a fixed cadence so a frame that
//! loads late or swallows a message still ends up with attribution data.
//! Messages are a tagged union; unknown or outbound-only types are ignored
//! on the way in.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::page::PageContext;

/// Delays after page load for the initial snapshot burst.
pub const PUSH_BURSTS: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_millis(1000),
];

/// Steady-state snapshot push interval.
pub const PUSH_INTERVAL: Duration = Duration::from_millis(5_000);

/// Delay before the snapshot push that follows a focus or history event.
pub const PUSH_REACTION_DELAY: Duration = Duration::from_millis(100);

/// Every message that crosses the page/frame boundary, in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FrameMessage {
    /// Unsolicited snapshot push from the page.
    #[serde(rename = "PARENT_TRACKING_DATA")]
    ParentTrackingData { data: TrackingSnapshot },

    #[serde(rename = "REQUEST_PARENT_URL")]
    RequestParentUrl,

    #[serde(rename = "PARENT_URL_RESPONSE")]
    ParentUrlResponse { url: String },

    #[serde(rename = "REQUEST_COOKIE")]
    RequestCookie {
        #[serde(rename = "cookieName")]
        cookie_name: String,
    },

    #[serde(rename = "PARENT_COOKIE_RESPONSE")]
    ParentCookieResponse {
        #[serde(rename = "cookieName")]
        cookie_name: String,
        #[serde(rename = "cookieValue")]
        cookie_value: String,
    },

    #[serde(rename = "REQUEST_TRACKING_DATA")]
    RequestTrackingData,

    #[serde(rename = "PARENT_TRACKING_RESPONSE")]
    ParentTrackingResponse { data: TrackingSnapshot },

    /// Content height reported by the embedded form.
    #[serde(rename = "BP_FORM_HEIGHT")]
    FormHeight { height: f64 },

    /// Generic embed resize request.
    #[serde(rename = "resize")]
    Resize { height: f64 },
}

/// What the page routes a frame message into.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameReaction {
    /// Send this message back to the frame.
    Reply(FrameMessage),
    /// Set the frame's height to this many pixels.
    Resize(u32),
    Ignored,
}

/// Attribution state handed to the embedded frame. Every field is always
/// present; unknown values are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub parent_url: String,
    pub parent_url_params: HashMap<String, String>,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
    pub gclid: String,
    pub fbclid: String,
    pub fbc: String,
    pub fbp: String,
    pub fbid: String,
    pub referrer: String,
    pub user_agent: String,
    /// Capture time, ISO 8601 with millisecond precision.
    pub timestamp: String,
}

impl TrackingSnapshot {
    pub fn capture(page: &PageContext, now: DateTime<Utc>) -> Self {
        let parent_url_params = page
            .url()
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let query = |name: &str| page.query_param(name).unwrap_or_default();
        let cookie = |name: &str| page.cookie(name).unwrap_or_default().to_owned();

        Self {
            parent_url: page.href().to_owned(),
            parent_url_params,
            utm_source: query("utm_source"),
            utm_medium: query("utm_medium"),
            utm_campaign: query("utm_campaign"),
            utm_content: query("utm_content"),
            utm_term: query("utm_term"),
            gclid: query("gclid"),
            fbclid: query("fbclid"),
            fbc: cookie("_fbc"),
            fbp: cookie("_fbp"),
            fbid: cookie("_fbid"),
            referrer: page.referrer.clone(),
            user_agent: page.user_agent.clone(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Answer one inbound frame request. Pushes, responses, and height reports
/// produce no reply here; height reports go to the [`IframeSizer`].
pub fn answer(
    page: &PageContext,
    message: &FrameMessage,
    now: DateTime<Utc>,
) -> Option<FrameMessage> {
    match message {
        FrameMessage::RequestParentUrl => Some(FrameMessage::ParentUrlResponse {
            url: page.href().to_owned(),
        }),
        FrameMessage::RequestCookie { cookie_name } => Some(FrameMessage::ParentCookieResponse {
            cookie_name: cookie_name.clone(),
            cookie_value: page.cookie(cookie_name).unwrap_or_default().to_owned(),
        }),
        FrameMessage::RequestTrackingData => Some(FrameMessage::ParentTrackingResponse {
            data: TrackingSnapshot::capture(page, now),
        }),
        _ => None,
    }
}

/// Build the unsolicited snapshot push.
pub fn tracking_push(page: &PageContext, now: DateTime<Utc>) -> FrameMessage {
    FrameMessage::ParentTrackingData {
        data: TrackingSnapshot::capture(page, now),
    }
}

// ── Iframe sizing ────────────────────────────────────────────────────────

/// Measurement retries after load while no height has been applied yet.
pub const FALLBACK_MEASURE_DELAYS: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_millis(1500),
    Duration::from_millis(2500),
];

const MIN_HEIGHT_DESKTOP: u32 = 200;
const MIN_HEIGHT_MOBILE: u32 = 250;
const DESKTOP_MIN_WIDTH: u32 = 768;
const HEIGHT_DELTA: u32 = 5;
const FALLBACK_HEIGHT: u32 = 1600;

/// Decides which reported form heights actually reach the iframe element.
///
/// Heights are clamped to a viewport-dependent minimum and changes smaller
/// than a few pixels are dropped, so the embed cannot make the page jitter.
#[derive(Debug, Clone)]
pub struct IframeSizer {
    viewport_width: u32,
    last: Option<u32>,
}

impl IframeSizer {
    pub fn new(viewport_width: u32) -> Self {
        Self {
            viewport_width,
            last: None,
        }
    }

    /// Minimum applied height. Narrow viewports stack content, so they get
    /// the taller floor.
    pub fn min_height(&self) -> u32 {
        if self.viewport_width >= DESKTOP_MIN_WIDTH {
            MIN_HEIGHT_DESKTOP
        } else {
            MIN_HEIGHT_MOBILE
        }
    }

    /// Validate and clamp a reported height. Returns the height to apply,
    /// or `None` when the report is invalid or too close to the last one.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply(&mut self, height: f64) -> Option<u32> {
        if !height.is_finite() || height <= 0.0 {
            return None;
        }
        let clamped = (height.round() as u32).max(self.min_height());
        if let Some(last) = self.last {
            if clamped.abs_diff(last) < HEIGHT_DELTA {
                return None;
            }
        }
        self.last = Some(clamped);
        Some(clamped)
    }

    /// Whether any height has been applied since construction.
    pub fn applied(&self) -> bool {
        self.last.is_some()
    }

    /// One scheduled measurement attempt. Runs only until a height has been
    /// applied; a final attempt that cannot measure (cross-origin content)
    /// falls back to a fixed tall height rather than leaving the frame
    /// collapsed.
    pub fn fallback(&mut self, measured: Option<f64>, final_attempt: bool) -> Option<u32> {
        if self.applied() {
            return None;
        }
        match measured {
            Some(height) => self.apply(height),
            None if final_attempt => {
                self.last = Some(FALLBACK_HEIGHT);
                Some(FALLBACK_HEIGHT)
            }
            None => None,
        }
    }
}
