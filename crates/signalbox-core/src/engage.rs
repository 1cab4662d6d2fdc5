//! Engagement observers: scroll depth, element clicks, video milestones.
//!
//! Observers turn raw page signals into at-most-once tracking events. The
//! once-ness always comes from [`GuardRegistry`] keys; the observers add the
//! thresholds, key derivation, and vendor payloads. Hosted `<video>`
//! elements and embedded players share the same milestone pipeline, embeds
//! just arrive as cross-document messages first.

use std::collections::HashSet;

use serde_json::{Value, json};

use crate::event::{CustomData, EventName};
use crate::guard::{GuardRegistry, GuardScope};
use crate::page::PageContext;

/// Depth at which the single scroll event fires, in percent.
pub const SCROLL_DEPTH_TARGET: f64 = 75.0;

/// Guard condition for the scroll event.
pub const SCROLL_GUARD_KEY: &str = "scroll_75";

/// Origin accepted for embedded-player progress messages.
pub const EMBED_ORIGIN: &str = "https://www.youtube.com";

const CLICK_KEY_TEXT_LEN: usize = 20;
const CLICK_NAME_LEN: usize = 100;
const IGNORED_CLICK_TAGS: [&str; 3] = ["script", "style", "iframe"];

const VIDEO_MILESTONES: [(f64, &str, EventName); 3] = [
    (0.25, "25", EventName::VideoView25),
    (0.50, "50", EventName::VideoView50),
    (0.75, "75", EventName::VideoView75),
];

// ── Scroll ───────────────────────────────────────────────────────────────

/// One reading of the page's scroll position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub scroll_y: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

impl ScrollSample {
    /// Scrolled share of the scrollable range, in percent. An unscrollable
    /// page at rest divides zero by zero; any movement on it counts as past
    /// every target.
    pub fn depth_percent(&self) -> f64 {
        self.scroll_y / (self.scroll_height - self.viewport_height) * 100.0
    }
}

/// Watches scroll samples until the depth target is reached once.
///
/// After the target fires the observer is done for the rest of the route,
/// mirroring a listener that unhooks itself.
#[derive(Debug, Default)]
pub struct ScrollObserver {
    done: bool,
}

impl ScrollObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample. Returns `true` exactly once, on the first sample at
    /// or past the depth target. A NaN depth never fires.
    pub fn observe(&mut self, sample: &ScrollSample) -> bool {
        let depth = sample.depth_percent();
        if self.done || depth.is_nan() || depth < SCROLL_DEPTH_TARGET {
            return false;
        }
        self.done = true;
        true
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Re-arm for a new route.
    pub fn reset(&mut self) {
        self.done = false;
    }
}

/// Social payload for the scroll event.
pub fn scroll_social_data(page: &PageContext) -> CustomData {
    CustomData::from_iter([
        ("scroll_depth".to_owned(), json!(75)),
        ("page_url".to_owned(), json!(page.href())),
    ])
}

/// Tag payload for the scroll event.
pub fn scroll_tag_params() -> CustomData {
    CustomData::from_iter([
        ("scroll_depth".to_owned(), json!(75)),
        ("event_category".to_owned(), json!("engagement")),
        ("event_label".to_owned(), json!("75% scroll depth")),
    ])
}

// ── Clicks ───────────────────────────────────────────────────────────────

/// The clicked element as reported by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClickTarget {
    pub id: String,
    pub class_name: String,
    /// Element tag in document casing, e.g. `BUTTON`.
    pub tag_name: String,
    pub text: String,
    pub href: Option<String>,
    pub offset_top: i32,
    pub offset_left: i32,
}

impl ClickTarget {
    /// Best available identifier: id, then class, then tag, then the
    /// element's offsets.
    pub fn element_id(&self) -> String {
        [&self.id, &self.class_name, &self.tag_name]
            .into_iter()
            .find(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("{}_{}", self.offset_top, self.offset_left))
    }

    /// Guard condition: the element identifier plus a short text prefix, so
    /// two buttons with the same markup but different labels count apart.
    pub fn guard_key(&self) -> String {
        let prefix: String = self.text.chars().take(CLICK_KEY_TEXT_LEN).collect();
        format!("{}_{prefix}", self.element_id())
    }

    /// Clicks on scaffolding elements are never tracked.
    pub fn is_ignored(&self) -> bool {
        IGNORED_CLICK_TAGS
            .iter()
            .any(|tag| self.tag_name.eq_ignore_ascii_case(tag))
    }

    fn content_name(&self) -> String {
        self.text.chars().take(CLICK_NAME_LEN).collect()
    }

    fn content_category(&self) -> String {
        self.tag_name.to_lowercase()
    }

    fn click_url(&self, page: &PageContext) -> String {
        match self.href.as_deref() {
            Some(href) if !href.is_empty() => href.to_owned(),
            _ => page.href().to_owned(),
        }
    }
}

/// Social payload for a click event.
pub fn click_social_data(target: &ClickTarget, page: &PageContext) -> CustomData {
    CustomData::from_iter([
        ("content_name".to_owned(), json!(target.content_name())),
        ("content_category".to_owned(), json!(target.content_category())),
        ("click_url".to_owned(), json!(target.click_url(page))),
        ("element_id".to_owned(), json!(target.element_id())),
    ])
}

/// Tag payload for a click event.
pub fn click_tag_params(target: &ClickTarget, page: &PageContext) -> CustomData {
    let category = target.content_category();
    let name = target.content_name();
    let category = if category.is_empty() {
        "interaction"
    } else {
        category.as_str()
    };
    let label = if name.is_empty() {
        "element_click"
    } else {
        name.as_str()
    };
    CustomData::from_iter([
        ("event_category".to_owned(), json!(category)),
        ("event_label".to_owned(), json!(label)),
        ("click_url".to_owned(), json!(target.click_url(page))),
        ("element_id".to_owned(), json!(target.element_id())),
    ])
}

// ── Video ────────────────────────────────────────────────────────────────

/// What a video element or embedded player reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoSignalKind {
    Play,
    /// Playback position as a fraction of the duration, `0.0..=1.0`.
    Progress(f64),
    Ended,
}

/// One playback signal, tied to a host-assigned video key.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSignal {
    pub video_key: String,
    pub kind: VideoSignalKind,
    /// Player-reported title; empty when unknown.
    pub title: String,
    /// Media or embed URL; empty when unknown.
    pub src: String,
}

/// Tracks which videos already have listeners attached, so DOM rescans
/// after mutations never double-register a player.
#[derive(Debug, Default)]
pub struct VideoObserver {
    known: HashSet<String>,
}

impl VideoObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the key is new and the host should attach
    /// listeners to it.
    pub fn register(&mut self, video_key: &str) -> bool {
        self.known.insert(video_key.to_owned())
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Forget every registration for a new route.
    pub fn reset(&mut self) {
        self.known.clear();
    }
}

/// Resolve a playback signal into the milestone events that have not fired
/// yet for this video. A progress jump releases every milestone it passed.
pub fn video_milestones(guards: &mut GuardRegistry, signal: &VideoSignal) -> Vec<EventName> {
    match signal.kind {
        VideoSignalKind::Play => {
            let key = format!("{}_play", signal.video_key);
            if guards.try_fire(GuardScope::Video, &key) {
                vec![EventName::VideoPlay]
            } else {
                Vec::new()
            }
        }
        VideoSignalKind::Progress(fraction) => VIDEO_MILESTONES
            .iter()
            .filter(|(threshold, _, _)| fraction >= *threshold)
            .filter(|(_, suffix, _)| {
                let key = format!("{}_{suffix}", signal.video_key);
                guards.try_fire(GuardScope::Video, &key)
            })
            .map(|(_, _, event)| *event)
            .collect(),
        VideoSignalKind::Ended => {
            let key = format!("{}_complete", signal.video_key);
            if guards.try_fire(GuardScope::Video, &key) {
                vec![EventName::VideoComplete]
            } else {
                Vec::new()
            }
        }
    }
}

/// Social payload shared by all milestones of one video.
pub fn video_social_data(signal: &VideoSignal, page: &PageContext) -> CustomData {
    let title = if signal.title.is_empty() {
        page.title.clone()
    } else {
        signal.title.clone()
    };
    let src = if signal.src.is_empty() {
        page.href().to_owned()
    } else {
        signal.src.clone()
    };
    CustomData::from_iter([
        ("video_title".to_owned(), json!(title)),
        ("video_url".to_owned(), json!(src)),
        ("content_type".to_owned(), json!("video")),
    ])
}

/// Tag payload for one video milestone.
pub fn video_tag_params(event: EventName) -> CustomData {
    let mut params = CustomData::from_iter([("event_category".to_owned(), json!("video"))]);
    if let Some((label, percent)) = video_label(event) {
        params.insert("event_label".to_owned(), json!(label));
        if let Some(percent) = percent {
            params.insert("video_percent".to_owned(), json!(percent));
        }
    }
    params
}

fn video_label(event: EventName) -> Option<(&'static str, Option<u32>)> {
    match event {
        EventName::VideoPlay => Some(("Video Play", None)),
        EventName::VideoView25 => Some(("Video 25%", Some(25))),
        EventName::VideoView50 => Some(("Video 50%", Some(50))),
        EventName::VideoView75 => Some(("Video 75%", Some(75))),
        EventName::VideoComplete => Some(("Video Complete", None)),
        _ => None,
    }
}

/// Translate an embedded player's progress message into a playback signal.
///
/// Messages from any other origin are dropped. Embeds only ever report
/// progress, so plays and completions never fire for them.
pub fn translate_embed_message(
    origin: &str,
    payload: &Value,
    frame_key: &str,
    frame_src: &str,
) -> Option<VideoSignal> {
    if origin != EMBED_ORIGIN {
        return None;
    }
    let info = payload.get("info")?;
    let fraction = info.get("videoProgress")?.as_f64()?;
    let title = info
        .get("videoTitle")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(VideoSignal {
        video_key: frame_key.to_owned(),
        kind: VideoSignalKind::Progress(fraction),
        title: title.to_owned(),
        src: frame_src.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::landing_page;

    fn sample(percent: f64) -> ScrollSample {
        // 2000px document in a 1000px viewport: 10px of scroll per percent.
        ScrollSample {
            scroll_y: percent * 10.0,
            scroll_height: 2000.0,
            viewport_height: 1000.0,
        }
    }

    #[test]
    fn scroll_target_fires_once_and_only_past_the_threshold() {
        let mut observer = ScrollObserver::new();

        assert!(!observer.observe(&sample(30.0)));
        assert!(observer.observe(&sample(80.0)));
        assert!(!observer.observe(&sample(90.0)));
        assert!(observer.is_done());
    }

    #[test]
    fn unscrollable_page_counts_as_fully_scrolled_only_when_moved() {
        let mut observer = ScrollObserver::new();
        let resting = ScrollSample {
            scroll_y: 0.0,
            scroll_height: 1000.0,
            viewport_height: 1000.0,
        };
        assert!(!observer.observe(&resting));

        let nudged = ScrollSample {
            scroll_y: 1.0,
            ..resting
        };
        assert!(observer.observe(&nudged));
    }

    #[test]
    fn click_identifier_prefers_id_then_class_then_tag_then_offsets() {
        let mut target = ClickTarget {
            id: "cta".to_owned(),
            class_name: "btn btn-primary".to_owned(),
            tag_name: "BUTTON".to_owned(),
            offset_top: 40,
            offset_left: 12,
            ..ClickTarget::default()
        };
        assert_eq!(target.element_id(), "cta");

        target.id.clear();
        assert_eq!(target.element_id(), "btn btn-primary");

        target.class_name.clear();
        assert_eq!(target.element_id(), "BUTTON");

        target.tag_name.clear();
        assert_eq!(target.element_id(), "40_12");
    }

    #[test]
    fn click_guard_key_truncates_the_text_prefix() {
        let target = ClickTarget {
            id: "cta".to_owned(),
            text: "Reserve your seat for the launch".to_owned(),
            ..ClickTarget::default()
        };
        assert_eq!(target.guard_key(), "cta_Reserve your seat fo");
    }

    #[test]
    fn scaffolding_elements_are_ignored() {
        for tag in ["SCRIPT", "style", "IFRAME"] {
            let target = ClickTarget {
                tag_name: tag.to_owned(),
                ..ClickTarget::default()
            };
            assert!(target.is_ignored(), "{tag} should be ignored");
        }

        let button = ClickTarget {
            tag_name: "BUTTON".to_owned(),
            ..ClickTarget::default()
        };
        assert!(!button.is_ignored());
    }

    #[test]
    fn click_payloads_fall_back_for_unnamed_targets() {
        let page = landing_page();
        let target = ClickTarget {
            tag_name: "DIV".to_owned(),
            ..ClickTarget::default()
        };

        let social = click_social_data(&target, &page);
        assert_eq!(social["content_name"], serde_json::json!(""));
        assert_eq!(social["content_category"], serde_json::json!("div"));
        assert_eq!(social["click_url"], serde_json::json!(page.href()));

        let tag = click_tag_params(&target, &page);
        assert_eq!(tag["event_label"], serde_json::json!("element_click"));
        assert_eq!(tag["event_category"], serde_json::json!("div"));
    }

    #[test]
    fn click_content_name_is_capped_at_one_hundred_chars() {
        let page = landing_page();
        let target = ClickTarget {
            tag_name: "A".to_owned(),
            text: "x".repeat(300),
            href: Some("https://example.com/offer".to_owned()),
            ..ClickTarget::default()
        };

        let social = click_social_data(&target, &page);
        let name = social["content_name"].as_str().unwrap();
        assert_eq!(name.len(), 100);
        assert_eq!(social["click_url"], serde_json::json!("https://example.com/offer"));
    }

    #[test]
    fn progress_jumps_release_every_passed_milestone_once() {
        let mut guards = GuardRegistry::new();
        let signal = |kind| VideoSignal {
            video_key: "video_0".to_owned(),
            kind,
            title: String::new(),
            src: String::new(),
        };

        assert_eq!(
            video_milestones(&mut guards, &signal(VideoSignalKind::Progress(0.30))),
            vec![EventName::VideoView25]
        );
        assert_eq!(
            video_milestones(&mut guards, &signal(VideoSignalKind::Progress(0.80))),
            vec![EventName::VideoView50, EventName::VideoView75]
        );
        assert!(video_milestones(&mut guards, &signal(VideoSignalKind::Progress(0.80))).is_empty());
    }

    #[test]
    fn a_full_watch_yields_all_five_milestones_exactly_once() {
        let mut guards = GuardRegistry::new();
        let signal = |kind| VideoSignal {
            video_key: "video_0".to_owned(),
            kind,
            title: String::new(),
            src: String::new(),
        };

        let mut fired = Vec::new();
        fired.extend(video_milestones(&mut guards, &signal(VideoSignalKind::Play)));
        fired.extend(video_milestones(
            &mut guards,
            &signal(VideoSignalKind::Progress(1.0)),
        ));
        fired.extend(video_milestones(&mut guards, &signal(VideoSignalKind::Ended)));

        assert_eq!(
            fired,
            vec![
                EventName::VideoPlay,
                EventName::VideoView25,
                EventName::VideoView50,
                EventName::VideoView75,
                EventName::VideoComplete,
            ]
        );

        assert!(video_milestones(&mut guards, &signal(VideoSignalKind::Play)).is_empty());
        assert!(video_milestones(&mut guards, &signal(VideoSignalKind::Ended)).is_empty());
    }

    #[test]
    fn separate_videos_keep_separate_milestones() {
        let mut guards = GuardRegistry::new();
        let first = VideoSignal {
            video_key: "video_0".to_owned(),
            kind: VideoSignalKind::Play,
            title: String::new(),
            src: String::new(),
        };
        let second = VideoSignal {
            video_key: "video_1".to_owned(),
            ..first.clone()
        };

        assert_eq!(video_milestones(&mut guards, &first).len(), 1);
        assert_eq!(video_milestones(&mut guards, &second).len(), 1);
    }

    #[test]
    fn rescans_never_double_register_a_video() {
        let mut observer = VideoObserver::new();
        assert!(observer.register("video_0"));
        assert!(observer.register("video_1"));
        assert!(!observer.register("video_0"));
        assert_eq!(observer.len(), 2);
    }

    #[test]
    fn video_payloads_fall_back_to_page_metadata() {
        let page = landing_page();
        let signal = VideoSignal {
            video_key: "video_0".to_owned(),
            kind: VideoSignalKind::Play,
            title: String::new(),
            src: String::new(),
        };

        let data = video_social_data(&signal, &page);
        assert_eq!(data["video_title"], serde_json::json!("Launch Event"));
        assert_eq!(data["video_url"], serde_json::json!(page.href()));
        assert_eq!(data["content_type"], serde_json::json!("video"));
    }

    #[test]
    fn tag_params_carry_percent_only_for_progress_milestones() {
        let progress = video_tag_params(EventName::VideoView50);
        assert_eq!(progress["event_label"], serde_json::json!("Video 50%"));
        assert_eq!(progress["video_percent"], serde_json::json!(50));

        let complete = video_tag_params(EventName::VideoComplete);
        assert_eq!(complete["event_label"], serde_json::json!("Video Complete"));
        assert!(complete.get("video_percent").is_none());
    }

    #[test]
    fn embed_messages_from_other_origins_are_dropped() {
        let payload = serde_json::json!({"info": {"videoProgress": 0.5}});
        assert!(
            translate_embed_message("https://evil.example", &payload, "embed_0", "https://e")
                .is_none()
        );
        assert!(translate_embed_message(EMBED_ORIGIN, &serde_json::json!({}), "embed_0", "x").is_none());
    }

    #[test]
    fn embed_progress_becomes_a_progress_signal_with_player_metadata() {
        let payload = serde_json::json!({
            "info": {"videoProgress": 0.52, "videoTitle": "Keynote"}
        });

        let signal = translate_embed_message(
            EMBED_ORIGIN,
            &payload,
            "embed_0",
            "https://www.youtube.com/embed/abc123",
        )
        .unwrap();

        assert_eq!(signal.kind, VideoSignalKind::Progress(0.52));
        assert_eq!(signal.title, "Keynote");
        assert_eq!(signal.src, "https://www.youtube.com/embed/abc123");
        assert_eq!(signal.video_key, "embed_0");
    }
}
