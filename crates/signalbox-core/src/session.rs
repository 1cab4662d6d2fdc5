//! One page's tracking session.
//!
//! A [`PageSession`] owns every piece of per-page state: the pixel set, the
//! once-only guards, the initialized-pixel registry, the engagement
//! observers, and the frame sizer. The host drives it from a single task;
//! methods take `&mut self` and the session never locks.
//!
//! Route changes keep the expensive state (injected scripts, registered
//! pixels) and reset the per-route state (guards, observers, sizer), so a
//! navigation refires the landing event without reloading vendor libraries.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::dispatch::EventDispatcher;
use crate::engage::{
    self, ClickTarget, SCROLL_GUARD_KEY, ScrollObserver, ScrollSample, VideoObserver, VideoSignal,
};
use crate::event::{CustomData, EventName};
use crate::frame::{self, FrameMessage, FrameReaction, IframeSizer};
use crate::guard::{GuardRegistry, GuardScope};
use crate::mirror::ConversionsMirror;
use crate::page::PageContext;
use crate::pixel::{self, PixelConfig};
use crate::poller::InitPoller;
use crate::script::{ScriptHost, ScriptKind, ScriptLoader};

/// Quiet window before a scroll sample is evaluated.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(100);

/// Pause between claiming a click and firing its events.
pub const CLICK_FIRE_DELAY: Duration = Duration::from_millis(100);

pub struct PageSession {
    host: Arc<dyn ScriptHost>,
    dispatcher: EventDispatcher,
    page: PageContext,
    pixels: Vec<PixelConfig>,
    guards: GuardRegistry,
    initialized: HashSet<String>,
    loader: ScriptLoader,
    poller: InitPoller,
    scroll: ScrollObserver,
    videos: VideoObserver,
    sizer: IframeSizer,
}

impl PageSession {
    pub fn new(
        host: Arc<dyn ScriptHost>,
        mirror: ConversionsMirror,
        page: PageContext,
        pixels: Vec<PixelConfig>,
    ) -> Self {
        let dispatcher = EventDispatcher::new(Arc::clone(&host), Arc::new(mirror));
        let sizer = IframeSizer::new(page.viewport.0);
        Self {
            host,
            dispatcher,
            page,
            pixels,
            guards: GuardRegistry::new(),
            initialized: HashSet::new(),
            loader: ScriptLoader::new(),
            poller: InitPoller::new(),
            scroll: ScrollObserver::new(),
            videos: VideoObserver::new(),
            sizer,
        }
    }

    /// Load the vendor scripts and fire the landing event for each family.
    ///
    /// Tag pixels fire immediately after their stub is in place. The social
    /// landing event waits for the poller; if the script never becomes
    /// ready, the social side is abandoned for this route and everything
    /// else keeps working.
    pub async fn open(&mut self) {
        tracing::debug!(
            url = %self.page.href(),
            pixels = self.pixels.len(),
            "page session opening"
        );

        if let Some(bootstrap_id) = pixel::tag_bootstrap_id(&self.pixels) {
            if let Err(err) = self
                .loader
                .ensure(self.host.as_ref(), ScriptKind::Tag, bootstrap_id)
            {
                tracing::warn!(error = %err, "tag script injection failed");
            }
            self.dispatcher.fire_tags(
                &self.pixels,
                &self.page,
                EventName::PageView,
                &CustomData::new(),
            );
        }

        let social_id = pixel::social(&self.pixels)
            .next()
            .map(|pixel| pixel.external_id.clone());
        if let Some(social_id) = social_id {
            if let Err(err) = self
                .loader
                .ensure(self.host.as_ref(), ScriptKind::Social, &social_id)
            {
                tracing::warn!(error = %err, "social script injection failed");
            }
            match self
                .poller
                .initialize_all(self.host.as_ref(), &self.pixels, &mut self.initialized)
                .await
            {
                Ok(retries) => {
                    tracing::debug!(retries, "social pixels ready");
                    self.dispatcher.fire_social(
                        &self.pixels,
                        &self.page,
                        EventName::PageView,
                        CustomData::new(),
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "social initialization abandoned");
                }
            }
        }
    }

    /// Swap in a new route: new page context and pixel set, fresh guards and
    /// observers. Injected scripts and initialized pixels carry over.
    pub fn enter_route(&mut self, page: PageContext, pixels: Vec<PixelConfig>) {
        self.sizer = IframeSizer::new(page.viewport.0);
        self.page = page;
        self.pixels = pixels;
        self.guards.clear();
        self.scroll.reset();
        self.videos.reset();
        tracing::debug!(url = %self.page.href(), "route entered");
    }

    /// Feed one scroll reading. Settles for the debounce window, then fires
    /// the depth event the first time the target is reached on this route.
    pub async fn on_scroll(&mut self, sample: ScrollSample) {
        if self.scroll.is_done() {
            return;
        }
        tokio::time::sleep(SCROLL_DEBOUNCE).await;
        if !self.scroll.observe(&sample) {
            return;
        }
        if !self.guards.try_fire(GuardScope::Scroll, SCROLL_GUARD_KEY) {
            return;
        }

        self.dispatcher.fire_social(
            &self.pixels,
            &self.page,
            EventName::Scroll75,
            engage::scroll_social_data(&self.page),
        );
        self.dispatcher.fire_tags(
            &self.pixels,
            &self.page,
            EventName::Scroll75,
            &engage::scroll_tag_params(),
        );
    }

    /// Feed one click. The guard is claimed up front so rapid double clicks
    /// collapse; the fire itself is slightly delayed so it never competes
    /// with the navigation the click may trigger.
    pub async fn on_click(&mut self, target: ClickTarget) {
        if target.is_ignored() {
            return;
        }
        if !self.guards.try_fire(GuardScope::Click, &target.guard_key()) {
            return;
        }
        tokio::time::sleep(CLICK_FIRE_DELAY).await;

        self.dispatcher.fire_social(
            &self.pixels,
            &self.page,
            EventName::Click,
            engage::click_social_data(&target, &self.page),
        );
        self.dispatcher.fire_tags(
            &self.pixels,
            &self.page,
            EventName::Click,
            &engage::click_tag_params(&target, &self.page),
        );
    }

    /// Track a video element discovered on the page or by a DOM rescan.
    /// Returns `true` when the host should attach playback listeners.
    pub fn register_video(&mut self, video_key: &str) -> bool {
        self.videos.register(video_key)
    }

    /// Feed one playback signal and fire whatever milestones it releases.
    pub fn on_video(&mut self, signal: &VideoSignal) {
        for event in engage::video_milestones(&mut self.guards, signal) {
            self.dispatcher.fire_social(
                &self.pixels,
                &self.page,
                event,
                engage::video_social_data(signal, &self.page),
            );
            self.dispatcher.fire_tags(
                &self.pixels,
                &self.page,
                event,
                &engage::video_tag_params(event),
            );
        }
    }

    /// Feed a raw message from an embedded player; non-player messages and
    /// foreign origins are dropped.
    pub fn on_embed_message(
        &mut self,
        origin: &str,
        payload: &Value,
        frame_key: &str,
        frame_src: &str,
    ) {
        if let Some(signal) = engage::translate_embed_message(origin, payload, frame_key, frame_src)
        {
            self.on_video(&signal);
        }
    }

    /// Route one message from the embedded form frame.
    pub fn on_frame(&mut self, message: &FrameMessage) -> FrameReaction {
        match message {
            FrameMessage::FormHeight { height } | FrameMessage::Resize { height } => {
                match self.sizer.apply(*height) {
                    Some(applied) => FrameReaction::Resize(applied),
                    None => FrameReaction::Ignored,
                }
            }
            other => match frame::answer(&self.page, other, Utc::now()) {
                Some(reply) => FrameReaction::Reply(reply),
                None => FrameReaction::Ignored,
            },
        }
    }

    /// Snapshot push for the frame's steady-state cadence.
    pub fn tracking_push(&self) -> FrameMessage {
        frame::tracking_push(&self.page, Utc::now())
    }

    /// One scheduled sizing attempt while no height has been applied.
    pub fn sizer_fallback(&mut self, measured: Option<f64>, final_attempt: bool) -> Option<u32> {
        self.sizer.fallback(measured, final_attempt)
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn pixels(&self) -> &[PixelConfig] {
        &self.pixels
    }
}
