//! Event fan-out to the vendor scripts and the conversions mirror.
//!
//! A social dispatch is one client-side fire through the shared handle plus
//! one mirrored submission per token-carrying pixel, all stamped with the
//! same deduplication id. A tag dispatch is a `config` followed by an
//! `event` for every tag pixel, so a pixel added mid-session is configured
//! before its first event.
//!
//! Mirror submissions run on detached tasks. A slow or dead conversions
//! endpoint never delays the next fire.

use std::sync::Arc;

use serde_json::json;

use crate::error::ScriptError;
use crate::event::{CustomData, EventName, TrackingEvent};
use crate::mirror::ConversionsMirror;
use crate::page::PageContext;
use crate::pixel::{self, PixelConfig, Vendor};
use crate::script::{ScriptHost, ScriptKind};

pub struct EventDispatcher {
    host: Arc<dyn ScriptHost>,
    mirror: Arc<ConversionsMirror>,
}

impl EventDispatcher {
    pub fn new(host: Arc<dyn ScriptHost>, mirror: Arc<ConversionsMirror>) -> Self {
        Self { host, mirror }
    }

    /// Fire `name` once through the social handle and mirror it for every
    /// token-carrying social pixel.
    ///
    /// Standard events go through `track` with empty data; everything else
    /// goes through `track_custom` with `custom`. A missing handle skips the
    /// browser fire but still mirrors, since the mirror does not need the
    /// vendor script. Returns the dispatched event, or `None` when no social
    /// pixel is configured.
    pub fn fire_social(
        &self,
        pixels: &[PixelConfig],
        page: &PageContext,
        name: EventName,
        custom: CustomData,
    ) -> Option<TrackingEvent> {
        pixel::social(pixels).next()?;
        let event = TrackingEvent::new(name, custom);

        match self.host.script() {
            Some(client) => {
                if name.is_standard() {
                    client.track(name.social_name(), &CustomData::new(), &event.dedupe_id);
                } else {
                    client.track_custom(name.social_name(), &event.custom_data, &event.dedupe_id);
                }
                tracing::debug!(
                    event = name.social_name(),
                    event_id = %event.dedupe_id,
                    "social event dispatched"
                );
            }
            None => {
                let err = ScriptError::HandleMissing {
                    kind: ScriptKind::Social,
                };
                tracing::warn!(event = name.social_name(), error = %err, "browser fire skipped");
            }
        }

        for pixel in pixel::mirrorable(pixels) {
            let mirror = Arc::clone(&self.mirror);
            let pixel = pixel.clone();
            let event = event.clone();
            let page = page.clone();
            tokio::spawn(async move {
                mirror.submit(&pixel, &event, &page).await;
            });
        }

        Some(event)
    }

    /// Fire `name` for every tag pixel, re-asserting each pixel's
    /// configuration immediately before its event.
    pub fn fire_tags(
        &self,
        pixels: &[PixelConfig],
        page: &PageContext,
        name: EventName,
        extra: &CustomData,
    ) {
        let mut tag_pixels = pixel::tags(pixels).peekable();
        if tag_pixels.peek().is_none() {
            return;
        }

        let Some(tag) = self.host.tag() else {
            let err = ScriptError::HandleMissing {
                kind: ScriptKind::Tag,
            };
            tracing::warn!(event = name.tag_name(), error = %err, "tag fire skipped");
            return;
        };

        let event_params = tag_event_params(page, extra);
        for pixel in tag_pixels {
            tag.config(&pixel.external_id, &tag_config_params(page, name, pixel.vendor));
            tag.event(name.tag_name(), &event_params);
        }
        tracing::debug!(event = name.tag_name(), "tag event dispatched");
    }
}

fn tag_config_params(page: &PageContext, name: EventName, vendor: Vendor) -> CustomData {
    let mut params = CustomData::from_iter([
        ("page_path".to_owned(), json!(page.path())),
        ("page_location".to_owned(), json!(page.href())),
        ("page_title".to_owned(), json!(page.title)),
        (
            "send_page_view".to_owned(),
            json!(name == EventName::PageView),
        ),
        ("allow_google_signals".to_owned(), json!(true)),
        ("allow_ad_personalization_signals".to_owned(), json!(true)),
    ]);
    if vendor == Vendor::SearchAds {
        params.insert("custom_map".to_owned(), json!({}));
    }
    for (key, value) in page.utm_params() {
        params.insert(key.to_owned(), json!(value));
    }
    if let Some(gclid) = page.gclid() {
        params.insert("gclid".to_owned(), json!(gclid));
    }
    params
}

fn tag_event_params(page: &PageContext, extra: &CustomData) -> CustomData {
    let mut params = CustomData::from_iter([
        ("page_path".to_owned(), json!(page.path())),
        ("page_location".to_owned(), json!(page.href())),
        ("page_title".to_owned(), json!(page.title)),
        ("referrer".to_owned(), json!(page.referrer)),
        ("user_agent".to_owned(), json!(page.user_agent)),
        (
            "screen_resolution".to_owned(),
            json!(format!("{}x{}", page.screen.0, page.screen.1)),
        ),
        (
            "viewport_size".to_owned(),
            json!(format!("{}x{}", page.viewport.0, page.viewport.1)),
        ),
        ("language".to_owned(), json!(page.language)),
    ]);
    for (key, value) in extra {
        params.insert(key.clone(), value.clone());
    }
    for (key, value) in page.utm_params() {
        params.insert(key.to_owned(), json!(value));
    }
    params
}
