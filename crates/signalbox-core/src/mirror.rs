//! Server-side conversions mirror.
//!
//! Every social dispatch is mirrored to the vendor's conversions endpoint for
//! the pixels that carry a server token. The mirror reuses the dispatch's
//! deduplication id as `event_id`, so the vendor can collapse the browser
//! fire and the server fire into one conversion.
//!
//! Delivery is best effort. [`ConversionsMirror::submit`] never returns an
//! error: rejected payloads and unreachable endpoints are logged at `warn`
//! and dropped.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use crate::error::MirrorError;
use crate::event::{CustomData, TrackingEvent};
use crate::page::PageContext;
use crate::pixel::PixelConfig;

/// Versioned ingestion root the pixel id and `/events` are appended to.
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v18.0";

const IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

const BROWSER_ID_COOKIES: [(&str, &str); 3] = [("_fbp", "fbp"), ("_fbc", "fbc"), ("_fbid", "fbid")];

/// Outbound HTTP seam for the mirror.
#[async_trait::async_trait]
pub trait MirrorTransport: Send + Sync {
    /// POST one conversions payload.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Rejected`] for a non-success status and
    /// [`MirrorError::Network`] when the request never completes.
    async fn post_events(&self, url: &str, body: &Value) -> Result<(), MirrorError>;

    /// Public IP of the visitor for user matching. `None` when the lookup
    /// fails; the payload simply omits the field.
    async fn lookup_ip(&self) -> Option<String>;
}

/// [`MirrorTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpMirrorTransport {
    http: reqwest::Client,
}

impl HttpMirrorTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MirrorTransport for HttpMirrorTransport {
    async fn post_events(&self, url: &str, body: &Value) -> Result<(), MirrorError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| MirrorError::Network {
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MirrorError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn lookup_ip(&self) -> Option<String> {
        let response = self.http.get(IP_LOOKUP_URL).send().await.ok()?;
        let payload: Value = response.json().await.ok()?;
        payload.get("ip").and_then(Value::as_str).map(str::to_owned)
    }
}

/// Builds and delivers conversions payloads.
pub struct ConversionsMirror {
    transport: Arc<dyn MirrorTransport>,
    graph_base: String,
}

impl ConversionsMirror {
    pub fn new(transport: Arc<dyn MirrorTransport>) -> Self {
        Self {
            transport,
            graph_base: DEFAULT_GRAPH_BASE.to_owned(),
        }
    }

    /// Override the ingestion root, mainly for staging endpoints.
    #[must_use]
    pub fn with_graph_base(mut self, base: &str) -> Self {
        self.graph_base = base.trim_end_matches('/').to_owned();
        self
    }

    /// Mirror one dispatched event for one pixel.
    ///
    /// Pixels without a server token are skipped. Transport failures are
    /// logged and swallowed; this call never fails the dispatch that spawned
    /// it.
    pub async fn submit(&self, pixel: &PixelConfig, event: &TrackingEvent, page: &PageContext) {
        match self.deliver(pixel, event, page).await {
            Ok(true) => tracing::debug!(
                pixel = %pixel.external_id,
                event = event.name.social_name(),
                event_id = %event.dedupe_id,
                "conversions mirror accepted"
            ),
            Ok(false) => {}
            Err(err) => tracing::warn!(
                pixel = %pixel.external_id,
                event = event.name.social_name(),
                error = %err,
                "conversions mirror delivery failed"
            ),
        }
    }

    /// Deliver one event and surface the transport outcome. Returns
    /// `Ok(false)` when the pixel carries no server token and nothing was
    /// sent. Credential smoke tests call this directly; dispatch goes
    /// through [`ConversionsMirror::submit`].
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the endpoint rejects the payload or the
    /// request never completes.
    pub async fn deliver(
        &self,
        pixel: &PixelConfig,
        event: &TrackingEvent,
        page: &PageContext,
    ) -> Result<bool, MirrorError> {
        let Some(token) = pixel
            .server_token
            .as_deref()
            .filter(|token| !token.is_empty())
        else {
            return Ok(false);
        };

        let url = format!("{}/{}/events", self.graph_base, pixel.external_id);
        let payload = self.build_payload(event, page, token).await;
        self.transport.post_events(&url, &payload).await?;
        Ok(true)
    }

    async fn build_payload(&self, event: &TrackingEvent, page: &PageContext, token: &str) -> Value {
        let mut custom_data = CustomData::new();
        custom_data.insert("content_name".to_owned(), Value::String(page.title.clone()));
        custom_data.insert(
            "content_category".to_owned(),
            Value::String("landing_page".to_owned()),
        );
        custom_data.insert("url".to_owned(), Value::String(page.href().to_owned()));
        custom_data.insert(
            "referrer".to_owned(),
            Value::String(page.referrer.clone()),
        );
        for (key, value) in &event.custom_data {
            custom_data.insert(key.clone(), value.clone());
        }
        for (key, value) in page.utm_params() {
            custom_data.insert(key.to_owned(), Value::String(value));
        }

        let mut user_data = CustomData::new();
        user_data.insert(
            "client_user_agent".to_owned(),
            Value::String(page.user_agent.clone()),
        );
        for (cookie, field) in BROWSER_ID_COOKIES {
            if let Some(value) = page.cookie(cookie) {
                user_data.insert(field.to_owned(), Value::String(value.to_owned()));
            }
        }
        if let Some(ip) = self.transport.lookup_ip().await {
            user_data.insert("client_ip_address".to_owned(), Value::String(ip));
        }
        if let Some(id) = page.external_id() {
            user_data.insert("external_id".to_owned(), Value::String(id));
        }
        if let Some(id) = page.fb_login_id() {
            user_data.insert("fb_login_id".to_owned(), Value::String(id));
        }

        json!({
            "data": [{
                "event_name": event.name.social_name(),
                "event_time": Utc::now().timestamp(),
                "action_source": "website",
                "event_id": event.dedupe_id,
                "user_data": user_data,
                "custom_data": custom_data,
                "event_source_url": page.href(),
            }],
            "access_token": token,
        })
    }
}
