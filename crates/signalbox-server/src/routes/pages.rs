//! Public page-bootstrap routes: `/v1/pages/*`
//!
//! These feed the landing and thank-you pages everything they render and
//! every pixel they fire. Settings fall back to the hardcoded defaults when
//! the tenant has no record, so the pages never come up blank.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use signalbox_core::countdown::{Countdown, format_date_pt};
use signalbox_store::{PageSettings, PixelConfig, Vendor};

use crate::error::AppError;
use crate::state::AppState;

/// Build the `/v1/pages` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/landing", get(landing))
        .route("/thank-you", get(thank_you))
}

// ── Response types ───────────────────────────────────────────────────

/// A pixel as exposed to the public page. Carries everything the client
/// engine needs to fire, and nothing it must not see: `server_token` stays
/// on the server.
#[derive(Debug, Serialize)]
pub struct PublicPixel {
    pub id: String,
    pub vendor: Vendor,
    pub external_id: String,
    /// Whether the server mirrors this pixel's events; the token itself is
    /// redacted.
    pub mirrored: bool,
}

impl From<&PixelConfig> for PublicPixel {
    fn from(pixel: &PixelConfig) -> Self {
        Self {
            id: pixel.id.clone(),
            vendor: pixel.vendor,
            external_id: pixel.external_id.clone(),
            mirrored: pixel
                .server_token
                .as_deref()
                .is_some_and(|token| !token.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LandingPayload {
    pub event_date: DateTime<Utc>,
    /// Visitor-facing date line, e.g. `19 de Novembro de 2025 às 19:00 horas`.
    pub event_date_display: String,
    pub countdown: Countdown,
    pub event_started: bool,
    pub form_url: String,
    pub pixels: Vec<PublicPixel>,
}

#[derive(Debug, Deserialize)]
pub struct ThankYouQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThankYouPayload {
    pub redirect_url: String,
    /// Visitor display name from the `name` query parameter, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub pixels: Vec<PublicPixel>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Bootstrap payload for the landing page.
async fn landing(State(state): State<Arc<AppState>>) -> Result<Json<LandingPayload>, AppError> {
    let settings = fetch_or_default(&state).await?;

    let event_date = settings.effective_event_date();
    let countdown = Countdown::remaining(Utc::now(), event_date);

    Ok(Json(LandingPayload {
        event_date,
        event_date_display: format_date_pt(event_date, state.config.display_offset_hours),
        event_started: countdown.is_elapsed(),
        countdown,
        form_url: settings.effective_form_url().to_owned(),
        pixels: settings.pixels.iter().map(PublicPixel::from).collect(),
    }))
}

/// Bootstrap payload for the thank-you page.
async fn thank_you(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ThankYouQuery>,
) -> Result<Json<ThankYouPayload>, AppError> {
    let settings = fetch_or_default(&state).await?;

    let name = query
        .name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty());

    Ok(Json(ThankYouPayload {
        redirect_url: settings.effective_redirect_url().to_owned(),
        name,
        pixels: settings.pixels.iter().map(PublicPixel::from).collect(),
    }))
}

async fn fetch_or_default(state: &AppState) -> Result<PageSettings, AppError> {
    let settings = state.store.fetch(state.config.tenant_id).await?;
    if settings.is_none() {
        tracing::debug!(tenant = %state.config.tenant_id, "no settings record, serving defaults");
    }
    Ok(settings.unwrap_or_default())
}
