//! Admin settings routes: `/v1/admin/*`
//!
//! Full settings record including server tokens. Read and replace only; the
//! record is small enough that PUT always carries the whole thing, matching
//! how the admin surface saves.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use tracing::info;

use signalbox_store::{PageSettings, Vendor};

use crate::auth::AdminIdentity;
use crate::error::AppError;
use crate::state::AppState;

/// Build the `/v1/admin` router. Auth middleware is layered on by the caller.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settings", get(get_settings))
        .route("/settings", put(put_settings))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Fetch the stored settings record, tokens included. A tenant with no
/// record yet sees the defaults-shaped empty record rather than a 404, so
/// the admin surface can render a blank form.
async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PageSettings>, AppError> {
    let settings = state
        .store
        .fetch(state.config.tenant_id)
        .await?
        .unwrap_or_default();

    Ok(Json(settings))
}

/// Replace the settings record wholesale.
async fn put_settings(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Json(settings): Json<PageSettings>,
) -> Result<Json<PageSettings>, AppError> {
    validate(&settings)?;

    state.store.save(state.config.tenant_id, &settings).await?;

    info!(
        tenant = %state.config.tenant_id,
        admin = %admin.email,
        pixels = settings.pixels.len(),
        "settings replaced"
    );

    Ok(Json(settings))
}

fn validate(settings: &PageSettings) -> Result<(), AppError> {
    for pixel in &settings.pixels {
        if pixel.external_id.trim().is_empty() {
            return Err(AppError::BadRequest(format!(
                "pixel {} has an empty external id",
                pixel.id
            )));
        }
        if pixel.vendor != Vendor::SocialAds
            && pixel.server_token.as_deref().is_some_and(|t| !t.is_empty())
        {
            return Err(AppError::BadRequest(format!(
                "pixel {} carries a server token but only social-ads pixels are mirrored",
                pixel.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use signalbox_store::{MemorySettingsStore, PixelConfig, SettingsStore};
    use uuid::Uuid;

    use crate::auth::{Role, StaticDirectory};
    use crate::config::{ServerConfig, StoreBackendType};

    use super::*;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            config: ServerConfig {
                bind_addr: ([127, 0, 0, 1], 0).into(),
                store_backend: StoreBackendType::Memory,
                log_level: "info".to_owned(),
                tenant_id: Uuid::new_v4(),
                display_offset_hours: -3,
                allowed_origin: None,
                dev_admin_email: None,
            },
            store: Arc::new(MemorySettingsStore::new()),
            directory: Arc::new(StaticDirectory::new()),
        })
    }

    fn admin() -> AdminIdentity {
        AdminIdentity {
            email: "ana@example.com".to_owned(),
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips_tokens() {
        let state = test_state();
        let settings = PageSettings {
            pixels: vec![PixelConfig {
                id: "row-1".to_owned(),
                vendor: Vendor::SocialAds,
                external_id: "111".to_owned(),
                server_token: Some("tok-111".to_owned()),
            }],
            ..PageSettings::default()
        };

        put_settings(
            State(Arc::clone(&state)),
            Extension(admin()),
            Json(settings.clone()),
        )
        .await
        .unwrap();

        let Json(fetched) = get_settings(State(Arc::clone(&state))).await.unwrap();
        assert_eq!(fetched, settings);
        assert_eq!(
            fetched.pixels[0].server_token.as_deref(),
            Some("tok-111")
        );
    }

    #[tokio::test]
    async fn get_without_record_yields_empty_settings() {
        let Json(fetched) = get_settings(State(test_state())).await.unwrap();
        assert_eq!(fetched, PageSettings::default());
    }

    #[tokio::test]
    async fn put_rejects_blank_external_id() {
        let state = test_state();
        let settings = PageSettings {
            pixels: vec![PixelConfig {
                id: "row-1".to_owned(),
                vendor: Vendor::SearchAds,
                external_id: "  ".to_owned(),
                server_token: None,
            }],
            ..PageSettings::default()
        };

        let result = put_settings(State(Arc::clone(&state)), Extension(admin()), Json(settings)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        // Nothing was stored.
        let stored = state.store.fetch(state.config.tenant_id).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn put_rejects_token_on_tag_pixel() {
        let state = test_state();
        let settings = PageSettings {
            pixels: vec![PixelConfig {
                id: "row-1".to_owned(),
                vendor: Vendor::WebAnalytics,
                external_id: "G-55".to_owned(),
                server_token: Some("tok".to_owned()),
            }],
            ..PageSettings::default()
        };

        let result = put_settings(State(state), Extension(admin()), Json(settings)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
