//! Postgres settings store: one row per tenant.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{PageSettings, PixelConfig, SettingsError, SettingsStore};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS event_page_settings (
    company_id      UUID PRIMARY KEY,
    event_date      TIMESTAMPTZ,
    redirect_url    TEXT,
    form_iframe_url TEXT,
    pixels          JSONB NOT NULL DEFAULT '[]'::jsonb,
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
)";

/// Settings store backed by the `event_page_settings` table.
pub struct PostgresSettingsStore {
    pool: PgPool,
}

impl PostgresSettingsStore {
    /// Connect to the database and make sure the settings table exists.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Read`] if the connection fails and
    /// [`SettingsError::Write`] if the schema bootstrap fails.
    pub async fn connect(database_url: &str) -> Result<Self, SettingsError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| SettingsError::Read {
                reason: format!("connect: {e}"),
            })?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| SettingsError::Write {
                reason: format!("schema bootstrap: {e}"),
            })?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. one shared with the admin directory.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    event_date: Option<DateTime<Utc>>,
    redirect_url: Option<String>,
    form_iframe_url: Option<String>,
    pixels: Json<Vec<PixelConfig>>,
}

impl From<SettingsRow> for PageSettings {
    fn from(row: SettingsRow) -> Self {
        Self {
            event_date: row.event_date,
            redirect_url: row.redirect_url,
            form_url: row.form_iframe_url,
            pixels: row.pixels.0,
        }
    }
}

fn read_error(err: sqlx::Error) -> SettingsError {
    match err {
        sqlx::Error::ColumnDecode { source, .. } => SettingsError::Malformed {
            reason: source.to_string(),
        },
        other => SettingsError::Read {
            reason: other.to_string(),
        },
    }
}

#[async_trait::async_trait]
impl SettingsStore for PostgresSettingsStore {
    async fn fetch(&self, tenant_id: Uuid) -> Result<Option<PageSettings>, SettingsError> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT event_date, redirect_url, form_iframe_url, pixels \
             FROM event_page_settings WHERE company_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error)?;

        Ok(row.map(PageSettings::from))
    }

    async fn save(&self, tenant_id: Uuid, settings: &PageSettings) -> Result<(), SettingsError> {
        sqlx::query(
            "INSERT INTO event_page_settings \
                 (company_id, event_date, redirect_url, form_iframe_url, pixels, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (company_id) DO UPDATE SET \
                 event_date = EXCLUDED.event_date, \
                 redirect_url = EXCLUDED.redirect_url, \
                 form_iframe_url = EXCLUDED.form_iframe_url, \
                 pixels = EXCLUDED.pixels, \
                 updated_at = now()",
        )
        .bind(tenant_id)
        .bind(settings.event_date)
        .bind(settings.redirect_url.as_deref())
        .bind(settings.form_url.as_deref())
        .bind(Json(&settings.pixels))
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsError::Write {
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
