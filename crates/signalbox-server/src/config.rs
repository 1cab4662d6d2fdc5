//! Server configuration for Signalbox.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `SIGNALBOX_*` environment variables.

use std::net::SocketAddr;

use uuid::Uuid;

use signalbox_store::DEFAULT_TENANT_ID;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Settings store backend type.
    pub store_backend: StoreBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Tenant whose settings record backs the public pages.
    pub tenant_id: Uuid,
    /// Hour offset applied when rendering the event date for visitors.
    pub display_offset_hours: i32,
    /// Exact origin allowed by CORS; `None` allows any origin.
    pub allowed_origin: Option<String>,
    /// Email seeded as a master admin when running on the memory backend.
    pub dev_admin_email: Option<String>,
}

/// Supported settings store backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackendType {
    /// In-memory (development only, settings lost on restart).
    Memory,
    /// PostgreSQL persistent storage.
    Postgres { url: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on (Railway convention, binds to `0.0.0.0`)
    /// - `SIGNALBOX_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8080`)
    /// - `SIGNALBOX_STORE`: `memory` or `postgres` (default: `memory`)
    /// - `DATABASE_URL`: PostgreSQL connection string (required when `SIGNALBOX_STORE=postgres`)
    /// - `SIGNALBOX_LOG_LEVEL`: log filter (default: `info`)
    /// - `SIGNALBOX_TENANT_ID`: tenant UUID served by the public routes
    /// - `SIGNALBOX_DISPLAY_OFFSET_HOURS`: event-date display offset (default: `-3`, São Paulo)
    /// - `SIGNALBOX_ALLOWED_ORIGIN`: exact CORS origin (default: any)
    /// - `SIGNALBOX_DEV_ADMIN_EMAIL`: master admin seeded on the memory backend (optional)
    #[must_use]
    pub fn from_env() -> Self {
        // Priority: SIGNALBOX_BIND_ADDR > PORT (Railway) > default 127.0.0.1:8080
        let bind_addr = if let Ok(addr) = std::env::var("SIGNALBOX_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080)))
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(8080);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 8080))
        };

        let store_backend = match std::env::var("SIGNALBOX_STORE")
            .unwrap_or_else(|_| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => {
                let url = std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/signalbox".to_owned());
                StoreBackendType::Postgres { url }
            }
            _ => StoreBackendType::Memory,
        };

        let log_level =
            std::env::var("SIGNALBOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        let tenant_id = std::env::var("SIGNALBOX_TENANT_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .or_else(|| DEFAULT_TENANT_ID.parse().ok())
            .unwrap_or_default();

        let display_offset_hours = std::env::var("SIGNALBOX_DISPLAY_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(signalbox_core::countdown::DISPLAY_OFFSET_HOURS);

        let allowed_origin = std::env::var("SIGNALBOX_ALLOWED_ORIGIN").ok();

        let dev_admin_email = std::env::var("SIGNALBOX_DEV_ADMIN_EMAIL").ok();

        Self {
            bind_addr,
            store_backend,
            log_level,
            tenant_id,
            display_offset_hours,
            allowed_origin,
            dev_admin_email,
        }
    }
}
