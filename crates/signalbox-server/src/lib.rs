//! Signalbox HTTP server.
//!
//! Wires the tracking engine, settings store, and admin directory into a
//! running Axum service. Serves the public page-bootstrap routes under
//! `/v1/pages/*` and the authenticated settings API under `/v1/admin/*`.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
