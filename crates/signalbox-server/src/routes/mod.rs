//! HTTP route handlers.
//!
//! Public page-bootstrap routes live under `/v1/pages/*` and require no
//! authentication; the settings API under `/v1/admin/*` sits behind the
//! bearer-JWT middleware in [`crate::auth`].

pub mod admin;
pub mod health;
pub mod pages;
