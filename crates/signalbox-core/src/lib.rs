//! Core library for Signalbox.
//!
//! Contains the pixel registry, vendor script loader, initialization poller,
//! event dispatcher, conversions mirror, engagement observers, guard
//! registry, embedded-frame bridge, and the page session that wires them
//! together. This crate depends on `signalbox-store` for the settings record
//! and knows nothing about HTTP hosting or persistence details.
//!
//! The page environment (vendor script globals, cookies, URL, viewport) is
//! injected through capability traits ([`script::ScriptHost`],
//! [`mirror::MirrorTransport`]) so the whole engine runs identically under a
//! real embedding and under test fakes.

pub mod countdown;
pub mod dispatch;
pub mod engage;
pub mod error;
pub mod event;
pub mod frame;
pub mod guard;
pub mod mirror;
pub mod page;
pub mod pixel;
pub mod poller;
pub mod retry;
pub mod script;
pub mod session;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing;
