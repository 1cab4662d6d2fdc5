//! The per-tenant settings record and its hardcoded fallbacks.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Tenant served when no explicit tenant id is configured.
pub const DEFAULT_TENANT_ID: &str = "62855c99-3a9a-41a1-80bd-b4ea8d2a22b1";

const DEFAULT_REDIRECT_URL: &str = "https://wa.me/5511999999999";

const DEFAULT_FORM_URL: &str =
    "https://www.bpsales.com.br/form/c8b6c593-f941-4c9f-874a-1cb7d83e28c5?v=1762539888901&r=xlzlb7u";

/// Event date used when the record is missing or carries no date:
/// 19 November 2025, 19:00 at UTC-3.
pub fn default_event_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 19, 22, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A third-party advertising/analytics platform a pixel reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Social-ads network: shared base script, fan-out `track` primitive,
    /// optional server-side conversions mirroring.
    SocialAds,
    /// Search-ads network: per-pixel `config` + `event` tag calls.
    SearchAds,
    /// Web-analytics platform, same tag contract as `SearchAds`.
    WebAnalytics,
}

impl Vendor {
    /// Wire identifier, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SocialAds => "social_ads",
            Self::SearchAds => "search_ads",
            Self::WebAnalytics => "web_analytics",
        }
    }

    /// Human-readable label for CLI and admin surfaces.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::SocialAds => "Social Ads",
            Self::SearchAds => "Search Ads",
            Self::WebAnalytics => "Web Analytics",
        }
    }
}

/// One configured tracking destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelConfig {
    /// Opaque identifier, stable for the lifetime of the settings record.
    pub id: String,
    pub vendor: Vendor,
    /// Vendor-assigned identifier (advertising account / pixel id).
    pub external_id: String,
    /// Secret enabling server-side mirroring. Only meaningful for
    /// [`Vendor::SocialAds`]; must never appear in public page payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_token: Option<String>,
}

/// The landing-page settings record for one tenant.
///
/// Every field is optional in storage; the `effective_*` accessors apply the
/// hardcoded defaults so callers never see an unusable record. An empty
/// string counts as unset, matching how the admin surface clears a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_url: Option<String>,
    #[serde(default)]
    pub pixels: Vec<PixelConfig>,
}

impl PageSettings {
    /// The configured event date, or the default when unset.
    pub fn effective_event_date(&self) -> DateTime<Utc> {
        self.event_date.unwrap_or_else(default_event_date)
    }

    /// Where the thank-you page sends visitors, defaulting to WhatsApp.
    pub fn effective_redirect_url(&self) -> &str {
        match self.redirect_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => DEFAULT_REDIRECT_URL,
        }
    }

    /// The embedded lead-form URL, or the default form.
    pub fn effective_form_url(&self) -> &str {
        match self.form_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => DEFAULT_FORM_URL,
        }
    }
}
