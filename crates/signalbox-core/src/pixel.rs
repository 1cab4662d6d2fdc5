//! Pixel configuration views.
//!
//! Configuration rows live in `signalbox-store`; this module adds the
//! engine-side partitions over them. Social pixels go through the script
//! poller and dispatcher, tag pixels go straight to the tag queue, and only
//! social pixels carrying a server token are mirrored.

pub use signalbox_store::{PixelConfig, Vendor};

/// Pixels handled by the social vendor's script.
pub fn social(pixels: &[PixelConfig]) -> impl Iterator<Item = &PixelConfig> {
    pixels
        .iter()
        .filter(|pixel| pixel.vendor == Vendor::SocialAds)
}

/// Pixels handled through the shared tag queue.
pub fn tags(pixels: &[PixelConfig]) -> impl Iterator<Item = &PixelConfig> {
    pixels
        .iter()
        .filter(|pixel| matches!(pixel.vendor, Vendor::SearchAds | Vendor::WebAnalytics))
}

/// Social pixels eligible for the server-side conversions mirror.
pub fn mirrorable(pixels: &[PixelConfig]) -> impl Iterator<Item = &PixelConfig> {
    social(pixels).filter(|pixel| {
        pixel
            .server_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    })
}

/// Pixel id embedded in the tag loader URL, taken from the first tag pixel.
pub fn tag_bootstrap_id(pixels: &[PixelConfig]) -> Option<&str> {
    tags(pixels).next().map(|pixel| pixel.external_id.as_str())
}
