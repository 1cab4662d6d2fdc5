//! Recording fakes and fixtures shared across the engine's tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{MirrorError, ScriptError};
use crate::event::CustomData;
use crate::mirror::MirrorTransport;
use crate::page::PageContext;
use crate::pixel::{PixelConfig, Vendor};
use crate::script::{ScriptClient, ScriptHost, ScriptKind, TagClient};

/// Everything a [`FakeHost`] observed, in call order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostCall {
    Inject {
        kind: ScriptKind,
        bootstrap_id: String,
    },
    Init {
        external_id: String,
    },
    Track {
        name: String,
        data: CustomData,
        dedupe_id: String,
    },
    TrackCustom {
        name: String,
        data: CustomData,
        dedupe_id: String,
    },
    TagConfig {
        external_id: String,
        params: CustomData,
    },
    TagEvent {
        name: String,
        params: CustomData,
    },
}

#[derive(Debug, Default)]
struct HostShared {
    calls: Mutex<Vec<HostCall>>,
    social_present: Mutex<bool>,
    social_checks_until_loaded: Mutex<u32>,
    social_install_blocked: Mutex<bool>,
    tag_present: Mutex<bool>,
    failing_inits: Mutex<HashSet<String>>,
}

impl HostShared {
    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Scriptable in-memory [`ScriptHost`]. Clones share state, so a test can
/// hand one clone to the engine and keep another for assertions.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeHost {
    shared: Arc<HostShared>,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pretend the social script tag is already in the document. The handle
    /// reports `loaded` only after `checks_until_loaded` readiness checks.
    pub(crate) fn install_social_script(&self, checks_until_loaded: u32) {
        *self.shared.social_present.lock().unwrap() = true;
        *self.shared.social_checks_until_loaded.lock().unwrap() = checks_until_loaded;
    }

    /// Pretend the tag stub is already installed.
    pub(crate) fn install_tag_stub(&self) {
        *self.shared.tag_present.lock().unwrap() = true;
    }

    /// Make social injection record the call but never produce a handle,
    /// like a document whose script loads are blocked.
    pub(crate) fn block_social_install(&self) {
        *self.shared.social_install_blocked.lock().unwrap() = true;
    }

    /// Make `init` fail permanently for one pixel id.
    pub(crate) fn fail_init(&self, external_id: &str) {
        self.shared
            .failing_inits
            .lock()
            .unwrap()
            .insert(external_id.to_owned());
    }

    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub(crate) fn init_count(&self, external_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(call, HostCall::Init { external_id: id } if id == external_id)
            })
            .count()
    }
}

impl ScriptHost for FakeHost {
    fn inject(&self, kind: ScriptKind, bootstrap_id: &str) -> Result<(), ScriptError> {
        self.shared.record(HostCall::Inject {
            kind,
            bootstrap_id: bootstrap_id.to_owned(),
        });
        match kind {
            ScriptKind::Social => {
                if !*self.shared.social_install_blocked.lock().unwrap() {
                    *self.shared.social_present.lock().unwrap() = true;
                }
            }
            ScriptKind::Tag => *self.shared.tag_present.lock().unwrap() = true,
        }
        Ok(())
    }

    fn script(&self) -> Option<Arc<dyn ScriptClient>> {
        if *self.shared.social_present.lock().unwrap() {
            Some(Arc::new(FakeSocial {
                shared: Arc::clone(&self.shared),
            }))
        } else {
            None
        }
    }

    fn tag(&self) -> Option<Arc<dyn TagClient>> {
        if *self.shared.tag_present.lock().unwrap() {
            Some(Arc::new(FakeTag {
                shared: Arc::clone(&self.shared),
            }))
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct FakeSocial {
    shared: Arc<HostShared>,
}

impl ScriptClient for FakeSocial {
    fn loaded(&self) -> bool {
        let mut left = self.shared.social_checks_until_loaded.lock().unwrap();
        if *left == 0 {
            true
        } else {
            *left -= 1;
            false
        }
    }

    fn init(&self, external_id: &str) -> Result<(), ScriptError> {
        self.shared.record(HostCall::Init {
            external_id: external_id.to_owned(),
        });
        if self.shared.failing_inits.lock().unwrap().contains(external_id) {
            return Err(ScriptError::Init {
                external_id: external_id.to_owned(),
                reason: "rejected by library".to_owned(),
            });
        }
        Ok(())
    }

    fn track(&self, name: &str, data: &CustomData, dedupe_id: &str) {
        self.shared.record(HostCall::Track {
            name: name.to_owned(),
            data: data.clone(),
            dedupe_id: dedupe_id.to_owned(),
        });
    }

    fn track_custom(&self, name: &str, data: &CustomData, dedupe_id: &str) {
        self.shared.record(HostCall::TrackCustom {
            name: name.to_owned(),
            data: data.clone(),
            dedupe_id: dedupe_id.to_owned(),
        });
    }
}

#[derive(Debug)]
struct FakeTag {
    shared: Arc<HostShared>,
}

impl TagClient for FakeTag {
    fn config(&self, external_id: &str, params: &CustomData) {
        self.shared.record(HostCall::TagConfig {
            external_id: external_id.to_owned(),
            params: params.clone(),
        });
    }

    fn event(&self, name: &str, params: &CustomData) {
        self.shared.record(HostCall::TagEvent {
            name: name.to_owned(),
            params: params.clone(),
        });
    }
}

/// [`MirrorTransport`] that records every POST instead of sending it.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    posts: Mutex<Vec<(String, Value)>>,
    reject: Mutex<Option<(u16, String)>>,
    ip: Mutex<Option<String>>,
}

impl RecordingTransport {
    pub(crate) fn with_ip(self, ip: &str) -> Self {
        *self.ip.lock().unwrap() = Some(ip.to_owned());
        self
    }

    pub(crate) fn rejecting(self, status: u16, body: &str) -> Self {
        *self.reject.lock().unwrap() = Some((status, body.to_owned()));
        self
    }

    pub(crate) fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MirrorTransport for RecordingTransport {
    async fn post_events(&self, url: &str, body: &Value) -> Result<(), MirrorError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_owned(), body.clone()));
        if let Some((status, body)) = self.reject.lock().unwrap().clone() {
            return Err(MirrorError::Rejected { status, body });
        }
        Ok(())
    }

    async fn lookup_ip(&self) -> Option<String> {
        self.ip.lock().unwrap().clone()
    }
}

/// A landing page arriving from a newsletter campaign, with the browser-id
/// cookies set and the `fbp` value forwarded on the URL.
pub(crate) fn landing_page() -> PageContext {
    PageContext::new(
        "https://pages.example.com/landing?utm_source=newsletter&utm_campaign=launch\
         &gclid=CjX1&fbclid=IwAR9xy&fbp=fb.1.1700000000123.1234567890",
    )
    .unwrap()
    .with_title("Launch Event")
    .with_user_agent("Mozilla/5.0 (X11; Linux x86_64) TestAgent/1.0")
    .with_language("pt-BR")
    .with_screen(1920, 1080)
    .with_viewport(1280, 720)
    .with_cookie("_fbp", "fb.1.1700000000123.1234567890")
    .with_cookie("_fbc", "fb.1.1700000000123.IwAR9xy")
}

/// Two social pixels (one mirrorable), one search-ads tag, one analytics tag.
pub(crate) fn pixel_set() -> Vec<PixelConfig> {
    vec![
        PixelConfig {
            id: "row-1".to_owned(),
            vendor: Vendor::SocialAds,
            external_id: "111".to_owned(),
            server_token: Some("tok-111".to_owned()),
        },
        PixelConfig {
            id: "row-2".to_owned(),
            vendor: Vendor::SocialAds,
            external_id: "222".to_owned(),
            server_token: None,
        },
        PixelConfig {
            id: "row-3".to_owned(),
            vendor: Vendor::SearchAds,
            external_id: "AW-77".to_owned(),
            server_token: None,
        },
        PixelConfig {
            id: "row-4".to_owned(),
            vendor: Vendor::WebAnalytics,
            external_id: "G-55".to_owned(),
            server_token: None,
        },
    ]
}
