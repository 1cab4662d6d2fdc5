//! Page environment snapshot.
//!
//! A [`PageContext`] captures everything the engine reads from the page it
//! runs on: the current URL and its query parameters, document metadata,
//! cookies, local storage, and display geometry. Embedders build one per
//! route; all attribution lookups resolve against it.

use std::collections::HashMap;

use url::Url;

use crate::error::PageError;

const UTM_KEYS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

/// Snapshot of the page environment for one route.
#[derive(Debug, Clone)]
pub struct PageContext {
    url: Url,
    pub title: String,
    pub referrer: String,
    pub user_agent: String,
    pub language: String,
    pub screen: (u32, u32),
    pub viewport: (u32, u32),
    cookies: HashMap<String, String>,
    local_storage: HashMap<String, String>,
}

impl PageContext {
    /// Parse the page URL and start an otherwise empty context.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidUrl`] when `url` is not an absolute URL.
    pub fn new(url: &str) -> Result<Self, PageError> {
        let url = Url::parse(url).map_err(|err| PageError::InvalidUrl {
            url: url.to_owned(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            url,
            title: String::new(),
            referrer: String::new(),
            user_agent: String::new(),
            language: String::new(),
            screen: (0, 0),
            viewport: (0, 0),
            cookies: HashMap::new(),
            local_storage: HashMap::new(),
        })
    }

    #[must_use]
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_owned();
        self
    }

    #[must_use]
    pub fn with_referrer(mut self, referrer: &str) -> Self {
        self.referrer = referrer.to_owned();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_owned();
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_owned();
        self
    }

    #[must_use]
    pub fn with_screen(mut self, width: u32, height: u32) -> Self {
        self.screen = (width, height);
        self
    }

    #[must_use]
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn with_local_item(mut self, name: &str, value: &str) -> Self {
        self.local_storage.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Full URL including the query string.
    pub fn href(&self) -> &str {
        self.url.as_str()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn local_item(&self, name: &str) -> Option<&str> {
        self.local_storage.get(name).map(String::as_str)
    }

    /// The UTM parameters present on the URL, in canonical order.
    pub fn utm_params(&self) -> Vec<(&'static str, String)> {
        UTM_KEYS
            .iter()
            .filter_map(|key| self.query_param(key).map(|value| (*key, value)))
            .collect()
    }

    pub fn gclid(&self) -> Option<String> {
        self.query_param("gclid")
    }

    pub fn fbclid(&self) -> Option<String> {
        self.query_param("fbclid")
    }

    /// Stable visitor id for the conversions mirror. Resolution order: the
    /// `external_id` query parameter, the timestamp segment of an `fbp`
    /// query parameter, the `external_id` cookie, then local storage.
    pub fn external_id(&self) -> Option<String> {
        self.query_param("external_id")
            .or_else(|| {
                self.query_param("fbp")
                    .and_then(|fbp| fbp.split('.').nth(2).map(str::to_owned))
            })
            .or_else(|| self.cookie("external_id").map(str::to_owned))
            .or_else(|| self.local_item("external_id").map(str::to_owned))
    }

    /// Social login id, from the URL first and the cookie second.
    pub fn fb_login_id(&self) -> Option<String> {
        self.query_param("fb_login_id")
            .or_else(|| self.cookie("fb_login_id").map(str::to_owned))
    }
}
