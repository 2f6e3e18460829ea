use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use harvester_core::{Limits, ResourcePattern};
use harvester_engine::{
    Extractor, HttpSourceSettings, JitterRange, ListingExtractor, ListingSchema, Pacing,
    SelectorConfig, Snapshot,
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Everything about a harvest that is not a per-run flag. Every field has a
/// default, so a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Search page; `keywords` and `location` query parameters are added.
    pub search_url: String,
    /// Extra query parameters for the search page.
    pub search_params: Vec<(String, String)>,
    /// Endpoint serving further results, queried with the same search terms.
    pub more_url: Option<String>,
    pub page_size: u64,
    pub selectors: SelectorConfig,
    /// Element fetched result fragments are wrapped in. Derived from
    /// `selectors.container` when unset.
    pub fragment_element: Option<FragmentElement>,
    pub identity: IdentityConfig,
    pub stall_threshold: u32,
    pub unavailable_limit: u32,
    pub pacing: PacingConfig,
    pub http: HttpConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.linkedin.com/jobs/search".to_string(),
            search_params: vec![
                ("origin".to_string(), "JOB_SEARCH_PAGE_SEARCH_BUTTON".to_string()),
                ("refresh".to_string(), "true".to_string()),
            ],
            more_url: Some(
                "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search"
                    .to_string(),
            ),
            page_size: 25,
            selectors: SelectorConfig::default(),
            fragment_element: None,
            identity: IdentityConfig::default(),
            stall_threshold: 5,
            unavailable_limit: 3,
            pacing: PacingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentElement {
    pub tag: String,
    pub class: String,
}

impl FragmentElement {
    /// Reads a plain `tag.class[.class...]` selector; anything richer yields `None`.
    fn from_selector(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        let plain = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        let mut parts = selector.split('.');
        let tag = match parts.next() {
            Some("") => "div",
            Some(tag) => tag,
            None => return None,
        };
        let classes: Vec<&str> = parts.collect();
        if !plain(tag) || !classes.iter().all(|class| plain(class)) {
            return None;
        }
        Some(Self {
            tag: tag.to_string(),
            class: classes.join(" "),
        })
    }

    fn render(&self, inner: &str) -> String {
        format!(
            "<html><body><{tag} class=\"{class}\">{inner}</{tag}></body></html>",
            tag = self.tag,
            class = self.class
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub host_suffix: String,
    pub path_prefix: String,
    pub canonical_base: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            host_suffix: "linkedin.com".to_string(),
            path_prefix: "/jobs/view/".to_string(),
            canonical_base: "https://www.linkedin.com/jobs/view/".to_string(),
        }
    }
}

/// Pause ranges in milliseconds, as `(min, max)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub after_navigate_ms: (u64, u64),
    pub after_advance_ms: (u64, u64),
    pub after_reveal_ms: (u64, u64),
    pub between_steps_ms: (u64, u64),
    pub scroll_pause_ms: (u64, u64),
    pub retry_pause_ms: (u64, u64),
    pub advance_attempts: u32,
    pub snapshot_attempts: u32,
    pub navigate_attempts: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            after_navigate_ms: (5_000, 10_000),
            after_advance_ms: (3_000, 7_000),
            after_reveal_ms: (3_000, 6_000),
            between_steps_ms: (1_000, 3_000),
            scroll_pause_ms: (2_000, 4_000),
            retry_pause_ms: (1_000, 2_000),
            advance_attempts: 3,
            snapshot_attempts: 3,
            navigate_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            max_bytes: 5 * 1024 * 1024,
            user_agent: None,
        }
    }
}

impl HarvestConfig {
    /// Reads a RON config file; `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Search page URL for the given terms.
    pub fn search_target(&self, keyword: &str, location: &str) -> Result<String> {
        with_search_terms(&self.search_url, &self.search_params, keyword, location)
    }

    pub fn limits(&self, max_steps: u64) -> Limits {
        Limits {
            max_steps,
            stall_threshold: self.stall_threshold.max(1),
            unavailable_limit: self.unavailable_limit.max(1),
        }
    }

    pub fn pacing(&self) -> Pacing {
        let p = &self.pacing;
        let range = |(min, max): (u64, u64)| JitterRange::from_millis(min, max);
        Pacing {
            after_navigate: range(p.after_navigate_ms),
            after_advance: range(p.after_advance_ms),
            after_reveal: range(p.after_reveal_ms),
            between_steps: range(p.between_steps_ms),
            scroll_pause: range(p.scroll_pause_ms),
            retry_pause: range(p.retry_pause_ms),
            advance_attempts: p.advance_attempts,
            snapshot_attempts: p.snapshot_attempts,
            navigate_attempts: p.navigate_attempts,
        }
    }

    pub fn resource_pattern(&self) -> ResourcePattern {
        ResourcePattern::new(
            &self.identity.host_suffix,
            &self.identity.path_prefix,
            &self.identity.canonical_base,
        )
    }

    /// Element for fetched fragments, checked against the container selector
    /// so fragment listings are extracted like those on the first page.
    pub fn fragment_element(&self) -> Result<FragmentElement> {
        let container = &self.selectors.container;
        let element = match &self.fragment_element {
            Some(element) => element.clone(),
            None => FragmentElement::from_selector(container).with_context(|| {
                format!("container selector {container:?} is not a plain tag.class selector; set fragment_element")
            })?,
        };
        let schema = ListingSchema::from_config(&self.selectors)?;
        let extractor = ListingExtractor::new(schema, self.resource_pattern());
        if !extractor
            .extract(&Snapshot::new(element.render("")))
            .container_found
        {
            bail!(
                "fragment element <{} class={:?}> does not match container selector {container:?}",
                element.tag,
                element.class
            );
        }
        Ok(element)
    }

    pub fn http_settings(&self, keyword: &str, location: &str) -> Result<HttpSourceSettings> {
        let fragment = self.fragment_element()?;
        let more_url = self
            .more_url
            .as_deref()
            .map(|url| with_search_terms(url, &[], keyword, location))
            .transpose()?;
        let defaults = HttpSourceSettings::default();
        Ok(HttpSourceSettings {
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            max_bytes: self.http.max_bytes,
            user_agent: self.http.user_agent.clone().unwrap_or(defaults.user_agent.clone()),
            more_url,
            page_size: self.page_size.max(1),
            fragment_tag: fragment.tag,
            fragment_class: fragment.class,
            ..defaults
        })
    }
}

fn with_search_terms(
    base: &str,
    extra: &[(String, String)],
    keyword: &str,
    location: &str,
) -> Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("invalid url {base:?}"))?;
    url.query_pairs_mut()
        .append_pair("keywords", keyword)
        .append_pair("location", location)
        .extend_pairs(extra);
    Ok(url.into())
}
