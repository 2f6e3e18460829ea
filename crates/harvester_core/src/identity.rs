use url::Url;

const DEFAULT_HOST_SUFFIX: &str = "linkedin.com";
const DEFAULT_PATH_PREFIX: &str = "/jobs/view/";
const DEFAULT_CANONICAL_BASE: &str = "https://www.linkedin.com/jobs/view/";

/// Describes which links point at a listing resource and how the canonical
/// identity of such a link is rendered.
///
/// A link matches when its host is `host_suffix` (or a subdomain of it) and its
/// path starts with `path_prefix` followed by a non-empty identifier segment.
/// Everything after the identifier (further segments, query, fragment) is
/// dropped, and the identifier is re-rendered as `{canonical_base}{id}/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePattern {
    host_suffix: String,
    path_prefix: Vec<String>,
    canonical_base: String,
}

impl ResourcePattern {
    pub fn new(host_suffix: &str, path_prefix: &str, canonical_base: &str) -> Self {
        let mut canonical_base = canonical_base.trim().to_string();
        if !canonical_base.ends_with('/') {
            canonical_base.push('/');
        }
        Self {
            host_suffix: host_suffix.trim().trim_start_matches('.').to_ascii_lowercase(),
            path_prefix: path_prefix
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            canonical_base,
        }
    }

    /// Maps a raw link to its identity key. Never fails: links that do not
    /// match the pattern come back unchanged, which also makes the mapping
    /// idempotent.
    pub fn normalize(&self, raw_link: &str) -> String {
        match self.resource_id(raw_link.trim()) {
            Some(id) => format!("{}{}/", self.canonical_base, id),
            None => raw_link.to_string(),
        }
    }

    fn resource_id(&self, link: &str) -> Option<String> {
        let url = parse_lenient(link)?;
        let host = url.host_str()?;
        if !self.host_matches(host) {
            return None;
        }
        let mut segments = url.path_segments()?;
        for expected in &self.path_prefix {
            if !segments.next()?.eq_ignore_ascii_case(expected) {
                return None;
            }
        }
        segments
            .next()
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
    }

    fn host_matches(&self, host: &str) -> bool {
        host == self.host_suffix
            || host
                .strip_suffix(self.host_suffix.as_str())
                .is_some_and(|rest| rest.ends_with('.'))
    }
}

impl Default for ResourcePattern {
    fn default() -> Self {
        Self::new(
            DEFAULT_HOST_SUFFIX,
            DEFAULT_PATH_PREFIX,
            DEFAULT_CANONICAL_BASE,
        )
    }
}

/// Normalizes a link with the default listing pattern.
pub fn normalize_link(raw_link: &str) -> String {
    ResourcePattern::default().normalize(raw_link)
}

/// Scheme-less links (`www.example.com/...`) are accepted by assuming https.
fn parse_lenient(link: &str) -> Option<Url> {
    if link.is_empty() {
        return None;
    }
    match Url::parse(link) {
        Ok(url) if url.has_host() => Some(url),
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{link}")).ok()
        }
        Err(_) => None,
    }
}
