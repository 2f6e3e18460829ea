use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::decode::decode_body;
use crate::pacing::Pacing;
use crate::{AdvanceResult, PageSource, Snapshot, SourceError};

#[derive(Debug, Clone)]
pub struct HttpSourceSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
    /// Endpoint serving further result fragments. The navigated URL is used
    /// when unset.
    pub more_url: Option<String>,
    /// Query parameter carrying the result offset of a fragment request.
    pub offset_param: String,
    pub page_size: u64,
    /// Element each fetched fragment is wrapped in when rendered into the
    /// snapshot, so the extractor finds it inside a results container.
    pub fragment_tag: String,
    pub fragment_class: String,
}

impl Default for HttpSourceSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string(),
            more_url: None,
            offset_param: "start".to_string(),
            page_size: 25,
            fragment_tag: "ul".to_string(),
            fragment_class: "jobs-search__results-list".to_string(),
        }
    }
}

/// Page source over plain HTTP: the search page plus successively fetched
/// "more results" fragments form the rendered feed.
#[derive(Debug)]
pub struct HttpPageSource {
    settings: HttpSourceSettings,
    pacing: Pacing,
    client: reqwest::Client,
    target: Option<Url>,
    document: Option<String>,
    fragments: Vec<String>,
    exhausted: bool,
    closed: bool,
}

impl HttpPageSource {
    pub fn new(settings: HttpSourceSettings, pacing: Pacing) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| SourceError::fatal(format!("http client: {err}")))?;
        Ok(Self {
            settings,
            pacing,
            client,
            target: None,
            document: None,
            fragments: Vec::new(),
            exhausted: false,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), SourceError> {
        if self.closed {
            return Err(SourceError::fatal("page source is closed"));
        }
        Ok(())
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    fn fragment_url(&self, offset: u64) -> Result<Url, SourceError> {
        let mut url = match (&self.settings.more_url, &self.target) {
            (Some(more), _) => Url::parse(more)
                .map_err(|err| SourceError::fatal(format!("invalid more url {more:?}: {err}")))?,
            (None, Some(target)) => target.clone(),
            (None, None) => return Err(SourceError::unavailable("feed not opened yet")),
        };
        let param = self.settings.offset_param.as_str();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(param, &offset.to_string());
        Ok(url)
    }

    async fn get(&self, url: &Url) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.settings.user_agent)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::unavailable(format!("{url} returned {status}")));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(SourceError::unavailable(format!(
                    "response too large: {content_len} > {max_bytes} bytes"
                )));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(SourceError::unavailable(format!(
                    "unsupported content type {ct}"
                )));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(SourceError::unavailable(format!(
                    "response too large: over {max_bytes} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_body(&bytes, content_type.as_deref());
        if decoded.had_errors {
            engine_warn!(
                "Body of {} had invalid {} sequences; replaced",
                url,
                decoded.encoding_label
            );
        }
        Ok(decoded.text)
    }

    fn render(&self) -> Option<String> {
        let document = self.document.as_ref()?;
        if self.fragments.is_empty() {
            return Some(document.clone());
        }
        let tag = &self.settings.fragment_tag;
        let class = &self.settings.fragment_class;
        let appended: String = self
            .fragments
            .iter()
            .map(|fragment| format!("<{tag} class=\"{class}\">{fragment}</{tag}>"))
            .collect();
        let insert_at = document
            .to_ascii_lowercase()
            .rfind("</body>")
            .unwrap_or(document.len());
        let mut rendered = String::with_capacity(document.len() + appended.len());
        rendered.push_str(&document[..insert_at]);
        rendered.push_str(&appended);
        rendered.push_str(&document[insert_at..]);
        Some(rendered)
    }
}

#[async_trait::async_trait]
impl PageSource for HttpPageSource {
    async fn navigate(&mut self, target: &str) -> Result<(), SourceError> {
        self.ensure_open()?;
        let url = Url::parse(target)
            .map_err(|err| SourceError::fatal(format!("invalid target {target:?}: {err}")))?;
        let document = self.get(&url).await?;
        engine_info!("Opened feed {} ({} bytes)", url, document.len());
        self.target = Some(url);
        self.document = Some(document);
        self.fragments.clear();
        self.exhausted = false;
        Ok(())
    }

    async fn current_snapshot(&mut self) -> Result<Snapshot, SourceError> {
        self.ensure_open()?;
        self.render()
            .map(Snapshot::new)
            .ok_or_else(|| SourceError::unavailable("feed not opened yet"))
    }

    async fn advance(&mut self) -> Result<AdvanceResult, SourceError> {
        self.ensure_open()?;
        let before = self.fragments.len();
        for attempt in 1..=self.pacing.advance_attempts.max(1) {
            if self.exhausted {
                engine_debug!("No further results to fetch");
                break;
            }
            let offset = (self.fragments.len() as u64 + 1) * self.settings.page_size;
            let url = self.fragment_url(offset)?;
            match self.get(&url).await {
                Ok(body) if body.trim().is_empty() => {
                    engine_info!("Reached the end of the feed at offset {}", offset);
                    self.exhausted = true;
                }
                Ok(body) => {
                    engine_debug!("Fetched {} bytes at offset {}", body.len(), offset);
                    self.fragments.push(body);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if self.fragments.len() > before => {
                    engine_warn!("Advance attempt {} failed after new results: {}", attempt, err);
                    break;
                }
                Err(err) => {
                    engine_warn!("Advance attempt {} failed: {}", attempt, err);
                    if attempt == self.pacing.advance_attempts.max(1) {
                        return Err(err);
                    }
                }
            }
            self.pacing.scroll_pause.pause().await;
        }
        Ok(AdvanceResult {
            grew: self.fragments.len() > before,
        })
    }

    async fn try_reveal_more(&mut self) -> Result<bool, SourceError> {
        self.ensure_open()?;
        Ok(false)
    }

    async fn close(&mut self) {
        if !self.closed {
            engine_debug!("Closing HTTP page source");
        }
        self.closed = true;
        self.document = None;
        self.fragments.clear();
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        return SourceError::unavailable(format!("timed out: {err}"));
    }
    if err.is_builder() {
        return SourceError::fatal(err.to_string());
    }
    SourceError::unavailable(err.to_string())
}
