#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use harvester_core::{Limits, ResourcePattern};
use harvester_engine::{
    AdvanceResult, Extractor, HarvestSettings, ListingExtractor, ListingSchema, Pacing,
    PageSource, SelectorConfig, Snapshot, SourceError,
};

pub const TARGET: &str = "https://www.linkedin.com/jobs/search?keywords=Data&location=Riyadh";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
}

pub fn settings(limits: Limits) -> HarvestSettings {
    HarvestSettings {
        target: TARGET.to_string(),
        limits,
        pacing: Pacing::immediate(),
    }
}

pub fn extractor() -> Box<dyn Extractor> {
    let schema = ListingSchema::from_config(&SelectorConfig::default()).unwrap();
    Box::new(ListingExtractor::new(schema, ResourcePattern::default()).with_today(today()))
}

pub fn card(id: u64, query: &str) -> String {
    format!(
        r#"<li><div class="base-card base-search-card job-search-card">
  <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/{id}/?{query}"></a>
  <h3 class="base-search-card__title"> Role {id} </h3>
  <h4 class="base-search-card__subtitle">Company {id}</h4>
  <span class="job-search-card__location">City {id}</span>
  <time class="job-search-card__listdate" datetime="2024-05-18">2 days ago</time>
</div></li>"#
    )
}

/// A results page listing `ids`, with tracking parameters that vary by `tag`.
pub fn page_with(ids: impl IntoIterator<Item = u64>, tag: &str) -> String {
    let cards: String = ids
        .into_iter()
        .map(|id| card(id, &format!("refId={tag}{id}&trackingId={tag}")))
        .collect();
    format!(
        r#"<html><body><main><ul class="jobs-search__results-list">{cards}</ul></main></body></html>"#
    )
}

/// First `count` listings, ids starting at 1.
pub fn page(count: u64) -> String {
    page_with(1..=count, "r")
}

pub fn blocked_page() -> String {
    "<html><body><p>Please sign in</p></body></html>".to_string()
}

#[derive(Debug, Default)]
pub struct Probe {
    pub navigations: u32,
    pub advances: u32,
    pub snapshots: u32,
    pub closes: u32,
}

/// Page source driven by a fixed list of frames and a failure script.
pub struct ScriptedSource {
    frames: Vec<String>,
    position: usize,
    reveal: bool,
    unavailable_after_advance: Option<u32>,
    fatal_on_advance: Option<u32>,
    probe: Arc<Mutex<Probe>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<String>) -> Self {
        Self {
            frames,
            position: 0,
            reveal: false,
            unavailable_after_advance: None,
            fatal_on_advance: None,
            probe: Arc::new(Mutex::new(Probe::default())),
        }
    }

    /// The load-more control is actioned on every step.
    pub fn always_revealing(mut self) -> Self {
        self.reveal = true;
        self
    }

    /// Snapshots stay unavailable once `advances` advances have happened.
    pub fn unavailable_after(mut self, advances: u32) -> Self {
        self.unavailable_after_advance = Some(advances);
        self
    }

    /// The `n`-th advance (1-based) fails fatally.
    pub fn fatal_on_advance(mut self, n: u32) -> Self {
        self.fatal_on_advance = Some(n);
        self
    }

    pub fn probe(&self) -> Arc<Mutex<Probe>> {
        self.probe.clone()
    }
}

#[async_trait::async_trait]
impl PageSource for ScriptedSource {
    async fn navigate(&mut self, _target: &str) -> Result<(), SourceError> {
        self.probe.lock().unwrap().navigations += 1;
        self.position = 0;
        Ok(())
    }

    async fn current_snapshot(&mut self) -> Result<Snapshot, SourceError> {
        let mut probe = self.probe.lock().unwrap();
        probe.snapshots += 1;
        if probe.closes > 0 {
            return Err(SourceError::fatal("closed"));
        }
        if self
            .unavailable_after_advance
            .is_some_and(|after| probe.advances >= after)
        {
            return Err(SourceError::unavailable("renderer busy"));
        }
        Ok(Snapshot::new(self.frames[self.position].clone()))
    }

    async fn advance(&mut self) -> Result<AdvanceResult, SourceError> {
        let mut probe = self.probe.lock().unwrap();
        probe.advances += 1;
        if self.fatal_on_advance == Some(probe.advances) {
            return Err(SourceError::fatal("renderer crashed"));
        }
        let before = self.frames[self.position].len();
        self.position = (self.position + 1).min(self.frames.len() - 1);
        Ok(AdvanceResult {
            grew: self.frames[self.position].len() != before,
        })
    }

    async fn try_reveal_more(&mut self) -> Result<bool, SourceError> {
        Ok(self.reveal)
    }

    async fn close(&mut self) {
        self.probe.lock().unwrap().closes += 1;
    }
}

/// Data rows of a record file, header excluded.
pub fn data_rows(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(ToOwned::to_owned)
        .collect()
}

pub fn distinct_links(rows: &[String]) -> HashSet<String> {
    rows.iter()
        .map(|row| row.split(',').nth(3).unwrap().to_string())
        .collect()
}
