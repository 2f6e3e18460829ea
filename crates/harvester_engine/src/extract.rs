use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use harvester_core::{Field, Record, ResourcePattern};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::dates::{format_date, parse_fuzzy_date};
use crate::Snapshot;

/// Candidate records found in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    /// False when the results container was absent from the snapshot.
    pub container_found: bool,
    pub records: Vec<Record>,
}

impl Extraction {
    /// Size of the candidate sequence; the stall comparison uses it.
    pub fn visible(&self) -> usize {
        self.records.len()
    }
}

pub trait Extractor: Send + Sync {
    fn extract(&self, snapshot: &Snapshot) -> Extraction;
}

/// CSS selectors locating listings and their fields, in string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub container: String,
    pub item: String,
    pub title: String,
    pub organization: String,
    pub location: String,
    pub link: String,
    /// Attribute carrying the link; the element text is used when `None`.
    pub link_attribute: Option<String>,
    pub published: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            container: "ul.jobs-search__results-list".to_string(),
            item: "div.job-search-card, div.base-search-card".to_string(),
            title: "h3.base-search-card__title".to_string(),
            organization: "h4.base-search-card__subtitle".to_string(),
            location: "span.job-search-card__location".to_string(),
            link: "a.base-card__full-link".to_string(),
            link_attribute: Some("href".to_string()),
            published: "time.job-search-card__listdate, time.job-search-card__listdate--new"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid {field} selector {selector:?}: {reason}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    Text,
    Attribute(String),
}

#[derive(Debug, Clone)]
pub struct FieldLocator {
    selector: Selector,
    source: FieldSource,
}

impl FieldLocator {
    fn locate(&self, item: ElementRef<'_>) -> Option<String> {
        let element = item.select(&self.selector).next()?;
        let value = match &self.source {
            FieldSource::Text => collapse_whitespace(&element.text().collect::<String>()),
            FieldSource::Attribute(name) => element.value().attr(name)?.trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Parsed selectors; one independent locator per field.
#[derive(Debug, Clone)]
pub struct ListingSchema {
    container: Selector,
    item: Selector,
    fields: Vec<(Field, FieldLocator)>,
}

impl ListingSchema {
    pub fn from_config(config: &SelectorConfig) -> Result<Self, SchemaError> {
        let text = |field, selector: &str| -> Result<FieldLocator, SchemaError> {
            Ok(FieldLocator {
                selector: parse_selector(field, selector)?,
                source: FieldSource::Text,
            })
        };
        let link_source = config
            .link_attribute
            .as_deref()
            .map(str::trim)
            .filter(|attr| !attr.is_empty())
            .map_or(FieldSource::Text, |attr| FieldSource::Attribute(attr.to_string()));

        Ok(Self {
            container: parse_selector("container", &config.container)?,
            item: parse_selector("item", &config.item)?,
            fields: vec![
                (Field::Title, text("title", &config.title)?),
                (Field::Organization, text("organization", &config.organization)?),
                (Field::Location, text("location", &config.location)?),
                (
                    Field::Link,
                    FieldLocator {
                        selector: parse_selector("link", &config.link)?,
                        source: link_source,
                    },
                ),
                (Field::Published, text("published", &config.published)?),
            ],
        })
    }
}

fn parse_selector(field: &'static str, selector: &str) -> Result<Selector, SchemaError> {
    Selector::parse(selector).map_err(|err| SchemaError::InvalidSelector {
        field,
        selector: selector.to_string(),
        reason: err.to_string(),
    })
}

type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Schema-driven extractor for listing feeds.
#[derive(Clone)]
pub struct ListingExtractor {
    schema: ListingSchema,
    pattern: ResourcePattern,
    today: Today,
}

impl ListingExtractor {
    pub fn new(schema: ListingSchema, pattern: ResourcePattern) -> Self {
        Self {
            schema,
            pattern,
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Fixes the date relative phrases such as `2 days ago` resolve against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Arc::new(move || today);
        self
    }

    fn record_from(&self, item: ElementRef<'_>, today: NaiveDate) -> Record {
        let mut builder = Record::builder();
        for (field, locator) in &self.schema.fields {
            let Some(value) = locator.locate(item) else {
                continue;
            };
            let value = match field {
                Field::Published => parse_fuzzy_date(&value, today).map_or(value, format_date),
                _ => value,
            };
            builder.set_field(*field, value);
        }
        builder.build(&self.pattern)
    }
}

impl fmt::Debug for ListingExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingExtractor")
            .field("schema", &self.schema)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl Extractor for ListingExtractor {
    fn extract(&self, snapshot: &Snapshot) -> Extraction {
        let doc = Html::parse_document(snapshot.content());
        let today = (self.today)();
        let mut extraction = Extraction::default();
        for container in doc.select(&self.schema.container) {
            extraction.container_found = true;
            extraction.records.extend(
                container
                    .select(&self.schema.item)
                    .map(|item| self.record_from(item, today)),
            );
        }
        extraction
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selector_names_the_field() {
        let config = SelectorConfig {
            location: "span[".to_string(),
            ..SelectorConfig::default()
        };
        let err = ListingSchema::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidSelector { field: "location", .. }
        ));
    }

    #[test]
    fn link_can_come_from_element_text() {
        let config = SelectorConfig {
            link: "span.url".to_string(),
            link_attribute: None,
            ..SelectorConfig::default()
        };
        let extractor = ListingExtractor::new(
            ListingSchema::from_config(&config).unwrap(),
            ResourcePattern::default(),
        );
        let html = r#"<ul class="jobs-search__results-list"><li><div class="job-search-card">
            <span class="url"> https://www.linkedin.com/jobs/view/5/?x=1 </span>
        </div></li></ul>"#;
        let extraction = extractor.extract(&Snapshot::new(html));
        assert_eq!(
            extraction.records[0].link(),
            "https://www.linkedin.com/jobs/view/5/"
        );
    }

    #[test]
    fn whitespace_in_text_is_collapsed() {
        assert_eq!(collapse_whitespace("  Data\n   Engineer \t"), "Data Engineer");
    }
}
