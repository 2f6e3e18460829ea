use crate::identity::ResourcePattern;

/// Sentinel stored for any field the extractor could not find.
pub const UNKNOWN: &str = "N/A";

/// Persisted column order.
pub const HEADER: [&str; 5] = ["Title", "Company", "Location", "Link", "Post Time"];

/// Named fields of a harvested listing, in persisted column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Organization,
    Location,
    Link,
    Published,
}

impl Field {
    pub fn index(self) -> usize {
        match self {
            Field::Title => 0,
            Field::Organization => 1,
            Field::Location => 2,
            Field::Link => 3,
            Field::Published => 4,
        }
    }

    /// Header cell used for this field in the persisted resource.
    pub fn column(self) -> &'static str {
        HEADER[self.index()]
    }
}

/// One harvested listing.
///
/// The identity is the normalized link. It is `None` when no usable link was
/// extracted; the harvest loop never persists such records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: [String; 5],
    identity: Option<String>,
}

impl Record {
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    pub fn title(&self) -> &str {
        self.get(Field::Title)
    }

    pub fn link(&self) -> &str {
        self.get(Field::Link)
    }

    pub fn published(&self) -> &str {
        self.get(Field::Published)
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Cells in persisted column order.
    pub fn to_row(&self) -> Vec<String> {
        self.values.to_vec()
    }
}

/// Collects independently optional field values; absent or blank values
/// resolve to [`UNKNOWN`] without affecting the other fields.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    values: [Option<String>; 5],
}

impl RecordBuilder {
    pub fn set(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set_field(field, value);
        self
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        self.values[field.index()] = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Finishes the record, normalizing the link through `pattern`.
    pub fn build(self, pattern: &ResourcePattern) -> Record {
        let [title, organization, location, link, published] = self.values;
        let identity = link
            .as_deref()
            .map(|raw| pattern.normalize(raw))
            .filter(|key| !key.is_empty());
        let link = identity.clone().unwrap_or_else(|| UNKNOWN.to_string());
        let or_unknown = |value: Option<String>| value.unwrap_or_else(|| UNKNOWN.to_string());
        Record {
            values: [
                or_unknown(title),
                or_unknown(organization),
                or_unknown(location),
                link,
                or_unknown(published),
            ],
            identity,
        }
    }
}
