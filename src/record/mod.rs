//! Person records extracted from ORCID summaries
//!
//! A `PersonRecord` is built by the `RecordParser` from one XML document and
//! lives for a single pipeline pass. Organization resolution rewrites the
//! `organization` of each `Employment` in place before export.

pub mod parser;

pub use parser::{RecordError, RecordParser, RecordResult};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an organization as seen by one employment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationRef {
    /// Organization name (canonical after resolution)
    pub name: String,
    /// Disambiguated id from the source, or a derived content hash
    pub org_id: String,
}

impl OrganizationRef {
    pub fn new(name: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            org_id: org_id.into(),
        }
    }

    /// Whether an org_id is set (from the source or already derived)
    pub fn has_org_id(&self) -> bool {
        !self.org_id.is_empty()
    }
}

/// A date with optional month and day, e.g. "2010", "2010-09" or "2010-09-01"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialDate(String);

impl PartialDate {
    /// Separator between date components
    pub const SEPARATOR: &'static str = "-";

    /// Join the non-empty components in order. `None` when nothing is left.
    pub fn from_parts<I, S>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<String> = parts
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(PartialDate(parts.join(Self::SEPARATOR)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One employment fact, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employment {
    pub organization: OrganizationRef,
    /// Role title, empty when the source has none
    pub role: String,
    pub start: Option<PartialDate>,
    pub end: Option<PartialDate>,
}

/// Identity fields plus the employment history of one researcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// ORCID identifier, e.g. "0000-0002-1825-0097"
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub employments: Vec<Employment>,
}

impl PersonRecord {
    pub fn new(id: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            employments: Vec::new(),
        }
    }

    /// Add an employment (builder style, used by tests and benches)
    pub fn with_employment(mut self, employment: Employment) -> Self {
        self.employments.push(employment);
        self
    }
}
