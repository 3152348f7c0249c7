//! Streaming parser for ORCID record summaries
//!
//! Elements are matched by local name, so the namespace prefixes used by the
//! export (`record:`, `person:`, `common:`, ...) do not matter. Missing
//! optional elements produce empty strings; only documents that are not well
//! formed, or whose root is not `record`, are rejected.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

use super::{Employment, OrganizationRef, PartialDate, PersonRecord};

/// Record parsing errors
#[derive(Error, Debug)]
pub enum RecordError {
    /// Document is structurally unusable
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// Underlying XML syntax error
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
}

pub type RecordResult<T> = Result<T, RecordError>;

const ROOT: &str = "record";
const URI_PATH: &[&str] = &["record", "orcid-identifier", "uri"];
const ORCID_PATH: &[&str] = &["record", "orcid-identifier", "path"];
const GIVEN_NAMES_PATH: &[&str] = &["record", "person", "name", "given-names"];
const FAMILY_NAME_PATH: &[&str] = &["record", "person", "name", "family-name"];
const GROUP_PATH: &[&str] = &[
    "record",
    "activities-summary",
    "employments",
    "affiliation-group",
];
const SUMMARY_PATH: &[&str] = &[
    "record",
    "activities-summary",
    "employments",
    "affiliation-group",
    "employment-summary",
];

/// Fields of the employment summary being read
#[derive(Default)]
struct PartialEmployment {
    name: String,
    org_id: String,
    role: String,
    start: Vec<String>,
    end: Vec<String>,
}

impl PartialEmployment {
    fn finish(self) -> Employment {
        Employment {
            organization: OrganizationRef::new(self.name, self.org_id),
            role: self.role,
            start: PartialDate::from_parts(self.start),
            end: PartialDate::from_parts(self.end),
        }
    }
}

/// Path below an employment-summary element, if the stack is inside one
fn summary_relative(stack: &[String]) -> Option<Vec<&str>> {
    if stack.len() < SUMMARY_PATH.len() {
        return None;
    }
    let (head, rest) = stack.split_at(SUMMARY_PATH.len());
    if head.iter().zip(SUMMARY_PATH).all(|(a, b)| a == b) {
        Some(rest.iter().map(|s| s.as_str()).collect())
    } else {
        None
    }
}

/// Accumulated identity fields and employments
#[derive(Default)]
struct ParseState {
    stack: Vec<String>,
    text: String,
    uri: String,
    orcid_path: String,
    first_name: String,
    last_name: String,
    employments: Vec<Employment>,
    current: Option<PartialEmployment>,
    group_has_summary: bool,
    saw_root: bool,
}

impl ParseState {
    fn at(&self, path: &[&str]) -> bool {
        self.stack.len() == path.len() && self.stack.iter().zip(path).all(|(a, b)| a == b)
    }

    fn open(&mut self, name: String) -> RecordResult<()> {
        if self.stack.is_empty() {
            if self.saw_root || name != ROOT {
                return Err(RecordError::Malformed(format!(
                    "unexpected root element <{}>",
                    name
                )));
            }
            self.saw_root = true;
        }

        self.stack.push(name);
        self.text.clear();

        if self.at(GROUP_PATH) {
            self.group_has_summary = false;
        } else if self.at(SUMMARY_PATH) {
            // A group may list several sources for one affiliation; the first wins.
            if !self.group_has_summary {
                self.group_has_summary = true;
                self.current = Some(PartialEmployment::default());
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        let text = self.text.trim().to_string();

        if self.at(URI_PATH) {
            self.uri = text;
        } else if self.at(ORCID_PATH) {
            self.orcid_path = text;
        } else if self.at(GIVEN_NAMES_PATH) {
            self.first_name = text;
        } else if self.at(FAMILY_NAME_PATH) {
            self.last_name = text;
        } else if let Some(rest) = summary_relative(&self.stack) {
            let finished = rest.is_empty();
            if let Some(current) = self.current.as_mut() {
                match rest.as_slice() {
                    ["organization", "name"] => current.name = text,
                    ["organization", "disambiguated-organization", "disambiguated-organization-identifier"] => {
                        current.org_id = text
                    }
                    ["role-title"] => current.role = text,
                    ["start-date", _] => current.start.push(text),
                    ["end-date", _] => current.end.push(text),
                    _ => {}
                }
            }
            if finished {
                if let Some(current) = self.current.take() {
                    self.employments.push(current.finish());
                }
            }
        }

        self.stack.pop();
        self.text.clear();
    }

    fn into_record(self) -> RecordResult<PersonRecord> {
        if !self.saw_root {
            return Err(RecordError::Malformed("no <record> element".to_string()));
        }
        if !self.stack.is_empty() {
            return Err(RecordError::Malformed(format!(
                "unclosed element <{}>",
                self.stack.join("/")
            )));
        }

        let id = match self.uri.rsplit('/').next() {
            Some(last) if !last.is_empty() => last.to_string(),
            _ => self.orcid_path,
        };

        Ok(PersonRecord {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            employments: self.employments,
        })
    }
}

/// Parses raw summary XML into a `PersonRecord`
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordParser;

impl RecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one XML document. Employments keep document order.
    pub fn parse(&self, xml: &[u8]) -> RecordResult<PersonRecord> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut state = ParseState::default();
        let mut buf = Vec::with_capacity(4096);

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|source| RecordError::Xml {
                position: reader.buffer_position(),
                source,
            })?;

            match event {
                Event::Start(ref e) => {
                    state.open(String::from_utf8_lossy(e.local_name().as_ref()).into_owned())?;
                }
                Event::Empty(ref e) => {
                    state.open(String::from_utf8_lossy(e.local_name().as_ref()).into_owned())?;
                    state.close();
                }
                Event::Text(ref e) => {
                    let text = e.unescape().map_err(|source| RecordError::Xml {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    state.text.push_str(&text);
                }
                Event::CData(ref e) => {
                    let text = std::str::from_utf8(e)
                        .map_err(|err| RecordError::Malformed(format!("invalid CDATA: {}", err)))?;
                    state.text.push_str(text);
                }
                Event::End(_) => state.close(),
                Event::Eof => break,
                _ => {}
            }

            buf.clear();
        }

        state.into_record()
    }
}
