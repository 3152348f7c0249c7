//! Identifier list reading

use std::path::Path;

use super::{PipelineError, PipelineResult};

/// Split a delimited list into identifiers, keeping file order.
///
/// Newlines and commas both separate fields; surrounding whitespace and
/// double quotes are stripped and empty fields skipped. Duplicates are kept.
pub fn parse_identifiers(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| line.split(','))
        .map(|field| field.trim().trim_matches('"').trim())
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read and split an identifier list file
pub fn read_identifiers(path: &Path) -> PipelineResult<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_identifiers(&text))
}
