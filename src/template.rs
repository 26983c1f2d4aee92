//! `{{ name }}` prompt templates.
//!
//! Every marker is its own positional slot: `{{a}} {{a}}` takes two arguments,
//! bound left to right. Marker text never spans a line.

use crate::error::PromptError;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("marker pattern is valid"));

pub fn is_template(text: &str) -> bool {
    MARKER.is_match(text)
}

/// Names of all markers in order of appearance, duplicates kept.
pub fn extract_variable_names(text: &str) -> Vec<String> {
    MARKER
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    raw: String,
    variables: Vec<String>,
}

impl TemplateSpec {
    /// Returns `None` when the text has no markers and should be sent as-is.
    pub fn parse(text: &str) -> Option<Self> {
        if !is_template(text) {
            return None;
        }
        Some(Self {
            raw: text.to_string(),
            variables: extract_variable_names(text),
        })
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    /// Substitute `values` positionally, one per marker. Values are inserted
    /// verbatim and never re-scanned for markers.
    pub fn render(&self, values: &[String]) -> Result<String, PromptError> {
        if values.len() != self.variables.len() {
            return Err(PromptError::ArgumentCountMismatch {
                expected: self.variables.clone(),
                supplied: values.len(),
            });
        }
        let mut slot = 0usize;
        let rendered = MARKER.replace_all(&self.raw, |_: &Captures| {
            let value = values[slot].clone();
            slot += 1;
            value
        });
        Ok(rendered.into_owned())
    }
}
