use serde::{Deserialize, Serialize};

/// A page body handed over by the scraping collaborator.
///
/// `text` is already normalized: whitespace runs collapsed to a single space,
/// trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub text: String,
}

impl Document {
    /// Builds a document from raw extracted text, normalizing it first.
    pub fn new(url: impl Into<String>, title: impl Into<String>, raw_text: &str) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            text: normalize_text(raw_text),
        }
    }
}

/// Collapse whitespace, trim and lower-case.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
