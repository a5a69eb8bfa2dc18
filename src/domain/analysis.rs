use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::THIN_CONTENT_WORDS;

/// Column order the quality classifier was trained on.
pub const FEATURE_NAMES: [&str; 3] = ["word_count", "sentence_count", "flesch_reading_ease"];

/// Numeric features of a document, in classifier input order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub word_count: usize,
    pub sentence_count: usize,
    pub readability: f64,
}

impl FeatureVector {
    /// Values laid out as `[word_count, sentence_count, flesch_reading_ease]`.
    pub fn as_array(&self) -> [f64; 3] {
        [
            self.word_count as f64,
            self.sentence_count as f64,
            self.readability,
        ]
    }

    pub fn is_thin(&self) -> bool {
        self.word_count < THIN_CONTENT_WORDS
    }
}

/// Round to two decimals, ties to even on the exact binary value.
///
/// `55.125` is stored exactly and becomes `55.12`; `2.675` is stored just
/// below the tie and becomes `2.67`.
pub fn round_hundredths(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let lower = (value * 100.0).floor();
    // Sign of `value * 200 - (2 * lower + 1)` computed with a single rounding,
    // so the comparison against the midpoint is exact.
    let offset = value.mul_add(200.0, -(2.0 * lower + 1.0));
    let units = if offset > 0.0 || (offset == 0.0 && lower % 2.0 != 0.0) {
        lower + 1.0
    } else {
        lower
    };
    units / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityLabel {
    Low,
    Medium,
    High,
}

impl QualityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Low => "Low",
            QualityLabel::Medium => "Medium",
            QualityLabel::High => "High",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(QualityLabel::Low),
            "medium" => Ok(QualityLabel::Medium),
            "high" => Ok(QualityLabel::High),
            other => Err(format!("unknown quality label `{other}`")),
        }
    }
}

/// A corpus document whose embedding is close to the query document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub url: String,
    pub similarity: f32,
}

/// Everything the presentation layer needs about one analyzed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub url: String,
    pub title: String,
    pub quality_label: QualityLabel,
    pub word_count: usize,
    pub sentence_count: usize,
    /// Flesch Reading Ease rounded to two decimals.
    pub readability: f64,
    pub is_thin: bool,
    pub similar_to: Vec<SimilarityMatch>,
}
