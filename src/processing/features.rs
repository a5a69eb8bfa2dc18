//! Text statistics fed to the quality classifier.
//!
//! Everything here is a pure function of the normalized text.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::analysis::FeatureVector;
use crate::errors::{EngineError, EngineResult};

/// Terminal punctuation, optional closing quotes or brackets, then whitespace.
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]+["'”’)\]]*\s+"#).expect("sentence boundary pattern is valid")
});

/// Lower-case abbreviations that end in a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "dept", "fig", "vol", "approx", "est", "jan", "feb", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];

/// Compute the classifier features for a normalized document body.
///
/// Empty text, or text without a single alphanumeric word, is rejected
/// instead of producing a division by zero in the readability formula.
pub fn extract_features(text: &str) -> EngineResult<FeatureVector> {
    let word_count = text.split_whitespace().count();
    if word_count == 0 {
        return Err(EngineError::InvalidInput("document text is empty".to_string()));
    }

    let sentence_count = split_sentences(text).len();
    if sentence_count == 0 {
        return Err(EngineError::InvalidInput(
            "document text has no sentences".to_string(),
        ));
    }

    let readability = flesch_reading_ease(text, sentence_count).ok_or_else(|| {
        EngineError::InvalidInput("document text contains no words".to_string())
    })?;

    Ok(FeatureVector {
        word_count,
        sentence_count,
        readability,
    })
}

/// Split text into sentences.
///
/// A boundary is a run of `.`, `!` or `?` followed by whitespace, unless the
/// period closes a known abbreviation, an initial or a dotted acronym.
/// Non-empty text without any terminator is a single sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_END.find_iter(text) {
        if !is_boundary(text, boundary.start(), boundary.as_str()) {
            continue;
        }
        let sentence = text[start..boundary.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn is_boundary(text: &str, terminator_start: usize, terminator: &str) -> bool {
    let punctuation = terminator.trim_end_matches(|c: char| !matches!(c, '.' | '!' | '?'));
    if punctuation != "." {
        return true;
    }

    let token = text[..terminator_start]
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    if token.is_empty() {
        return true;
    }
    if ABBREVIATIONS.contains(&token.as_str()) {
        return false;
    }
    !is_initialism(&token)
}

/// `j`, `e.g`, `u.s`: single letters, optionally chained with periods.
fn is_initialism(token: &str) -> bool {
    token.split('.').all(|part| {
        let mut chars = part.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
    })
}

/// Flesch Reading Ease over the words of `text`.
///
/// Returns `None` when no token carries an alphanumeric character.
pub fn flesch_reading_ease(text: &str, sentence_count: usize) -> Option<f64> {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() || sentence_count == 0 {
        return None;
    }

    let syllables: usize = words.iter().map(|word| count_syllables(word)).sum();
    let words_per_sentence = words.len() as f64 / sentence_count as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;

    Some(206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word)
}

/// Estimate English syllables from vowel groups.
///
/// Tokens without letters (numbers) count as one syllable.
pub fn count_syllables(word: &str) -> usize {
    let letters: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    if letters.is_empty() {
        return 1;
    }

    let is_vowel = |idx: usize| match letters[idx] {
        'a' | 'e' | 'i' | 'o' | 'u' => true,
        'y' => idx > 0,
        _ => false,
    };

    let mut groups = 0;
    let mut previous_vowel = false;
    for idx in 0..letters.len() {
        let vowel = is_vowel(idx);
        if vowel && !previous_vowel {
            groups += 1;
        }
        previous_vowel = vowel;
    }

    let len = letters.len();
    if groups > 1 && letters[len - 1] == 'e' {
        let consonant_le = len >= 3 && letters[len - 2] == 'l' && !is_vowel(len - 3);
        if !consonant_le {
            groups -= 1;
        }
    }

    groups.max(1)
}
