pub mod domain;
pub mod engine;
pub mod errors;
pub mod models;
pub mod processing;
pub mod repository;

/// Cosine similarity a corpus document must exceed to count as a near-duplicate.
pub const SIMILARITY_THRESHOLD: f32 = 0.8;

/// Documents with fewer words than this are flagged as thin content.
pub const THIN_CONTENT_WORDS: usize = 500;
