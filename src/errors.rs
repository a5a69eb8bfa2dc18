//! Typed failures surfaced by the engine.
//!
//! Load failures are fatal at startup; every other variant is scoped to a
//! single document and reported back to the caller without retry.

use thiserror::Error;

/// A pretrained artifact or the corpus could not be brought up.
///
/// `Clone` so that the outcome of the one-time initialization can be handed
/// to every caller that asks for the shared engine afterwards.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("{artifact} not found at {path}: {reason}")]
    Missing {
        artifact: &'static str,
        path: String,
        reason: String,
    },

    #[error("{artifact} is corrupt: {reason}")]
    Corrupt {
        artifact: &'static str,
        reason: String,
    },

    #[error("corpus is corrupt: {rows} embedding rows but {urls} urls")]
    CorpusCorrupt { rows: usize, urls: usize },

    #[error("{artifact} schema mismatch: {reason}")]
    SchemaMismatch {
        artifact: &'static str,
        reason: String,
    },

    #[error("embedding model failed to load: {0}")]
    Encoder(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors returned by engine operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("{0} is not loaded")]
    ModelNotLoaded(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<config::ConfigError> for LoadError {
    fn from(err: config::ConfigError) -> Self {
        LoadError::Config(err.to_string())
    }
}
