//! Configuration model loaded from external sources.

use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::LoadError;

#[derive(Clone, Debug, Deserialize)]
/// Artifact locations and model selection for the engine.
pub struct EngineConfig {
    pub classifier_path: PathBuf,
    pub embeddings_path: PathBuf,
    pub corpus_path: PathBuf,
    pub embedding_model: String,
    #[serde(default)]
    pub model_cache_dir: Option<PathBuf>,
    /// Documents per encoder call in the batch driver.
    pub batch_size: usize,
}

impl EngineConfig {
    /// Defaults, then the YAML file at `path` (or an optional
    /// `config/default`), then `CONTENT_AUDIT_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, LoadError> {
        let mut builder = config::Config::builder()
            .set_default("classifier_path", "models/quality_model.json")?
            .set_default("embeddings_path", "models/embeddings.npy")?
            .set_default("corpus_path", "models/features.csv")?
            .set_default("embedding_model", "all-MiniLM-L6-v2")?
            .set_default("batch_size", 16_i64)?;

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("config/default").required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix("CONTENT_AUDIT"));

        let loaded: EngineConfig = builder.build()?.try_deserialize()?;
        if loaded.batch_size == 0 {
            return Err(LoadError::Config("batch_size must be positive".to_string()));
        }
        Ok(loaded)
    }
}
