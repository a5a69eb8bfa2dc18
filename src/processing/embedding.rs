use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::errors::{EngineError, EngineResult, LoadError};

/// Turns text into fixed-dimension dense vectors.
///
/// Implementations must be deterministic for a fixed model version: the
/// corpus index is only meaningful against the encoder that produced it.
pub trait TextEncoder: Send + Sync {
    /// Encodes every text, returning one vector per input in the same order.
    fn encode_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>>;

    fn encode(&self, text: &str) -> EngineResult<Vec<f32>> {
        self.encode_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Inference("encoder returned no embedding".to_string()))
    }
}

/// Sentence-embedding model served by `fastembed`.
pub struct FastEmbedEncoder {
    // `TextEmbedding::embed` takes `&mut self`.
    embedder: Mutex<TextEmbedding>,
}

impl FastEmbedEncoder {
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self, LoadError> {
        let model = embedding_model(model_name)?;
        let mut options = InitOptions::new(model).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let embedder = TextEmbedding::try_new(options)
            .map_err(|error| LoadError::Encoder(format!("{model_name}: {error:?}")))?;
        log::info!("Loaded embedding model {model_name}");

        Ok(Self {
            embedder: Mutex::new(embedder),
        })
    }
}

impl TextEncoder for FastEmbedEncoder {
    fn encode_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut embedder = self
            .embedder
            .lock()
            .map_err(|_| EngineError::Inference("embedding model lock poisoned".to_string()))?;
        let vectors = embedder.embed(texts.to_vec(), None).map_err(|error| {
            EngineError::Inference(format!("Failed to generate embedding: {error:?}"))
        })?;
        if vectors.len() != texts.len() {
            return Err(EngineError::Inference(format!(
                "encoder returned {} embeddings for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

/// Resolve a configured model name to a `fastembed` model.
pub fn embedding_model(name: &str) -> Result<EmbeddingModel, LoadError> {
    let short = name
        .trim()
        .trim_start_matches("sentence-transformers/")
        .to_ascii_lowercase();
    match short.as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
        _ => Err(LoadError::Config(format!(
            "unsupported embedding model `{name}`"
        ))),
    }
}

pub fn l2_norm(vec: &[f32]) -> f32 {
    vec.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two equally sized vectors.
///
/// Zero-magnitude vectors have no direction and score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_norms(a, l2_norm(a), b, l2_norm(b))
}

/// Cosine similarity when both norms are already known.
pub fn cosine_with_norms(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}
