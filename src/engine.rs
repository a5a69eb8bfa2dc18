//! Analysis pipeline: features and quality label on one side, embedding and
//! near-duplicate search on the other, merged into one result per document.

use std::sync::OnceLock;

use crate::domain::analysis::{
    AnalysisResult, FeatureVector, QualityLabel, SimilarityMatch, round_hundredths,
};
use crate::domain::document::Document;
use crate::errors::{EngineError, EngineResult, LoadError};
use crate::models::config::EngineConfig;
use crate::processing::classifier::QualityClassifier;
use crate::processing::embedding::{FastEmbedEncoder, TextEncoder};
use crate::processing::features::extract_features;
use crate::processing::similarity::find_similar;
use crate::repository::corpus::CorpusIndex;

static ENGINE: OnceLock<Result<Engine, LoadError>> = OnceLock::new();

/// Loaded artifacts shared read-only by every analysis.
pub struct Engine {
    classifier: QualityClassifier,
    encoder: Box<dyn TextEncoder>,
    corpus: CorpusIndex,
}

impl Engine {
    /// Load every artifact named by `config`.
    pub fn load(config: &EngineConfig) -> Result<Self, LoadError> {
        let classifier = QualityClassifier::load(&config.classifier_path)?;
        let corpus = CorpusIndex::load(&config.embeddings_path, &config.corpus_path)?;
        let encoder =
            FastEmbedEncoder::new(&config.embedding_model, config.model_cache_dir.clone())?;
        Self::from_parts(classifier, Box::new(encoder), corpus)
    }

    /// Assemble an engine from already loaded parts.
    ///
    /// The encoder is probed once; its output dimension must match the corpus.
    pub fn from_parts(
        classifier: QualityClassifier,
        encoder: Box<dyn TextEncoder>,
        corpus: CorpusIndex,
    ) -> Result<Self, LoadError> {
        let probe = encoder
            .encode("dimension probe")
            .map_err(|err| LoadError::Encoder(err.to_string()))?;
        if probe.len() != corpus.dimension() {
            return Err(LoadError::SchemaMismatch {
                artifact: "embedding matrix",
                reason: format!(
                    "encoder produces {} dimensions, corpus was built with {}",
                    probe.len(),
                    corpus.dimension()
                ),
            });
        }

        Ok(Self {
            classifier,
            encoder,
            corpus,
        })
    }

    /// Analyze a single document.
    pub fn analyze(&self, document: &Document) -> EngineResult<AnalysisResult> {
        let (features, label) = self.score(document)?;
        let embedding = self.encoder.encode(&document.text)?;
        let similar_to = find_similar(&embedding, &document.url, &self.corpus)?;
        Ok(self.assemble(document, features, label, similar_to))
    }

    /// Analyze several documents with one classifier call and one encoder call.
    ///
    /// Results are returned in input order; a failing document does not
    /// affect the others unless the encoder call itself fails.
    pub fn analyze_batch(&self, documents: &[Document]) -> Vec<EngineResult<AnalysisResult>> {
        let extracted: Vec<EngineResult<FeatureVector>> = documents
            .iter()
            .map(|doc| extract_features(&doc.text))
            .collect();
        let valid: Vec<FeatureVector> = extracted
            .iter()
            .filter_map(|features| features.as_ref().ok().copied())
            .collect();

        let mut labels = self.classifier.predict_batch(&valid).into_iter();
        let scored: Vec<EngineResult<(FeatureVector, QualityLabel)>> = extracted
            .into_iter()
            .map(|features| -> EngineResult<(FeatureVector, QualityLabel)> {
                let features = features?;
                let label = labels.next().unwrap_or_else(|| {
                    Err(EngineError::Inference(
                        "classifier returned too few labels".to_string(),
                    ))
                })?;
                Ok((features, label))
            })
            .collect();

        let texts: Vec<String> = documents
            .iter()
            .zip(&scored)
            .filter(|(_, score)| score.is_ok())
            .map(|(doc, _)| doc.text.clone())
            .collect();

        let mut embeddings = match self.encoder.encode_batch(&texts) {
            Ok(embeddings) => embeddings.into_iter(),
            Err(err) => {
                return scored
                    .into_iter()
                    .map(|score| score.and_then(|_| Err(err.clone())))
                    .collect();
            }
        };

        documents
            .iter()
            .zip(scored)
            .map(|(doc, score)| -> EngineResult<AnalysisResult> {
                let (features, label) = score?;
                let embedding = embeddings.next().ok_or_else(|| {
                    EngineError::Inference("encoder returned too few embeddings".to_string())
                })?;
                let similar_to = find_similar(&embedding, &doc.url, &self.corpus)?;
                Ok(self.assemble(doc, features, label, similar_to))
            })
            .collect()
    }

    fn score(&self, document: &Document) -> EngineResult<(FeatureVector, QualityLabel)> {
        let features = extract_features(&document.text)?;
        let label = self.classifier.predict(&features)?;
        Ok((features, label))
    }

    fn assemble(
        &self,
        document: &Document,
        features: FeatureVector,
        quality_label: QualityLabel,
        similar_to: Vec<SimilarityMatch>,
    ) -> AnalysisResult {
        log::debug!(
            "Analyzed {}: label={quality_label}, words={}, duplicates={}",
            document.url,
            features.word_count,
            similar_to.len()
        );
        AnalysisResult {
            url: document.url.clone(),
            title: document.title.clone(),
            quality_label,
            word_count: features.word_count,
            sentence_count: features.sentence_count,
            readability: round_hundredths(features.readability),
            is_thin: features.is_thin(),
            similar_to,
        }
    }
}

/// Load the process-wide engine exactly once.
///
/// Concurrent first callers wait for the single load; every later call gets
/// the same engine, or the same load error.
pub fn initialize(config: &EngineConfig) -> EngineResult<&'static Engine> {
    ENGINE
        .get_or_init(|| Engine::load(config))
        .as_ref()
        .map_err(|err| EngineError::Load(err.clone()))
}

/// The process-wide engine set up by [`initialize`].
pub fn shared() -> EngineResult<&'static Engine> {
    match ENGINE.get() {
        None => Err(EngineError::ModelNotLoaded("engine")),
        Some(Ok(engine)) => Ok(engine),
        Some(Err(err)) => Err(EngineError::Load(err.clone())),
    }
}
