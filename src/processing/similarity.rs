//! Near-duplicate search against the corpus index.
//!
//! Exhaustive cosine scan: every corpus row is scored, so the ranking is
//! exact and reproducible.

use crate::SIMILARITY_THRESHOLD;
use crate::domain::analysis::SimilarityMatch;
use crate::errors::{EngineError, EngineResult};
use crate::processing::embedding::{cosine_with_norms, l2_norm};
use crate::repository::corpus::CorpusIndex;

/// Corpus documents whose similarity to `query` exceeds the threshold.
///
/// The document's own URL is never reported. Matches are ordered by
/// descending similarity, ties keeping corpus row order.
pub fn find_similar(
    query: &[f32],
    query_url: &str,
    corpus: &CorpusIndex,
) -> EngineResult<Vec<SimilarityMatch>> {
    let scores = similarities(query, corpus)?;
    Ok(rank_matches(corpus.urls(), &scores, query_url))
}

/// Cosine similarity between `query` and every corpus row, in row order.
pub fn similarities(query: &[f32], corpus: &CorpusIndex) -> EngineResult<Vec<f32>> {
    if query.len() != corpus.dimension() {
        return Err(EngineError::Inference(format!(
            "query embedding has {} dimensions, corpus has {}",
            query.len(),
            corpus.dimension()
        )));
    }
    // Unlike a zero corpus row, a zero query is an error.
    let query_norm = l2_norm(query);
    if !query_norm.is_finite() || query_norm == 0.0 {
        return Err(EngineError::Inference(
            "query embedding has no usable magnitude".to_string(),
        ));
    }

    let scores = corpus
        .matrix()
        .chunks_exact(corpus.dimension())
        .zip(corpus.norms())
        .map(|(row, row_norm)| cosine_with_norms(query, query_norm, row, *row_norm))
        .collect();
    Ok(scores)
}

/// Keep scores strictly above the threshold that do not belong to
/// `query_url`, best first.
pub fn rank_matches(urls: &[String], scores: &[f32], query_url: &str) -> Vec<SimilarityMatch> {
    let mut matches: Vec<SimilarityMatch> = urls
        .iter()
        .zip(scores)
        .filter(|(url, score)| **score > SIMILARITY_THRESHOLD && url.as_str() != query_url)
        .map(|(url, score)| SimilarityMatch {
            url: url.clone(),
            similarity: score.min(1.0),
        })
        .collect();

    // `sort_by` is stable.
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches
}

#[cfg(test)]
mod tests {
    use super::{find_similar, rank_matches, similarities};
    use crate::errors::EngineError;
    use crate::processing::embedding::cosine_similarity;
    use crate::repository::corpus::CorpusIndex;

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn keeps_only_scores_above_threshold() {
        let matches = rank_matches(&urls(&["A", "B"]), &[0.92, 0.50], "query");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "A");
        assert_eq!(matches[0].similarity, 0.92);
    }

    #[test]
    fn threshold_is_strict() {
        let matches = rank_matches(&urls(&["exact", "above"]), &[0.80, 0.800_000_1], "query");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "above");
    }

    #[test]
    fn suppresses_self_match() {
        let matches = rank_matches(&urls(&["self", "other"]), &[1.0, 0.9], "self");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "other");
    }

    #[test]
    fn orders_by_descending_similarity_and_keeps_ties_stable() {
        let matches = rank_matches(
            &urls(&["a", "b", "c", "d"]),
            &[0.85, 0.95, 0.85, 0.90],
            "query",
        );
        let order: Vec<&str> = matches.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn nan_scores_never_match() {
        assert!(rank_matches(&urls(&["a"]), &[f32::NAN], "query").is_empty());
    }

    #[test]
    fn scores_every_row_by_cosine() {
        let b = (1.0_f32 - 0.92 * 0.92).sqrt();
        let corpus = CorpusIndex::from_rows(
            urls(&["A", "B"]),
            vec![vec![0.92, b], vec![0.5, (1.0_f32 - 0.25).sqrt()]],
        )
        .expect("valid corpus");

        let matches = find_similar(&[2.0, 0.0], "query", &corpus).expect("search");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "A");
        assert!((matches[0].similarity - 0.92).abs() < 1e-5);
    }

    #[test]
    fn zero_corpus_row_scores_zero() {
        let corpus = CorpusIndex::from_rows(urls(&["zero"]), vec![vec![0.0, 0.0]])
            .expect("valid corpus");
        assert_eq!(similarities(&[1.0, 0.0], &corpus).expect("scores"), vec![0.0]);
    }

    #[test]
    fn dimension_mismatch_is_inference_error() {
        let corpus =
            CorpusIndex::from_rows(urls(&["a"]), vec![vec![1.0, 0.0]]).expect("valid corpus");
        assert!(matches!(
            find_similar(&[1.0, 0.0, 0.0], "query", &corpus),
            Err(EngineError::Inference(_))
        ));
    }

    #[test]
    fn zero_query_is_inference_error() {
        let corpus =
            CorpusIndex::from_rows(urls(&["a"]), vec![vec![1.0, 0.0]]).expect("valid corpus");
        assert!(matches!(
            find_similar(&[0.0, 0.0], "query", &corpus),
            Err(EngineError::Inference(_))
        ));
    }

    #[test]
    fn scan_agrees_with_pairwise_cosine() {
        let rows = vec![vec![0.3, -0.4, 0.9], vec![1.0, 1.0, 0.0], vec![0.0, 0.0, 0.0]];
        let corpus = CorpusIndex::from_rows(urls(&["a", "b", "zero"]), rows.clone())
            .expect("valid corpus");
        let query = [0.5_f32, 0.2, 0.7];

        let scores = similarities(&query, &corpus).expect("scores");
        for (score, row) in scores.iter().zip(&rows) {
            assert_eq!(score.to_bits(), cosine_similarity(&query, row).to_bits());
        }
    }
}
