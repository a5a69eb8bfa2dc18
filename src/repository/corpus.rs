use std::path::Path;

use serde::Deserialize;

use crate::errors::LoadError;
use crate::processing::embedding::l2_norm;
use crate::repository::npy::{Matrix, read_npy};

const METADATA: &str = "corpus metadata";

#[derive(Debug, Deserialize)]
struct MetadataRow {
    url: String,
}

/// Precomputed corpus embeddings, row-aligned with their source URLs.
///
/// Immutable after construction and safe to share between threads.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    urls: Vec<String>,
    dimension: usize,
    matrix: Vec<f32>,
    norms: Vec<f32>,
}

impl CorpusIndex {
    /// Load the embedding matrix and the metadata table, checking that both
    /// describe the same number of documents.
    pub fn load(embeddings_path: &Path, metadata_path: &Path) -> Result<Self, LoadError> {
        let matrix = read_npy(embeddings_path)?;
        let urls = read_urls(metadata_path)?;
        let index = Self::from_matrix(urls, matrix)?;
        log::info!(
            "Loaded corpus index from {} and {}: {} documents, dimension {}",
            embeddings_path.display(),
            metadata_path.display(),
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    pub fn from_matrix(urls: Vec<String>, matrix: Matrix) -> Result<Self, LoadError> {
        if matrix.rows != urls.len() {
            return Err(LoadError::CorpusCorrupt {
                rows: matrix.rows,
                urls: urls.len(),
            });
        }
        if matrix.cols == 0 {
            return Err(LoadError::Corrupt {
                artifact: "embedding matrix",
                reason: "embeddings have zero dimensions".to_string(),
            });
        }

        let norms: Vec<f32> = matrix.data.chunks_exact(matrix.cols).map(l2_norm).collect();
        let degenerate = norms.iter().filter(|norm| **norm == 0.0).count();
        if degenerate > 0 {
            log::warn!("{degenerate} corpus embeddings have zero magnitude and will never match");
        }

        Ok(Self {
            urls,
            dimension: matrix.cols,
            matrix: matrix.data,
            norms,
        })
    }

    /// Build an index from in-memory rows.
    pub fn from_rows(urls: Vec<String>, rows: Vec<Vec<f32>>) -> Result<Self, LoadError> {
        if rows.len() != urls.len() {
            return Err(LoadError::CorpusCorrupt {
                rows: rows.len(),
                urls: urls.len(),
            });
        }
        let cols = rows.first().map(Vec::len).unwrap_or_default();
        if let Some(idx) = rows.iter().position(|row| row.len() != cols) {
            return Err(LoadError::Corrupt {
                artifact: "embedding matrix",
                reason: format!(
                    "row {idx} has {} dimensions, expected {cols}",
                    rows[idx].len()
                ),
            });
        }
        let matrix = Matrix {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        };
        Self::from_matrix(urls, matrix)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Embedding dimension D shared by every row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Row-major N×D embedding matrix.
    pub fn matrix(&self) -> &[f32] {
        &self.matrix
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.urls
            .iter()
            .map(String::as_str)
            .zip(self.matrix.chunks_exact(self.dimension))
    }

    pub(crate) fn norms(&self) -> &[f32] {
        &self.norms
    }
}

/// Read the `url` column of the metadata table, in file order.
pub fn read_urls(path: &Path) -> Result<Vec<String>, LoadError> {
    let file = std::fs::File::open(path).map_err(|err| LoadError::Missing {
        artifact: METADATA,
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    let mut reader = csv::Reader::from_reader(file);

    // Spreadsheet exports may prefix the first header with a byte-order mark.
    let headers: csv::StringRecord = reader
        .headers()
        .map_err(|err| LoadError::Corrupt {
            artifact: METADATA,
            reason: err.to_string(),
        })?
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            if idx == 0 {
                header.trim_start_matches('\u{feff}')
            } else {
                header
            }
        })
        .collect();
    if !headers.iter().any(|header| header == "url") {
        return Err(LoadError::SchemaMismatch {
            artifact: METADATA,
            reason: "no `url` column".to_string(),
        });
    }

    reader.set_headers(headers);

    reader
        .deserialize::<MetadataRow>()
        .map(|row| {
            row.map(|row| row.url).map_err(|err| LoadError::Corrupt {
                artifact: METADATA,
                reason: err.to_string(),
            })
        })
        .collect()
}
