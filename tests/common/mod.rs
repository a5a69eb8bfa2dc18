//! Helpers for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use content_audit::errors::{EngineError, EngineResult};
use content_audit::models::config::EngineConfig;
use content_audit::processing::embedding::TextEncoder;
use tempfile::TempDir;

pub const DIMENSION: usize = 32;

/// One stump on word_count: thin pages are Low, everything else High.
pub const STUMP_CLASSIFIER: &str = r#"{
    "features": ["word_count", "sentence_count", "flesch_reading_ease"],
    "classes": ["High", "Low", "Medium"],
    "trees": [{
        "children_left": [1, -1, -1],
        "children_right": [2, -1, -1],
        "feature": [0, -2, -2],
        "threshold": [499.5, -2.0, -2.0],
        "value": [[0, 0, 0], [0, 9, 1], [7, 0, 3]]
    }]
}"#;

/// Bag-of-words hashing encoder: deterministic and download-free.
pub struct HashingEncoder {
    pub dimension: usize,
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self {
            dimension: DIMENSION,
        }
    }
}

impl HashingEncoder {
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in text.split_whitespace() {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        vector
    }
}

impl TextEncoder for HashingEncoder {
    fn encode_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }
}

/// Fails any batch containing the marker word, after a successful probe.
pub struct FlakyEncoder {
    pub inner: HashingEncoder,
}

impl TextEncoder for FlakyEncoder {
    fn encode_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        if texts.iter().any(|text| text.contains("explode")) {
            return Err(EngineError::Inference("model rejected input".to_string()));
        }
        self.inner.encode_batch(texts)
    }
}

/// Records the size of every batch it encodes.
pub struct CountingEncoder {
    pub inner: HashingEncoder,
    pub batches: Arc<Mutex<Vec<usize>>>,
}

impl CountingEncoder {
    pub fn new() -> (Self, Arc<Mutex<Vec<usize>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let encoder = Self {
            inner: HashingEncoder::default(),
            batches: Arc::clone(&batches),
        };
        (encoder, batches)
    }
}

impl TextEncoder for CountingEncoder {
    fn encode_batch(&self, texts: &[String]) -> EngineResult<Vec<Vec<f32>>> {
        self.batches
            .lock()
            .expect("batch log poisoned")
            .push(texts.len());
        self.inner.encode_batch(texts)
    }
}

/// Temporary directory holding engine artifacts.
pub struct TestArtifacts {
    dir: TempDir,
}

impl TestArtifacts {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create artifact directory."),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_classifier(&self, contents: &str) -> PathBuf {
        let path = self.path("quality_model.json");
        std::fs::write(&path, contents).expect("Failed to write classifier.");
        path
    }

    /// Write `rows` as a version 1 `<f4` matrix.
    pub fn write_embeddings(&self, rows: &[Vec<f32>], cols: usize) -> PathBuf {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        self.write_npy(1, "<f4", rows.len(), cols, bytemuck::cast_slice::<f32, u8>(&flat))
    }

    /// Write `rows` as a version 2 `<f8` matrix.
    pub fn write_embeddings_f64(&self, rows: &[Vec<f32>], cols: usize) -> PathBuf {
        let flat: Vec<f64> = rows.iter().flatten().map(|v| f64::from(*v)).collect();
        self.write_npy(2, "<f8", rows.len(), cols, bytemuck::cast_slice::<f64, u8>(&flat))
    }

    fn write_npy(
        &self,
        major: u8,
        descr: &str,
        rows: usize,
        cols: usize,
        data: &[u8],
    ) -> PathBuf {
        let path = self.path("embeddings.npy");
        let prefix_len = if major == 1 { 10 } else { 12 };

        let mut header = format!(
            "{{'descr': '{descr}', 'fortran_order': False, 'shape': ({rows}, {cols}), }}"
        );
        while (prefix_len + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut bytes = b"\x93NUMPY".to_vec();
        bytes.extend_from_slice(&[major, 0]);
        if major == 1 {
            bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        } else {
            bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
        }
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(data);
        std::fs::write(&path, bytes).expect("Failed to write embeddings.");
        path
    }

    pub fn write_metadata(&self, urls: &[&str]) -> PathBuf {
        let path = self.path("features.csv");
        let mut writer = csv::Writer::from_path(&path).expect("Failed to open metadata.");
        writer
            .write_record(["url", "word_count"])
            .expect("Failed to write header.");
        for url in urls {
            writer
                .write_record([*url, "0"])
                .expect("Failed to write row.");
        }
        writer.flush().expect("Failed to flush metadata.");
        path
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            classifier_path: self.path("quality_model.json"),
            embeddings_path: self.path("embeddings.npy"),
            corpus_path: self.path("features.csv"),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            model_cache_dir: Some(self.path("model-cache")),
            batch_size: 8,
        }
    }
}
