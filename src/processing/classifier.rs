//! Quality classifier backed by an exported tree ensemble.
//!
//! The artifact is a JSON dump of a fitted forest in scikit-learn's node-array
//! layout. Prediction averages the normalized leaf distributions of every tree
//! and picks the most probable class.

use std::path::Path;

use serde::Deserialize;

use crate::domain::analysis::{FEATURE_NAMES, FeatureVector, QualityLabel};
use crate::errors::{EngineError, EngineResult, LoadError};

const ARTIFACT: &str = "classifier artifact";
const LEAF: i64 = -1;

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    features: Vec<String>,
    classes: Vec<String>,
    trees: Vec<TreeArtifact>,
}

#[derive(Debug, Deserialize)]
struct TreeArtifact {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

/// A loaded, immutable quality classifier.
#[derive(Debug, Clone)]
pub struct QualityClassifier {
    classes: Vec<QualityLabel>,
    trees: Vec<Tree>,
}

impl QualityClassifier {
    /// Load and validate the classifier artifact at `path`.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(path).map_err(|err| LoadError::Missing {
            artifact: ARTIFACT,
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let classifier = Self::from_json(&raw)?;
        log::info!(
            "Loaded quality classifier from {}: {} trees, classes {:?}",
            path.display(),
            classifier.trees.len(),
            classifier.classes
        );
        Ok(classifier)
    }

    /// Parse and validate an artifact already held in memory.
    pub fn from_json(raw: &str) -> Result<Self, LoadError> {
        let artifact: ForestArtifact =
            serde_json::from_str(raw).map_err(|err| LoadError::Corrupt {
                artifact: ARTIFACT,
                reason: err.to_string(),
            })?;

        if artifact.features != FEATURE_NAMES {
            return Err(LoadError::SchemaMismatch {
                artifact: ARTIFACT,
                reason: format!(
                    "expected features {:?}, found {:?}",
                    FEATURE_NAMES, artifact.features
                ),
            });
        }

        let classes = artifact
            .classes
            .iter()
            .map(|class| class.parse::<QualityLabel>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| LoadError::SchemaMismatch {
                artifact: ARTIFACT,
                reason,
            })?;
        if classes.is_empty() {
            return Err(schema("artifact declares no classes"));
        }

        if artifact.trees.is_empty() {
            return Err(schema("artifact contains no trees"));
        }

        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(|(idx, tree)| {
                build_tree(tree, classes.len()).map_err(|reason| LoadError::Corrupt {
                    artifact: ARTIFACT,
                    reason: format!("tree {idx}: {reason}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { classes, trees })
    }

    /// Predict the quality label of a single feature vector.
    pub fn predict(&self, features: &FeatureVector) -> EngineResult<QualityLabel> {
        let input = features.as_array();
        if let Some(idx) = input.iter().position(|value| !value.is_finite()) {
            return Err(EngineError::Inference(format!(
                "feature `{}` is not a finite number",
                FEATURE_NAMES[idx]
            )));
        }

        let mut probabilities = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (total, p) in probabilities.iter_mut().zip(tree.leaf_for(&input)?) {
                *total += p;
            }
        }

        let mut best = 0;
        for (idx, p) in probabilities.iter().enumerate() {
            if *p > probabilities[best] {
                best = idx;
            }
        }
        Ok(self.classes[best])
    }

    /// Predict every feature vector; a failing row does not affect the others.
    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Vec<EngineResult<QualityLabel>> {
        batch.iter().map(|features| self.predict(features)).collect()
    }
}

impl Tree {
    fn leaf_for(&self, input: &[f64; 3]) -> EngineResult<&[f64]> {
        let mut idx = 0;
        // Validation guarantees children point inside the tree; a walk longer
        // than the node count can only mean a cycle.
        for _ in 0..=self.nodes.len() {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return Ok(distribution.as_slice()),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if input[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
        Err(EngineError::Inference(
            "decision path does not reach a leaf".to_string(),
        ))
    }
}

fn schema(reason: &str) -> LoadError {
    LoadError::SchemaMismatch {
        artifact: ARTIFACT,
        reason: reason.to_string(),
    }
}

fn build_tree(tree: TreeArtifact, n_classes: usize) -> Result<Tree, String> {
    let n = tree.children_left.len();
    if n == 0 {
        return Err("tree has no nodes".to_string());
    }
    if [
        tree.children_right.len(),
        tree.feature.len(),
        tree.threshold.len(),
        tree.value.len(),
    ]
    .iter()
    .any(|len| *len != n)
    {
        return Err("node arrays have different lengths".to_string());
    }

    let child = |raw: i64, node: usize| -> Result<usize, String> {
        usize::try_from(raw)
            .ok()
            .filter(|idx| *idx < n && *idx != node)
            .ok_or_else(|| format!("node {node} has invalid child {raw}"))
    };

    let mut nodes = Vec::with_capacity(n);
    for node in 0..n {
        if tree.children_left[node] == LEAF {
            let values = &tree.value[node];
            if values.len() != n_classes {
                return Err(format!(
                    "leaf {node} has {} class values, expected {n_classes}",
                    values.len()
                ));
            }
            let total: f64 = values.iter().sum();
            if !total.is_finite() || total <= 0.0 || values.iter().any(|v| *v < 0.0) {
                return Err(format!("leaf {node} has an invalid class distribution"));
            }
            nodes.push(Node::Leaf {
                distribution: values.iter().map(|v| v / total).collect(),
            });
        } else {
            let feature = usize::try_from(tree.feature[node])
                .ok()
                .filter(|idx| *idx < FEATURE_NAMES.len())
                .ok_or_else(|| {
                    format!("node {node} splits on unknown feature {}", tree.feature[node])
                })?;
            nodes.push(Node::Split {
                feature,
                threshold: tree.threshold[node],
                left: child(tree.children_left[node], node)?,
                right: child(tree.children_right[node], node)?,
            });
        }
    }

    Ok(Tree { nodes })
}
