//! Random forest classifier for the lightweight tier
//!
//! The forest is exported offline as JSON with one flat array per node
//! attribute, the same layout tree ensembles use internally:
//!
//! ```json
//! {
//!   "n_features": 219,
//!   "classes": [0, 1, 2],
//!   "trees": [
//!     {
//!       "children_left":  [1, -1, -1],
//!       "children_right": [2, -1, -1],
//!       "feature":        [215, -2, -2],
//!       "threshold":      [1.05, -2.0, -2.0],
//!       "value":          [[10, 10, 0], [9, 1, 0], [1, 9, 0]]
//!     }
//!   ]
//! }
//! ```
//!
//! `classes[j]` is the label index (into the parallel label list) of
//! probability column `j`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::argmax;
use crate::utils::error::{DiagnosisError, Result};

/// Child index marking a leaf node
pub const LEAF: i64 = -1;

/// A single decision tree in flat-array form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights (counts or fractions)
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn validate(&self, index: usize, n_features: usize, n_classes: usize) -> Result<()> {
        let nodes = self.node_count();
        let invalid = |msg: String| DiagnosisError::Config(format!("tree {}: {}", index, msg));

        if nodes == 0 {
            return Err(invalid("no nodes".into()));
        }
        if self.children_right.len() != nodes
            || self.feature.len() != nodes
            || self.threshold.len() != nodes
            || self.value.len() != nodes
        {
            return Err(invalid("node arrays differ in length".into()));
        }

        for node in 0..nodes {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if self.value[node].len() != n_classes {
                return Err(invalid(format!(
                    "node {} has {} class weights, expected {}",
                    node,
                    self.value[node].len(),
                    n_classes
                )));
            }
            if left == LEAF && right == LEAF {
                continue;
            }
            // Children always come after their parent, so traversal terminates
            for child in [left, right] {
                if child <= node as i64 || child >= nodes as i64 {
                    return Err(invalid(format!("node {} has invalid child {}", node, child)));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(invalid(format!(
                    "node {} splits on feature {} (have {})",
                    node, feature, n_features
                )));
            }
        }
        Ok(())
    }

    /// Walk to the leaf for `x` and return its normalized class distribution
    fn leaf_distribution(&self, x: &[f64]) -> Vec<f64> {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            // Splits were learned on single-precision inputs
            let value = (x[self.feature[node] as usize] as f32) as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }

        let weights = &self.value[node];
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter().map(|w| w / total).collect()
        } else {
            weights.clone()
        }
    }
}

/// Ensemble of decision trees voting by averaged class distributions
///
/// Only constructible through [`RandomForest::new`] or deserialization, both
/// of which validate, so prediction never indexes out of range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ForestExport")]
pub struct RandomForest {
    n_features: usize,
    classes: Vec<usize>,
    trees: Vec<DecisionTree>,
}

/// Unvalidated on-disk shape
#[derive(Deserialize)]
struct ForestExport {
    n_features: usize,
    classes: Vec<usize>,
    trees: Vec<DecisionTree>,
}

impl TryFrom<ForestExport> for RandomForest {
    type Error = DiagnosisError;

    fn try_from(export: ForestExport) -> Result<Self> {
        Self::new(export.n_features, export.classes, export.trees)
    }
}

impl RandomForest {
    /// Assemble a forest, checking structural consistency
    pub fn new(n_features: usize, classes: Vec<usize>, trees: Vec<DecisionTree>) -> Result<Self> {
        let forest = Self {
            n_features,
            classes,
            trees,
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Load a forest from its JSON export
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let forest: RandomForest = serde_json::from_str(&contents)?;

        info!(
            "Loaded random forest from {:?} ({} trees, {} classes)",
            path,
            forest.trees.len(),
            forest.classes.len()
        );
        Ok(forest)
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(DiagnosisError::Config("forest has no trees".into()));
        }
        if self.classes.is_empty() {
            return Err(DiagnosisError::Config("forest has no classes".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.n_features, self.classes.len())?;
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Label index of each probability column
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn check_input(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.n_features {
            return Err(DiagnosisError::Config(format!(
                "expected {} features, got {}",
                self.n_features,
                x.len()
            )));
        }
        Ok(())
    }

    /// Mean of the per-tree leaf distributions, one entry per class column
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.check_input(x)?;

        let mut proba = vec![0.0f64; self.n_classes()];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf_distribution(x)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        for p in proba.iter_mut() {
            *p /= n_trees;
        }
        Ok(proba)
    }

    /// Winning label index together with the full distribution, from a
    /// single pass over the trees (first column wins ties)
    pub fn predict_with_proba(&self, x: &[f64]) -> Result<(usize, Vec<f64>)> {
        let proba = self.predict_proba(x)?;
        Ok((self.classes[argmax(&proba)], proba))
    }

    /// Label index of the most probable class
    pub fn predict(&self, x: &[f64]) -> Result<usize> {
        self.predict_with_proba(x).map(|(class, _)| class)
    }
}
