//! Gradient-boosted regression trees loaded from an XGBoost JSON model.
//!
//! Only the pieces needed for inference are read: the base score, the
//! declared feature count, the objective name and each tree's node arrays.
//! Training and the binary model format are out of scope.

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::types::{ForecastError, Result, ReturnEstimator};

/// Objectives whose prediction is the raw margin
const IDENTITY_OBJECTIVES: &[&str] = &[
    "reg:squarederror",
    "reg:linear",
    "reg:pseudohubererror",
    "reg:absoluteerror",
];

/// One regression tree in flat array form
#[derive(Debug, Clone)]
struct RegressionTree {
    left: Vec<i32>,
    right: Vec<i32>,
    split_index: Vec<usize>,
    /// Split threshold for inner nodes, leaf value for leaves
    condition: Vec<f32>,
    default_left: Vec<bool>,
}

impl RegressionTree {
    fn from_raw(raw: RawTree, position: usize) -> Result<Self> {
        let nodes = raw.left_children.len();
        if nodes == 0 {
            return Err(ForecastError::Model(format!("tree {} has no nodes", position)));
        }
        if raw.right_children.len() != nodes
            || raw.split_indices.len() != nodes
            || raw.split_conditions.len() != nodes
            || raw.default_left.len() != nodes
        {
            return Err(ForecastError::Model(format!(
                "tree {} has node arrays of different lengths",
                position
            )));
        }

        // Children always come after their parent, which also rules out cycles
        for node in 0..nodes {
            let (l, r) = (raw.left_children[node], raw.right_children[node]);
            let is_leaf = l == -1;
            let valid_child = |c: i32| c > node as i32 && (c as usize) < nodes;
            if !is_leaf && !(valid_child(l) && valid_child(r)) {
                return Err(ForecastError::Model(format!(
                    "tree {} node {} has invalid children ({}, {})",
                    position, node, l, r
                )));
            }
        }

        Ok(Self {
            left: raw.left_children,
            right: raw.right_children,
            split_index: raw.split_indices,
            condition: raw.split_conditions,
            default_left: raw.default_left.into_iter().map(Flag::is_set).collect(),
        })
    }

    /// Features are narrowed to `f32` before comparison, as XGBoost does
    fn leaf_value(&self, features: &[f64]) -> f32 {
        let mut node = 0usize;
        while self.left[node] != -1 {
            let value = features
                .get(self.split_index[node])
                .map(|v| *v as f32)
                .filter(|v| !v.is_nan());
            let go_left = match value {
                Some(v) => v < self.condition[node],
                None => self.default_left[node],
            };
            let next = if go_left { self.left[node] } else { self.right[node] };
            node = next as usize;
        }
        self.condition[node]
    }
}

/// Sum-of-trees regressor
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    base_score: f32,
    num_feature: Option<usize>,
    trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    /// Load a model file written by XGBoost's `save_model("*.json")`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ForecastError::Model(format!(
                "Model file not found at {}",
                path.display()
            )));
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| ForecastError::Model(format!("{}: {}", path.display(), e)))?;
        let model = Self::from_json_str(&json)?;
        info!(
            "Loaded tree ensemble from {} ({} trees)",
            path.display(),
            model.trees.len()
        );
        Ok(model)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: RawModelFile =
            serde_json::from_str(json).map_err(|e| ForecastError::Model(e.to_string()))?;
        let learner = file.learner;

        if let Some(objective) = &learner.objective {
            if !IDENTITY_OBJECTIVES.contains(&objective.name.as_str()) {
                return Err(ForecastError::Model(format!(
                    "unsupported objective: {}",
                    objective.name
                )));
            }
        }

        let booster = learner.gradient_booster;
        let model = match (booster.name.as_str(), booster.model) {
            ("gbtree", Some(model)) => model,
            (name, _) => {
                return Err(ForecastError::Model(format!("unsupported booster: {}", name)));
            }
        };

        let params = learner.learner_model_param;
        let base_score = match params.base_score.as_deref() {
            Some(raw) => parse_param(raw)
                .map(|v| v as f32)
                .ok_or_else(|| ForecastError::Model(format!("invalid base_score: {}", raw)))?,
            None => 0.5,
        };
        let num_feature = params
            .num_feature
            .as_deref()
            .and_then(parse_param)
            .map(|n| n as usize)
            .filter(|n| *n > 0);

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| RegressionTree::from_raw(raw, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base_score,
            num_feature,
            trees,
        })
    }

    pub fn base_score(&self) -> f64 {
        self.base_score as f64
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw margin: base score plus every tree's leaf, summed in `f32`
    pub fn predict_margin(&self, features: &[f64]) -> f64 {
        let margin = self
            .trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.leaf_value(features));
        margin as f64
    }
}

impl ReturnEstimator for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if let Some(expected) = self.num_feature {
            if features.len() != expected {
                return Err(ForecastError::Estimator(format!(
                    "model expects {} features, got {}",
                    expected,
                    features.len()
                )));
            }
        }
        Ok(self.predict_margin(features))
    }

    fn expected_features(&self) -> Option<usize> {
        self.num_feature
    }
}

/// Numeric model parameters are strings, sometimes wrapped as `"[5E-1]"`
fn parse_param(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next()?.trim();
    first.parse::<f64>().ok().filter(|v| v.is_finite())
}

// On-disk model layout
#[derive(Debug, Deserialize)]
struct RawModelFile {
    learner: RawLearner,
}

#[derive(Debug, Deserialize)]
struct RawLearner {
    learner_model_param: RawLearnerParam,
    gradient_booster: RawBooster,
    #[serde(default)]
    objective: Option<RawObjective>,
}

#[derive(Debug, Deserialize)]
struct RawLearnerParam {
    #[serde(default)]
    base_score: Option<String>,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBooster {
    name: String,
    #[serde(default)]
    model: Option<RawGbTree>,
}

#[derive(Debug, Deserialize)]
struct RawGbTree {
    trees: Vec<RawTree>,
}

#[derive(Debug, Deserialize)]
struct RawObjective {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<usize>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
}

/// `default_left` is written as 0/1 by some versions and as booleans by others
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}
