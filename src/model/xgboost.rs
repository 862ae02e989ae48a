//! Gradient-boosted tree ensembles in XGBoost's JSON model format.
//!
//! Only the parts needed for inference are read:
//! `learner.gradient_booster.model.trees`, `learner.learner_model_param.base_score`,
//! `learner.objective.name` and the optional `learner.feature_names`.
//! Thresholds are compared and leaves are summed in single precision, as XGBoost does.

use serde::{Deserialize, Deserializer};
use std::path::Path;

use super::{ModelError, Regressor};
use crate::features::{FeatureVector, FEATURE_COLUMNS, FEATURE_COUNT};

/// Objectives whose raw margin is the prediction
const IDENTITY_OBJECTIVES: &[&str] = &[
    "reg:squarederror",
    "reg:linear",
    "reg:absoluteerror",
    "reg:pseudohubererror",
    "reg:quantileerror",
];

#[derive(Debug, Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Option<Objective>,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    model: Option<GbTreeModel>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    trees: Vec<RawTree>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    #[serde(deserialize_with = "flags")]
    default_left: Vec<bool>,
}

/// `default_left` is written as 0/1 by some versions and as booleans by others
fn flags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    let raw = Vec::<Flag>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|f| match f {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

/// A single regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn from_raw(index: usize, raw: RawTree) -> Result<Self, ModelError> {
        let n = raw.left_children.len();
        let invalid = |msg: String| ModelError::Invalid(format!("tree {}: {}", index, msg));

        if n == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        if [
            raw.right_children.len(),
            raw.split_indices.len(),
            raw.split_conditions.len(),
            raw.default_left.len(),
        ]
        .iter()
        .any(|len| *len != n)
        {
            return Err(invalid("node array length mismatch".to_string()));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let left = raw.left_children[i];
            if left == -1 {
                nodes.push(Node::Leaf(raw.split_conditions[i] as f32));
                continue;
            }

            let right = raw.right_children[i];
            // Children always come after their parent, so traversal terminates
            let child = |c: i64| -> Result<usize, ModelError> {
                usize::try_from(c)
                    .ok()
                    .filter(|c| *c > i && *c < n)
                    .ok_or_else(|| invalid(format!("node {} has invalid child {}", i, c)))
            };
            let feature = usize::try_from(raw.split_indices[i])
                .ok()
                .filter(|f| *f < FEATURE_COUNT)
                .ok_or_else(|| {
                    invalid(format!(
                        "node {} splits on feature {} (only {} features)",
                        i, raw.split_indices[i], FEATURE_COUNT
                    ))
                })?;

            nodes.push(Node::Split {
                feature,
                threshold: raw.split_conditions[i] as f32,
                left: child(left)?,
                right: child(right)?,
                default_left: raw.default_left[i],
            });
        }

        Ok(Self { nodes })
    }

    /// Walk from the root to a leaf; NaN inputs follow the default branch
    pub fn predict(&self, features: &[f64]) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = features[feature];
                    idx = if value.is_nan() {
                        if default_left {
                            left
                        } else {
                            right
                        }
                    } else if (value as f32) < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Sum-of-trees regressor: `base_score + Σ tree(x)`
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    base_score: f32,
    trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let file: ModelFile = serde_json::from_str(json)?;
        let learner = file.learner;

        if let Some(objective) = &learner.objective {
            if !IDENTITY_OBJECTIVES.contains(&objective.name.as_str()) {
                return Err(ModelError::Unsupported(format!(
                    "objective {}",
                    objective.name
                )));
            }
        }

        if !learner.feature_names.is_empty() && learner.feature_names != FEATURE_COLUMNS {
            return Err(ModelError::FeatureMismatch {
                expected: learner.feature_names,
                found: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            });
        }

        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelError::Unsupported(format!(
                "booster {}",
                learner.gradient_booster.name
            )));
        }
        let model = learner
            .gradient_booster
            .model
            .ok_or_else(|| ModelError::Invalid("gbtree has no model".to_string()))?;

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| RegressionTree::from_raw(i, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { base_score, trees })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn base_score(&self) -> f64 {
        f64::from(self.base_score)
    }
}

/// Accepts both `"5E-1"` and the bracketed `"[5E-1]"` written by XGBoost 2.1+
fn parse_base_score(raw: &str) -> Result<f32, ModelError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed
        .parse::<f32>()
        .map_err(|_| ModelError::Invalid(format!("base_score {:?}", raw)))
}

impl Regressor for TreeEnsemble {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let values = features.as_slice();
        let margin = self.base_score + self.trees.iter().map(|t| t.predict(values)).sum::<f32>();
        let prediction = f64::from(margin);

        if !prediction.is_finite() {
            return Err(ModelError::Inference(format!(
                "non-finite prediction {}",
                prediction
            )));
        }
        Ok(prediction)
    }

    fn name(&self) -> &str {
        "xgboost-gbtree"
    }
}
