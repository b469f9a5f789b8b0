use serde::{Deserialize, Serialize};

use crate::error::{Result, WellbeingError};

/// One node of a fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go `left` when `x[feature] <= threshold`, otherwise `right`
    Split {
        /// Column index into the aligned row
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Node index taken when at or below the threshold
        left: usize,
        /// Node index taken when above the threshold
        right: usize,
    },
    /// Class weights (counts or fractions) at a leaf
    Leaf {
        /// One weight per class
        value: Vec<f64>,
    },
}

/// A fitted tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Flattened nodes
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn leaf(&self, x: &[f64]) -> Result<&[f64]> {
        let mut index = 0;
        // a well-formed tree reaches a leaf in fewer hops than it has nodes
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).ok_or_else(|| {
                        WellbeingError::Configuration(format!(
                            "tree splits on feature {feature} but the row has {} columns",
                            x.len()
                        ))
                    })?;
                    index = if *v <= *threshold { *left } else { *right };
                }
                None => break,
            }
        }
        Err(WellbeingError::Configuration(
            "decision tree never reaches a leaf".to_string(),
        ))
    }

    fn check(&self, n_classes: usize, width: Option<usize>) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(WellbeingError::Configuration("empty decision tree".to_string()));
        }
        for node in &self.nodes {
            match node {
                TreeNode::Leaf { value } if value.len() != n_classes => {
                    return Err(WellbeingError::Configuration(format!(
                        "leaf has {} class weights, expected {n_classes}",
                        value.len()
                    )));
                }
                TreeNode::Split { left, right, .. }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() =>
                {
                    return Err(WellbeingError::Configuration(
                        "split points outside the tree".to_string(),
                    ));
                }
                TreeNode::Split { feature, .. } if width.is_some_and(|w| *feature >= w) => {
                    return Err(WellbeingError::Configuration(format!(
                        "split on feature {feature} outside the declared columns"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Random forest classifier: the mean of each tree's normalized leaf weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Number of output classes
    pub n_classes: usize,
    /// Columns the forest was fitted on
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// Fitted trees
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    #[allow(clippy::cast_precision_loss)]
    pub(super) fn probabilities(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut totals = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let leaf = tree.leaf(x)?;
            let sum: f64 = leaf.iter().sum();
            for (total, weight) in totals.iter_mut().zip(leaf) {
                *total += if sum > 0.0 {
                    weight / sum
                } else {
                    1.0 / self.n_classes as f64
                };
            }
        }
        let n = self.trees.len() as f64;
        Ok(totals.into_iter().map(|t| t / n).collect())
    }

    pub(super) fn check(&self, width: Option<usize>) -> Result<()> {
        if self.n_classes == 0 || self.trees.is_empty() {
            return Err(WellbeingError::Configuration(
                "random forest needs at least one class and one tree".to_string(),
            ));
        }
        let width = width.or_else(|| self.feature_names.as_ref().map(Vec::len));
        self.trees
            .iter()
            .try_for_each(|tree| tree.check(self.n_classes, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(threshold: f64, low: [f64; 3], high: [f64; 3]) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low.to_vec() },
                TreeNode::Leaf { value: high.to_vec() },
            ],
        }
    }

    #[test]
    fn test_probabilities_average_normalized_leaves() {
        let forest = RandomForest {
            n_classes: 3,
            feature_names: None,
            trees: vec![
                stump(5.0, [4.0, 0.0, 0.0], [0.0, 0.0, 4.0]),
                stump(10.0, [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]),
            ],
        };
        let proba = forest.probabilities(&[7.0]).unwrap();
        assert_eq!(proba, vec![0.0, 0.25, 0.75]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let tree = DecisionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(tree.leaf(&[0.0]).is_err());
    }

    #[test]
    fn test_check_rejects_bad_leaf_width() {
        let forest = RandomForest {
            n_classes: 3,
            feature_names: None,
            trees: vec![DecisionTree {
                nodes: vec![TreeNode::Leaf { value: vec![1.0, 2.0] }],
            }],
        };
        assert!(forest.check(None).is_err());
    }

    #[test]
    fn test_check_rejects_feature_outside_columns() {
        let forest = RandomForest {
            n_classes: 3,
            feature_names: None,
            trees: vec![stump(1.0, [1.0, 0.0, 0.0], [0.0, 0.0, 1.0])],
        };
        assert!(forest.check(Some(0)).is_err());
        assert!(forest.check(Some(1)).is_ok());
    }
}
