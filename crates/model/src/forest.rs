//! Random forest of CART trees with Gini splits.
//!
//! Each tree is fitted on its own bootstrap sample with a seed derived from
//! the forest seed and the tree index, so a forest is reproducible whatever
//! order rayon builds the trees in. Class weights (balanced by default) enter
//! both the split criterion and the leaf probabilities.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use signal_core::config::ForestConfig;
use signal_core::{Error, Result, Signal};

use crate::classifier::{Classifier, Probabilities};
use crate::scaler::matrix_width;

/// Smallest impurity decrease accepted as a split.
const MIN_GAIN: f64 = 1e-12;

/// One node of a fitted tree. Children are always stored after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Weighted class frequencies of the training rows that reached the leaf.
    Leaf { proba: Probabilities },
}

/// A fitted classification tree stored as a flat node list; the root is node 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Nodes in build order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Leaf probabilities for one row.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Probabilities> {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Leaf { proba }) => return Ok(*proba),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).ok_or_else(|| {
                        Error::model(format!("tree splits on feature {feature} of {}", x.len()))
                    })?;
                    index = if *value <= *threshold { *left } else { *right };
                }
                None => return Err(Error::model(format!("tree has no node {index}"))),
            }
        }
    }

    fn validate(&self, dim: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::model("tree has no nodes"));
        }
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= dim || !threshold.is_finite() {
                        return Err(Error::model(format!("node {i} has an invalid split")));
                    }
                    // children after the parent keeps traversal finite
                    if *left <= i || *right <= i || *left >= len || *right >= len {
                        return Err(Error::model(format!("node {i} has invalid children")));
                    }
                }
                Node::Leaf { proba } => {
                    let total: f64 = proba.iter().sum();
                    if proba.iter().any(|p| !p.is_finite() || *p < 0.0)
                        || (total - 1.0).abs() > 1e-6
                    {
                        return Err(Error::model(format!("leaf {i} is not a distribution")));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged decision trees averaged into class probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Forest shape.
    pub config: ForestConfig,
    /// Weight classes inversely to their training frequency.
    pub balanced: bool,
    /// Base seed; tree `t` uses `seed + t`.
    pub seed: u64,
    n_features: usize,
    trees: Vec<DecisionTree>,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Unfitted forest.
    pub fn new(config: ForestConfig, balanced: bool, seed: u64) -> Self {
        Self {
            config,
            balanced,
            seed,
            n_features: 0,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    /// Fitted trees.
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Whether `fit` has run.
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Check internal consistency after deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::model("forest has no trees"));
        }
        if self.importances.len() != self.n_features {
            return Err(Error::model(format!(
                "forest has {} importances for {} features",
                self.importances.len(),
                self.n_features
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| Error::model(format!("tree {t}: {e}")))?;
        }
        Ok(())
    }

    fn class_weights(&self, y: &[Signal]) -> [f64; 3] {
        let mut counts = [0usize; 3];
        for label in y {
            counts[label.index()] += 1;
        }
        if !self.balanced {
            return [1.0; 3];
        }
        let observed = counts.iter().filter(|&&c| c > 0).count() as f64;
        let n = y.len() as f64;
        counts.map(|c| if c == 0 { 0.0 } else { n / (observed * c as f64) })
    }

    fn max_features(&self, width: usize) -> usize {
        self.config
            .max_features
            .unwrap_or_else(|| (width as f64).sqrt().floor() as usize)
            .clamp(1, width)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Signal]) -> Result<()> {
        let width = matrix_width(x)?;
        if x.len() != y.len() {
            return Err(Error::model(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if let Some(i) = x.iter().position(|row| row.iter().any(|v| !v.is_finite())) {
            return Err(Error::model(format!("row {i} has a non-finite feature")));
        }

        let class_weight = self.class_weights(y);
        let max_features = self.max_features(width);
        let fitted: Vec<(DecisionTree, Vec<f64>)> = (0..self.config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut builder = TreeBuilder {
                    x,
                    y,
                    class_weight,
                    config: &self.config,
                    max_features,
                    rng: StdRng::seed_from_u64(self.seed.wrapping_add(t as u64)),
                    nodes: Vec::new(),
                    importances: vec![0.0; width],
                };
                let mut samples: Vec<usize> = if self.config.bootstrap {
                    let n = x.len();
                    (0..n).map(|_| builder.rng.gen_range(0..n)).collect()
                } else {
                    (0..x.len()).collect()
                };
                builder.build(&mut samples, 0);
                (DecisionTree { nodes: builder.nodes }, normalized(builder.importances))
            })
            .collect();

        let mut importances = vec![0.0; width];
        for (_, tree_importances) in &fitted {
            for (total, v) in importances.iter_mut().zip(tree_importances) {
                *total += v;
            }
        }

        self.n_features = width;
        self.importances = normalized(importances);
        self.trees = fitted.into_iter().map(|(tree, _)| tree).collect();
        Ok(())
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Probabilities> {
        let dim = self
            .dim()
            .ok_or_else(|| Error::model("classifier is not fitted"))?;
        if x.len() != dim {
            return Err(Error::model(format!(
                "input has {} features, classifier expects {dim}",
                x.len()
            )));
        }

        let mut proba = [0.0; 3];
        for tree in &self.trees {
            for (total, p) in proba.iter_mut().zip(tree.predict_proba(x)?) {
                *total += p;
            }
        }
        let n = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n;
        }
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(Error::model("non-finite class probability"));
        }
        Ok(proba)
    }

    fn dim(&self) -> Option<usize> {
        self.is_fitted().then_some(self.n_features)
    }

    fn name(&self) -> &str {
        "random_forest"
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.is_fitted().then_some(self.importances.as_slice())
    }
}

/// Split chosen for a node.
#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Weighted impurity decrease.
    gain: f64,
}

/// Grows one tree depth-first into a flat node list.
struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [Signal],
    class_weight: [f64; 3],
    config: &'a ForestConfig,
    max_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    /// Grow the subtree over `samples` and return its node index.
    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let index = self.nodes.len();
        let counts = self.weighted_counts(samples);
        let impurity = gini(&counts);
        self.nodes.push(Node::Leaf {
            proba: distribution(&counts),
        });

        if depth >= self.config.max_depth
            || samples.len() < self.config.min_samples_split
            || impurity <= MIN_GAIN
        {
            return index;
        }
        let Some(split) = self.best_split(samples, &counts, impurity) else {
            return index;
        };
        self.importances[split.feature] += split.gain;

        let x = self.x;
        samples.sort_by(|&a, &b| x[a][split.feature].total_cmp(&x[b][split.feature]));
        let mid = samples.partition_point(|&i| x[i][split.feature] <= split.threshold);
        let (left_samples, right_samples) = samples.split_at_mut(mid);

        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    fn weighted_counts(&self, samples: &[usize]) -> [f64; 3] {
        let mut counts = [0.0; 3];
        for &i in samples {
            let class = self.y[i].index();
            counts[class] += self.class_weight[class];
        }
        counts
    }

    /// Best threshold over a random subset of features, by weighted Gini decrease.
    fn best_split(
        &mut self,
        samples: &[usize],
        parent: &[f64; 3],
        impurity: f64,
    ) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.importances.len()).collect();
        features.shuffle(&mut self.rng);
        features.truncate(self.max_features);

        let x = self.x;
        let total: f64 = parent.iter().sum();
        let min_leaf = self.config.min_samples_leaf;
        let mut order = samples.to_vec();
        let mut best: Option<BestSplit> = None;

        for feature in features {
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));
            let mut left = [0.0; 3];
            for k in 0..order.len().saturating_sub(1) {
                let class = self.y[order[k]].index();
                left[class] += self.class_weight[class];

                let (here, next) = (x[order[k]][feature], x[order[k + 1]][feature]);
                let n_left = k + 1;
                if here == next || n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }

                let right = [parent[0] - left[0], parent[1] - left[1], parent[2] - left[2]];
                let w_left: f64 = left.iter().sum();
                let w_right = total - w_left;
                let gain = total * impurity - w_left * gini(&left) - w_right * gini(&right);
                if gain > best.map_or(MIN_GAIN, |b| b.gain) {
                    let mut threshold = (here + next) / 2.0;
                    if !(threshold >= here && threshold < next) {
                        threshold = here;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: &[f64; 3]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

fn distribution(counts: &[f64; 3]) -> Probabilities {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return [1.0 / 3.0; 3];
    }
    counts.map(|c| c / total)
}

fn normalized(mut values: Vec<f64>) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in &mut values {
            *v /= sum;
        }
    }
    values
}
