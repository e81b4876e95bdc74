//! Random forest regressor.
//!
//! Bagged CART trees split on variance reduction. Every tree draws its own
//! bootstrap sample and split candidates from an RNG derived from the forest
//! seed and the tree index, so training is reproducible and the trees can be
//! built in any order (in parallel with the `parallel` feature).

use crate::config::MlConfig;
use crate::{AnalysisError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Hyper-parameters of the forest.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from(&MlConfig::default())
    }
}

impl From<&MlConfig> for ForestParams {
    fn from(config: &MlConfig) -> Self {
        ForestParams {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features,
            seed: config.seed,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(AnalysisError::invalid("n_trees", "the forest needs at least one tree"));
        }
        if self.min_samples_split < 2 {
            return Err(AnalysisError::invalid(
                "min_samples_split",
                "a split needs at least 2 rows",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(AnalysisError::invalid("min_samples_leaf", "must be at least 1"));
        }
        if self.max_features == Some(0) {
            return Err(AnalysisError::invalid("max_features", "must be at least 1"));
        }
        Ok(())
    }
}

/// Regression tree node.
#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        value: f64,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf { value } => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// Best split found at a node.
struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    /// Rows going left, in the node's sorted order for `feature`
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Grows one tree over a bootstrap sample.
struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    n_features: usize,
    rng: StdRng,
    /// Total squared-error reduction credited to each feature
    importance: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self) -> (Node, Vec<f64>) {
        let n = self.y.len();
        let sample: Vec<usize> = (0..n).map(|_| self.rng.random_range(0..n)).collect();
        let root = self.grow(sample, 0);
        (root, self.importance)
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> Node {
        let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, q), &i| {
            let v = self.y[i];
            (s + v, q + v * v)
        });
        let count = rows.len() as f64;
        let mean = sum / count;
        let sse = sum_sq - sum * sum / count;

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let pure = sse <= f64::EPSILON * sum_sq;
        if depth_reached || rows.len() < self.params.min_samples_split || pure {
            return Node::Leaf { value: mean };
        }

        match self.best_split(&rows, sse) {
            Some(split) => {
                self.importance[split.feature] += split.gain;
                Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(self.grow(split.left, depth + 1)),
                    right: Box::new(self.grow(split.right, depth + 1)),
                }
            }
            None => Node::Leaf { value: mean },
        }
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        match self.params.max_features {
            Some(m) if m < self.n_features => {
                let mut picked =
                    rand::seq::index::sample(&mut self.rng, self.n_features, m).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn best_split(&mut self, rows: &[usize], parent_sse: f64) -> Option<Candidate> {
        let min_leaf = self.params.min_samples_leaf;
        let n = rows.len();
        if n < 2 * min_leaf {
            return None;
        }
        let total: f64 = rows.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = rows.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<Candidate> = None;
        for feature in self.candidate_features() {
            let mut order = rows.to_vec();
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            let mut best_here: Option<(usize, f64)> = None;
            for k in 0..n - 1 {
                let v = self.y[order[k]];
                left_sum += v;
                left_sq += v * v;

                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let here = self.x[order[k]][feature];
                let next = self.x[order[k + 1]][feature];
                if here >= next {
                    continue;
                }
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse_left = left_sq - left_sum * left_sum / n_left as f64;
                let sse_right = right_sq - right_sum * right_sum / n_right as f64;
                let gain = parent_sse - sse_left - sse_right;
                if gain > best_here.map_or(0.0, |(_, g)| g) {
                    best_here = Some((k, gain));
                }
            }

            if let Some((k, gain)) = best_here {
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let (here, next) = (self.x[order[k]][feature], self.x[order[k + 1]][feature]);
                    let mid = here + (next - here) / 2.0;
                    // Adjacent floats can round the midpoint up onto `next`
                    let threshold = if mid < next { mid } else { here };
                    let right = order.split_off(k + 1);
                    best = Some(Candidate {
                        feature,
                        threshold,
                        gain,
                        left: order,
                        right,
                    });
                }
            }
        }
        best
    }
}

/// Trained ensemble.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Node>,
    n_features: usize,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Train on a row-major design matrix.
    ///
    /// Rows with a non-finite value (in the features or the target) or the
    /// wrong width are rejected together in one [`AnalysisError::ModelTraining`].
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self> {
        params.validate()?;
        if x.is_empty() || x.len() != y.len() {
            return Err(AnalysisError::InsufficientData {
                operation: "forest training",
                required: 1,
                available: x.len().min(y.len()),
            });
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(AnalysisError::ModelTraining {
                rows: Vec::new(),
                reason: "no feature columns".into(),
            });
        }

        let ragged: Vec<usize> = (0..x.len()).filter(|&i| x[i].len() != n_features).collect();
        if !ragged.is_empty() {
            return Err(AnalysisError::ModelTraining {
                rows: ragged,
                reason: format!("expected {n_features} features per row"),
            });
        }
        let non_finite: Vec<usize> = (0..x.len())
            .filter(|&i| !y[i].is_finite() || x[i].iter().any(|v| !v.is_finite()))
            .collect();
        if !non_finite.is_empty() {
            return Err(AnalysisError::ModelTraining {
                rows: non_finite,
                reason: "non-finite value in training data".into(),
            });
        }

        let grow = |tree: usize| {
            TreeBuilder {
                x,
                y,
                params,
                n_features,
                rng: StdRng::seed_from_u64(tree_seed(params.seed, tree)),
                importance: vec![0.0; n_features],
            }
            .build()
        };

        #[cfg(feature = "parallel")]
        let grown: Vec<(Node, Vec<f64>)> = {
            use rayon::prelude::*;
            (0..params.n_trees).into_par_iter().map(grow).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let grown: Vec<(Node, Vec<f64>)> = (0..params.n_trees).map(grow).collect();

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, gains) in grown {
            let total: f64 = gains.iter().sum();
            if total > 0.0 {
                for (acc, g) in importances.iter_mut().zip(&gains) {
                    *acc += g / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(trees = trees.len(), rows = x.len(), features = n_features, "forest trained");
        Ok(RandomForest {
            trees,
            n_features,
            importances,
        })
    }

    /// Mean of the tree predictions.
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean decrease in impurity per feature, summing to 1 (all zero when no
    /// tree ever split).
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed.wrapping_add((tree as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
