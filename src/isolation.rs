//! Seeded isolation forest.
//!
//! Points that random axis-aligned cuts separate quickly are outliers. Each
//! tree is grown on a subsample of `sample_size` points up to depth
//! `ceil(log2(sample_size))`; the anomaly score of a point is
//! `2^(-E[h(x)] / c(sample_size))` where `h` is the path length and `c` the
//! average path length of an unsuccessful binary-search-tree lookup.
//!
//! Unlike the textbook version, a node only cuts along features whose values
//! actually vary inside it. A feature that is constant within a node would
//! otherwise end the path early and dilute the score of genuine outliers.

use crate::{AnalysisError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Euler–Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq)]
pub struct IsolationParams {
    pub n_trees: usize,
    pub sample_size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
enum INode {
    Internal {
        feature: usize,
        split: f64,
        left: Box<INode>,
        right: Box<INode>,
    },
    External {
        size: usize,
    },
}

impl INode {
    fn path_length(&self, point: &[f64], depth: usize) -> f64 {
        match self {
            INode::External { size } => depth as f64 + c_factor(*size),
            INode::Internal {
                feature,
                split,
                left,
                right,
            } => {
                if point[*feature] < *split {
                    left.path_length(point, depth + 1)
                } else {
                    right.path_length(point, depth + 1)
                }
            }
        }
    }
}

fn build_node(
    data: &[Vec<f64>],
    rows: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> INode {
    if rows.len() <= 1 || depth >= max_depth {
        return INode::External { size: rows.len() };
    }

    let n_features = data[rows[0]].len();
    let ranges: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                (lo.min(data[r][f]), hi.max(data[r][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();
    if ranges.is_empty() {
        return INode::External { size: rows.len() };
    }

    let (feature, lo, hi) = ranges[rng.random_range(0..ranges.len())];
    let split = rng.random_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| data[r][feature] < split);

    INode::Internal {
        feature,
        split,
        left: Box::new(build_node(data, left, depth + 1, max_depth, rng)),
        right: Box::new(build_node(data, right, depth + 1, max_depth, rng)),
    }
}

/// Average path length correction for a node holding `n` points.
pub fn c_factor(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Trained isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<INode>,
    sample_size: usize,
}

impl IsolationForest {
    /// Grow `n_trees` trees over subsamples of `data` (row-major, equal widths).
    pub fn fit(data: &[Vec<f64>], params: &IsolationParams) -> Result<Self> {
        if params.n_trees == 0 {
            return Err(AnalysisError::invalid("n_trees", "the forest needs at least one tree"));
        }
        if params.sample_size < 2 {
            return Err(AnalysisError::invalid("sample_size", "subsamples need at least 2 points"));
        }
        if data.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                operation: "isolation forest",
                required: 2,
                available: data.len(),
            });
        }

        let sample_size = params.sample_size.min(data.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let rows = rand::seq::index::sample(&mut rng, data.len(), sample_size).into_vec();
                build_node(data, rows, 0, max_depth, &mut rng)
            })
            .collect();

        Ok(IsolationForest { trees, sample_size })
    }

    /// Anomaly score in (0, 1]; higher is more anomalous, about 0.5 for typical points.
    pub fn score(&self, point: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(point, 0)).sum();
        let mean_path = total / self.trees.len() as f64;
        let c = c_factor(self.sample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    pub fn score_all(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter().map(|p| self.score(p)).collect()
    }
}

/// Indices of the `count` highest scores, ties broken towards the lower index.
pub fn top_scores(scores: &[f64], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(count);
    order.sort_unstable();
    order
}
