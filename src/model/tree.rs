use crate::model::ModelConfig;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Tree node; children are indices into the owning tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Growth parameters for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub learning_rate: f64,
}

impl From<&ModelConfig> for TreeParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            lambda: config.lambda,
            gamma: config.gamma,
            min_child_weight: config.min_child_weight,
            learning_rate: config.learning_rate,
        }
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree fitted to gradient statistics
///
/// Splits are chosen greedily by exact enumeration over sorted feature values,
/// scoring each with the second-order gain
/// `½·(G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)) − γ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit a tree on `rows` of `x` with per-row gradients and hessians
    pub fn fit(
        x: ArrayView2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, grad, hess, rows.to_vec(), 0, params);
        tree
    }

    fn grow(
        &mut self,
        x: ArrayView2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let id = self.nodes.len();
        let g: f64 = rows.iter().map(|&r| grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| hess[r]).sum();
        let leaf_value = -g / (h + params.lambda) * params.learning_rate;
        self.nodes.push(Node::Leaf { value: leaf_value });

        if depth >= params.max_depth || rows.len() < 2 {
            return id;
        }

        let Some(best) = best_split(x, grad, hess, &rows, g, h, params) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| x[[r, best.feature]] <= best.threshold);

        let left = self.grow(x, grad, hess, left_rows, depth + 1, params);
        let right = self.grow(x, grad, hess, right_rows, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Leaf value reached by a row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Depth of the deepest leaf (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Largest feature index referenced by a split
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn best_split(
    x: ArrayView2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    g_total: f64,
    h_total: f64,
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let parent = score(g_total, h_total, params.lambda);
    let mut best: Option<SplitCandidate> = None;
    let mut sorted = rows.to_vec();

    for feature in 0..x.ncols() {
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]).then(a.cmp(&b)));

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for pos in 0..sorted.len() - 1 {
            let r = sorted[pos];
            g_left += grad[r];
            h_left += hess[r];

            let value = x[[r, feature]];
            let next = x[[sorted[pos + 1], feature]];
            if value == next {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < params.min_child_weight || h_right < params.min_child_weight {
                continue;
            }

            let gain = 0.5
                * (score(g_left, h_left, params.lambda) + score(g_right, h_right, params.lambda) - parent)
                - params.gamma;
            if gain <= 1e-12 || best.as_ref().is_some_and(|b| gain <= b.gain) {
                continue;
            }

            let mut threshold = value + (next - value) / 2.0;
            if !(value <= threshold && threshold < next) {
                threshold = value;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                gain,
            });
        }
    }

    best
}
