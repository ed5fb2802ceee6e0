use crate::data::{Dataset, FeatureMatrix, LabeledSet};
use crate::error::PipelineError;
use crate::utils::random::seeded_rng;
use anyhow::{Context, Result};
use ndarray::{concatenate, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Dataset split configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
        }
    }
}

/// Turn a labelled feature matrix into a training set
pub fn to_labeled_set(matrix: FeatureMatrix) -> Result<LabeledSet> {
    let labels = matrix
        .labels
        .context("Feature matrix was loaded without labels")?;
    Ok(LabeledSet {
        genes: matrix.genes,
        features: matrix.values,
        labels,
    })
}

fn select_rows(set: &LabeledSet, rows: &[usize]) -> LabeledSet {
    LabeledSet {
        genes: rows.iter().map(|&i| set.genes[i].clone()).collect(),
        features: set.features.select(Axis(0), rows),
        labels: rows.iter().map(|&i| set.labels[i]).collect(),
    }
}

/// Number of test rows per class, proportional to class size
///
/// Floors the exact shares, then hands the leftover rows to the classes with
/// the largest remainders (larger class first on ties).
fn allocate_test_rows(class_sizes: &[usize], n_test: usize) -> Vec<usize> {
    let n: usize = class_sizes.iter().sum();
    let exact: Vec<f64> = class_sizes
        .iter()
        .map(|&size| size as f64 * n_test as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let mut order: Vec<usize> = (0..class_sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra)
            .then(class_sizes[b].cmp(&class_sizes[a]))
            .then(a.cmp(&b))
    });

    let mut leftover = n_test - alloc.iter().sum::<usize>();
    for &class in order.iter().cycle() {
        if leftover == 0 {
            break;
        }
        if alloc[class] < class_sizes[class] {
            alloc[class] += 1;
            leftover -= 1;
        }
    }
    alloc
}

/// Stratified train/test split preserving the label ratio
pub fn stratified_split(set: &LabeledSet, config: &SplitConfig) -> Result<Dataset> {
    info!(
        "Splitting {} rows with test_size={} seed={}",
        set.len(),
        config.test_size,
        config.seed
    );

    let n = set.len();
    let n_test = (config.test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::insufficient_data(format!(
            "test_size {} leaves no rows for one partition of {} rows",
            config.test_size, n
        ))
        .into());
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(), Vec::new()];
    for (i, &y) in set.labels.iter().enumerate() {
        by_class[usize::from(y == 1)].push(i);
    }
    for (class, rows) in by_class.iter().enumerate() {
        if rows.len() < 2 {
            return Err(PipelineError::insufficient_data(format!(
                "class {} has {} member(s); stratification needs at least 2",
                class,
                rows.len()
            ))
            .into());
        }
    }

    let sizes: Vec<usize> = by_class.iter().map(Vec::len).collect();
    let test_alloc = allocate_test_rows(&sizes, n_test);

    let mut rng = seeded_rng(config.seed);
    let mut train_rows = Vec::with_capacity(n - n_test);
    let mut test_rows = Vec::with_capacity(n_test);

    for (class, rows) in by_class.iter_mut().enumerate() {
        if test_alloc[class] >= rows.len() {
            return Err(PipelineError::insufficient_data(format!(
                "class {} would have no training rows",
                class
            ))
            .into());
        }
        rows.shuffle(&mut rng);
        let (test, train) = rows.split_at(test_alloc[class]);
        test_rows.extend_from_slice(test);
        train_rows.extend_from_slice(train);
    }

    train_rows.sort_unstable();
    test_rows.sort_unstable();

    let dataset = Dataset {
        train: select_rows(set, &train_rows),
        test: select_rows(set, &test_rows),
    };

    log_distribution("Train", &dataset.train);
    log_distribution("Test", &dataset.test);

    Ok(dataset)
}

/// Log class distribution of a set
pub fn log_distribution(name: &str, set: &LabeledSet) {
    let (neg, pos) = set.class_counts();
    info!("{} distribution: positive={}, negative={}", name, pos, neg);
}

/// Synthetic minority oversampling (SMOTE)
///
/// New minority rows are interpolated between a randomly chosen minority row
/// and one of its k nearest minority neighbours until both classes have the
/// same size.
#[derive(Debug, Clone)]
pub struct Smote {
    /// Neighbours considered per minority row
    pub k_neighbors: usize,
    /// Random seed
    pub seed: u64,
}

impl Smote {
    /// Create new oversampler
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self { k_neighbors, seed }
    }

    /// Return the set with synthetic minority rows appended
    pub fn fit_resample(&self, set: &LabeledSet) -> Result<LabeledSet> {
        let (neg, pos) = set.class_counts();
        info!("Oversampling: positive={}, negative={}", pos, neg);

        if pos == 0 || neg == 0 {
            return Err(PipelineError::insufficient_data(
                "cannot oversample: one class is empty",
            )
            .into());
        }
        if pos == neg {
            debug!("Classes already balanced");
            return Ok(set.clone());
        }

        let (minority_label, n_new) = if pos < neg { (1u8, neg - pos) } else { (0u8, pos - neg) };
        let minority_rows: Vec<usize> = set
            .labels
            .iter()
            .enumerate()
            .filter(|(_, &y)| y == minority_label)
            .map(|(i, _)| i)
            .collect();
        let minority = set.features.select(Axis(0), &minority_rows);
        let m = minority.nrows();
        let d = minority.ncols();

        let mut rng = seeded_rng(self.seed);
        let mut synthetic = Vec::with_capacity(n_new * d);

        if m == 1 {
            warn!("Only one minority row; duplicating it instead of interpolating");
            for _ in 0..n_new {
                synthetic.extend(minority.row(0).iter().copied());
            }
        } else {
            let k = self.k_neighbors.min(m - 1);
            let neighbours = nearest_neighbours(&minority, k);
            debug!("Synthesising {} rows from {} minority rows (k={})", n_new, m, k);

            for _ in 0..n_new {
                let i = rng.gen_range(0..m);
                let j = neighbours[i][rng.gen_range(0..k)];
                let gap: f64 = rng.gen();
                let base = minority.row(i);
                let other = minority.row(j);
                synthetic.extend(base.iter().zip(other.iter()).map(|(&a, &b)| a + gap * (b - a)));
            }
        }

        let synthetic = Array2::from_shape_vec((n_new, d), synthetic)
            .context("Synthetic rows do not form a matrix")?;
        let features = concatenate(Axis(0), &[set.features.view(), synthetic.view()])
            .context("Failed to append synthetic rows")?;

        let mut genes = set.genes.clone();
        genes.extend((0..n_new).map(|s| format!("synthetic_{}", s)));
        let mut labels = set.labels.clone();
        labels.extend(std::iter::repeat(minority_label).take(n_new));

        let resampled = LabeledSet { genes, features, labels };
        log_distribution("Resampled train", &resampled);
        Ok(resampled)
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Indices of the k nearest other rows for every row (ties by index)
fn nearest_neighbours(rows: &Array2<f64>, k: usize) -> Vec<Vec<usize>> {
    (0..rows.nrows())
        .map(|i| {
            let mut dists: Vec<(f64, usize)> = (0..rows.nrows())
                .filter(|&j| j != i)
                .map(|j| (squared_distance(rows.row(i), rows.row(j)), j))
                .collect();
            dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            dists.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}
