//! Seeded train/test split.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use signal_core::{Error, Result, Signal};

/// Row indices for each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Training rows, ascending.
    pub train: Vec<usize>,
    /// Held-out rows, ascending.
    pub test: Vec<usize>,
}

/// Split `labels.len()` rows into train and test sets.
///
/// With `stratify`, each class contributes `round(count * test_fraction)`
/// rows to the test set. The same seed always yields the same split.
pub fn train_test_split(
    labels: &[Signal],
    test_fraction: f64,
    seed: u64,
    stratify: bool,
) -> Result<Split> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(Error::config("test_fraction must be in [0, 1)"));
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let groups: Vec<Vec<usize>> = if stratify {
        Signal::ALL
            .iter()
            .map(|s| {
                labels
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| *l == s)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect()
    } else {
        vec![(0..labels.len()).collect()]
    };

    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for mut group in groups {
        group.shuffle(&mut rng);
        let n_test = (group.len() as f64 * test_fraction).round() as usize;
        // keep at least one training row per group
        let n_test = n_test.min(group.len().saturating_sub(1));
        test.extend_from_slice(&group[..n_test]);
        train.extend_from_slice(&group[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    if train.is_empty() {
        return Err(Error::model("split left no training rows"));
    }
    Ok(Split { train, test })
}
