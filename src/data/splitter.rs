// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Two ways to carve a validation set out of the students:
//
//   split_train_val — shuffle, then the first `train_fraction`
//                     go to training (default 0.7)
//   kfold_split     — shuffle, cut into `n_folds` contiguous
//                     folds, fold `fold` is the validation set
//
// Both shuffle with a seeded RNG so a run is reproducible and
// every fold of a cross-validation sees the same permutation.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Randomly shuffle `samples` and split into (train, validation).
///
/// # Arguments
/// * `samples`        - All available samples (consumed by this function)
/// * `train_fraction` - Proportion for training, e.g. 0.7 = 70%
/// * `seed`           - Shuffle seed
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;

    // Clamp to valid range to avoid panics on tiny datasets
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

/// Shuffle `samples` and return (train, validation) for one fold
/// of an `n_folds`-way cross validation.
pub fn kfold_split<T>(mut samples: Vec<T>, n_folds: usize, fold: usize, seed: u64) -> Result<(Vec<T>, Vec<T>)> {
    ensure!(n_folds >= 2, "cross validation needs at least 2 folds, got {n_folds}");
    ensure!(fold < n_folds, "fold {fold} is out of range for {n_folds} folds");

    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    // Fold boundaries spread the remainder over the first folds.
    let total = samples.len();
    let start = fold * total / n_folds;
    let end   = (fold + 1) * total / n_folds;

    let mut train = Vec::with_capacity(total - (end - start));
    let mut val   = Vec::with_capacity(end - start);
    for (idx, sample) in samples.into_iter().enumerate() {
        if (start..end).contains(&idx) {
            val.push(sample);
        } else {
            train.push(sample);
        }
    }

    tracing::debug!(
        "Fold {}/{}: {} training, {} validation",
        fold,
        n_folds,
        train.len(),
        val.len(),
    );

    Ok((train, val))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.7, 42);
        assert_eq!(train.len(), 70);
        assert_eq!(val.len(),   30);
    }

    #[test]
    fn test_split_is_reproducible() {
        let (a, _) = split_train_val((0..50).collect::<Vec<usize>>(), 0.5, 7);
        let (b, _) = split_train_val((0..50).collect::<Vec<usize>>(), 0.5, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.8, 42);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_folds_partition_the_data() {
        let mut seen = Vec::new();
        for fold in 0..3 {
            let (train, val) = kfold_split((0..10).collect::<Vec<usize>>(), 3, fold, 11).unwrap();
            assert_eq!(train.len() + val.len(), 10);
            assert!(val.iter().all(|v| !train.contains(v)));
            seen.extend(val);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<usize>>());
    }

    #[test]
    fn test_fold_out_of_range() {
        assert!(kfold_split(vec![1, 2, 3], 3, 3, 0).is_err());
        assert!(kfold_split(vec![1, 2, 3], 1, 0, 0).is_err());
    }
}
