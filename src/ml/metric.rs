// ============================================================
// Layer 5 — Metric Evaluator
// ============================================================
// AUC and accuracy over host-side prediction arrays.
//
// AUC is computed from ranks (Mann-Whitney U): the probability
// that a random positive scores higher than a random negative,
// ties counting half. Accuracy thresholds predictions at 0.5.

use anyhow::{bail, ensure, Result};

/// (auc, acc) for binary targets and probability predictions.
pub fn get_metric(targets: &[f32], preds: &[f32]) -> Result<(f64, f64)> {
    let auc = roc_auc(targets, preds)?;
    let acc = accuracy(targets, preds)?;
    Ok((auc, acc))
}

pub fn roc_auc(targets: &[f32], preds: &[f32]) -> Result<f64> {
    check_lengths(targets, preds)?;

    let n_pos = targets.iter().filter(|&&t| is_positive(t)).count();
    let n_neg = targets.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        bail!("AUC is undefined when only one class is present ({n_pos} positive, {n_neg} negative)");
    }

    let mut order: Vec<usize> = (0..preds.len()).collect();
    order.sort_by(|&a, &b| preds[a].total_cmp(&preds[b]));

    // Sum of 1-based ranks of the positives, tied groups share
    // their average rank.
    let mut pos_rank_sum = 0.0f64;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && preds[order[end]] == preds[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end]
            .iter()
            .filter(|&&i| is_positive(targets[i]))
            .count();
        pos_rank_sum += avg_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

pub fn accuracy(targets: &[f32], preds: &[f32]) -> Result<f64> {
    check_lengths(targets, preds)?;
    let hits = targets
        .iter()
        .zip(preds)
        .filter(|(&t, &p)| is_positive(t) == (p >= 0.5))
        .count();
    Ok(hits as f64 / targets.len() as f64)
}

fn is_positive(target: f32) -> bool {
    target >= 0.5
}

fn check_lengths(targets: &[f32], preds: &[f32]) -> Result<()> {
    ensure!(
        targets.len() == preds.len(),
        "{} targets but {} predictions",
        targets.len(),
        preds.len()
    );
    ensure!(!targets.is_empty(), "no predictions to evaluate");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_ranking() {
        let auc = roc_auc(&[0.0, 0.0, 1.0, 1.0], &[0.1, 0.3, 0.6, 0.9]).unwrap();
        assert_eq!(auc, 1.0);
    }

    #[test]
    fn test_reversed_ranking() {
        let auc = roc_auc(&[1.0, 1.0, 0.0, 0.0], &[0.1, 0.3, 0.6, 0.9]).unwrap();
        assert_eq!(auc, 0.0);
    }

    #[test]
    fn test_ties_count_half() {
        let auc = roc_auc(&[0.0, 1.0], &[0.5, 0.5]).unwrap();
        assert_eq!(auc, 0.5);
    }

    #[test]
    fn test_mixed_ranking() {
        // Pairs (pos, neg): (0.35 vs 0.1) win, (0.35 vs 0.4) lose,
        // (0.8 vs 0.1) win, (0.8 vs 0.4) win -> 3/4
        let auc = roc_auc(&[0.0, 1.0, 0.0, 1.0], &[0.1, 0.35, 0.4, 0.8]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_order_invariant() {
        let t = [1.0, 0.0, 1.0, 0.0, 1.0];
        let p = [0.7, 0.2, 0.4, 0.5, 0.9];
        let (auc, acc) = get_metric(&t, &p).unwrap();

        let t_rev: Vec<f32> = t.iter().rev().copied().collect();
        let p_rev: Vec<f32> = p.iter().rev().copied().collect();
        let (auc_rev, acc_rev) = get_metric(&t_rev, &p_rev).unwrap();
        assert_eq!(auc, auc_rev);
        assert_eq!(acc, acc_rev);
    }

    #[test]
    fn test_single_class_is_an_error() {
        assert!(roc_auc(&[1.0, 1.0], &[0.2, 0.9]).is_err());
    }

    #[test]
    fn test_accuracy_threshold() {
        let acc = accuracy(&[1.0, 0.0, 1.0, 0.0], &[0.5, 0.49, 0.2, 0.7]).unwrap();
        assert_eq!(acc, 0.5);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(get_metric(&[1.0, 0.0], &[0.5]).is_err());
        assert!(get_metric(&[], &[]).is_err());
    }
}
