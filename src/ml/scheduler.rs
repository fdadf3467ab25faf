// ============================================================
// Layer 5 — Learning Rate Scheduler
// ============================================================
// Stepped once per epoch by the run controller. Every "step"
// below is an epoch: linear_warmup's warmup and total lengths
// are counted in epochs, not in batches.
//
//   plateau        — watch validation AUC (higher is better);
//                    after `patience` epochs without a relative
//                    improvement of 1e-4, multiply lr by `factor`
//   linear_warmup  — ramp up over the first 10% of epochs, then
//                    decay linearly to zero at the last epoch
//   constant       — never changes
//
// Only the plateau policy needs the metric; the controller asks
// `is_plateau()` to decide which step method to call.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const PLATEAU_FACTOR: f64 = 0.5;
const PLATEAU_PATIENCE: usize = 10;
const PLATEAU_THRESHOLD: f64 = 1e-4;
const WARMUP_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerKind {
    Plateau,
    LinearWarmup,
    Constant,
}

impl SchedulerKind {
    pub const NAMES: [&'static str; 3] = ["plateau", "linear_warmup", "constant"];
}

impl FromStr for SchedulerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plateau" => Ok(Self::Plateau),
            "linear_warmup" => Ok(Self::LinearWarmup),
            "constant" => Ok(Self::Constant),
            other => Err(anyhow!(
                "Scheduler {other} not defined: choose one of: {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone)]
enum Policy {
    Plateau { best: f64, bad_epochs: usize },
    LinearWarmup { step: usize, warmup: usize, total: usize },
    Constant,
}

#[derive(Debug, Clone)]
pub struct LrScheduler {
    base_lr: f64,
    lr: f64,
    policy: Policy,
}

impl LrScheduler {
    /// `total_steps` is how many times `step` will be called over
    /// the run (the epoch count); only linear warmup uses it.
    pub fn new(kind: SchedulerKind, base_lr: f64, total_steps: usize) -> Self {
        let policy = match kind {
            SchedulerKind::Plateau => Policy::Plateau {
                best: f64::NEG_INFINITY,
                bad_epochs: 0,
            },
            SchedulerKind::LinearWarmup => Policy::LinearWarmup {
                step: 0,
                warmup: (total_steps as f64 * WARMUP_FRACTION) as usize,
                total: total_steps.max(1),
            },
            SchedulerKind::Constant => Policy::Constant,
        };
        let mut scheduler = Self { base_lr, lr: base_lr, policy };
        scheduler.refresh();
        scheduler
    }

    /// Learning rate for the next optimizer steps.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn is_plateau(&self) -> bool {
        matches!(self.policy, Policy::Plateau { .. })
    }

    /// Advance one epoch. A no-op for the plateau policy, which
    /// only moves on a metric.
    pub fn step(&mut self) {
        if let Policy::LinearWarmup { step, .. } = &mut self.policy {
            *step += 1;
        }
        self.refresh();
    }

    /// Advance one epoch with the validation metric.
    pub fn step_with_metric(&mut self, metric: f64) {
        match &mut self.policy {
            Policy::Plateau { best, bad_epochs } => {
                if metric > *best * (1.0 + PLATEAU_THRESHOLD) {
                    *best = metric;
                    *bad_epochs = 0;
                } else {
                    *bad_epochs += 1;
                }

                if *bad_epochs > PLATEAU_PATIENCE {
                    *bad_epochs = 0;
                    self.lr *= PLATEAU_FACTOR;
                    tracing::info!("Reducing learning rate to {:.3e}", self.lr);
                }
            }
            _ => self.step(),
        }
    }

    fn refresh(&mut self) {
        if let Policy::LinearWarmup { step, warmup, total } = self.policy {
            // (step + 1) so the first epoch does not train at lr = 0
            let factor = if step < warmup {
                (step + 1) as f64 / (warmup + 1) as f64
            } else {
                (total.saturating_sub(step)) as f64 / (total - warmup).max(1) as f64
            };
            self.lr = self.base_lr * factor.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("plateau".parse::<SchedulerKind>().unwrap(), SchedulerKind::Plateau);
        assert_eq!("linear_warmup".parse::<SchedulerKind>().unwrap(), SchedulerKind::LinearWarmup);
        let err = "cosine".parse::<SchedulerKind>().unwrap_err().to_string();
        assert!(err.contains("plateau, linear_warmup, constant"));
    }

    #[test]
    fn test_constant_never_moves() {
        let mut s = LrScheduler::new(SchedulerKind::Constant, 1e-3, 10);
        s.step();
        s.step_with_metric(0.9);
        assert_eq!(s.lr(), 1e-3);
        assert!(!s.is_plateau());
    }

    #[test]
    fn test_plateau_halves_after_patience() {
        let mut s = LrScheduler::new(SchedulerKind::Plateau, 1.0, 100);
        s.step_with_metric(0.7);
        for _ in 0..PLATEAU_PATIENCE {
            s.step_with_metric(0.7);
            assert_eq!(s.lr(), 1.0);
        }
        s.step_with_metric(0.69);
        assert_eq!(s.lr(), 0.5);
    }

    #[test]
    fn test_plateau_improvement_resets() {
        let mut s = LrScheduler::new(SchedulerKind::Plateau, 1.0, 100);
        s.step_with_metric(0.5);
        for i in 0..30 {
            s.step_with_metric(0.6 + i as f64 * 0.01);
        }
        assert_eq!(s.lr(), 1.0);
    }

    #[test]
    fn test_plateau_ignores_plain_step() {
        let mut s = LrScheduler::new(SchedulerKind::Plateau, 1.0, 100);
        for _ in 0..50 {
            s.step();
        }
        assert_eq!(s.lr(), 1.0);
    }

    #[test]
    fn test_linear_warmup_shape() {
        let mut s = LrScheduler::new(SchedulerKind::LinearWarmup, 1.0, 20);
        // warmup = 2 steps
        assert!((s.lr() - 1.0 / 3.0).abs() < 1e-12);
        s.step();
        assert!((s.lr() - 2.0 / 3.0).abs() < 1e-12);
        s.step();
        assert_eq!(s.lr(), 1.0);

        let mut last = s.lr();
        for _ in 0..18 {
            s.step();
            assert!(s.lr() <= last);
            last = s.lr();
        }
        assert_eq!(s.lr(), 0.0);
    }
}
