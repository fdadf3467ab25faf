// ============================================================
// Layer 5 — Run Controller
// ============================================================
// Drives the epoch loop and decides what happens after each
// validation pass:
//
//            ┌──────────────────────────────────────────────┐
//            ▼                                              │
//   Training ──► Validating ──► improved? ──yes──► Checkpointing ─┤
//                                  │                        │
//                                  no                       │
//                                  ▼                        │
//                          stalls >= patience? ──no─────────┘
//                                  │
//                                 yes
//                                  ▼
//                             EarlyStopped
//
// Running out of epochs ends in Completed. Either way the best
// score is written to best_dict.json on the way out.
//
// The scheduler is stepped after the decision, so an epoch
// that triggers early stopping never moves the learning rate.

use std::fmt;

use anyhow::Result;
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::RawBatch;
use crate::domain::metrics::{BestScore, EpochDecision, EpochMetrics, TrainingState};
use crate::domain::traits::ExperimentTracker;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::SequenceModel;
use crate::ml::scheduler::LrScheduler;
use crate::ml::trainer::{train, validate, LoopSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Training,
    Validating,
    Checkpointing,
    EarlyStopped,
    Completed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Training => "training",
            Self::Validating => "validating",
            Self::Checkpointing => "checkpointing",
            Self::EarlyStopped => "early-stopped",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub n_epochs: usize,
    pub patience: usize,
    pub fold: Option<usize>,
    pub loop_settings: LoopSettings,
}

/// What a finished run looked like.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub best: BestScore,
    pub epochs_run: usize,
    pub phase: RunPhase,
    pub history: Vec<EpochMetrics>,
    /// Learning rate the scheduler held when the run ended
    pub final_lr: f64,
}

pub struct RunController<'a, B: AutodiffBackend, O> {
    settings: ControllerSettings,
    device: B::Device,
    inner_device: <B::InnerBackend as Backend>::Device,
    optim: O,
    scheduler: LrScheduler,
    tracker: &'a mut dyn ExperimentTracker,
    checkpoints: &'a CheckpointManager,
    phase: RunPhase,
}

impl<'a, B: AutodiffBackend, O> RunController<'a, B, O> {
    pub fn new(
        settings: ControllerSettings,
        device: B::Device,
        inner_device: <B::InnerBackend as Backend>::Device,
        optim: O,
        scheduler: LrScheduler,
        tracker: &'a mut dyn ExperimentTracker,
        checkpoints: &'a CheckpointManager,
    ) -> Self {
        Self {
            settings,
            device,
            inner_device,
            optim,
            scheduler,
            tracker,
            checkpoints,
            phase: RunPhase::Training,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        if self.phase != phase {
            tracing::debug!("Run phase: {} → {}", self.phase, phase);
        }
        self.phase = phase;
    }

    /// Run up to `n_epochs` epochs. Returns the model as it was
    /// after the last epoch run (the best one is on disk).
    pub fn fit<M>(
        mut self,
        mut model: M,
        train_loader: &dyn DataLoader<RawBatch<B>>,
        valid_loader: &dyn DataLoader<RawBatch<B::InnerBackend>>,
    ) -> Result<(M, RunReport)>
    where
        M: SequenceModel<B> + AutodiffModule<B>,
        M::InnerModule: SequenceModel<B::InnerBackend>,
        O: Optimizer<M, B>,
    {
        let settings = self.settings;
        let mut state = TrainingState::new(settings.patience);
        let mut history = Vec::with_capacity(settings.n_epochs);

        for epoch in 0..settings.n_epochs {
            tracing::info!("Start Training: Epoch {}", epoch + 1);

            self.enter(RunPhase::Training);
            let lr = self.scheduler.lr();
            let (trained, train_out) = train(
                train_loader,
                model,
                &mut self.optim,
                lr,
                settings.loop_settings,
                &self.device,
            )?;
            model = trained;

            self.enter(RunPhase::Validating);
            let valid_out = validate(
                valid_loader,
                &model.valid(),
                settings.loop_settings,
                &self.inner_device,
            )?;

            let metrics = EpochMetrics {
                epoch,
                train_loss: train_out.loss,
                train_auc: train_out.auc,
                train_acc: train_out.acc,
                valid_auc: valid_out.auc,
                valid_acc: valid_out.acc,
            };
            self.tracker.log_epoch(&metrics, settings.fold)?;
            history.push(metrics);

            println!(
                "Epoch {:>3}/{} | lr={:.2e} | train_loss={:.4} | train_auc={:.4} | valid_auc={:.4} | valid_acc={:.4}",
                epoch + 1,
                settings.n_epochs,
                lr,
                train_out.loss,
                train_out.auc,
                valid_out.auc,
                valid_out.acc,
            );

            match state.observe(epoch, valid_out.auc, valid_out.acc) {
                EpochDecision::Improved => {
                    self.enter(RunPhase::Checkpointing);
                    self.checkpoints.save_checkpoint::<B, M>(&model, epoch + 1)?;
                    tracing::info!("Saving model: new best valid AUC {:.4}", valid_out.auc);
                }
                EpochDecision::Stalled => {}
                EpochDecision::EarlyStop => {
                    tracing::warn!(
                        "EarlyStopping counter: {} out of {}",
                        state.stall_count(),
                        state.patience()
                    );
                    self.enter(RunPhase::EarlyStopped);
                    break;
                }
            }

            if self.scheduler.is_plateau() {
                self.scheduler.step_with_metric(valid_out.auc);
            } else {
                self.scheduler.step();
            }
        }

        if self.phase != RunPhase::EarlyStopped {
            self.enter(RunPhase::Completed);
        }

        let best = state.best();
        self.checkpoints.save_best(&best)?;
        tracing::info!(
            "Run {}: best valid AUC {:.4} at epoch {:?}",
            self.phase,
            best.auc,
            best.best_epoch
        );

        let report = RunReport {
            best,
            epochs_run: history.len(),
            phase: self.phase,
            history,
            final_lr: self.scheduler.lr(),
        };
        Ok((model, report))
    }
}
