// ============================================================
// Layer 5 — Optimizers and the Parameter Updater
// ============================================================
// Two optimizers, picked by name:
//
//   adam  — Adam with optional L2 weight decay
//   adamw — Adam with decoupled weight decay
//
// Gradients are clipped by their GLOBAL L2 norm before the
// step: one norm over every parameter, and every gradient
// scaled by the same factor min(1, clip_grad / norm). burn's
// own `GradientClippingConfig::Norm` works per tensor, so the
// optimizers are built without it.
//
// Burn is functional about updates: the optimizer consumes the
// model and the gradients and hands back the updated model.
// Gradients are not kept anywhere afterwards, which is what
// `zero_grad` achieves in an imperative framework.

use std::{marker::PhantomData, str::FromStr};

use anyhow::{anyhow, Result};
use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::{decay::WeightDecayConfig, AdamConfig, AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Adam,
    AdamW,
}

impl OptimizerKind {
    pub const NAMES: [&'static str; 2] = ["adam", "adamw"];
}

impl FromStr for OptimizerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "adamw" => Ok(Self::AdamW),
            _ => Err(anyhow!(
                "Optimizer {s} not defined: choose one of: {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}

pub fn adam_config(weight_decay: f64) -> AdamConfig {
    let decay = (weight_decay > 0.0).then(|| WeightDecayConfig::new(weight_decay as f32));
    AdamConfig::new().with_epsilon(1e-8).with_weight_decay(decay)
}

pub fn adamw_config(weight_decay: f64) -> AdamWConfig {
    AdamWConfig::new()
        .with_epsilon(1e-8)
        .with_weight_decay(weight_decay as f32)
}

/// Sums the squared gradient of every float parameter.
struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.total += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

/// Multiplies every float parameter's gradient by `factor`.
struct ScaleGrads<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    factor: f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for ScaleGrads<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.factor));
        }
    }
}

/// L2 norm over the gradients of all of `model`'s parameters.
pub fn global_grad_norm<B, M>(model: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> { grads, total: 0.0, _backend: PhantomData };
    model.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Rescale all gradients together so their global norm is at
/// most `max_norm`. Returns the norm measured before clipping.
pub fn clip_grad_norm<B, M>(model: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(model, grads);
    if norm > max_norm {
        let factor = max_norm / (norm + 1e-6);
        let mut visitor = ScaleGrads::<B> { grads, factor, _backend: PhantomData };
        model.visit(&mut visitor);
    }
    norm
}

/// Backward pass, global-norm clipping, one optimizer step.
/// Call exactly once per training batch, after the loss has
/// been computed.
pub fn update_params<B, M, O>(
    loss: Tensor<B, 1>,
    model: M,
    optim: &mut O,
    lr: f64,
    clip_grad: f64,
) -> M
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let grads = loss.backward();
    let mut grads = GradientsParams::from_grads(grads, &model);
    clip_grad_norm::<B, M>(&model, &mut grads, clip_grad);
    optim.step(lr, model, grads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
    };

    type TestBackend = Autodiff<NdArray>;
    type InnerBackend = NdArray;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("adamW".parse::<OptimizerKind>().unwrap(), OptimizerKind::AdamW);
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        let err = "sgd".parse::<OptimizerKind>().unwrap_err().to_string();
        assert!(err.contains("adam, adamw"));
    }

    #[test]
    fn test_update_moves_parameters() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);
        let mut optim = adam_config(0.0).init::<TestBackend, Linear<TestBackend>>();

        let before = model.weight.val().into_data().convert::<f32>().to_vec::<f32>().unwrap();

        let x = Tensor::<TestBackend, 2>::from_data(TensorData::new(vec![1.0f32, 2.0], [1, 2]), &device);
        let loss = model.forward(x).sum();
        let model = update_params(loss, model, &mut optim, 0.1, 10.0);

        let after = model.weight.val().into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_ne!(before, after);
    }

    fn grads_of(model: &Linear<TestBackend>, x: Vec<f32>) -> GradientsParams {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_data(TensorData::new(x, [1, 2]), &device);
        let loss = model.forward(x).sum();
        GradientsParams::from_grads(loss.backward(), model)
    }

    #[test]
    fn test_clipping_uses_the_norm_over_all_parameters() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);

        // weight grad = x = [3, 0], bias grad = 1: global norm sqrt(10)
        let mut grads = grads_of(&model, vec![3.0, 0.0]);
        let norm = global_grad_norm::<TestBackend, _>(&model, &grads);
        assert!((norm - 10f64.sqrt()).abs() < 1e-5, "{norm}");

        // each tensor alone is under 3.1, together they are not
        let before = clip_grad_norm::<TestBackend, _>(&model, &mut grads, 3.1);
        assert!((before - 10f64.sqrt()).abs() < 1e-5);

        let after = global_grad_norm::<TestBackend, _>(&model, &grads);
        assert!((after - 3.1).abs() < 1e-4, "{after}");

        // same factor for both tensors
        let factor = 3.1 / 10f64.sqrt();
        let weight: Tensor<InnerBackend, 2> = grads.get(model.weight.id).unwrap();
        let weight = weight.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!((weight[0] as f64 - 3.0 * factor).abs() < 1e-4);
        let bias_id = model.bias.as_ref().unwrap().id;
        let bias: Tensor<InnerBackend, 1> = grads.get(bias_id).unwrap();
        let bias = bias.into_scalar().elem::<f64>();
        assert!((bias - factor).abs() < 1e-4);
    }

    #[test]
    fn test_small_gradients_are_left_alone() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);

        let mut grads = grads_of(&model, vec![0.3, 0.4]);
        let expected = global_grad_norm::<TestBackend, _>(&model, &grads);
        clip_grad_norm::<TestBackend, _>(&model, &mut grads, 10.0);
        let after = global_grad_norm::<TestBackend, _>(&model, &grads);
        assert!((after - expected).abs() < 1e-9);
    }
}
