//! The minimal inference graph: an optional shared trunk feeding a policy
//! head, and masked softmax action selection over its logits.

use burn::prelude::*;
use burn::tensor::Distribution;
use burn::tensor::activation::softmax;

use super::config::{ModelConfig, PartialModelConfig};
use super::model::Model;
use super::model_set::ModelSet;

/// Registry name of the optional shared feature trunk.
pub const SHARED_HEAD: &str = "shared_head";
/// Registry name of the per-action scoring head.
pub const POLICY: &str = "policy";

/// Post-softmax probability floor; keeps every action's support strictly
/// positive so a following log stays finite.
pub const ACTION_MIN_PROB: f32 = 1e-11;
/// Logit bias that suppresses masked-off actions before the softmax.
pub const ACTION_DISABLED_LOGIT: f32 = -1e10;

/// Builds only what inference needs: shared head (if configured) + policy.
///
/// The shared head must not carry an output layer; its last hidden width
/// becomes the policy head's input width. The policy head always projects to
/// the action count.
pub fn make_inference_models<B: Backend>(
    obs_size: usize,
    num_actions: usize,
    shared_head_config: &PartialModelConfig,
    policy_config: &PartialModelConfig,
    device: &B::Device,
    out_models: &mut ModelSet<B>,
) {
    assert!(
        policy_config.output_layer,
        "the policy head must project to the action count"
    );

    // Policy: obs -> logits(num_actions)
    let mut full_policy = ModelConfig::from_partial(policy_config, obs_size, num_actions);

    if shared_head_config.is_valid() {
        assert!(
            !shared_head_config.output_layer,
            "the shared head produces raw features and must not have an output layer"
        );

        let full_shared = ModelConfig::from_partial(shared_head_config, obs_size, 0);
        // The trunk's last hidden width feeds the policy head
        full_policy.num_inputs = *full_shared.layer_sizes.last().unwrap();

        out_models.add(Model::new(SHARED_HEAD, full_shared, device.clone()));
    }

    out_models.add(Model::new(POLICY, full_policy, device.clone()));
}

/// Masked, temperature-scaled action distribution.
///
/// Probabilities are floored at [`ACTION_MIN_PROB`] after the softmax, so a
/// row's sum may exceed 1 by a sliver; downstream consumers tolerate the
/// approximation.
fn infer_policy_probs<B: Backend>(
    models: &mut ModelSet<B>,
    obs: Tensor<B, 2>,
    action_masks: Tensor<B, 2, Bool>,
    temperature: f32,
    reduced_precision: bool,
) -> Tensor<B, 2> {
    // Guard against bad temperature
    let temperature = if temperature > 0.0 { temperature } else { 1.0 };

    let mut obs = obs;
    if let Some(shared_head) = models.get_mut(SHARED_HEAD) {
        obs = shared_head.forward(obs, reduced_precision);
    }

    let policy = models.get_mut(POLICY).expect("no policy model registered");
    let num_actions = policy.config.num_outputs;
    let logits = policy.forward(obs, reduced_precision) / temperature;

    let disabled = action_masks.bool_not().float() * ACTION_DISABLED_LOGIT;
    let probs = softmax(logits + disabled, 1);

    // Keep the shape stable and avoid exact zeros
    probs
        .reshape([-1, num_actions as i32])
        .clamp(ACTION_MIN_PROB, 1.0)
}

/// Runs the policy over a batch and selects one action per row.
///
/// Deterministic selection takes the arg-max and produces no
/// log-probabilities. Stochastic selection draws one multinomial sample per
/// row from the masked distribution and returns the log-probability of each
/// drawn action.
pub fn infer_actions<B: Backend>(
    models: &mut ModelSet<B>,
    obs: Tensor<B, 2>,
    action_masks: Tensor<B, 2, Bool>,
    deterministic: bool,
    temperature: f32,
    reduced_precision: bool,
) -> (Tensor<B, 1, Int>, Option<Tensor<B, 1>>) {
    let probs = infer_policy_probs(models, obs, action_masks, temperature, reduced_precision);

    if deterministic {
        let action: Tensor<B, 2, Int> = probs.argmax(1);
        (action.squeeze(1), None)
    } else {
        // One multinomial draw per row via the Gumbel-max trick
        let uniform = Tensor::<B, 2>::random(
            probs.shape(),
            Distribution::Uniform(0.0, 1.0),
            &probs.device(),
        );
        let gumbel = -(-uniform.log()).log();
        let action: Tensor<B, 2, Int> = (probs.clone().log() + gumbel).argmax(1);

        let log_prob = probs.log().gather(1, action.clone()).squeeze(1);

        (action.squeeze(1), Some(log_prob))
    }
}
