//! Batched inference front-end: validates observations, batches every agent
//! into one forward pass, and decodes the chosen indices back into actions.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::actions::{Action, ActionParser};
use crate::obs::ObsBuilder;
use crate::state::{GameState, Player};

use super::config::PartialModelConfig;
use super::model_set::ModelSet;
use super::pipeline;

/// Owns the inference models plus the observation-building and
/// action-decoding collaborators.
pub struct InferUnit<B: Backend> {
    obs_size: usize,
    obs_builder: Box<dyn ObsBuilder>,
    action_parser: Box<dyn ActionParser>,
    models: ModelSet<B>,
    device: B::Device,
}

impl<B: Backend> InferUnit<B> {
    /// Builds the inference graph and loads all weights from `models_folder`.
    /// Any configuration or checkpoint mismatch is fatal.
    pub fn new(
        obs_builder: Box<dyn ObsBuilder>,
        obs_size: usize,
        action_parser: Box<dyn ActionParser>,
        shared_head_config: &PartialModelConfig,
        policy_config: &PartialModelConfig,
        models_folder: &Path,
        device: B::Device,
    ) -> Self {
        let mut unit = Self::with_fresh_models(
            obs_builder,
            obs_size,
            action_parser,
            shared_head_config,
            policy_config,
            device,
        );
        unit.models.load_all(models_folder, false);
        unit
    }

    /// Builds the inference graph with freshly initialized weights, e.g. to
    /// write out an initial checkpoint folder.
    pub fn with_fresh_models(
        obs_builder: Box<dyn ObsBuilder>,
        obs_size: usize,
        action_parser: Box<dyn ActionParser>,
        shared_head_config: &PartialModelConfig,
        policy_config: &PartialModelConfig,
        device: B::Device,
    ) -> Self {
        let mut models = ModelSet::new();
        pipeline::make_inference_models(
            obs_size,
            action_parser.action_count(),
            shared_head_config,
            policy_config,
            &device,
            &mut models,
        );

        Self {
            obs_size,
            obs_builder,
            action_parser,
            models,
            device,
        }
    }

    pub fn obs_size(&self) -> usize {
        self.obs_size
    }

    pub fn action_count(&self) -> usize {
        self.action_parser.action_count()
    }

    pub fn models(&self) -> &ModelSet<B> {
        &self.models
    }

    pub fn save_models(&self, folder: &Path) {
        self.models.save_all(folder);
    }

    /// Single-agent convenience wrapper around [`Self::batch_infer_actions`].
    pub fn infer_action(
        &mut self,
        player: &Player,
        state: &GameState,
        deterministic: bool,
        temperature: f32,
        reduced_precision: bool,
    ) -> Action {
        self.batch_infer_actions(
            std::slice::from_ref(player),
            std::slice::from_ref(state),
            deterministic,
            temperature,
            reduced_precision,
        )
        .remove(0)
    }

    /// Runs one batched forward pass over all agents and decodes one action
    /// per agent. Precondition violations and observation-size mismatches are
    /// fatal; a live control loop has no meaningful retry for either.
    pub fn batch_infer_actions(
        &mut self,
        players: &[Player],
        states: &[GameState],
        deterministic: bool,
        temperature: f32,
        reduced_precision: bool,
    ) -> Vec<Action> {
        assert!(
            !players.is_empty() && !states.is_empty(),
            "batch inference needs at least one agent"
        );
        assert!(
            players.len() == states.len(),
            "got {} players but {} states",
            players.len(),
            states.len()
        );

        let batch_size = players.len();
        let num_actions = self.action_parser.action_count();

        let mut all_obs: Vec<f32> = Vec::with_capacity(batch_size * self.obs_size);
        let mut all_masks: Vec<bool> = Vec::with_capacity(batch_size * num_actions);

        for (player, state) in players.iter().zip(states) {
            let obs = self.obs_builder.build_obs(player, state);
            if obs.len() != self.obs_size {
                panic!(
                    "obs builder produced an obs that differs from the configured size \
                     (expected {}, got {}); make sure the correct obs size was given to \
                     InferUnit::new, and that the number of players is right \
                     (this state has {})",
                    self.obs_size,
                    obs.len(),
                    state.players.len()
                );
            }
            all_obs.extend(obs);

            let mask = self.action_parser.action_mask(player, state);
            assert!(
                mask.len() == num_actions,
                "action mask length {} differs from the action count {}",
                mask.len(),
                num_actions
            );
            all_masks.extend(mask);
        }

        let obs_tensor = Tensor::<B, 1>::from_floats(all_obs.as_slice(), &self.device)
            .reshape([batch_size, self.obs_size]);
        let mask_tensor = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(all_masks, [batch_size, num_actions]),
            &self.device,
        );

        let (actions, _log_probs) = pipeline::infer_actions(
            &mut self.models,
            obs_tensor,
            mask_tensor,
            deterministic,
            temperature,
            reduced_precision,
        );

        let indices: Vec<i64> = actions.into_data().convert::<i64>().to_vec().unwrap();

        indices
            .iter()
            .zip(players.iter().zip(states))
            .map(|(&idx, (player, state))| self.action_parser.decode(idx as usize, player, state))
            .collect()
    }
}
