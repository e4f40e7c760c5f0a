//! Bot session: drives the per-agent schedulers and batched inference for
//! every world update.

pub mod scheduler;

pub use scheduler::{AgentScheduler, RESET_TICK_THRESHOLD, SchedulerBank};

use std::collections::BTreeSet;

use burn::prelude::*;

use crate::actions::ControllerOutput;
use crate::infer::InferUnit;
use crate::state::GameState;

/// Run parameters for one bot session; static configuration, never mutated by
/// the core.
#[derive(Debug, Clone, Copy)]
pub struct BotParams {
    /// Ticks between successive fresh inferences.
    pub tick_skip: i32,
    /// Ticks at the start of each macro-step during which the previous action
    /// keeps being applied.
    pub action_delay: i32,
    /// Arg-max action selection instead of sampling.
    pub deterministic: bool,
    /// Softmax temperature for stochastic selection.
    pub temperature: f32,
    /// Run forward passes through the reduced-precision mirror.
    pub reduced_precision: bool,
}

impl Default for BotParams {
    fn default() -> Self {
        Self {
            tick_skip: 8,
            action_delay: 7,
            deterministic: true,
            temperature: 1.0,
            reduced_precision: false,
        }
    }
}

/// One bot instance controlling a set of player indices.
///
/// Collaborators arrive by ownership at construction; there is no shared
/// process-wide context. All state is mutated by the single control-loop
/// thread that calls [`Bot::update`].
pub struct Bot<B: Backend> {
    indices: BTreeSet<u32>,
    infer_unit: InferUnit<B>,
    params: BotParams,
    bank: SchedulerBank,
}

impl<B: Backend> Bot<B> {
    pub fn new(
        indices: impl IntoIterator<Item = u32>,
        infer_unit: InferUnit<B>,
        params: BotParams,
    ) -> Self {
        let indices: BTreeSet<u32> = indices.into_iter().collect();
        for index in &indices {
            tracing::info!("bot created for player index {index}");
        }

        Self {
            indices,
            infer_unit,
            params,
            bank: SchedulerBank::new(),
        }
    }

    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().copied()
    }

    /// Processes one world snapshot and returns a control output per
    /// controlled index. An index missing from the snapshot degrades to a
    /// neutral output for this update instead of failing the loop.
    pub fn update(&mut self, frame: u32, state: &GameState) -> Vec<(u32, ControllerOutput)> {
        let dt = self.bank.begin_frame(frame);

        let tick_skip = self.params.tick_skip.max(1) as u32;
        let action_delay = self.params.action_delay.clamp(0, tick_skip as i32) as u32;
        let params = self.params;

        let unit = &mut self.infer_unit;
        let mut outputs = Vec::with_capacity(self.indices.len());

        for &index in &self.indices {
            if state.players.len() <= index as usize {
                // Not in this snapshot; emit neutral controls
                outputs.push((index, ControllerOutput::default()));
                continue;
            }

            let agent = self.bank.agent(index);
            let action = agent.advance(dt, tick_skip, action_delay, |prev| {
                let mut player = state.players[index as usize].clone();
                player.prev_action = *prev;
                unit.infer_action(
                    &player,
                    state,
                    params.deterministic,
                    params.temperature,
                    params.reduced_precision,
                )
            });

            outputs.push((index, action.into()));
        }

        outputs
    }

    /// Drops all per-agent scheduler state, e.g. between matches.
    pub fn reset(&mut self) {
        self.bank.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionParser};
    use crate::infer::PartialModelConfig;
    use crate::obs::ObsBuilder;
    use crate::state::Player;

    use std::cell::Cell;
    use std::rc::Rc;

    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    type B = NdArray;

    const OBS_SIZE: usize = 8;

    /// Counts how often an observation is built, i.e. how often a fresh plan
    /// is requested.
    struct CountingObs(Rc<Cell<usize>>);

    impl ObsBuilder for CountingObs {
        fn build_obs(&mut self, _player: &Player, _state: &GameState) -> Vec<f32> {
            self.0.set(self.0.get() + 1);
            vec![0.5; OBS_SIZE]
        }
    }

    struct FourActions;

    impl ActionParser for FourActions {
        fn action_count(&self) -> usize {
            4
        }

        fn decode(&self, action_idx: usize, _player: &Player, _state: &GameState) -> Action {
            Action {
                throttle: action_idx as f32,
                ..Default::default()
            }
        }
    }

    fn test_bot(tick_skip: i32) -> (Bot<B>, Rc<Cell<usize>>) {
        let plans = Rc::new(Cell::new(0));
        let policy = PartialModelConfig {
            layer_sizes: vec![8],
            ..Default::default()
        };
        let unit = InferUnit::with_fresh_models(
            Box::new(CountingObs(Rc::clone(&plans))),
            OBS_SIZE,
            Box::new(FourActions),
            &PartialModelConfig::default(),
            &policy,
            NdArrayDevice::default(),
        );
        let params = BotParams {
            tick_skip,
            action_delay: tick_skip - 1,
            ..Default::default()
        };
        (Bot::new([0], unit, params), plans)
    }

    fn two_player_state() -> GameState {
        let mut state = GameState::default();
        for i in 0..2 {
            state.players.push(Player {
                car_id: i,
                ..Default::default()
            });
        }
        state
    }

    #[test]
    fn test_plans_once_per_macro_step() {
        let (mut bot, plans) = test_bot(4);
        let state = two_player_state();

        for frame in 0..17 {
            bot.update(frame, &state);
        }
        // Plans at frames 0, 4, 8, 12, 16
        assert_eq!(plans.get(), 5);
    }

    #[test]
    fn test_missing_index_degrades_to_neutral() {
        let (mut bot, plans) = test_bot(4);
        let state = GameState::default(); // no players at all

        let outputs = bot.update(0, &state);
        assert_eq!(outputs, vec![(0, ControllerOutput::default())]);
        assert_eq!(plans.get(), 0);
    }

    #[test]
    fn test_frame_jump_resets_and_replans() {
        let (mut bot, plans) = test_bot(4);
        let state = two_player_state();

        bot.update(0, &state);
        bot.update(1, &state);
        assert_eq!(plans.get(), 1);

        // Past the discontinuity threshold: scheduler state is rebuilt and a
        // fresh plan happens immediately
        bot.update(500, &state);
        assert_eq!(plans.get(), 2);
    }

    #[test]
    fn test_reset_forces_replan() {
        let (mut bot, plans) = test_bot(8);
        let state = two_player_state();

        bot.update(0, &state);
        bot.update(1, &state);
        assert_eq!(plans.get(), 1);

        bot.reset();
        bot.update(2, &state);
        assert_eq!(plans.get(), 2);
    }
}
