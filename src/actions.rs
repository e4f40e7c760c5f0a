//! Discrete action model: structured actions, per-tick controller outputs, and
//! the default lookup-table parser.

use crate::state::{GameState, Player};

/// A policy-level action. All fields are continuous; the button fields are
/// thresholded when converted to a [`ControllerOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Action {
    pub throttle: f32,
    pub steer: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub jump: f32,
    pub boost: f32,
    pub handbrake: f32,
}

/// Controls emitted to the game for a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerOutput {
    pub throttle: f32,
    pub steer: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub jump: bool,
    pub boost: bool,
    pub handbrake: bool,
}

impl From<Action> for ControllerOutput {
    fn from(action: Action) -> Self {
        Self {
            throttle: action.throttle,
            steer: action.steer,
            pitch: action.pitch,
            yaw: action.yaw,
            roll: action.roll,
            jump: action.jump > 0.5,
            boost: action.boost > 0.5,
            handbrake: action.handbrake > 0.5,
        }
    }
}

/// Maps policy action indices to structured actions.
pub trait ActionParser {
    /// Size of the discrete action space.
    fn action_count(&self) -> usize;

    /// Per-action legality in the current situation. Defaults to everything
    /// legal.
    fn action_mask(&self, _player: &Player, _state: &GameState) -> Vec<bool> {
        vec![true; self.action_count()]
    }

    /// Decodes one action index into a structured action.
    fn decode(&self, action_idx: usize, player: &Player, state: &GameState) -> Action;
}

/// The standard discrete lookup table: ground throttle/steer combinations plus
/// aerial orientation combinations, with redundant entries pruned.
#[derive(Debug, Clone)]
pub struct LookupTableAction {
    table: Vec<Action>,
}

impl LookupTableAction {
    pub fn new() -> Self {
        let mut table = Vec::new();

        // Ground actions
        for throttle in [-1.0, 0.0, 1.0] {
            for steer in [-1.0, 0.0, 1.0] {
                for boost in [0.0, 1.0] {
                    for handbrake in [0.0, 1.0] {
                        // Boosting implies full throttle
                        if boost == 1.0 && throttle != 1.0 {
                            continue;
                        }
                        table.push(Action {
                            throttle,
                            steer,
                            boost,
                            handbrake,
                            ..Default::default()
                        });
                    }
                }
            }
        }

        // Aerial actions
        for pitch in [-1.0, 0.0, 1.0] {
            for yaw in [-1.0, 0.0, 1.0] {
                for roll in [-1.0, 0.0, 1.0] {
                    for jump in [0.0, 1.0] {
                        for boost in [0.0, 1.0] {
                            // Flip direction comes from pitch/roll while jumping
                            if jump == 1.0 && yaw != 0.0 {
                                continue;
                            }
                            // Covered by the ground table
                            if pitch == 0.0 && roll == 0.0 && jump == 0.0 {
                                continue;
                            }
                            table.push(Action {
                                throttle: boost,
                                steer: yaw,
                                pitch,
                                yaw,
                                roll,
                                jump,
                                boost,
                                ..Default::default()
                            });
                        }
                    }
                }
            }
        }

        Self { table }
    }
}

impl Default for LookupTableAction {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionParser for LookupTableAction {
    fn action_count(&self) -> usize {
        self.table.len()
    }

    fn decode(&self, action_idx: usize, _player: &Player, _state: &GameState) -> Action {
        self.table[action_idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_output_thresholds() {
        let action = Action {
            throttle: 0.3,
            jump: 0.6,
            boost: 0.5,
            handbrake: 0.49,
            ..Default::default()
        };
        let out = ControllerOutput::from(action);
        assert!((out.throttle - 0.3).abs() < 1e-6);
        assert!(out.jump);
        assert!(!out.boost); // strictly greater than 0.5
        assert!(!out.handbrake);
    }

    #[test]
    fn test_lookup_table_size() {
        let parser = LookupTableAction::new();
        assert_eq!(parser.action_count(), 90);
    }

    #[test]
    fn test_lookup_table_decode_in_range() {
        let parser = LookupTableAction::new();
        let player = Player::default();
        let state = GameState::default();
        for idx in 0..parser.action_count() {
            let action = parser.decode(idx, &player, &state);
            assert!(action.throttle.abs() <= 1.0);
            assert!(action.steer.abs() <= 1.0);
        }
    }

    #[test]
    fn test_default_mask_is_all_legal() {
        let parser = LookupTableAction::new();
        let mask = parser.action_mask(&Player::default(), &GameState::default());
        assert_eq!(mask.len(), parser.action_count());
        assert!(mask.iter().all(|&m| m));
    }
}
