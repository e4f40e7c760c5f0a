//! Observation building: the trait seam plus a compact default encoder.

use crate::state::{GameState, Player, Vec3};

/// Builds the fixed-length observation vector for one agent.
///
/// The produced length must be constant for a given run and match the obs size
/// the infer unit was constructed with; a mismatch is a fatal setup error.
pub trait ObsBuilder {
    fn build_obs(&mut self, player: &Player, state: &GameState) -> Vec<f32>;
}

/// Position/velocity normalization (max car speed in uu/s).
const POS_COEF: f32 = 1.0 / 2300.0;
/// Angular velocity normalization (max in rad/s).
const ANG_VEL_COEF: f32 = 1.0 / 5.5;

/// Compact kinematic encoder: ball, own car, previous action, and a fixed
/// number of other cars, zero-padded when fewer are present.
#[derive(Debug, Clone)]
pub struct BasicObs {
    max_players: usize,
}

impl BasicObs {
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players: max_players.max(1),
        }
    }

    /// Length of the vectors [`ObsBuilder::build_obs`] produces.
    pub fn obs_size(&self) -> usize {
        // ball (9) + own car (18) + previous action (8) + others (6 each)
        9 + 18 + 8 + 6 * (self.max_players - 1)
    }
}

impl ObsBuilder for BasicObs {
    fn build_obs(&mut self, player: &Player, state: &GameState) -> Vec<f32> {
        let mut obs = Vec::with_capacity(self.obs_size());

        let ball = &state.ball;
        push_vec3(&mut obs, ball.pos * POS_COEF);
        push_vec3(&mut obs, ball.vel * POS_COEF);
        push_vec3(&mut obs, ball.ang_vel * ANG_VEL_COEF);

        let phys = &player.phys;
        push_vec3(&mut obs, phys.pos * POS_COEF);
        push_vec3(&mut obs, phys.rot_mat.forward);
        push_vec3(&mut obs, phys.rot_mat.up);
        push_vec3(&mut obs, phys.vel * POS_COEF);
        push_vec3(&mut obs, phys.ang_vel * ANG_VEL_COEF);
        obs.push(player.boost / 100.0);
        obs.push(player.on_ground as u8 as f32);
        obs.push(player.has_jumped as u8 as f32);

        let prev = &player.prev_action;
        obs.extend([
            prev.throttle,
            prev.steer,
            prev.pitch,
            prev.yaw,
            prev.roll,
            prev.jump,
            prev.boost,
            prev.handbrake,
        ]);

        let mut encoded = 0;
        for other in &state.players {
            if other.car_id == player.car_id {
                continue;
            }
            if encoded == self.max_players - 1 {
                break;
            }
            push_vec3(&mut obs, (other.phys.pos - phys.pos) * POS_COEF);
            push_vec3(&mut obs, other.phys.vel * POS_COEF);
            encoded += 1;
        }
        for _ in encoded..self.max_players - 1 {
            obs.extend([0.0; 6]);
        }

        obs
    }
}

fn push_vec3(obs: &mut Vec<f32>, v: Vec3) {
    obs.extend([v.x, v.y, v.z]);
}
