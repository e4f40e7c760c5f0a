//! Snapshot types describing the world as seen in one update.

use crate::actions::Action;

use super::math::{RotMat, Vec3};

/// Number of boost pads on a standard field.
pub const BOOST_PAD_COUNT: usize = 34;

/// Kinematic state shared by cars and the ball.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysState {
    pub pos: Vec3,
    pub vel: Vec3,
    pub ang_vel: Vec3,
    pub rot_mat: RotMat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Team {
    #[default]
    Blue,
    Orange,
}

/// One car in the snapshot.
#[derive(Debug, Clone, Default)]
pub struct Player {
    pub car_id: u32,
    pub team: Team,
    pub phys: PhysState,
    /// Boost amount in [0, 100].
    pub boost: f32,
    pub on_ground: bool,
    pub has_jumped: bool,
    pub has_double_jumped: bool,
    pub demoed: bool,
    /// Action applied in the previous macro-step; observation builders embed
    /// it so the policy sees its own recent choice.
    pub prev_action: Action,
}

/// A full world snapshot for one tick.
#[derive(Debug, Clone)]
pub struct GameState {
    pub players: Vec<Player>,
    pub ball: PhysState,
    pub boost_pads: [bool; BOOST_PAD_COUNT],
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            ball: PhysState::default(),
            boost_pads: [true; BOOST_PAD_COUNT],
        }
    }
}
