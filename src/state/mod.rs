mod game;
mod math;

pub use game::{BOOST_PAD_COUNT, GameState, PhysState, Player, Team};
pub use math::{RotMat, Vec3};
