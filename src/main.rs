use std::env;
use std::f32::consts::FRAC_PI_2;
use std::path::PathBuf;

use burn::backend::NdArray;
use burn::backend::ndarray::NdArrayDevice;
use dotenv::dotenv;
use rand::Rng;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use nitrobot::actions::LookupTableAction;
use nitrobot::bot::{Bot, BotParams};
use nitrobot::infer::{InferUnit, PartialModelConfig};
use nitrobot::obs::BasicObs;
use nitrobot::state::{GameState, Player, RotMat, Team, Vec3};

fn get_env_var_i32(key: &str) -> Option<i32> {
    env::var(key).ok().and_then(|val| val.parse::<i32>().ok())
}

fn get_env_var_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|val| val.parse::<bool>().ok())
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nitrobot=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

/// A kickoff-ish snapshot: ball at the center, the first `team_size` cars on
/// blue, the rest on orange, everyone facing the ball.
fn kickoff_state(team_size: usize) -> GameState {
    let mut state = GameState::default();
    state.ball.pos = Vec3::new(0.0, 0.0, 93.0);

    for i in 0..team_size * 2 {
        let team = if i < team_size {
            Team::Blue
        } else {
            Team::Orange
        };
        let side = if team == Team::Blue { -1.0 } else { 1.0 };
        let lane = (i % team_size) as f32 - (team_size - 1) as f32 / 2.0;

        let mut player = Player::default();
        player.car_id = i as u32;
        player.team = team;
        player.phys.pos = Vec3::new(lane * 512.0, side * 4608.0, 17.0);
        player.phys.rot_mat = RotMat::from_euler(0.0, -side * FRAC_PI_2, 0.0);
        player.boost = 33.0;
        player.on_ground = true;
        state.players.push(player);
    }

    state
}

fn main() {
    dotenv().ok();
    init_logging();

    let models_folder = PathBuf::from(
        env::var("NITROBOT_MODELS_FOLDER")
            .expect("NITROBOT_MODELS_FOLDER environment variable is required, see README.md"),
    );
    let team_size = get_env_var_i32("NITROBOT_TEAM_SIZE").unwrap_or(1).max(1) as usize;
    let frames = get_env_var_i32("NITROBOT_FRAMES").unwrap_or(300).max(1) as u32;
    let init_models = get_env_var_bool("NITROBOT_INIT_MODELS").unwrap_or(false);

    let mut params = BotParams::default();
    if let Some(v) = get_env_var_i32("NITROBOT_TICK_SKIP") {
        params.tick_skip = v;
    }
    if let Some(v) = get_env_var_i32("NITROBOT_ACTION_DELAY") {
        params.action_delay = v;
    }
    if let Some(v) = get_env_var_bool("NITROBOT_DETERMINISTIC") {
        params.deterministic = v;
    }
    if let Some(v) = env::var("NITROBOT_TEMPERATURE")
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
    {
        params.temperature = v;
    }
    if let Some(v) = get_env_var_bool("NITROBOT_REDUCED_PRECISION") {
        params.reduced_precision = v;
    }

    // ----------------------------------------------------------------------
    // Set the architectures to match whatever the checkpoint was trained with
    // ----------------------------------------------------------------------
    let shared_head = PartialModelConfig {
        layer_sizes: vec![256, 256],
        output_layer: false,
        ..Default::default()
    };
    let policy = PartialModelConfig {
        layer_sizes: vec![256, 256, 256],
        ..Default::default()
    };

    let obs_builder = BasicObs::new(team_size * 2);
    let obs_size = obs_builder.obs_size();
    let device = NdArrayDevice::default();

    if init_models {
        std::fs::create_dir_all(&models_folder).unwrap_or_else(|err| {
            panic!(
                "failed to create models folder {}: {err}",
                models_folder.display()
            )
        });
        let fresh = InferUnit::<NdArray>::with_fresh_models(
            Box::new(obs_builder.clone()),
            obs_size,
            Box::new(LookupTableAction::new()),
            &shared_head,
            &policy,
            device,
        );
        fresh.save_models(&models_folder);
        tracing::info!(
            "wrote freshly initialized models to {}",
            models_folder.display()
        );
    }

    let infer_unit = InferUnit::<NdArray>::new(
        Box::new(obs_builder),
        obs_size,
        Box::new(LookupTableAction::new()),
        &shared_head,
        &policy,
        &models_folder,
        device,
    );
    tracing::info!(
        "obs size {obs_size}, {} discrete actions, tick_skip {}, action_delay {}",
        infer_unit.action_count(),
        params.tick_skip,
        params.action_delay
    );

    // Control the blue team
    let mut bot = Bot::new(0..team_size as u32, infer_unit, params);

    // Offline dry run: no game connection here, just the decision core driven
    // by a synthetic kickoff world
    let mut rng = rand::rng();
    let mut state = kickoff_state(team_size);

    for frame in 0..frames {
        state.ball.pos = state.ball.pos
            + Vec3::new(
                rng.random_range(-50.0..50.0),
                rng.random_range(-50.0..50.0),
                0.0,
            );

        let outputs = bot.update(frame, &state);

        if frame % 60 == 0 {
            for (index, out) in &outputs {
                tracing::info!(
                    "frame {frame} player {index}: throttle {:+.2} steer {:+.2} jump {} boost {}",
                    out.throttle,
                    out.steer,
                    out.jump,
                    out.boost
                );
            }
        }
    }

    tracing::info!("dry run finished after {frames} frames");
}
