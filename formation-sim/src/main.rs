//! formation-sim entry point.
//!
//! A plain blocking loop (no async runtime, matching the controller's own
//! thread-per-stage model): each tick advances a small simulated ground-robot
//! fleet, optionally distorts or drops markers per the active fault
//! scenario, projects every robot's pose into synthetic pixel-space marker
//! corners, and sends the resulting frame as JSON over UDP to the
//! controller's synthetic frame source. Grounded on the teacher's
//! `uwb-simulator/src/main.rs`: CLI args layered over an embedded-default
//! TOML config, then a periodic tick loop that ticks physics and transmits.

mod fleet_sim;
mod scenarios;
mod udp_tx;

use std::time::{Duration, Instant};

use clap::Parser;
use serde::Deserialize;
use tracing::info;

use fleet_sim::{FleetSim, SimConfig};
use scenarios::ScenarioConfig;
use udp_tx::UdpTransmitter;

const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml");

#[derive(Parser, Debug)]
#[command(name = "formation-sim", about = "Synthetic marker-detection frame generator")]
struct Args {
    /// Path to a TOML config file. Falls back to the embedded default if
    /// unreadable or omitted.
    #[arg(long)]
    config: Option<String>,

    /// UDP address the controller's synthetic frame source is listening on.
    #[arg(long)]
    target_addr: Option<String>,

    /// Simulation tick rate in Hz.
    #[arg(long)]
    tick_hz: Option<f64>,

    /// Inject marker dropout on these agent ids (comma-separated).
    #[arg(long, value_delimiter = ',')]
    dropout_ids: Vec<u32>,

    /// Inject high pixel jitter on every marker.
    #[arg(long)]
    high_jitter: bool,

    /// Inject one extra detection outside the known agent set.
    #[arg(long)]
    unknown_intruder: bool,

    /// Freeze these agent ids in place (stuck drivetrain fault injection).
    #[arg(long, value_delimiter = ',')]
    frozen_ids: Vec<u32>,

    /// Load a named scenario preset at startup instead of combining the
    /// individual fault flags above: one of dropout, jitter, intruder, frozen.
    #[arg(long)]
    preset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    network: NetworkConfig,
    camera: CameraConfig,
    fleet: FleetConfig,
}

#[derive(Debug, Deserialize)]
struct NetworkConfig {
    target_addr: String,
    tick_hz: f64,
}

#[derive(Debug, Deserialize)]
struct CameraConfig {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    camera_height_m: f64,
    marker_length_m: f64,
}

#[derive(Debug, Deserialize)]
struct FleetConfig {
    arena_half_width_m: f64,
    arena_half_height_m: f64,
    robot_speed_mps: f64,
    heading_noise_rad: f64,
}

impl Default for FileConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("embedded config.toml must parse")
    }
}

fn load_file_config(path: Option<&str>) -> FileConfig {
    match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("config: failed to parse {p} ({e}); using embedded default");
                FileConfig::default()
            }),
            Err(e) => {
                tracing::warn!("config: could not read {p}: {e}; using embedded default");
                FileConfig::default()
            }
        },
        None => FileConfig::default(),
    }
}

fn sim_config_from(file: &FileConfig) -> SimConfig {
    SimConfig {
        fx: file.camera.fx,
        fy: file.camera.fy,
        cx: file.camera.cx,
        cy: file.camera.cy,
        camera_height_m: file.camera.camera_height_m,
        marker_length_m: file.camera.marker_length_m,
        arena_half_width_m: file.fleet.arena_half_width_m,
        arena_half_height_m: file.fleet.arena_half_height_m,
        robot_speed_mps: file.fleet.robot_speed_mps,
        heading_noise_rad: file.fleet.heading_noise_rad,
    }
}

fn scenario_from(args: &Args) -> ScenarioConfig {
    if let Some(preset) = args.preset.as_deref() {
        return match preset {
            "dropout" => scenarios::preset_marker_dropout(&args.dropout_ids),
            "jitter" => scenarios::preset_high_jitter(),
            "intruder" => scenarios::preset_unknown_intruder(),
            "frozen" => scenarios::preset_frozen_robot(&args.frozen_ids),
            other => {
                tracing::warn!("unknown scenario preset '{other}', running with no fault injection");
                ScenarioConfig::default()
            }
        };
    }

    let mut active = Vec::new();
    if !args.dropout_ids.is_empty() {
        active.push(scenarios::ScenarioType::MarkerDropout);
    }
    if args.high_jitter {
        active.push(scenarios::ScenarioType::HighJitter);
    }
    if args.unknown_intruder {
        active.push(scenarios::ScenarioType::UnknownIntruder);
    }
    if !args.frozen_ids.is_empty() {
        active.push(scenarios::ScenarioType::FrozenRobot);
    }
    ScenarioConfig {
        active,
        dropout_ids: args.dropout_ids.clone(),
        frozen_ids: args.frozen_ids.clone(),
        ..Default::default()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "formation_sim=info".into()),
        )
        .init();

    let args = Args::parse();
    let file = load_file_config(args.config.as_deref());

    let target_addr = args.target_addr.clone().unwrap_or_else(|| file.network.target_addr.clone());
    let tick_hz = args.tick_hz.unwrap_or(file.network.tick_hz);
    let period = Duration::from_secs_f64(1.0 / tick_hz);

    let mut fleet = FleetSim::new(sim_config_from(&file));
    let scenario = scenario_from(&args);
    let transmitter = UdpTransmitter::new(&target_addr).expect("failed to bind synthetic-frame UDP socket");

    info!("formation-sim: streaming to {target_addr} at {tick_hz} Hz");

    let mut frame_counter: u32 = 0;
    let mut last_tick = Instant::now();
    loop {
        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;

        let frozen_ids: Vec<u32> =
            fleet.robots.iter().map(|r| r.id).filter(|&id| scenario.is_frozen(id)).collect();
        fleet.tick(dt.min(0.25), &frozen_ids);

        let sim_cfg = sim_config_from(&file);
        let mut detections: Vec<_> = fleet
            .robots
            .iter()
            .filter(|r| !scenario.is_marker_dropped(r.id, frame_counter))
            .map(|r| formation_types::MarkerDetection {
                id: r.id,
                corners: fleet_sim::project_to_corners(r.pose, &sim_cfg, scenario.jitter_sigma_px()),
            })
            .collect();

        if scenario.has(scenarios::ScenarioType::UnknownIntruder) {
            let intruder_pose = formation_types::Pose2D::new(0.0, 0.0, 0.0);
            detections.push(formation_types::MarkerDetection {
                id: scenario.intruder_id,
                corners: fleet_sim::project_to_corners(intruder_pose, &sim_cfg, 0.0),
            });
        }

        transmitter.send_frame(&detections);

        frame_counter = frame_counter.wrapping_add(1);
        std::thread::sleep(period);
    }
}

