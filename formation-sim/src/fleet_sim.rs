//! Per-robot kinematic simulation and the forward camera projection that
//! turns a simulated pose into pixel-space marker corners. Grounded on
//! `boat_sim.rs`'s `tick(dt)` physics update (position integration, heading
//! noise, bouncing off a bounded arena) and, for the projection itself, on
//! the inverse of `frame_analyzer::estimate_pose`'s normalize → depth →
//! yaw-from-edge pipeline — this module constructs the one pixel frame that
//! pipeline would decode back into the given pose.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

use formation_types::{MarkerDetection, Pose2D, KNOWN_AGENT_IDS};

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub camera_height_m: f64,
    pub marker_length_m: f64,
    pub arena_half_width_m: f64,
    pub arena_half_height_m: f64,
    pub robot_speed_mps: f64,
    pub heading_noise_rad: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RobotState {
    pub id: u32,
    pub pose: Pose2D,
    heading: f64,
}

pub struct FleetSim {
    pub robots: Vec<RobotState>,
    cfg: SimConfig,
}

impl FleetSim {
    pub fn new(cfg: SimConfig) -> Self {
        let mut rng = rand::thread_rng();
        let robots = KNOWN_AGENT_IDS
            .iter()
            .map(|&id| {
                let x = rng.gen_range(-cfg.arena_half_width_m..cfg.arena_half_width_m);
                let y = rng.gen_range(-cfg.arena_half_height_m..cfg.arena_half_height_m);
                let heading = rng.gen_range(0.0..std::f64::consts::TAU);
                RobotState { id, pose: Pose2D::new(x, y, heading), heading }
            })
            .collect();
        Self { robots, cfg }
    }

    /// Advance every robot by `dt` seconds: move forward along its heading,
    /// drift the heading with Gaussian noise, and bounce off the arena
    /// walls. Robots whose id is in `frozen_ids` are left untouched (stuck
    /// drivetrain fault injection).
    pub fn tick(&mut self, dt: f64, frozen_ids: &[u32]) {
        let mut rng = rand::thread_rng();
        let noise = Normal::new(0.0, self.cfg.heading_noise_rad).expect("heading_noise_rad must be finite and >= 0");

        for robot in &mut self.robots {
            if frozen_ids.contains(&robot.id) {
                continue;
            }
            robot.heading += noise.sample(&mut rng) * dt;

            let mut x = robot.pose.x + self.cfg.robot_speed_mps * robot.heading.cos() * dt;
            let mut y = robot.pose.y + self.cfg.robot_speed_mps * robot.heading.sin() * dt;

            if x.abs() > self.cfg.arena_half_width_m {
                robot.heading = std::f64::consts::PI - robot.heading;
                x = x.clamp(-self.cfg.arena_half_width_m, self.cfg.arena_half_width_m);
            }
            if y.abs() > self.cfg.arena_half_height_m {
                robot.heading = -robot.heading;
                y = y.clamp(-self.cfg.arena_half_height_m, self.cfg.arena_half_height_m);
            }

            robot.pose = Pose2D::new(x, y, robot.heading);
        }
    }

    pub fn detections(&self, jitter_sigma_px: f64) -> Vec<MarkerDetection> {
        self.robots
            .iter()
            .map(|r| MarkerDetection { id: r.id, corners: project_to_corners(r.pose, &self.cfg, jitter_sigma_px) })
            .collect()
    }
}

/// Forward-project a world pose into the four pixel-space corners a
/// straight-down camera with the given intrinsics would report for a square
/// marker of `marker_length_m` at `camera_height_m` depth, at orientation
/// `pose.theta`. Optionally adds Gaussian pixel noise per corner.
pub fn project_to_corners(pose: Pose2D, cfg: &SimConfig, jitter_sigma_px: f64) -> [[f64; 2]; 4] {
    let depth = cfg.camera_height_m;
    let apparent_side = cfg.marker_length_m / depth;
    let half = apparent_side / 2.0;

    let center = (pose.x / depth, pose.y / depth);
    let (s, c) = pose.theta.sin_cos();
    let rotate = |u: f64, v: f64| (u * c - v * s, u * s + v * c);

    let local = [(-half, -half), (half, -half), (half, half), (-half, half)];

    let mut rng = rand::thread_rng();
    let noise = if jitter_sigma_px > 0.0 { Normal::new(0.0, jitter_sigma_px).ok() } else { None };

    let mut corners = [[0.0; 2]; 4];
    for (i, (u, v)) in local.iter().enumerate() {
        let (ru, rv) = rotate(*u, *v);
        let nx = center.0 + ru;
        let ny = center.1 + rv;
        let mut px = nx * cfg.fx + cfg.cx;
        let mut py = ny * cfg.fy + cfg.cy;
        if let Some(dist) = &noise {
            px += dist.sample(&mut rng);
            py += dist.sample(&mut rng);
        }
        corners[i] = [px, py];
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg() -> SimConfig {
        SimConfig {
            fx: 800.0,
            fy: 800.0,
            cx: 640.0,
            cy: 360.0,
            camera_height_m: 2.0,
            marker_length_m: 0.12,
            arena_half_width_m: 1.5,
            arena_half_height_m: 1.0,
            robot_speed_mps: 0.3,
            heading_noise_rad: 0.1,
        }
    }

    #[test]
    fn projected_corners_round_trip_through_pose_estimation() {
        let cfg = test_cfg();
        let pose = Pose2D::new(0.3, -0.2, 0.4);
        let corners = project_to_corners(pose, &cfg, 0.0);

        let calibration = formation_controller_test_shim::calibration_from(&cfg);
        let recovered = formation_controller_test_shim::estimate_pose(&corners, &calibration, cfg.marker_length_m);

        assert!((recovered.x - pose.x).abs() < 1e-6);
        assert!((recovered.y - pose.y).abs() < 1e-6);
        assert!((recovered.theta - pose.theta).abs() < 1e-6);
    }

    #[test]
    fn robots_stay_within_the_configured_arena() {
        let cfg = test_cfg();
        let mut sim = FleetSim::new(cfg.clone());
        for _ in 0..500 {
            sim.tick(0.05, &[]);
        }
        for robot in &sim.robots {
            assert!(robot.pose.x.abs() <= cfg.arena_half_width_m + 1e-9);
            assert!(robot.pose.y.abs() <= cfg.arena_half_height_m + 1e-9);
        }
    }

    #[test]
    fn detections_cover_every_known_agent() {
        let sim = FleetSim::new(test_cfg());
        let detections = sim.detections(0.0);
        assert_eq!(detections.len(), KNOWN_AGENT_IDS.len());
    }

    // A tiny local stand-in for the controller's pose-estimation math so this
    // crate's round-trip test doesn't need a dependency on the controller
    // binary crate; the two are kept in sync by the shared inverse-function
    // relationship documented on `project_to_corners`.
    mod formation_controller_test_shim {
        use super::SimConfig;
        use formation_types::Pose2D;

        pub struct Calibration {
            pub fx: f64,
            pub fy: f64,
            pub cx: f64,
            pub cy: f64,
        }

        pub fn calibration_from(cfg: &SimConfig) -> Calibration {
            Calibration { fx: cfg.fx, fy: cfg.fy, cx: cfg.cx, cy: cfg.cy }
        }

        pub fn estimate_pose(corners: &[[f64; 2]; 4], cal: &Calibration, marker_length: f64) -> Pose2D {
            let normalized: Vec<(f64, f64)> =
                corners.iter().map(|p| ((p[0] - cal.cx) / cal.fx, (p[1] - cal.cy) / cal.fy)).collect();
            let center = {
                let sx: f64 = normalized.iter().map(|p| p.0).sum();
                let sy: f64 = normalized.iter().map(|p| p.1).sum();
                (sx / 4.0, sy / 4.0)
            };
            let mut side_sum = 0.0;
            for i in 0..4 {
                let a = normalized[i];
                let b = normalized[(i + 1) % 4];
                side_sum += ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
            }
            let apparent_side = (side_sum / 4.0).max(1e-9);
            let depth = marker_length / apparent_side;
            let edge = (normalized[1].0 - normalized[0].0, normalized[1].1 - normalized[0].1);
            let yaw = edge.1.atan2(edge.0);
            Pose2D::new(center.0 * depth, center.1 * depth, yaw)
        }
    }
}
