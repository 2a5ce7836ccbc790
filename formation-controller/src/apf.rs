//! CollisionAvoidanceLayer — the last stage before the serial link: nudges
//! each agent's resolved target away from its nearest neighbors via an
//! artificial potential field. Grounded near-verbatim on `apf.py`'s
//! `compute_repulsive_force`/`adjust_target` and `collision_avoidance.py`'s
//! toggle/pass-through behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::{
    Pose2D, APF_D_INFLUENCE, APF_D_SAFETY, APF_ETA, APF_K_REP, APF_MAX_ADJUSTMENT, EPSILON,
};
use tracing::info;

use crate::context::ControllerContext;

/// Total repulsive force on `robot_pos` from every position in `others`.
pub fn compute_repulsive_force(robot_pos: (f64, f64), others: &[(f64, f64)]) -> (f64, f64) {
    let mut total = (0.0, 0.0);

    for &other in others {
        let dx = robot_pos.0 - other.0;
        let dy = robot_pos.1 - other.1;
        let d_ij = (dx * dx + dy * dy).sqrt();

        if d_ij < EPSILON || d_ij >= APF_D_INFLUENCE {
            continue;
        }

        let d_clamped = d_ij.max(APF_D_SAFETY);
        let magnitude = APF_K_REP * (1.0 / d_clamped - 1.0 / APF_D_INFLUENCE) * (1.0 / (d_clamped * d_clamped));

        let ux = dx / d_ij;
        let uy = dy / d_ij;
        total.0 += magnitude * ux;
        total.1 += magnitude * uy;
    }

    total
}

/// Displace `target` by `force` scaled by `APF_ETA`, clamped to `APF_MAX_ADJUSTMENT`.
pub fn adjust_target(target: (f64, f64), force: (f64, f64)) -> (f64, f64) {
    let mut adj = (APF_ETA * force.0, APF_ETA * force.1);
    let magnitude = (adj.0 * adj.0 + adj.1 * adj.1).sqrt();
    if magnitude > APF_MAX_ADJUSTMENT {
        let scale = APF_MAX_ADJUSTMENT / magnitude;
        adj.0 *= scale;
        adj.1 *= scale;
    }
    (target.0 + adj.0, target.1 + adj.1)
}

pub struct CollisionAvoidanceLayer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl CollisionAvoidanceLayer {
    pub fn spawn(context: Arc<ControllerContext>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            info!("collision_avoidance_layer: running");
            while !stop_flag.load(Ordering::Relaxed) {
                tick(&context);
                std::thread::sleep(period);
            }
            info!("collision_avoidance_layer: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

pub fn tick(context: &ControllerContext) {
    let resolved = context.agent_resolved_target_store.get_all();

    if !context.toggles.apf_enabled.load(Ordering::Relaxed) || resolved.is_empty() {
        context.agent_adjusted_target_store.update_batch(resolved);
        return;
    }

    let current_poses = context.agent_pose_store.get_all();
    let positions: HashMap<u32, (f64, f64)> = current_poses
        .iter()
        .filter_map(|(&id, pose)| pose.map(|p| (id, (p.x, p.y))))
        .collect();

    let mut adjusted = HashMap::with_capacity(resolved.len());
    for (&agent_id, target) in &resolved {
        let Some(&own_pos) = positions.get(&agent_id) else {
            adjusted.insert(agent_id, *target);
            continue;
        };
        let others: Vec<(f64, f64)> = positions
            .iter()
            .filter(|(&id, _)| id != agent_id)
            .map(|(_, &pos)| pos)
            .collect();

        let force = compute_repulsive_force(own_pos, &others);
        let (x, y) = adjust_target((target.x, target.y), force);
        adjusted.insert(agent_id, Pose2D::new(x, y, target.theta));
    }

    context.agent_adjusted_target_store.update_batch(adjusted);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_no_nearby_robots_leaves_target_unchanged() {
        let force = compute_repulsive_force((0.0, 0.0), &[(5.0, 5.0)]);
        assert_eq!(force, (0.0, 0.0));
        let adjusted = adjust_target((1.0, 1.0), force);
        assert_eq!(adjusted, (1.0, 1.0));
    }

    #[test]
    fn close_robot_pushes_target_away() {
        let force = compute_repulsive_force((0.0, 0.0), &[(0.1, 0.0)]);
        assert!(force.0 > 0.0, "force should point away from the other robot: {force:?}");
        let adjusted = adjust_target((0.0, 0.0), force);
        assert!(adjusted.0 > 0.0);
    }

    #[test]
    fn coincident_positions_are_skipped_not_infinite() {
        let force = compute_repulsive_force((1.0, 1.0), &[(1.0, 1.0)]);
        assert_eq!(force, (0.0, 0.0));
    }

    #[test]
    fn adjustment_is_clamped_to_max() {
        // A pathologically small safety distance still produces a bounded adjustment.
        let force = compute_repulsive_force((0.0, 0.0), &[(0.001, 0.0)]);
        let adjusted = adjust_target((0.0, 0.0), force);
        let magnitude = (adjusted.0 * adjusted.0 + adjusted.1 * adjusted.1).sqrt();
        assert!(magnitude <= APF_MAX_ADJUSTMENT + 1e-9);
    }

    #[test]
    fn disabled_layer_passes_resolved_targets_through() {
        let context = ControllerContext::new();
        context.toggles.apf_enabled.store(false, Ordering::Relaxed);
        context.agent_resolved_target_store.update(0, Pose2D::new(3.0, 4.0, 0.0));
        tick(&context);
        assert_eq!(
            context.agent_adjusted_target_store.get(&0),
            Some(Pose2D::new(3.0, 4.0, 0.0))
        );
    }

    #[test]
    fn no_pose_yet_passes_target_through_unadjusted() {
        let context = ControllerContext::new();
        context.agent_resolved_target_store.update(0, Pose2D::new(1.0, 1.0, 0.0));
        tick(&context);
        assert_eq!(
            context.agent_adjusted_target_store.get(&0),
            Some(Pose2D::new(1.0, 1.0, 0.0))
        );
    }
}
