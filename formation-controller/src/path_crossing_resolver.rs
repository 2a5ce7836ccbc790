//! PathCrossingResolver — detects and resolves path-crossing conflicts
//! between raw agent targets using a priority-based wait strategy (lower id
//! wins). Grounded near-verbatim on `path_crossing_resolver.py`: the same
//! three conflict checks (proximity, path intersection, target proximity),
//! the same min-id-priority / max-id-waits rule, and the same hysteresis —
//! a conflict, once active, stays active until the waiting robot is
//! sufficiently close to the target it was given before the conflict.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::{
    Pose2D, PCR_CLEAR_MARGIN, PCR_COLLISION_RADIUS, PCR_ROBOT_SPEED_MAX, PCR_ROBOT_SPEED_MIN,
    PCR_TIME_WINDOW, SEGMENT_PARALLEL_EPS,
};
use tracing::info;

use crate::context::ControllerContext;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathConflict {
    pub robot_a: u32,
    pub robot_b: u32,
}

fn distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    ((p2.0 - p1.0).powi(2) + (p2.1 - p1.1).powi(2)).sqrt()
}

/// Segment `p1->t1` vs `p2->t2`, via the same parametric cross-product test
/// as the original; `None` for parallel/collinear or non-overlapping segments.
fn segments_intersect(p1: (f64, f64), t1: (f64, f64), p2: (f64, f64), t2: (f64, f64)) -> Option<(f64, f64)> {
    let d1 = (t1.0 - p1.0, t1.1 - p1.1);
    let d2 = (t2.0 - p2.0, t2.1 - p2.1);
    let cross = d1.0 * d2.1 - d1.1 * d2.0;
    if cross.abs() < SEGMENT_PARALLEL_EPS {
        return None;
    }
    let dp = (p2.0 - p1.0, p2.1 - p1.1);
    let t = (dp.0 * d2.1 - dp.1 * d2.0) / cross;
    let u = (dp.0 * d1.1 - dp.1 * d1.0) / cross;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((p1.0 + t * d1.0, p1.1 + t * d1.1))
    } else {
        None
    }
}

fn calculate_speed(dist_to_target: f64) -> f64 {
    dist_to_target.clamp(PCR_ROBOT_SPEED_MIN, PCR_ROBOT_SPEED_MAX)
}

fn estimate_time_to_point(current: (f64, f64), target: (f64, f64), final_target: (f64, f64)) -> f64 {
    let dist_to_point = distance(current, target);
    let dist_to_final = distance(current, final_target);
    let speed = calculate_speed(dist_to_final);
    if speed <= 0.0 {
        f64::INFINITY
    } else {
        dist_to_point / speed
    }
}

pub fn detect_conflicts(
    targets: &HashMap<u32, Pose2D>,
    poses: &HashMap<u32, Option<Pose2D>>,
) -> Vec<PathConflict> {
    let mut conflicts = Vec::new();
    let mut robot_ids: Vec<u32> = targets.keys().copied().collect();
    robot_ids.sort_unstable();

    for (i, &robot_a) in robot_ids.iter().enumerate() {
        for &robot_b in &robot_ids[i + 1..] {
            let (Some(target_a), Some(target_b)) = (targets.get(&robot_a), targets.get(&robot_b)) else {
                continue;
            };
            let (Some(Some(pose_a)), Some(Some(pose_b))) = (poses.get(&robot_a), poses.get(&robot_b)) else {
                continue;
            };

            let p1 = (pose_a.x, pose_a.y);
            let t1 = (target_a.x, target_a.y);
            let p2 = (pose_b.x, pose_b.y);
            let t2 = (target_b.x, target_b.y);

            if distance(p1, p2) < PCR_COLLISION_RADIUS {
                conflicts.push(PathConflict { robot_a, robot_b });
                continue;
            }

            if let Some(intersection) = segments_intersect(p1, t1, p2, t2) {
                let time_a = estimate_time_to_point(p1, intersection, t1);
                let time_b = estimate_time_to_point(p2, intersection, t2);
                if (time_a - time_b).abs() < PCR_TIME_WINDOW {
                    conflicts.push(PathConflict { robot_a, robot_b });
                }
            } else if distance(t1, t2) < PCR_COLLISION_RADIUS {
                conflicts.push(PathConflict { robot_a, robot_b });
            }
        }
    }

    conflicts
}

/// Apply the wait strategy and advance hysteresis state in place.
pub fn resolve_conflicts(
    targets: &HashMap<u32, Pose2D>,
    poses: &HashMap<u32, Option<Pose2D>>,
    conflicts: &[PathConflict],
    active_conflicts: &mut HashSet<(u32, u32)>,
) -> HashMap<u32, Pose2D> {
    let mut resolved = targets.clone();
    let mut waiting_robots: HashSet<u32> = HashSet::new();

    let current_pairs: HashSet<(u32, u32)> = conflicts
        .iter()
        .map(|c| (c.robot_a.min(c.robot_b), c.robot_a.max(c.robot_b)))
        .collect();

    for &pair in &current_pairs {
        waiting_robots.insert(pair.1);
    }

    for &pair in current_pairs.difference(active_conflicts) {
        info!("path_crossing_resolver: conflict detected between {} and {}", pair.0, pair.1);
    }
    active_conflicts.extend(&current_pairs);

    let mut cleared = HashSet::new();
    for &pair in active_conflicts.iter() {
        if current_pairs.contains(&pair) {
            continue;
        }
        let (robot_a, robot_b) = pair;
        if let (Some(Some(pose_a)), Some(Some(_pose_b)), Some(target_a)) =
            (poses.get(&robot_a), poses.get(&robot_b), targets.get(&robot_a))
        {
            let dist_to_target = distance((pose_a.x, pose_a.y), (target_a.x, target_a.y));
            if dist_to_target < PCR_COLLISION_RADIUS * PCR_CLEAR_MARGIN {
                cleared.insert(pair);
                info!("path_crossing_resolver: conflict cleared between {} and {}", pair.0, pair.1);
            }
        }
    }
    for pair in &cleared {
        active_conflicts.remove(pair);
    }

    for &pair in active_conflicts.iter() {
        waiting_robots.insert(pair.0.max(pair.1));
    }

    for robot_id in waiting_robots {
        if let Some(Some(pose)) = poses.get(&robot_id) {
            resolved.insert(robot_id, *pose);
        }
    }

    resolved
}

pub struct PathCrossingResolver {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PathCrossingResolver {
    pub fn spawn(context: Arc<ControllerContext>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            info!("path_crossing_resolver: running");
            let mut active_conflicts = HashSet::new();
            while !stop_flag.load(Ordering::Relaxed) {
                tick(&context, &mut active_conflicts);
                std::thread::sleep(period);
            }
            info!("path_crossing_resolver: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

pub fn tick(context: &ControllerContext, active_conflicts: &mut HashSet<(u32, u32)>) {
    let raw_targets = context.agent_target_store.get_all();
    let current_poses = context.agent_pose_store.get_all();

    let enabled = context.toggles.path_crossing_enabled.load(Ordering::Relaxed);
    if !enabled {
        active_conflicts.clear();
        context.agent_resolved_target_store.update_batch(raw_targets);
        return;
    }

    if raw_targets.is_empty() || current_poses.is_empty() {
        context.agent_resolved_target_store.update_batch(raw_targets);
        return;
    }

    let conflicts = detect_conflicts(&raw_targets, &current_poses);
    let resolved = resolve_conflicts(&raw_targets, &current_poses, &conflicts, active_conflicts);
    context.agent_resolved_target_store.update_batch(resolved);
}
