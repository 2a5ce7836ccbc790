//! LinkController — one worker per formation link, mapping that link's
//! published pose plus each assigned agent's fixed nominal offset into a raw
//! per-agent target. Grounded near-verbatim on `link_controller.py`'s
//! `link_agent_map` / `nominal_offsets` tables and its
//! `X_F @ [offset_x, offset_y, 1]` homogeneous-point application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::{Pose2D, Transform2D, LINK_AGENT_MAP, NOMINAL_OFFSETS};
use tracing::info;

use crate::context::ControllerContext;

pub struct LinkController {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl LinkController {
    pub fn spawn(context: Arc<ControllerContext>, link_id: usize, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            info!("link_controller[{link_id}]: running");
            while !stop_flag.load(Ordering::Relaxed) {
                tick(&context, link_id);
                std::thread::sleep(period);
            }
            info!("link_controller[{link_id}]: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

pub fn tick(context: &ControllerContext, link_id: usize) {
    let Some(link_pose) = context.link_pose_store.get(&link_id) else {
        return;
    };
    let agent_ids = LINK_AGENT_MAP[link_id];
    if agent_ids.is_empty() {
        return;
    }

    let x_f = Transform2D::translation(link_pose.x, link_pose.y).compose(&Transform2D::rotation(link_pose.theta));

    let mut targets = std::collections::HashMap::new();
    for &agent_id in agent_ids {
        let offset = NOMINAL_OFFSETS[agent_id as usize];
        let (x, y) = x_f.apply_point(offset.0, offset.1);
        targets.insert(agent_id, Pose2D::new(x, y, 0.0));
    }
    context.agent_target_store.update_batch(targets);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn zero_offset_agent_lands_on_link_origin() {
        let context = ControllerContext::new();
        context.link_pose_store.update(0, Pose2D::new(2.0, 3.0, FRAC_PI_2));
        tick(&context, 0);
        let target = context.agent_target_store.get(&0).unwrap();
        assert!((target.x - 2.0).abs() < 1e-9);
        assert!((target.y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn shared_link_frame_distinguishes_agents_by_offset() {
        let context = ControllerContext::new();
        context.link_pose_store.update(1, Pose2D::new(0.0, 0.0, 0.0));
        tick(&context, 1);
        let agent1 = context.agent_target_store.get(&1).unwrap();
        let agent2 = context.agent_target_store.get(&2).unwrap();
        assert_eq!(agent1, Pose2D::new(0.0, 0.0, 0.0));
        assert_eq!(agent2, Pose2D::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn idle_when_link_pose_not_yet_published() {
        let context = ControllerContext::new();
        tick(&context, 2);
        assert!(context.agent_target_store.get_all().is_empty());
    }

    #[test]
    fn unassigned_link_publishes_nothing() {
        let context = ControllerContext::new();
        context.link_pose_store.update(3, Pose2D::new(5.0, 5.0, 0.0));
        tick(&context, 3);
        assert!(context.agent_target_store.get_all().is_empty());
    }
}
