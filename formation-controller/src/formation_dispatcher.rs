//! FormationDispatcher — at 2 Hz, walks the homogeneous-transform chain from
//! the formation descriptor to a `Pose2D` per link. Grounded on
//! `formation_dispatcher.py`'s numpy 3x3 chain (`X_{i+1} = X_i . R(theta_i) .
//! T(m_i . L)`, ported to `formation_types::Transform2D`) and on
//! `boat_sim.rs`'s convention of hand-rolling this kind of fixed-size
//! transform math rather than reaching for a linear-algebra crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::{FormationDescriptor, Pose2D, Transform2D, LINK_LENGTH, NUM_LINKS};
use tracing::info;

use crate::context::ControllerContext;

pub struct FormationDispatcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl FormationDispatcher {
    pub fn spawn(context: Arc<ControllerContext>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            info!("formation_dispatcher: running");
            while !stop_flag.load(Ordering::Relaxed) {
                tick(&context);
                std::thread::sleep(period);
            }
            info!("formation_dispatcher: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

/// Walk the chain for one descriptor, returning one `Pose2D` per link index.
pub fn dispatch(descriptor: &FormationDescriptor) -> [Pose2D; NUM_LINKS] {
    let mut x = Transform2D::translation(descriptor.r_d.0, descriptor.r_d.1)
        .compose(&Transform2D::rotation(descriptor.q_d));

    let mut orientation = descriptor.q_d;
    let mut poses = [Pose2D::default(); NUM_LINKS];

    for i in 0..NUM_LINKS {
        let link_length = descriptor.link_multipliers[i] * LINK_LENGTH;
        x = x
            .compose(&Transform2D::rotation(descriptor.theta_d[i]))
            .compose(&Transform2D::translation_x(link_length));
        orientation += descriptor.theta_d[i];

        let (px, py) = x.translation_part();
        poses[i] = Pose2D::new(px, py, orientation);
    }

    poses
}

pub fn tick(context: &ControllerContext) {
    let Some(descriptor) = context.formation_state_store.get() else {
        return;
    };
    let poses = dispatch(&descriptor);
    for (i, pose) in poses.into_iter().enumerate() {
        context.link_pose_store.update(i, pose);
    }
}
