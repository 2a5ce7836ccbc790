//! GlobalSupervisor — at 10 Hz, turns the current command into a
//! `FormationDescriptor`. Grounded on `global_supervisor.py`'s shape-table
//! lookup (here a closed enum match, per the redesign flag, rather than the
//! original's open string dispatch) and on `procedure_engine.rs`'s
//! periodic-tick shape: read state, compute, publish, nothing retained
//! across cycles beyond what the stores hold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::FormationDescriptor;
use tracing::info;

use crate::configuration_manager::get_current_config;
use crate::context::ControllerContext;

pub struct GlobalSupervisor {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl GlobalSupervisor {
    pub fn spawn(context: Arc<ControllerContext>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            info!("global_supervisor: running");
            while !stop_flag.load(Ordering::Relaxed) {
                tick(&context);
                std::thread::sleep(period);
            }
            info!("global_supervisor: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

pub fn tick(context: &ControllerContext) {
    let config = get_current_config(context);
    let params = config.shape.params();

    let descriptor = FormationDescriptor {
        r_d: (config.target.x, config.target.y),
        q_d: config.target.theta,
        theta_d: params.theta_d,
        link_multipliers: params.link_multipliers,
    };

    context.formation_state_store.update(descriptor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use formation_types::{CommandType, ConfigurationMessage, Pose2D, Shape, NUM_LINKS};

    #[test]
    fn published_descriptor_arrays_match_num_links() {
        let context = ControllerContext::new();
        crate::configuration_manager::update_configuration(
            &context,
            ConfigurationMessage {
                command: CommandType::Configure,
                shape: Some(Shape::Square),
                target: Pose2D::new(1.0, 1.0, 0.0),
            },
        );
        tick(&context);
        let descriptor = context.formation_state_store.get().unwrap();
        assert_eq!(descriptor.theta_d.len(), NUM_LINKS);
        assert_eq!(descriptor.link_multipliers.len(), NUM_LINKS);
        assert_eq!(descriptor.r_d, (1.0, 1.0));
    }
}
