//! ConfigurationManager — guards `(command_type, shape, target_pose)` with a
//! lock and applies operator commands atomically. Event-driven, not
//! periodic, grounded on `configuration_manager.py` /
//! `models/configuration_message.py`: the original dispatches on
//! `CommandType::Configure` (adopt shape+target) vs `CommandType::Move`
//! (keep shape, adopt target only).

use std::sync::Arc;

use formation_types::{CommandType, ConfigurationMessage, Pose2D};
use tracing::warn;

use crate::context::{ControllerContext, CurrentConfig};

/// Applies an operator command to the shared config, rejecting malformed
/// input (non-finite target fields) per the error-handling taxonomy (7c):
/// reject, log, do not mutate.
pub fn update_configuration(context: &ControllerContext, message: ConfigurationMessage) {
    if !is_finite_pose(&message.target) {
        warn!("configuration_manager: rejecting non-finite target pose {:?}", message.target);
        return;
    }

    let mut current = context.current_config.write().expect("config lock poisoned");
    match message.command {
        CommandType::Configure => {
            if let Some(shape) = message.shape {
                current.shape = shape;
            }
            current.target = message.target;
        }
        CommandType::Move => {
            current.target = message.target;
        }
    }
}

fn is_finite_pose(pose: &Pose2D) -> bool {
    pose.x.is_finite() && pose.y.is_finite() && pose.theta.is_finite()
}

pub fn get_current_config(context: &ControllerContext) -> CurrentConfig {
    context.current_config.read().expect("config lock poisoned").clone()
}

pub fn context_new_for_tests() -> Arc<ControllerContext> {
    ControllerContext::new()
}
