//! The shared owner of every store. Every stage holds only an `Arc` clone of
//! the context; no store is reachable except through it, and no store ever
//! references another directly — stages are glued exclusively by the
//! context, matching `stores/controller_context.py`.

use std::sync::{Arc, Mutex, RwLock};

use formation_types::{FormationDescriptor, MarkerDetection, Pose2D};

use crate::stores::{MapStore, ValueStore};

/// Raw per-frame detections from the (out-of-scope) fiducial detector.
#[derive(Debug, Clone, Default)]
pub struct FrameData {
    pub detections: Vec<MarkerDetection>,
}

/// The mutable parts of the operator command the GUI would otherwise drive:
/// the active shape and target pose, guarded together so a reader never sees
/// a shape paired with a target from a different command (see
/// `ConfigurationManager`).
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConfig {
    pub shape: formation_types::Shape,
    pub target: Pose2D,
}

impl Default for CurrentConfig {
    fn default() -> Self {
        Self {
            shape: formation_types::Shape::Line,
            target: Pose2D::default(),
        }
    }
}

/// Runtime feature toggles, mutated from the CLI/config and by the local
/// control surface; read by the stages they gate.
pub struct Toggles {
    pub path_crossing_enabled: std::sync::atomic::AtomicBool,
    pub apf_enabled: std::sync::atomic::AtomicBool,
    pub safety_stop_enabled: std::sync::atomic::AtomicBool,
}

impl Default for Toggles {
    fn default() -> Self {
        use std::sync::atomic::AtomicBool;
        Self {
            path_crossing_enabled: AtomicBool::new(true),
            apf_enabled: AtomicBool::new(true),
            safety_stop_enabled: AtomicBool::new(true),
        }
    }
}

pub struct ControllerContext {
    pub frame_data_store: ValueStore<FrameData>,
    pub agent_pose_store: MapStore<u32, Option<Pose2D>>,
    pub formation_state_store: ValueStore<FormationDescriptor>,
    pub link_pose_store: MapStore<usize, Pose2D>,
    pub agent_target_store: MapStore<u32, Pose2D>,
    pub agent_resolved_target_store: MapStore<u32, Pose2D>,
    pub agent_adjusted_target_store: MapStore<u32, Pose2D>,

    pub current_config: RwLock<CurrentConfig>,
    pub toggles: Toggles,
    /// The serial port name PositionUpdater should be bound to; mutated by
    /// the control surface to trigger a reconnect (S6).
    pub port: Mutex<Option<String>>,
}

impl ControllerContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            frame_data_store: ValueStore::new(),
            agent_pose_store: MapStore::new(),
            formation_state_store: ValueStore::new(),
            link_pose_store: MapStore::new(),
            agent_target_store: MapStore::new(),
            agent_resolved_target_store: MapStore::new(),
            agent_adjusted_target_store: MapStore::new(),
            current_config: RwLock::new(CurrentConfig::default()),
            toggles: Toggles::default(),
            port: Mutex::new(None),
        })
    }
}
