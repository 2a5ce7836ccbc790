//! Library surface for the formation controller: every stage module plus
//! the shared context/stores/config/calibration/error types, so both the
//! binary and the integration tests drive the same code.

pub mod apf;
pub mod calibration;
pub mod config;
pub mod configuration_manager;
pub mod context;
pub mod error;
pub mod formation_dispatcher;
pub mod frame_analyzer;
pub mod global_supervisor;
pub mod link_controller;
pub mod observer;
pub mod path_crossing_resolver;
pub mod position_updater;
pub mod stores;
