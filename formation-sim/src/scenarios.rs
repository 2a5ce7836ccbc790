//! Injectable fault scenarios for the synthetic frame generator. Each tests
//! a specific real-world failure mode the observer/analyzer pipeline has to
//! tolerate. Grounded on the teacher's `ScenarioType`/`ScenarioConfig`
//! pattern (a closed enum of fault kinds, an `active: Vec<ScenarioType>` set,
//! and per-scenario query methods) with the fault kinds themselves replaced
//! for this domain: occlusion, sensor jitter, and an unrecognized marker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioType {
    /// Periodically occlude one or more marker ids (camera line-of-sight loss).
    MarkerDropout,
    /// Add pixel-space Gaussian noise to detected corners (vibration, motion blur).
    HighJitter,
    /// Emit one extra detection with an id outside the known set (false positive / stray tag).
    UnknownIntruder,
    /// One robot's marker stops moving entirely (stuck drivetrain).
    FrozenRobot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub active: Vec<ScenarioType>,
    pub dropout_ids: Vec<u32>,
    pub dropout_duration_frames: u32,
    pub jitter_px: f64,
    pub intruder_id: u32,
    pub frozen_ids: Vec<u32>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            active: vec![],
            dropout_ids: vec![],
            dropout_duration_frames: 15,
            jitter_px: 2.0,
            intruder_id: 99,
            frozen_ids: vec![],
        }
    }
}

impl ScenarioConfig {
    pub fn has(&self, s: ScenarioType) -> bool {
        self.active.contains(&s)
    }

    /// True if `id` should be omitted from this frame's detections.
    pub fn is_marker_dropped(&self, id: u32, frame_counter: u32) -> bool {
        if !self.has(ScenarioType::MarkerDropout) || !self.dropout_ids.contains(&id) {
            return false;
        }
        frame_counter % (self.dropout_duration_frames + 20) < self.dropout_duration_frames
    }

    pub fn jitter_sigma_px(&self) -> f64 {
        if self.has(ScenarioType::HighJitter) { self.jitter_px } else { 0.0 }
    }

    pub fn is_frozen(&self, id: u32) -> bool {
        self.has(ScenarioType::FrozenRobot) && self.frozen_ids.contains(&id)
    }
}

pub fn preset_marker_dropout(ids: &[u32]) -> ScenarioConfig {
    ScenarioConfig {
        active: vec![ScenarioType::MarkerDropout],
        dropout_ids: ids.to_vec(),
        ..Default::default()
    }
}

pub fn preset_high_jitter() -> ScenarioConfig {
    ScenarioConfig { active: vec![ScenarioType::HighJitter], jitter_px: 4.0, ..Default::default() }
}

pub fn preset_unknown_intruder() -> ScenarioConfig {
    ScenarioConfig { active: vec![ScenarioType::UnknownIntruder], ..Default::default() }
}

pub fn preset_frozen_robot(ids: &[u32]) -> ScenarioConfig {
    ScenarioConfig { active: vec![ScenarioType::FrozenRobot], frozen_ids: ids.to_vec(), ..Default::default() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropout_only_applies_to_configured_ids() {
        let cfg = preset_marker_dropout(&[2]);
        assert!(cfg.is_marker_dropped(2, 0));
        assert!(!cfg.is_marker_dropped(3, 0));
    }

    #[test]
    fn dropout_recovers_after_its_window() {
        let cfg = preset_marker_dropout(&[2]);
        assert!(cfg.is_marker_dropped(2, 0));
        assert!(!cfg.is_marker_dropped(2, cfg.dropout_duration_frames + 1));
    }

    #[test]
    fn jitter_is_zero_when_scenario_inactive() {
        let cfg = ScenarioConfig::default();
        assert_eq!(cfg.jitter_sigma_px(), 0.0);
    }

    #[test]
    fn frozen_only_applies_to_configured_ids() {
        let cfg = preset_frozen_robot(&[1]);
        assert!(cfg.is_frozen(1));
        assert!(!cfg.is_frozen(2));
    }
}
