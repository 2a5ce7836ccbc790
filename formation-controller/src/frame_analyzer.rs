//! FrameAnalyzer — per-marker pose estimation.
//!
//! Grounded on `capture/frame_analyzer.py`: read the latest `(ids, corners)`,
//! mark absent known ids `None`, and estimate `(x, y, yaw)` for present ones
//! via `Rodrigues(rvec) -> atan2(R[1,0], R[0,0])`. The original farms this out
//! across a `ThreadPoolExecutor`; here it is `rayon`'s bounded pool, the
//! idiomatic Rust equivalent for independent per-item CPU work over a slice
//! (see DESIGN.md — no pack example covers a bounded worker pool, so this is
//! drawn from general ecosystem convention rather than the teacher).
//!
//! Pose estimation itself (out of the detector's scope — corners in, pose
//! out) assumes what the Design Notes call out explicitly: the marker plane
//! is parallel to the camera. For this application (an overhead camera
//! looking straight down at ground robots) that is the operating
//! assumption, not an approximation of convenience, so rvec reduces to a
//! pure rotation about the camera's optical axis: `(0, 0, yaw)`. Depth is
//! recovered from the marker's apparent size in normalized image
//! coordinates (a small-angle similar-triangles estimate), and `(x, y)` from
//! the marker center scaled by that depth — the planar analogue of
//! `cv2.aruco.estimatePoseSingleMarkers` for this fixed camera geometry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::{Pose2D, KNOWN_AGENT_IDS};
use rayon::prelude::*;
use tracing::info;

use crate::calibration::CameraCalibration;
use crate::context::ControllerContext;

/// Expand a pure-yaw rotation vector the way `cv2.Rodrigues` would for
/// `rvec = (0, 0, yaw)`, then recover yaw via `atan2(R[1,0], R[0,0])` — the
/// exact construction/extraction pair the original algorithm uses, made
/// explicit here since our rvec is already known to be z-axis-only.
fn yaw_via_rodrigues_roundtrip(yaw: f64) -> f64 {
    let (s, c) = yaw.sin_cos();
    let r10 = s;
    let r00 = c;
    r10.atan2(r00)
}

/// Estimate one marker's 2D pose from its four pixel-space corners and the
/// camera intrinsics, assuming the marker plane is parallel to the camera.
pub fn estimate_pose(
    corners: &[[f64; 2]; 4],
    calibration: &CameraCalibration,
    marker_length: f64,
) -> Pose2D {
    let fx = calibration.camera_matrix[0][0];
    let fy = calibration.camera_matrix[1][1];
    let cx = calibration.camera_matrix[0][2];
    let cy = calibration.camera_matrix[1][2];

    let normalized: Vec<(f64, f64)> = corners
        .iter()
        .map(|p| ((p[0] - cx) / fx, (p[1] - cy) / fy))
        .collect();

    let center = {
        let sx: f64 = normalized.iter().map(|p| p.0).sum();
        let sy: f64 = normalized.iter().map(|p| p.1).sum();
        (sx / 4.0, sy / 4.0)
    };

    // Average the four edge lengths in normalized coordinates as the
    // apparent side length, then invert the pinhole similar-triangles
    // relation (apparent_size ~= physical_size / depth) for Z.
    let mut side_sum = 0.0;
    for i in 0..4 {
        let a = normalized[i];
        let b = normalized[(i + 1) % 4];
        side_sum += ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
    }
    let apparent_side = (side_sum / 4.0).max(1e-9);
    let depth = marker_length / apparent_side;

    let x = center.0 * depth;
    let y = center.1 * depth;

    let edge = (normalized[1].0 - normalized[0].0, normalized[1].1 - normalized[0].1);
    let yaw = edge.1.atan2(edge.0);
    let yaw = yaw_via_rodrigues_roundtrip(yaw);

    Pose2D::new(x, y, yaw)
}

pub struct FrameAnalyzer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl FrameAnalyzer {
    pub fn spawn(context: Arc<ControllerContext>, calibration: CameraCalibration, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            info!("frame_analyzer: running");
            while !stop_flag.load(Ordering::Relaxed) {
                run_once(&context, &calibration);
                std::thread::sleep(period);
            }
            info!("frame_analyzer: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

pub fn run_once(context: &ControllerContext, calibration: &CameraCalibration) {
    let frame = context.frame_data_store.get();

    let detections = match frame {
        Some(f) if !f.detections.is_empty() => f.detections,
        _ => {
            for id in KNOWN_AGENT_IDS {
                context.agent_pose_store.update(id, None);
            }
            return;
        }
    };

    let seen: std::collections::HashSet<u32> = detections.iter().map(|d| d.id).collect();
    for id in KNOWN_AGENT_IDS {
        if !seen.contains(&id) {
            context.agent_pose_store.update(id, None);
        }
    }

    // Unknown ids present in the frame are ignored (boundary behavior).
    let known: Vec<_> = detections.into_iter().filter(|d| KNOWN_AGENT_IDS.contains(&d.id)).collect();

    let poses: HashMap<u32, Option<Pose2D>> = known
        .par_iter()
        .map(|d| (d.id, Some(estimate_pose(&d.corners, calibration, formation_types::MARKER_LENGTH))))
        .collect();

    context.agent_pose_store.update_batch(poses);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_calibration() -> CameraCalibration {
        CameraCalibration {
            camera_matrix: [[800.0, 0.0, 640.0], [0.0, 800.0, 360.0], [0.0, 0.0, 1.0]],
            dist_coeffs: [0.0; 5],
        }
    }

    #[test]
    fn centered_unrotated_marker_yields_near_zero_yaw() {
        let cal = identity_calibration();
        // A square centered at the principal point, top-left / top-right /
        // bottom-right / bottom-left order, axis-aligned.
        let half = 40.0;
        let corners = [
            [640.0 - half, 360.0 - half],
            [640.0 + half, 360.0 - half],
            [640.0 + half, 360.0 + half],
            [640.0 - half, 360.0 + half],
        ];
        let pose = estimate_pose(&corners, &cal, 0.12);
        assert!(pose.x.abs() < 1e-6);
        assert!(pose.y.abs() < 1e-6);
        assert!(pose.theta.abs() < 1e-9);
    }

    #[test]
    fn unknown_id_is_ignored_known_ids_default_to_none() {
        let context = crate::context::ControllerContext::new();
        let cal = identity_calibration();
        context.frame_data_store.update(crate::context::FrameData {
            detections: vec![formation_types::MarkerDetection { id: 99, corners: [[0.0, 0.0]; 4] }],
        });
        run_once(&context, &cal);
        for id in KNOWN_AGENT_IDS {
            assert_eq!(context.agent_pose_store.get(&id), Some(None));
        }
    }

    #[test]
    fn empty_frame_marks_all_known_ids_none() {
        let context = crate::context::ControllerContext::new();
        let cal = identity_calibration();
        context.frame_data_store.update(crate::context::FrameData { detections: vec![] });
        run_once(&context, &cal);
        for id in KNOWN_AGENT_IDS {
            assert_eq!(context.agent_pose_store.get(&id), Some(None));
        }
    }
}
