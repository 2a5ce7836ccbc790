//! Camera calibration loading.
//!
//! The calibration artifact is whatever the legacy calibration script
//! produces: a Numpy `.npz` (a zip of `.npy` arrays) with two named arrays,
//! `camera_matrix` (3x3) and `dist_coeffs` (1x5). Loading it here with
//! `ndarray`/`ndarray-npy` means an operator's existing calibration file
//! loads unmodified — no format migration, no bespoke parser.
//!
//! Unlike the rest of the config layer, a missing calibration file is fatal
//! for the Observer specifically (spec section 4.1/6): there is no safe
//! default camera matrix to fall back to.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use ndarray_npy::NpzReader;

use crate::error::CalibrationError;

#[derive(Debug, Clone)]
pub struct CameraCalibration {
    /// Row-major 3x3 intrinsic matrix.
    pub camera_matrix: [[f64; 3]; 3],
    /// Five distortion coefficients (k1, k2, p1, p2, k3).
    pub dist_coeffs: [f64; 5],
}

pub fn load(path: &Path) -> Result<CameraCalibration, CalibrationError> {
    if !path.exists() {
        return Err(CalibrationError::NotFound(PathBuf::from(path)));
    }
    let file = std::fs::File::open(path)?;
    let mut npz = NpzReader::new(file).map_err(|_| CalibrationError::MissingArray("camera_matrix"))?;

    let camera_matrix: Array2<f64> = npz
        .by_name("camera_matrix.npy")
        .map_err(|_| CalibrationError::MissingArray("camera_matrix"))?;
    let dist_coeffs: Array2<f64> = npz
        .by_name("dist_coeffs.npy")
        .map_err(|_| CalibrationError::MissingArray("dist_coeffs"))?;

    if camera_matrix.shape() != [3, 3] {
        return Err(CalibrationError::BadShape("camera_matrix", camera_matrix.shape().to_vec()));
    }
    if dist_coeffs.len() != 5 {
        return Err(CalibrationError::BadShape("dist_coeffs", dist_coeffs.shape().to_vec()));
    }

    let mut m = [[0.0; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            m[r][c] = camera_matrix[[r, c]];
        }
    }
    let mut d = [0.0; 5];
    let flat: Vec<f64> = dist_coeffs.iter().copied().collect();
    d.copy_from_slice(&flat[..5]);

    Ok(CameraCalibration { camera_matrix: m, dist_coeffs: d })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_typed_error_not_a_panic() {
        let result = load(Path::new("/nonexistent/calibration_data_latest.npz"));
        assert!(matches!(result, Err(CalibrationError::NotFound(_))));
    }
}
