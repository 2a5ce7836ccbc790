//! Observer — pulls frames, undistorts, detects markers, publishes raw
//! detections. Grounded on `capture/observer.py` for the stage shape, and on
//! `uwb_hub.rs`'s UDP ingest (bind, `recv_from`, parse-and-log-on-failure,
//! never panic on a malformed packet) for the synthetic/dev-mode input path.
//!
//! Frame capture and marker-corner detection are the one genuinely
//! out-of-scope external dependency in this pipeline (section 1): real
//! hardware requires a camera driver and a fiducial-detection library this
//! crate does not ship. The `FrameSource` trait is the seam; `NullFrameSource`
//! is what runs when no such backend is wired in, and `SyntheticFrameSource`
//! is the dev/test stand-in used with `formation-sim`.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::MarkerDetection;
use tracing::{info, warn};

use crate::calibration::CameraCalibration;
use crate::context::{ControllerContext, FrameData};

pub trait FrameSource: Send {
    /// Returns the latest frame's marker detections, or `None` if no frame
    /// is ready yet / the source has nothing new to report this poll.
    fn poll(&mut self) -> Option<Vec<MarkerDetection>>;
}

/// No hardware wired in. Logs once, then reports nothing forever — the
/// pipeline keeps running (every other stage tolerates an empty pose store),
/// it simply never sees a detection.
pub struct NullFrameSource {
    warned: bool,
}

impl NullFrameSource {
    pub fn new() -> Self {
        Self { warned: false }
    }
}

impl FrameSource for NullFrameSource {
    fn poll(&mut self) -> Option<Vec<MarkerDetection>> {
        if !self.warned {
            warn!("observer: no camera/marker-detection backend configured — no hardware, ignoring");
            self.warned = true;
        }
        None
    }
}

/// Reads marker detections from a loopback UDP socket as JSON frames, the
/// way `formation-sim` publishes them. Bind failure is logged, not fatal —
/// the controller still runs, it just never receives synthetic frames.
pub struct SyntheticFrameSource {
    socket: Option<UdpSocket>,
}

impl SyntheticFrameSource {
    pub fn bind(addr: &str) -> Self {
        match UdpSocket::bind(addr) {
            Ok(socket) => {
                socket.set_nonblocking(true).ok();
                info!("observer: synthetic frame source listening on {addr}");
                Self { socket: Some(socket) }
            }
            Err(e) => {
                warn!("observer: failed to bind synthetic frame source on {addr}: {e} — no hardware, ignoring");
                Self { socket: None }
            }
        }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn poll(&mut self) -> Option<Vec<MarkerDetection>> {
        let socket = self.socket.as_ref()?;
        let mut buf = [0u8; 8192];
        let mut latest = None;
        // Drain the socket so the newest frame wins if several queued up.
        loop {
            match socket.recv_from(&mut buf) {
                Ok((n, _)) => match serde_json::from_slice::<Vec<MarkerDetection>>(&buf[..n]) {
                    Ok(frame) => latest = Some(frame),
                    Err(e) => {
                        warn!("observer: malformed synthetic frame packet, dropping: {e}");
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("observer: synthetic frame socket read error: {e}");
                    break;
                }
            }
        }
        latest
    }
}

pub struct Observer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Observer {
    pub fn spawn(
        context: Arc<ControllerContext>,
        _calibration: CameraCalibration,
        mut source: Box<dyn FrameSource>,
        period: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::spawn(move || {
            info!("observer: running");
            while !stop_flag.load(Ordering::Relaxed) {
                if let Some(detections) = source.poll() {
                    context.frame_data_store.update(FrameData { detections });
                }
                std::thread::sleep(period);
            }
            info!("observer: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}
