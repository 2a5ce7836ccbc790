//! UDP transmitter for synthetic marker-detection frames.
//!
//! Sends one JSON-encoded `Vec<MarkerDetection>` per simulation tick to a
//! single unicast target — the controller's `SyntheticFrameSource`. Grounded
//! on the teacher's `udp_tx.rs`: a plain unconnected socket, one send call
//! per frame, and serialize/send failures logged and skipped rather than
//! panicking. Multicast relay is dropped: this is a loopback development
//! source feeding exactly one listener, not a radio-network simulation with
//! a relay fan-out (see DESIGN.md).

use std::net::UdpSocket;
use tracing::warn;

use formation_types::MarkerDetection;

pub struct UdpTransmitter {
    socket: UdpSocket,
    target_addr: String,
}

impl UdpTransmitter {
    pub fn new(target_addr: &str) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket, target_addr: target_addr.to_string() })
    }

    /// Send one frame's worth of detections. Errors are logged and the frame
    /// is dropped; the next tick tries again.
    pub fn send_frame(&self, detections: &[MarkerDetection]) {
        let bytes = match serde_json::to_vec(detections) {
            Ok(b) => b,
            Err(e) => {
                warn!("udp_tx: serialize failed: {e}");
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&bytes, &self.target_addr) {
            warn!("udp_tx: send to {} failed: {e}", self.target_addr);
        }
    }
}
