//! PositionUpdater — the only stage that touches the serial port. At 20 Hz,
//! snapshots poses and adjusted targets and emits one newline-terminated
//! ASCII record per known agent. Grounded on `position_updater.py`'s
//! port-change/reopen-on-failure loop, generalized from its single hardcoded
//! port to the reconnect-on-`context.port`-change behavior the original
//! already describes, and on `udp_tx.rs`'s log-and-continue error policy for
//! send failures.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use formation_types::{Pose2D, KNOWN_AGENT_IDS};
use tracing::{info, warn};

use crate::context::ControllerContext;
use crate::error::SerialError;

const BAUD_RATE: u32 = 115_200;

/// One outbound record: the hold/unknown-pose form when `pose` is `None`.
fn format_record(id: u32, pose: Option<Pose2D>, target: Pose2D) -> String {
    match pose {
        None => format!("0,{id},0,0,0,0,0\n"),
        Some(p) => format!(
            "1,{id},{:.3},{:.3},{:.3},{:.3},{:.3}\n",
            p.x, p.y, p.theta, target.x, target.y
        ),
    }
}

/// Build every known agent's record for one cycle. Safety-stop forces the
/// hold form for every agent whose pose is unknown, which is already the
/// behavior `format_record` gives a `None` pose — this flag exists so a
/// caller can additionally force holds for *known* poses, per 5's latch
/// semantics layered on top of the per-record pose check.
pub fn build_records(
    poses: &std::collections::HashMap<u32, Option<Pose2D>>,
    targets: &std::collections::HashMap<u32, Pose2D>,
    safety_stop: bool,
) -> Vec<String> {
    KNOWN_AGENT_IDS
        .iter()
        .map(|&id| {
            let pose = poses.get(&id).copied().flatten();
            if safety_stop && pose.is_none() {
                return format_record(id, None, Pose2D::default());
            }
            let Some(p) = pose else {
                return format_record(id, None, Pose2D::default());
            };
            let target = targets.get(&id).copied().unwrap_or(p);
            format_record(id, Some(p), target)
        })
        .collect()
}

struct SerialConnection {
    port_name: String,
    handle: Box<dyn serialport::SerialPort>,
}

fn open_port(name: &str) -> Result<Box<dyn serialport::SerialPort>, serialport::Error> {
    serialport::new(name, BAUD_RATE)
        .timeout(Duration::from_millis(1000))
        .open()
}

/// Whether the currently-held connection (if any) must be dropped before a
/// cycle can proceed, because the configured port name has changed (S6).
pub fn needs_reopen(current: Option<&str>, configured: &str) -> bool {
    current != Some(configured)
}

pub struct PositionUpdater {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PositionUpdater {
    pub fn spawn(context: Arc<ControllerContext>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let serial_mutex = Arc::new(Mutex::new(None::<SerialConnection>));
        let handle = std::thread::spawn(move || {
            info!("position_updater: running");
            while !stop_flag.load(Ordering::Relaxed) {
                tick(&context, &serial_mutex);
                std::thread::sleep(period);
            }
            if let Some(conn) = serial_mutex.lock().expect("serial lock poisoned").take() {
                info!("position_updater: closing serial port {}", conn.port_name);
            }
            info!("position_updater: stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn tick(context: &ControllerContext, serial_mutex: &Mutex<Option<SerialConnection>>) {
    let configured_port = context.port.lock().expect("port lock poisoned").clone();
    let Some(configured_port) = configured_port.filter(|p| !p.is_empty()) else {
        return;
    };

    let mut guard = serial_mutex.lock().expect("serial lock poisoned");

    if needs_reopen(guard.as_ref().map(|c| c.port_name.as_str()), &configured_port) {
        *guard = None;
    }

    if guard.is_none() {
        match open_port(&configured_port) {
            Ok(handle) => {
                info!("position_updater: serial port opened: {configured_port}");
                *guard = Some(SerialConnection { port_name: configured_port.clone(), handle });
            }
            Err(source) => {
                let err = SerialError::Open { port: configured_port.clone(), source };
                warn!("position_updater: {err}");
                return;
            }
        }
    }

    let poses = context.agent_pose_store.get_all();
    let targets = context.agent_adjusted_target_store.get_all();
    let safety_stop = context.toggles.safety_stop_enabled.load(Ordering::Relaxed);
    let records = build_records(&poses, &targets, safety_stop);

    let conn = guard.as_mut().expect("just opened or already present");
    for record in &records {
        if let Err(source) = conn.handle.write_all(record.as_bytes()) {
            let err = SerialError::Write(source);
            tracing::error!("position_updater: {err}");
            *guard = None;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn known_pose_emits_full_record_with_own_pose_as_default_target() {
        let mut poses = HashMap::new();
        poses.insert(0, Some(Pose2D::new(1.0, 2.0, 0.5)));
        let targets = HashMap::new();
        let records = build_records(&poses, &targets, false);
        assert!(records[0].starts_with("1,0,1.000,2.000,0.500,1.000,2.000"));
    }

    #[test]
    fn known_pose_with_target_uses_target_fields() {
        let mut poses = HashMap::new();
        poses.insert(0, Some(Pose2D::new(0.0, 0.0, 0.0)));
        let mut targets = HashMap::new();
        targets.insert(0, Pose2D::new(3.0, 4.0, 0.0));
        let records = build_records(&poses, &targets, false);
        assert!(records[0].starts_with("1,0,0.000,0.000,0.000,3.000,4.000"));
    }

    #[test]
    fn unknown_pose_emits_hold_record() {
        let mut poses = HashMap::new();
        poses.insert(0, None);
        let targets = HashMap::new();
        let records = build_records(&poses, &targets, false);
        assert_eq!(records[0], "0,0,0,0,0,0,0\n");
    }

    #[test]
    fn safety_stop_forces_hold_for_unknown_pose_even_with_stale_target() {
        let mut poses = HashMap::new();
        poses.insert(0, None);
        let mut targets = HashMap::new();
        targets.insert(0, Pose2D::new(9.0, 9.0, 0.0));
        let records = build_records(&poses, &targets, true);
        assert_eq!(records[0], "0,0,0,0,0,0,0\n");
    }

    #[test]
    fn every_known_agent_gets_exactly_one_record() {
        let records = build_records(&HashMap::new(), &HashMap::new(), false);
        assert_eq!(records.len(), KNOWN_AGENT_IDS.len());
    }

    #[test]
    fn absent_port_is_a_no_op_not_a_panic() {
        let context = ControllerContext::new();
        let serial_mutex = Mutex::new(None);
        tick(&context, &serial_mutex);
        assert!(serial_mutex.lock().unwrap().is_none());
    }

    #[test]
    fn s6_port_change_forces_reopen() {
        assert!(!needs_reopen(Some("COM3"), "COM3"));
        assert!(needs_reopen(Some("COM3"), "COM9"));
        assert!(needs_reopen(None, "COM3"));
    }
}
