use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use formation_controller::apf::CollisionAvoidanceLayer;
use formation_controller::calibration;
use formation_controller::config::{self, Args};
use formation_controller::context::ControllerContext;
use formation_controller::formation_dispatcher::FormationDispatcher;
use formation_controller::frame_analyzer::FrameAnalyzer;
use formation_controller::global_supervisor::GlobalSupervisor;
use formation_controller::link_controller::LinkController;
use formation_controller::observer::{FrameSource, NullFrameSource, Observer, SyntheticFrameSource};
use formation_controller::path_crossing_resolver::PathCrossingResolver;
use formation_controller::position_updater::PositionUpdater;

use formation_types::NUM_LINKS;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "formation_controller=info".into()),
        )
        .init();
}

fn main() {
    init_tracing();
    let args = Args::parse();
    let resolved = config::resolve(&args);

    info!("formation-controller v{} starting: {:?}", env!("CARGO_PKG_VERSION"), resolved);

    let context = ControllerContext::new();
    *context.port.lock().expect("port lock poisoned") = resolved.serial_port.clone();
    context
        .toggles
        .path_crossing_enabled
        .store(resolved.path_crossing_enabled, std::sync::atomic::Ordering::Relaxed);
    context.toggles.apf_enabled.store(resolved.apf_enabled, std::sync::atomic::Ordering::Relaxed);
    context
        .toggles
        .safety_stop_enabled
        .store(resolved.safety_stop_enabled, std::sync::atomic::Ordering::Relaxed);

    // Calibration failure disables the observer stream only (section 7): the
    // rest of the pipeline keeps running, it simply never sees a detection.
    let observer_handle = match calibration::load(&resolved.calibration_path) {
        Ok(calibration) => {
            let source: Box<dyn FrameSource> = match &resolved.synthetic_source {
                Some(addr) => Box::new(SyntheticFrameSource::bind(addr)),
                None => Box::new(NullFrameSource::new()),
            };
            let observer = Observer::spawn(context.clone(), calibration.clone(), source, Duration::from_millis(33));
            let frame_analyzer = FrameAnalyzer::spawn(context.clone(), calibration, Duration::from_millis(33));
            Some((observer, frame_analyzer))
        }
        Err(e) => {
            error!("calibration load failed ({e}), observer disabled — pipeline continues without a detection stream");
            None
        }
    };

    let global_supervisor = GlobalSupervisor::spawn(context.clone(), Duration::from_millis(100));
    let formation_dispatcher = FormationDispatcher::spawn(context.clone(), Duration::from_millis(500));

    let link_controllers: Vec<LinkController> = (0..NUM_LINKS)
        .map(|link_id| LinkController::spawn(context.clone(), link_id, Duration::from_millis(50)))
        .collect();

    let path_crossing_resolver = PathCrossingResolver::spawn(context.clone(), Duration::from_millis(50));
    let collision_avoidance = CollisionAvoidanceLayer::spawn(context.clone(), Duration::from_millis(25));
    let position_updater = PositionUpdater::spawn(context.clone(), Duration::from_millis(50));

    wait_for_shutdown_signal();

    info!("formation-controller shutting down");
    if let Some((observer, frame_analyzer)) = observer_handle {
        observer.stop();
        frame_analyzer.stop();
    }
    global_supervisor.stop();
    formation_dispatcher.stop();
    for lc in link_controllers {
        lc.stop();
    }
    path_crossing_resolver.stop();
    collision_avoidance.stop();
    position_updater.stop();
}

/// Blocks until Ctrl+C. If a handler can't be installed, logs and blocks
/// forever instead — the process then only stops on an external kill.
fn wait_for_shutdown_signal() {
    let (tx, rx) = std::sync::mpsc::channel();
    match ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        Ok(()) => {
            let _ = rx.recv();
        }
        Err(e) => {
            warn!("could not install Ctrl+C handler ({e}); run until killed");
            loop {
                std::thread::sleep(Duration::from_secs(3600));
            }
        }
    }
}
