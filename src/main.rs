//! # Propulsion Supervisor Entry Point
//!
//! Brings up the board tasks and hands the serial link to the command loop.
//!
//! Usage: `propulsion_supervisor [port] [baud] [watchdog_ms] [arm]`
//! Default: `/dev/ttyACM0`, 115200, 1000, `safe`
//!
//! `arm` (also `true`/`1`) queues the start sequence at boot; `safe`
//! (also `false`/`0`) boots suspended and waits for a `0xFE` from the host.
//!
//! ## Tasks
//! - **Sampler:** refreshes the sensor cache every 10 ms.
//! - **Watchdog:** highest priority; suspends when the host goes quiet.
//! - **Telemetry:** drains supervisor events into `data/logs/telemetry.csv`.
//! - **Dispatcher:** runs on the main thread until the serial link fails
//!   repeatedly. Outputs then go neutral, the tasks are joined, telemetry is
//!   flushed and the process exits with status 1. Killing the process skips
//!   that shutdown path.

use std::{
    fs::create_dir_all,
    path::Path,
    process,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{error, info, warn};

use propulsion_supervisor::{
    Dispatcher, LinkConfig, SamplerTask, SensorCache, Supervisor, SupervisorConfig, Telemetry,
    TelemetryEvent, Watchdog,
    config::{DEFAULT_BAUD, DEFAULT_PORT},
    inputs::sensor::SimulatedSensors,
    link::serial,
    outputs::actuator::VirtualActuator,
};

const TELEMETRY_DIR: &str = "data/logs";
const TELEMETRY_FILE: &str = "telemetry.csv";

fn main() {
    env_logger::init();
    info!("=== PROPULSION SUPERVISOR START ===");

    let args: Vec<String> = std::env::args().collect();
    let (link_config, config) = parse_args(&args);

    let telemetry = Arc::new(Telemetry::new());
    start_telemetry(&telemetry);

    let running = Arc::new(AtomicBool::new(true));

    let supervisor = Supervisor::new(VirtualActuator::new(), &config, telemetry.clone());

    let cache = Arc::new(SensorCache::new(SimulatedSensors::default()));
    let sampler = SamplerTask::new(
        cache.clone(),
        config.sample_period,
        running.clone(),
        telemetry.clone(),
    );
    let sampler_handle = match sampler.spawn() {
        Ok(h) => Some(h),
        Err(e) => {
            error!("[Main] {}", e);
            telemetry.record(TelemetryEvent::TaskDegraded { task: "sampler" });
            cache.fallback_to_synchronous();
            None
        }
    };

    let (watchdog, feeder) = Watchdog::new(
        supervisor.clone(),
        config.watchdog_timeout,
        telemetry.clone(),
    );
    let watchdog_handle = match watchdog.spawn(running.clone()) {
        Ok(h) => Some(h),
        Err(e) => {
            error!("[Main] {}, host silence will not suspend the board", e);
            telemetry.record(TelemetryEvent::TaskDegraded { task: "watchdog" });
            None
        }
    };

    let link = match serial::open(&link_config) {
        Ok(port) => port,
        Err(e) => {
            error!("[Main] {}: {}", link_config.port, e);
            running.store(false, Ordering::Release);
            telemetry.stop_consumer();
            process::exit(1);
        }
    };

    if config.arm_on_boot {
        info!("[Main] arming on boot");
        supervisor.start();
    }

    let mut dispatcher = Dispatcher::new(
        link,
        supervisor.clone(),
        cache,
        feeder,
        telemetry.clone(),
        config.link_idle_sleep,
    );
    let outcome = dispatcher.run(&running);

    running.store(false, Ordering::Release);
    supervisor.suspend();
    for handle in [sampler_handle, watchdog_handle].into_iter().flatten() {
        let _ = handle.join();
    }
    telemetry.stop_consumer();

    if let Err(e) = outcome {
        error!("[Main] host link lost on {}: {}", link_config.port, e);
        info!("=== PROPULSION SUPERVISOR FINISHED ===");
        process::exit(1);
    }
    info!("=== PROPULSION SUPERVISOR FINISHED ===");
}

/// `[port] [baud] [watchdog_ms] [arm]`; a value that does not parse keeps its default.
fn parse_args(args: &[String]) -> (LinkConfig, SupervisorConfig) {
    let port = args.get(1).map(|s| s.as_str()).unwrap_or(DEFAULT_PORT);

    let baud = match args.get(2) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("[Main] invalid baud '{}', using {}", raw, DEFAULT_BAUD);
            DEFAULT_BAUD
        }),
        None => DEFAULT_BAUD,
    };

    let mut config = SupervisorConfig::default();
    if let Some(raw) = args.get(3) {
        match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => {
                config = config.with_watchdog_timeout(Duration::from_millis(ms));
            }
            _ => warn!(
                "[Main] invalid watchdog timeout '{}', using {:?}",
                raw, config.watchdog_timeout
            ),
        }
    }

    if let Some(raw) = args.get(4) {
        match parse_arm(raw) {
            Some(arm) => config = config.with_arm_on_boot(arm),
            None => warn!("[Main] invalid boot mode '{}', booting suspended", raw),
        }
    }

    info!(
        "[Main] port={} baud={} watchdog={:?} arm_on_boot={}",
        port, baud, config.watchdog_timeout, config.arm_on_boot
    );
    (LinkConfig::new(port).with_baud(baud), config)
}

fn parse_arm(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "arm" | "true" | "1" => Some(true),
        "safe" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn start_telemetry(telemetry: &Telemetry) {
    if let Err(e) = create_dir_all(TELEMETRY_DIR) {
        warn!("[Main] telemetry disabled, cannot create {}: {}", TELEMETRY_DIR, e);
        return;
    }
    let path = Path::new(TELEMETRY_DIR).join(TELEMETRY_FILE);
    if let Err(e) = telemetry.start_consumer(path) {
        warn!("[Main] telemetry disabled: {}", e);
    }
}
