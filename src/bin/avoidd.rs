//! avoidd - pedestrian avoidance daemon
//!
//! This daemon:
//! 1. Connects to the aircraft and starts its video stream
//! 2. Takes off and hovers
//! 3. Each cycle: reads a frame, selects a person, decides a motion command,
//!    sends it, and pauses after any movement
//! 4. On Ctrl-C, or any failure after takeoff: hovers and lands

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tello_avoid::aircraft::fly;
use tello_avoid::config::AvoidConfig;
use tello_avoid::{
    open_source, Aircraft, BackendRegistry, ControlLoop, DryRunAircraft, MotionPolicy,
    PersonDetector, TelloLink, ThreadPause,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pedestrian avoidance control loop for Tello quadcopters")]
struct Args {
    /// Config file (JSON, or TOML when the name ends in .toml).
    #[arg(long, env = "AVOID_CONFIG")]
    config: Option<PathBuf>,

    /// Log commands instead of flying.
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many control cycles.
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = AvoidConfig::load_from(args.config.as_deref())?;

    let registry = BackendRegistry::from_settings(&cfg.detector)?;
    let backend = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend available"))?;
    let detector = PersonDetector::new(
        backend,
        cfg.detector.labels()?,
        cfg.detector.detection.clone(),
    )?;
    detector.warm_up()?;
    log::info!(
        "detector backend={} labels={} target={} selection={:?} (registered: {})",
        detector.backend_name()?,
        detector.labels().len(),
        cfg.detector.detection.target_label,
        cfg.detector.detection.selection,
        registry.list().join(", ")
    );

    let mut aircraft: Box<dyn Aircraft> = if args.dry_run {
        Box::new(DryRunAircraft::new())
    } else {
        Box::new(TelloLink::new(cfg.aircraft.tello_config())?)
    };
    aircraft.connect()?;
    match aircraft.battery()? {
        Some(percent) => log::info!("{} battery {}%", aircraft.name(), percent),
        None => log::info!("{} battery unknown", aircraft.name()),
    }
    aircraft.start_stream()?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut source = open_source(&cfg.source)?;
    source.connect()?;

    log::info!(
        "avoidd running. source={} policy={}x{} pause={}ms",
        cfg.source.url,
        cfg.policy.frame_width,
        cfg.policy.frame_height,
        cfg.control.pause.as_millis()
    );

    let result = fly(&mut aircraft, cfg.aircraft.takeoff, |aircraft| {
        let mut control = ControlLoop::new(
            source,
            &detector,
            MotionPolicy::new(cfg.policy.clone()),
            aircraft,
            ThreadPause,
        )
        .with_pause_duration(cfg.control.pause)
        .with_max_cycles(args.max_cycles.or(cfg.control.max_cycles));
        control.run(&stop)
    });

    match result {
        Ok(summary) => {
            log::info!(
                "avoidd stopped after {} cycles ({} with a target, {} paused, {} with an unhealthy source)",
                summary.cycles,
                summary.detections,
                summary.pauses,
                summary.unhealthy_cycles
            );
            Ok(())
        }
        Err(e) => {
            log::error!("control loop halted: {:#}", e);
            Err(e)
        }
    }
}
