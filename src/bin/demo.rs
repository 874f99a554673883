//! demo - end-to-end synthetic run of the avoidance loop
//!
//! A synthetic pedestrian wanders through the frame; the CPU backend finds it,
//! the policy reacts, and a dry-run aircraft records the commands. Pauses are
//! recorded rather than slept, so the run finishes as fast as the CPU allows.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::io::IsTerminal;
use std::time::Duration;

use tello_avoid::aircraft::AircraftEvent;
use tello_avoid::{
    Aircraft, ControlLoop, CpuBackend, DetectorConfig, DryRunAircraft, FrameSource, Labels,
    MotionPolicy, PersonDetector, PolicyConfig, RcCommand, RecordedPause, SyntheticConfig,
    SyntheticSource, TargetSelection,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthetic end-to-end run of the avoidance loop")]
struct Args {
    /// Number of control cycles.
    #[arg(long, default_value_t = 200)]
    cycles: u64,
    /// Optional deterministic seed for the synthetic pedestrian.
    #[arg(long)]
    seed: Option<u64>,
    /// Render an empty scene every N frames (0 disables).
    #[arg(long, default_value_t = 25)]
    empty_every: u64,
    /// Target selection (first|largest_area|highest_confidence|nearest_center).
    #[arg(long, default_value = "largest_area")]
    selection: String,
    /// Settle pause after a non-zero command, in milliseconds.
    #[arg(long, default_value_t = 400)]
    pause_ms: u64,
    /// Print the summary as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Debug, Default, Serialize)]
struct AxisCounts {
    negative: u64,
    zero: u64,
    positive: u64,
}

impl AxisCounts {
    fn record(&mut self, value: i32) {
        match value.signum() {
            -1 => self.negative += 1,
            1 => self.positive += 1,
            _ => self.zero += 1,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct DemoSummary {
    cycles: u64,
    detections: u64,
    pauses: u64,
    simulated_pause_ms: u128,
    rc_commands: usize,
    vertical: AxisCounts,
    longitudinal: AxisCounts,
    yaw: AxisCounts,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    if args.cycles == 0 {
        return Err(anyhow!("cycles must be >= 1"));
    }
    let selection: TargetSelection = args.selection.parse()?;
    let ui = ui::Ui::from_args(&args.ui, std::io::stderr().is_terminal());

    let detector = {
        let _stage = ui.stage("load detector");
        PersonDetector::from_backend(
            CpuBackend::default(),
            Labels::coco(),
            DetectorConfig {
                selection,
                ..DetectorConfig::default()
            },
        )?
    };

    let mut aircraft = DryRunAircraft::new();
    {
        let _stage = ui.stage("connect + take off (dry run)");
        aircraft.connect()?;
        aircraft.start_stream()?;
        aircraft.takeoff()?;
        aircraft.send_rc(RcCommand::HOVER)?;
    }

    let mut source = SyntheticSource::new(SyntheticConfig {
        url: "stub://demo".to_string(),
        empty_every: args.empty_every,
        seed: args.seed,
        ..SyntheticConfig::default()
    });
    source.connect()?;

    let mut control = ControlLoop::new(
        source,
        &detector,
        MotionPolicy::new(PolicyConfig::default()),
        aircraft,
        RecordedPause::new(),
    )
    .with_pause_duration(Duration::from_millis(args.pause_ms));

    let mut summary = DemoSummary::default();
    {
        let _stage = ui.stage("run control loop");
        let bar = ui.cycles(args.cycles);
        for _ in 0..args.cycles {
            let report = control.step()?;
            let (vertical, longitudinal, yaw) = report.command.as_tuple();
            summary.vertical.record(vertical);
            summary.longitudinal.record(longitudinal);
            summary.yaw.record(yaw);
            summary.cycles += 1;
            if report.detected {
                summary.detections += 1;
            }
            if report.paused.is_some() {
                summary.pauses += 1;
            }
            bar.set_message(format!("{:?}", report.command.as_tuple()));
            bar.inc(1);
        }
        bar.finish_and_clear();
    }

    let (_, mut aircraft, pauser) = control.into_parts();
    {
        let _stage = ui.stage("hover + land (dry run)");
        aircraft.send_rc(RcCommand::HOVER)?;
        aircraft.land()?;
    }

    summary.simulated_pause_ms = pauser.total().as_millis();
    summary.rc_commands = aircraft
        .events()
        .iter()
        .filter(|event| matches!(event, AircraftEvent::Rc(_)))
        .count();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("demo summary:");
    println!("  cycles: {}", summary.cycles);
    println!("  cycles with a person: {}", summary.detections);
    println!("  cycles that paused: {}", summary.pauses);
    println!("  simulated pause: {}ms", summary.simulated_pause_ms);
    println!("  rc commands sent: {}", summary.rc_commands);
    println!(
        "  up/down:    up={} hold={} down={}",
        summary.vertical.positive, summary.vertical.zero, summary.vertical.negative
    );
    println!(
        "  fwd/back:   fwd={} hold={} back={}",
        summary.longitudinal.positive, summary.longitudinal.zero, summary.longitudinal.negative
    );
    println!(
        "  yaw:        right={} hold={} left={}",
        summary.yaw.positive, summary.yaw.zero, summary.yaw.negative
    );
    Ok(())
}
