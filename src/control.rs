//! Control loop.
//!
//! One cycle: acquire a frame, resize it to the policy resolution, select a
//! target, decide, send the `rc` command, and pause if anything moved.
//!
//! Cycles never overlap. Collaborator errors end the loop immediately; there
//! is no retry. The settle pause goes through `Pause` so tests run without
//! wall-clock waits.

use anyhow::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::aircraft::{Aircraft, RcCommand};
use crate::detect::PersonDetector;
use crate::ingest::FrameSource;
use crate::policy::{MotionCommand, MotionPolicy};
use crate::BoundingBox;

pub const DEFAULT_PAUSE: Duration = Duration::from_millis(400);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Pause
// ----------------------------------------------------------------------------

/// Settle delay after a non-zero command.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Wall-clock pause.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested pauses and returns immediately.
#[derive(Clone, Debug, Default)]
pub struct RecordedPause {
    pauses: Vec<Duration>,
}

impl RecordedPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> &[Duration] {
        &self.pauses
    }

    pub fn total(&self) -> Duration {
        self.pauses.iter().sum()
    }
}

impl Pause for RecordedPause {
    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

// ----------------------------------------------------------------------------
// Reports
// ----------------------------------------------------------------------------

/// What one cycle saw and did.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleReport {
    pub sequence: u64,
    /// Time from capture to the start of detection.
    pub frame_age_ms: u128,
    pub target: BoundingBox,
    pub detected: bool,
    pub command: MotionCommand,
    pub paused: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub cycles: u64,
    pub detections: u64,
    pub commands_sent: u64,
    /// Cycles that commanded motion and therefore paused.
    pub pauses: u64,
    /// Cycles after which the source reported itself unhealthy.
    pub unhealthy_cycles: u64,
}

impl LoopSummary {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.commands_sent += 1;
        if report.detected {
            self.detections += 1;
        }
        if report.paused.is_some() {
            self.pauses += 1;
        }
    }
}

// ----------------------------------------------------------------------------
// ControlLoop
// ----------------------------------------------------------------------------

pub struct ControlLoop<'d, S, A, P> {
    source: S,
    detector: &'d PersonDetector,
    policy: MotionPolicy,
    aircraft: A,
    pauser: P,
    pause_duration: Duration,
    max_cycles: Option<u64>,
}

impl<'d, S, A, P> ControlLoop<'d, S, A, P>
where
    S: FrameSource,
    A: Aircraft,
    P: Pause,
{
    pub fn new(
        source: S,
        detector: &'d PersonDetector,
        policy: MotionPolicy,
        aircraft: A,
        pauser: P,
    ) -> Self {
        Self {
            source,
            detector,
            policy,
            aircraft,
            pauser,
            pause_duration: DEFAULT_PAUSE,
            max_cycles: None,
        }
    }

    pub fn with_pause_duration(mut self, duration: Duration) -> Self {
        self.pause_duration = duration;
        self
    }

    /// Stop after this many cycles. `None` runs until stopped.
    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn aircraft(&self) -> &A {
        &self.aircraft
    }

    pub fn pauser(&self) -> &P {
        &self.pauser
    }

    /// Hand the collaborators back, e.g. to land the aircraft after the loop.
    pub fn into_parts(self) -> (S, A, P) {
        (self.source, self.aircraft, self.pauser)
    }

    /// Run exactly one cycle.
    pub fn step(&mut self) -> Result<CycleReport> {
        let frame = self.source.next_frame()?;
        let sequence = frame.sequence;
        let frame_age_ms = frame.age_ms();
        let frame = frame.resized(self.policy.frame_size())?;

        let target = self.detector.select_target(&frame)?;
        let detected = target.is_some();
        let bbox = target
            .map(|det| det.bbox)
            .unwrap_or_else(|| BoundingBox::sentinel(frame.size()));

        let command = self.policy.decide(bbox);
        self.aircraft.send_rc(RcCommand::from(command))?;

        let paused = if command.is_stationary() {
            None
        } else {
            let (vertical, longitudinal, yaw) = command.as_tuple();
            log::debug!(
                "cycle {}: target x={} w={} y={} h={} -> up_down={} front_back={} yaw={}",
                sequence,
                bbox.x,
                bbox.w,
                bbox.y,
                bbox.h,
                vertical,
                longitudinal,
                yaw
            );
            self.pauser.pause(self.pause_duration);
            Some(self.pause_duration)
        };

        Ok(CycleReport {
            sequence,
            frame_age_ms,
            target: bbox,
            detected,
            command,
            paused,
        })
    }

    /// Run cycles until `stop` is set, `max_cycles` is reached, or a cycle fails.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<LoopSummary> {
        let mut summary = LoopSummary::default();
        let mut last_health_log = Instant::now();
        let mut was_healthy = true;

        while !stop.load(Ordering::SeqCst) {
            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }

            let report = self.step()?;
            summary.record(&report);

            let healthy = self.source.is_healthy();
            if !healthy {
                summary.unhealthy_cycles += 1;
                if was_healthy {
                    log::warn!(
                        "{} reports unhealthy (stalled or disconnected) at cycle {}; frame age {}ms",
                        self.source.name(),
                        summary.cycles,
                        report.frame_age_ms
                    );
                }
            } else if !was_healthy {
                log::info!("{} healthy again", self.source.name());
            }
            was_healthy = healthy;

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = self.source.stats();
                log::info!(
                    "{} health={} frames={} url={} detections={}/{}",
                    self.source.name(),
                    healthy,
                    stats.frames_captured,
                    stats.url,
                    summary.detections,
                    summary.cycles
                );
                last_health_log = Instant::now();
            }
        }

        Ok(summary)
    }
}
