use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{anyhow, Result};

use tello_avoid::{
    BoundingBox, ControlLoop, CpuBackend, DetectorConfig, DryRunAircraft, Frame, FrameSource,
    Labels, MotionPolicy, PersonDetector, PolicyConfig, RawDetection, RcCommand, RecordedPause,
    SourceStats, StubBackend, SyntheticConfig, SyntheticSource, TargetSelection,
};

/// Blank frames at a fixed size; fails once `fail_after` frames have been served
/// and reports unhealthy once `unhealthy_after` have.
struct BlankSource {
    width: u32,
    height: u32,
    served: u64,
    fail_after: Option<u64>,
    unhealthy_after: Option<u64>,
}

impl BlankSource {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            served: 0,
            fail_after: None,
            unhealthy_after: None,
        }
    }

    fn unhealthy_after(mut self, frames: u64) -> Self {
        self.unhealthy_after = Some(frames);
        self
    }

    fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }
}

impl FrameSource for BlankSource {
    fn name(&self) -> &'static str {
        "blank"
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.fail_after.is_some_and(|limit| self.served >= limit) {
            return Err(anyhow!("stream ended"));
        }
        self.served += 1;
        let len = (self.width * self.height * 3) as usize;
        Frame::new(vec![0u8; len], self.width, self.height, self.served)
    }

    fn is_healthy(&self) -> bool {
        self.unhealthy_after.map_or(true, |limit| self.served < limit)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.served,
            url: "blank://".to_string(),
        }
    }
}

fn detector(script: Vec<Vec<RawDetection>>) -> PersonDetector {
    PersonDetector::from_backend(
        StubBackend::new(script),
        Labels::coco(),
        DetectorConfig::default(),
    )
    .unwrap()
}

fn centred_person() -> RawDetection {
    RawDetection::new(0, 0.9, 0.5, 0.5, 0.22, 0.5)
}

fn far_left_person() -> RawDetection {
    RawDetection::new(0, 0.9, 0.05, 0.5, 0.2, 0.5)
}

#[test]
fn centred_person_hovers_without_pause() -> Result<()> {
    let detector = detector(vec![vec![centred_person()]]);
    let mut control = ControlLoop::new(
        BlankSource::new(360, 240),
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    );

    let report = control.step()?;
    assert!(report.detected);
    assert!(report.command.is_stationary());
    assert_eq!(report.paused, None);
    assert!(report.frame_age_ms < 1_000);
    assert_eq!(control.source().stats().frames_captured, 1);

    let (_, aircraft, pauser) = control.into_parts();
    assert_eq!(aircraft.rc_commands(), vec![RcCommand::HOVER]);
    assert!(pauser.pauses().is_empty());
    Ok(())
}

#[test]
fn movement_pauses_for_configured_duration() -> Result<()> {
    let detector = detector(vec![vec![far_left_person()]]);
    let mut control = ControlLoop::new(
        BlankSource::new(360, 240),
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    );

    let report = control.step()?;
    assert!(report.command.yaw.get() < 0);
    assert_eq!(report.paused, Some(Duration::from_millis(400)));

    let (_, aircraft, pauser) = control.into_parts();
    let sent = aircraft.rc_commands();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].roll, 0);
    assert_eq!(sent[0].yaw, -30);
    assert_eq!(pauser.pauses(), &[Duration::from_millis(400)]);
    Ok(())
}

#[test]
fn empty_scene_sends_hover_with_sentinel() -> Result<()> {
    let detector = detector(vec![]);
    let mut control = ControlLoop::new(
        BlankSource::new(360, 240),
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    );

    let report = control.step()?;
    assert!(!report.detected);
    assert_eq!(report.target, BoundingBox::new(180, 0, 120, 0));
    assert_eq!(report.paused, None);
    assert_eq!(control.aircraft().rc_commands(), vec![RcCommand::HOVER]);
    Ok(())
}

#[test]
fn frames_are_resized_to_policy_resolution() -> Result<()> {
    // The sentinel is built from the resized frame, so its centre reveals the size.
    let detector = detector(vec![]);
    let mut control = ControlLoop::new(
        BlankSource::new(960, 720),
        &detector,
        MotionPolicy::new(PolicyConfig::default()),
        DryRunAircraft::new(),
        RecordedPause::new(),
    );

    let report = control.step()?;
    assert_eq!(report.target, BoundingBox::new(180, 0, 120, 0));
    assert_eq!(report.sequence, 1);
    Ok(())
}

#[test]
fn run_honours_max_cycles_and_counts() -> Result<()> {
    let detector = detector(vec![
        vec![far_left_person()],
        vec![centred_person()],
        vec![],
    ]);
    let mut control = ControlLoop::new(
        BlankSource::new(360, 240),
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    )
    .with_pause_duration(Duration::from_millis(50))
    .with_max_cycles(Some(6));

    let summary = control.run(&AtomicBool::new(false))?;
    assert_eq!(summary.cycles, 6);
    assert_eq!(summary.commands_sent, 6);
    assert_eq!(summary.detections, 4);
    assert_eq!(summary.pauses, 2);
    assert_eq!(summary.unhealthy_cycles, 0);

    let (source, aircraft, pauser) = control.into_parts();
    assert_eq!(source.stats().frames_captured, 6);
    assert_eq!(aircraft.rc_commands().len(), 6);
    assert_eq!(pauser.total(), Duration::from_millis(100));
    Ok(())
}

#[test]
fn unhealthy_source_is_counted_but_keeps_flying() -> Result<()> {
    let detector = detector(vec![vec![centred_person()]]);
    let mut control = ControlLoop::new(
        BlankSource::new(360, 240).unhealthy_after(2),
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    )
    .with_max_cycles(Some(5));

    let summary = control.run(&AtomicBool::new(false))?;
    assert_eq!(summary.cycles, 5);
    assert_eq!(summary.unhealthy_cycles, 4);
    assert!(!control.source().is_healthy());
    Ok(())
}

#[test]
fn stop_flag_set_before_run_sends_nothing() -> Result<()> {
    let detector = detector(vec![vec![far_left_person()]]);
    let mut control = ControlLoop::new(
        BlankSource::new(360, 240),
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    );

    let summary = control.run(&AtomicBool::new(true))?;
    assert_eq!(summary.cycles, 0);
    assert!(control.aircraft().events().is_empty());
    Ok(())
}

#[test]
fn source_failure_ends_the_loop() {
    let detector = detector(vec![vec![far_left_person()]]);
    let mut control = ControlLoop::new(
        BlankSource::new(360, 240).failing_after(2),
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    );

    let err = control.run(&AtomicBool::new(false)).unwrap_err();
    assert!(err.to_string().contains("stream ended"));
    assert_eq!(control.aircraft().rc_commands().len(), 2);
    assert_eq!(control.pauser().pauses().len(), 2);
}

#[test]
fn synthetic_scene_end_to_end() -> Result<()> {
    let mut source = SyntheticSource::new(SyntheticConfig {
        empty_every: 5,
        seed: Some(11),
        ..SyntheticConfig::default()
    });
    source.connect()?;
    let detector = PersonDetector::from_backend(
        CpuBackend::default(),
        Labels::coco(),
        DetectorConfig {
            selection: TargetSelection::First,
            ..DetectorConfig::default()
        },
    )?;
    let mut control = ControlLoop::new(
        source,
        &detector,
        MotionPolicy::default(),
        DryRunAircraft::new(),
        RecordedPause::new(),
    )
    .with_max_cycles(Some(40));

    let mut moving = 0;
    for _ in 0..40 {
        let report = control.step()?;
        if report.sequence % 5 == 0 {
            assert!(!report.detected, "frame {} is empty", report.sequence);
            assert!(report.command.is_stationary());
        } else {
            assert!(report.detected, "frame {} has a target", report.sequence);
        }
        if !report.command.is_stationary() {
            moving += 1;
        }
    }

    let (_, aircraft, pauser) = control.into_parts();
    let sent = aircraft.rc_commands();
    assert_eq!(sent.len(), 40);
    assert!(sent.iter().all(|cmd| cmd.roll == 0));
    assert_eq!(pauser.pauses().len(), moving);
    Ok(())
}
