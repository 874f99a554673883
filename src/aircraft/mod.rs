//! Aircraft command sinks.
//!
//! - `TelloLink`: Tello SDK text commands over UDP
//! - `DryRunAircraft`: records and logs commands without flying
//!
//! The control loop only needs `send_rc`; the lifecycle commands (connect,
//! stream, takeoff, land) are driven by the daemon around the loop.

mod dry_run;
mod tello;

use anyhow::Result;
use serde::Serialize;

use crate::policy::MotionCommand;

pub use dry_run::{AircraftEvent, DryRunAircraft};
pub use tello::{TelloConfig, TelloLink};

/// Four-axis velocity command in SDK wire order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RcCommand {
    /// Left/right. The policy never commands lateral motion.
    pub roll: i32,
    /// Forward/back.
    pub longitudinal: i32,
    /// Up/down.
    pub vertical: i32,
    pub yaw: i32,
}

impl RcCommand {
    pub const HOVER: RcCommand = RcCommand {
        roll: 0,
        longitudinal: 0,
        vertical: 0,
        yaw: 0,
    };

    /// `rc a b c d`
    pub fn to_sdk_string(&self) -> String {
        format!(
            "rc {} {} {} {}",
            self.roll, self.longitudinal, self.vertical, self.yaw
        )
    }
}

impl From<MotionCommand> for RcCommand {
    fn from(cmd: MotionCommand) -> Self {
        Self {
            roll: 0,
            longitudinal: cmd.longitudinal.get(),
            vertical: cmd.vertical.get(),
            yaw: cmd.yaw.get(),
        }
    }
}

/// Aircraft command interface.
pub trait Aircraft {
    /// Sink identifier for logs.
    fn name(&self) -> &'static str;

    /// Enter command mode.
    fn connect(&mut self) -> Result<()>;

    /// Battery percentage, when the sink can report one.
    fn battery(&mut self) -> Result<Option<u8>>;

    /// Start the onboard video stream.
    fn start_stream(&mut self) -> Result<()> {
        Ok(())
    }

    fn takeoff(&mut self) -> Result<()>;

    fn land(&mut self) -> Result<()>;

    /// Fire-and-forget velocity command; no acknowledgment is consumed.
    fn send_rc(&mut self, cmd: RcCommand) -> Result<()>;
}

impl<A: Aircraft + ?Sized> Aircraft for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn battery(&mut self) -> Result<Option<u8>> {
        (**self).battery()
    }

    fn start_stream(&mut self) -> Result<()> {
        (**self).start_stream()
    }

    fn takeoff(&mut self) -> Result<()> {
        (**self).takeoff()
    }

    fn land(&mut self) -> Result<()> {
        (**self).land()
    }

    fn send_rc(&mut self, cmd: RcCommand) -> Result<()> {
        (**self).send_rc(cmd)
    }
}

impl<A: Aircraft + ?Sized> Aircraft for &mut A {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn battery(&mut self) -> Result<Option<u8>> {
        (**self).battery()
    }

    fn start_stream(&mut self) -> Result<()> {
        (**self).start_stream()
    }

    fn takeoff(&mut self) -> Result<()> {
        (**self).takeoff()
    }

    fn land(&mut self) -> Result<()> {
        (**self).land()
    }

    fn send_rc(&mut self, cmd: RcCommand) -> Result<()> {
        (**self).send_rc(cmd)
    }
}

/// Take off (when `takeoff` is set), hover, run `body`, then hover and land.
///
/// Landing is attempted on every exit once takeoff was requested, including a
/// failed takeoff and a failed `body`. Landing problems are logged; the
/// returned error is the first one that stopped the flight.
pub fn fly<A, T, F>(aircraft: &mut A, takeoff: bool, body: F) -> Result<T>
where
    A: Aircraft + ?Sized,
    F: FnOnce(&mut A) -> Result<T>,
{
    if takeoff {
        if let Err(e) = aircraft.takeoff() {
            if let Err(land_err) = aircraft.land() {
                log::error!("landing after failed takeoff failed: {}", land_err);
            }
            return Err(e);
        }
    }

    let result = aircraft
        .send_rc(RcCommand::HOVER)
        .and_then(|()| body(aircraft));

    if let Err(e) = aircraft.send_rc(RcCommand::HOVER) {
        log::warn!("failed to send hover before landing: {}", e);
    }
    if takeoff {
        if let Err(e) = aircraft.land() {
            log::error!("landing failed: {}", e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// Dry-run aircraft whose takeoff reports failure after recording it.
    struct FailingTakeoff(DryRunAircraft);

    impl Aircraft for FailingTakeoff {
        fn name(&self) -> &'static str {
            "failing-takeoff"
        }

        fn connect(&mut self) -> Result<()> {
            self.0.connect()
        }

        fn battery(&mut self) -> Result<Option<u8>> {
            self.0.battery()
        }

        fn takeoff(&mut self) -> Result<()> {
            self.0.takeoff()?;
            Err(anyhow!("no response to 'takeoff'"))
        }

        fn land(&mut self) -> Result<()> {
            self.0.land()
        }

        fn send_rc(&mut self, cmd: RcCommand) -> Result<()> {
            self.0.send_rc(cmd)
        }
    }

    #[test]
    fn fly_lands_after_body_error() {
        let mut aircraft = DryRunAircraft::new();
        let err = fly(&mut aircraft, true, |_| -> Result<()> {
            Err(anyhow!("stream ended"))
        })
        .unwrap_err();

        assert!(err.to_string().contains("stream ended"));
        assert_eq!(
            aircraft.events(),
            &[
                AircraftEvent::Takeoff,
                AircraftEvent::Rc(RcCommand::HOVER),
                AircraftEvent::Rc(RcCommand::HOVER),
                AircraftEvent::Land,
            ]
        );
    }

    #[test]
    fn fly_lands_after_failed_takeoff() {
        let mut aircraft = FailingTakeoff(DryRunAircraft::new());
        let mut ran = false;
        let result = fly(&mut aircraft, true, |_| {
            ran = true;
            Ok(())
        });

        assert!(result.is_err());
        assert!(!ran);
        assert_eq!(
            aircraft.0.events(),
            &[AircraftEvent::Takeoff, AircraftEvent::Land]
        );
    }

    #[test]
    fn fly_without_takeoff_never_lands() -> Result<()> {
        let mut aircraft = DryRunAircraft::new();
        let value = fly(&mut aircraft, false, |inner| {
            inner.send_rc(RcCommand::from(MotionCommand::new(0, 20, 0)))?;
            Ok(7)
        })?;

        assert_eq!(value, 7);
        assert!(!aircraft.events().contains(&AircraftEvent::Land));
        assert_eq!(aircraft.rc_commands().len(), 3);
        Ok(())
    }

    #[test]
    fn motion_command_maps_to_rc_order_with_zero_roll() {
        let rc = RcCommand::from(MotionCommand::new(-20, 20, 30));
        assert_eq!(
            rc,
            RcCommand {
                roll: 0,
                longitudinal: 20,
                vertical: -20,
                yaw: 30,
            }
        );
        assert_eq!(rc.to_sdk_string(), "rc 0 20 -20 30");
    }

    #[test]
    fn hover_is_all_zero() {
        assert_eq!(RcCommand::HOVER.to_sdk_string(), "rc 0 0 0 0");
        assert_eq!(RcCommand::from(MotionCommand::STOP), RcCommand::HOVER);
    }
}
