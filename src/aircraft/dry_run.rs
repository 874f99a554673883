use anyhow::Result;
use serde::Serialize;

use super::{Aircraft, RcCommand};

/// Everything a dry-run aircraft was asked to do, in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AircraftEvent {
    Connect,
    StreamOn,
    Takeoff,
    Land,
    Rc(RcCommand),
}

/// Command sink that never flies. Records every command and logs it at debug.
#[derive(Debug)]
pub struct DryRunAircraft {
    events: Vec<AircraftEvent>,
    battery: u8,
}

impl DryRunAircraft {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            battery: 100,
        }
    }

    pub fn events(&self) -> &[AircraftEvent] {
        &self.events
    }

    /// Only the rc commands, in send order.
    pub fn rc_commands(&self) -> Vec<RcCommand> {
        self.events
            .iter()
            .filter_map(|event| match event {
                AircraftEvent::Rc(cmd) => Some(*cmd),
                _ => None,
            })
            .collect()
    }
}

impl Default for DryRunAircraft {
    fn default() -> Self {
        Self::new()
    }
}

impl Aircraft for DryRunAircraft {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("DryRunAircraft: connected (no aircraft)");
        self.events.push(AircraftEvent::Connect);
        Ok(())
    }

    fn battery(&mut self) -> Result<Option<u8>> {
        Ok(Some(self.battery))
    }

    fn start_stream(&mut self) -> Result<()> {
        self.events.push(AircraftEvent::StreamOn);
        Ok(())
    }

    fn takeoff(&mut self) -> Result<()> {
        log::info!("DryRunAircraft: takeoff");
        self.events.push(AircraftEvent::Takeoff);
        Ok(())
    }

    fn land(&mut self) -> Result<()> {
        log::info!("DryRunAircraft: land");
        self.events.push(AircraftEvent::Land);
        Ok(())
    }

    fn send_rc(&mut self, cmd: RcCommand) -> Result<()> {
        log::debug!("DryRunAircraft: {}", cmd.to_sdk_string());
        self.events.push(AircraftEvent::Rc(cmd));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_lifecycle_and_rc() -> Result<()> {
        let mut aircraft = DryRunAircraft::new();
        aircraft.connect()?;
        aircraft.takeoff()?;
        aircraft.send_rc(RcCommand::HOVER)?;
        aircraft.land()?;

        assert_eq!(
            aircraft.events(),
            &[
                AircraftEvent::Connect,
                AircraftEvent::Takeoff,
                AircraftEvent::Rc(RcCommand::HOVER),
                AircraftEvent::Land,
            ]
        );
        assert_eq!(aircraft.rc_commands(), vec![RcCommand::HOVER]);
        assert_eq!(aircraft.battery()?, Some(100));
        Ok(())
    }
}
