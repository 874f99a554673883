//! Tello SDK link.
//!
//! The Tello accepts plain-text commands on UDP port 8889 and answers each
//! control command with `ok` or an error string. `rc` commands are never
//! acknowledged, so they are sent without waiting.

use anyhow::{anyhow, Context, Result};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::{Aircraft, RcCommand};

const MAX_RESPONSE_BYTES: usize = 1024;
/// Takeoff and landing answer only once the manoeuvre completes.
const MANOEUVRE_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for a Tello link.
#[derive(Clone, Debug)]
pub struct TelloConfig {
    /// Aircraft command endpoint.
    pub addr: String,
    /// Local endpoint responses arrive on.
    pub bind_addr: String,
    /// How long to wait for an acknowledged command.
    pub response_timeout: Duration,
}

impl Default for TelloConfig {
    fn default() -> Self {
        Self {
            addr: "192.168.10.1:8889".to_string(),
            bind_addr: "0.0.0.0:8889".to_string(),
            response_timeout: Duration::from_secs(7),
        }
    }
}

pub struct TelloLink {
    config: TelloConfig,
    socket: UdpSocket,
    remote: SocketAddr,
    commands_sent: u64,
}

impl TelloLink {
    pub fn new(config: TelloConfig) -> Result<Self> {
        let remote = config
            .addr
            .to_socket_addrs()
            .with_context(|| format!("invalid aircraft address {}", config.addr))?
            .next()
            .ok_or_else(|| anyhow!("aircraft address {} did not resolve", config.addr))?;
        let socket = UdpSocket::bind(&config.bind_addr)
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;
        Ok(Self {
            config,
            socket,
            remote,
            commands_sent: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    fn send(&mut self, command: &str) -> Result<()> {
        self.socket
            .send_to(command.as_bytes(), self.remote)
            .with_context(|| format!("failed to send '{}' to {}", command, self.remote))?;
        self.commands_sent += 1;
        Ok(())
    }

    /// Send a command and return the aircraft's answer.
    pub fn request(&mut self, command: &str, timeout: Duration) -> Result<String> {
        self.send(command)?;
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; MAX_RESPONSE_BYTES];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(anyhow!(
                    "no response to '{}' within {}ms",
                    command,
                    timeout.as_millis()
                ));
            }
            self.socket.set_read_timeout(Some(remaining))?;
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e).context("failed to receive aircraft response"),
            };
            if from != self.remote {
                log::debug!("TelloLink: ignoring datagram from {}", from);
                continue;
            }
            let response = String::from_utf8_lossy(&buf[..len]).trim().to_string();
            log::debug!("TelloLink: '{}' -> '{}'", command, response);
            return Ok(response);
        }
    }

    fn expect_ok(&mut self, command: &str, timeout: Duration) -> Result<()> {
        let response = self.request(command, timeout)?;
        if response.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(anyhow!("aircraft rejected '{}': {}", command, response))
        }
    }
}

impl Aircraft for TelloLink {
    fn name(&self) -> &'static str {
        "tello"
    }

    fn connect(&mut self) -> Result<()> {
        self.expect_ok("command", self.config.response_timeout)
            .with_context(|| format!("failed to enter SDK mode on {}", self.remote))?;
        log::info!("TelloLink: connected to {}", self.remote);
        Ok(())
    }

    fn battery(&mut self) -> Result<Option<u8>> {
        let response = self.request("battery?", self.config.response_timeout)?;
        let percent: u8 = response
            .parse()
            .map_err(|_| anyhow!("unexpected battery response '{}'", response))?;
        Ok(Some(percent))
    }

    fn start_stream(&mut self) -> Result<()> {
        self.expect_ok("streamon", self.config.response_timeout)
    }

    fn takeoff(&mut self) -> Result<()> {
        self.expect_ok("takeoff", MANOEUVRE_TIMEOUT.max(self.config.response_timeout))
    }

    fn land(&mut self) -> Result<()> {
        self.expect_ok("land", MANOEUVRE_TIMEOUT.max(self.config.response_timeout))
    }

    fn send_rc(&mut self, cmd: RcCommand) -> Result<()> {
        self.send(&cmd.to_sdk_string())
    }
}
