//! Control protocol and client for the Alarmsweet daemon
//!
//! The protocol is line-oriented UTF-8 over TCP: a controller sends one
//! newline-terminated command, the daemon answers `Echo: <line>`. This
//! module holds the protocol constants and a synchronous client used by
//! the CLI and by tests.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::types::Command;

/// Default listen address of the daemon.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default listen port of the daemon.
pub const DEFAULT_BIND_PORT: u16 = 7777;

/// Prefix of every acknowledgement line.
pub const ECHO_PREFIX: &str = "Echo: ";

/// Longest command line the daemon accepts, terminator included.
pub const MAX_LINE_BYTES: usize = 1024;

/// Build the acknowledgement for a received line.
pub fn echo_line(line: &str) -> String {
    format!("{}{}\n", ECHO_PREFIX, line)
}

/// Error type for control client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Nothing is listening at the address
    #[error("Daemon not running")]
    DaemonNotRunning,

    /// Address could not be resolved
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Socket connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(std::io::Error),

    /// Failed to send the command line
    #[error("Send failed: {0}")]
    SendFailed(std::io::Error),

    /// Failed to receive the acknowledgement
    #[error("Receive failed: {0}")]
    ReceiveFailed(std::io::Error),

    /// Acknowledgement was not an echo line
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Client for sending control lines to the daemon
pub struct ControlClient {
    addr: String,
    timeout: Duration,
}

impl Default for ControlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlClient {
    /// Create a client for the default daemon address
    pub fn new() -> Self {
        Self::with_addr(format!("{}:{}", DEFAULT_BIND_ADDRESS, DEFAULT_BIND_PORT))
    }

    /// Create a client for a custom `host:port`
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Set the connect/read/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn resolve(&self) -> Result<SocketAddr, ClientError> {
        self.addr
            .to_socket_addrs()
            .map_err(|e| ClientError::InvalidAddress(format!("{}: {}", self.addr, e)))?
            .next()
            .ok_or_else(|| ClientError::InvalidAddress(self.addr.clone()))
    }

    fn connect(&self) -> Result<TcpStream, ClientError> {
        let addr = self.resolve()?;
        let stream = TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                ClientError::DaemonNotRunning
            } else {
                ClientError::ConnectionFailed(e)
            }
        })?;

        stream.set_read_timeout(Some(self.timeout)).ok();
        stream.set_write_timeout(Some(self.timeout)).ok();
        Ok(stream)
    }

    fn write_line(stream: &mut TcpStream, line: &str) -> Result<(), ClientError> {
        writeln!(stream, "{}", line).map_err(ClientError::SendFailed)?;
        stream.flush().map_err(ClientError::SendFailed)
    }

    /// Send one line and disconnect without reading the echo
    pub fn send(&self, line: &str) -> Result<(), ClientError> {
        let mut stream = self.connect()?;
        Self::write_line(&mut stream, line)
    }

    /// Send one line and wait for the daemon's echo
    ///
    /// # Returns
    /// The echoed text with the `Echo: ` prefix and terminator removed.
    pub fn send_and_wait(&self, line: &str) -> Result<String, ClientError> {
        let mut stream = self.connect()?;
        Self::write_line(&mut stream, line)?;

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        reader
            .read_line(&mut response)
            .map_err(ClientError::ReceiveFailed)?;

        let echoed = response
            .trim_end_matches(['\r', '\n'])
            .strip_prefix(ECHO_PREFIX)
            .map(str::to_string);
        echoed.ok_or(ClientError::InvalidResponse(response))
    }

    /// Convenience method: send a recognized command
    pub fn command(&self, command: Command) -> Result<(), ClientError> {
        self.send(command.as_str())
    }

    pub fn snooze(&self) -> Result<(), ClientError> {
        self.command(Command::Snooze)
    }

    pub fn shut(&self) -> Result<(), ClientError> {
        self.command(Command::Shut)
    }
}
