//! Alarmsweet CLI
//!
//! Thin controller that sends one command line to the daemon over TCP.
//!
//! Commands:
//! - alarmctl snooze
//! - alarmctl shut
//! - alarmctl send <line>       # arbitrary line, ignored by the daemon if unknown

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use alarmsweet_core::{ClientError, Command, ControlClient, DEFAULT_BIND_ADDRESS, DEFAULT_BIND_PORT};

#[derive(Parser)]
#[command(name = "alarmctl")]
#[command(about = "Snooze or shut off the Alarmsweet alarm")]
#[command(version)]
struct Cli {
    /// Daemon address as host:port
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Wait for the daemon's echo and print it
    #[arg(long, global = true)]
    wait: bool,

    /// Connect/read timeout in seconds
    #[arg(long, global = true, default_value = "5")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snooze the ringing alarm
    Snooze,

    /// Shut the alarm off
    Shut,

    /// Send a raw line
    Send {
        /// Line to send
        line: String,
    },
}

impl Commands {
    fn line(&self) -> &str {
        match self {
            Commands::Snooze => Command::Snooze.as_str(),
            Commands::Shut => Command::Shut.as_str(),
            Commands::Send { line } => line,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let addr = cli
        .addr
        .unwrap_or_else(|| format!("{}:{}", DEFAULT_BIND_ADDRESS, DEFAULT_BIND_PORT));
    let client = ControlClient::with_addr(addr).with_timeout(Duration::from_secs(cli.timeout));
    let line = cli.command.line();

    let result = if cli.wait {
        client.send_and_wait(line).map(|echo| println!("Echo: {}", echo))
    } else {
        client.send(line).map(|()| println!("Sent command: {}", line))
    };

    match result {
        Ok(()) => Ok(()),
        Err(ClientError::DaemonNotRunning) => {
            eprintln!("Error: Could not connect to daemon at {}. Is it running?", client.addr());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to communicate with daemon: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["alarmctl", "snooze"]).unwrap();
        assert_eq!(cli.command.line(), "snooze");
        assert!(cli.addr.is_none());

        let cli = Cli::try_parse_from(["alarmctl", "--addr", "10.0.0.2:7777", "--wait", "shut"])
            .unwrap();
        assert_eq!(cli.command.line(), "shut");
        assert_eq!(cli.addr.as_deref(), Some("10.0.0.2:7777"));
        assert!(cli.wait);

        let cli = Cli::try_parse_from(["alarmctl", "send", "hello there"]).unwrap();
        assert_eq!(cli.command.line(), "hello there");
    }
}
