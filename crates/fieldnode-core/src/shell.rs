//! Line-oriented Wi-Fi console
//!
//! Each input line is one command. Output goes to any [`core::fmt::Write`] so
//! the same console works over a UART on the device and stdout on the host.

use core::fmt;

use log::warn;
use thiserror_no_std::Error;

use crate::network::{NetworkManager, WifiDriver, WifiError};

pub const CONNECT_USAGE: &str = "Usage: wifi_connect <SSID> <PASSWORD>";

/// Command names and their help lines, in the order `help` prints them
pub const COMMANDS: [(&str, &str); 5] = [
    ("wifi_scan", "Scan for available Wi-Fi networks"),
    ("wifi_status", "Print current Wi-Fi status"),
    (
        "wifi_connect",
        "Connect to a Wi-Fi network: wifi_connect <SSID> <PASSWORD>",
    ),
    ("wifi_disconnect", "Disconnect from the current Wi-Fi network"),
    ("help", "List available commands"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand<'a> {
    Scan,
    Status,
    Connect { ssid: &'a str, password: &'a str },
    Disconnect,
    Help,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellError<'a> {
    #[error("empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    UnknownCommand(&'a str),
    #[error("{0}")]
    Usage(&'static str),
    #[error("{0}")]
    Wifi(WifiError),
    #[error("console output failed")]
    Output,
}

impl From<WifiError> for ShellError<'_> {
    fn from(e: WifiError) -> Self {
        Self::Wifi(e)
    }
}

impl From<fmt::Error> for ShellError<'_> {
    fn from(_: fmt::Error) -> Self {
        Self::Output
    }
}

impl<'a> ShellCommand<'a> {
    /// Parse one line. Arguments are split on whitespace.
    pub fn parse(line: &'a str) -> Result<Self, ShellError<'a>> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(ShellError::Empty);
        };

        let command = match name {
            "wifi_scan" => Self::Scan,
            "wifi_status" => Self::Status,
            "wifi_disconnect" => Self::Disconnect,
            "help" => Self::Help,
            "wifi_connect" => {
                let (Some(ssid), Some(password), None) = (words.next(), words.next(), words.next())
                else {
                    return Err(ShellError::Usage(CONNECT_USAGE));
                };
                return Ok(Self::Connect { ssid, password });
            }
            other => return Err(ShellError::UnknownCommand(other)),
        };
        Ok(command)
    }
}

/// Run `command` against the manager and print its output.
pub async fn execute<'a, D, W>(
    manager: &mut NetworkManager<'_, D>,
    command: ShellCommand<'a>,
    out: &mut W,
) -> Result<(), ShellError<'a>>
where
    D: WifiDriver,
    W: fmt::Write,
{
    match command {
        ShellCommand::Scan => {
            out.write_str("Scanning for Wi-Fi networks...\r\n")?;
            let report = manager.scan().await?;
            if report.is_empty() {
                out.write_str("No networks found\r\n")?;
            }
            write!(out, "{}", report)?;
        }
        ShellCommand::Status => {
            let status = manager.status()?;
            write!(out, "{}", status)?;
        }
        ShellCommand::Connect { ssid, password } => {
            manager.connect(ssid, password).await?;
            write!(out, "Connected to {}\r\n", ssid)?;
        }
        ShellCommand::Disconnect => {
            manager.disconnect()?;
            out.write_str("Disconnect requested\r\n")?;
        }
        ShellCommand::Help => {
            for (name, help) in COMMANDS {
                write!(out, "  {:<16}{}\r\n", name, help)?;
            }
        }
    }
    Ok(())
}

/// Parse and run one console line, printing any error instead of returning it.
pub async fn handle_line<D, W>(
    manager: &mut NetworkManager<'_, D>,
    line: &str,
    out: &mut W,
) -> fmt::Result
where
    D: WifiDriver,
    W: fmt::Write,
{
    let result = match ShellCommand::parse(line) {
        Ok(command) => execute(manager, command, out).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) | Err(ShellError::Empty) => Ok(()),
        Err(ShellError::Output) => Err(fmt::Error),
        Err(ShellError::Usage(usage)) => write!(out, "{}\r\n", usage),
        Err(e) => {
            warn!("Console command '{}' failed: {}", line.trim(), e);
            write!(out, "Error: {}\r\n", e)
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::network::{MockWifi, NetworkEvents};
    use embassy_futures::block_on;
    use embassy_time::Duration;
    use std::string::String;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("wifi_scan"), Ok(ShellCommand::Scan));
        assert_eq!(ShellCommand::parse("  wifi_status \r\n"), Ok(ShellCommand::Status));
        assert_eq!(ShellCommand::parse("wifi_disconnect"), Ok(ShellCommand::Disconnect));
        assert_eq!(ShellCommand::parse("help"), Ok(ShellCommand::Help));
        assert_eq!(
            ShellCommand::parse("wifi_connect home hunter22"),
            Ok(ShellCommand::Connect {
                ssid: "home",
                password: "hunter22"
            })
        );
    }

    #[test]
    fn test_parse_connect_argument_count() {
        let usage = Err(ShellError::Usage(CONNECT_USAGE));
        assert_eq!(ShellCommand::parse("wifi_connect"), usage);
        assert_eq!(ShellCommand::parse("wifi_connect home"), usage);
        assert_eq!(ShellCommand::parse("wifi_connect home a b"), usage);
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert_eq!(
            ShellCommand::parse("reboot now"),
            Err(ShellError::UnknownCommand("reboot"))
        );
        assert_eq!(ShellCommand::parse("   "), Err(ShellError::Empty));
    }

    fn run(line: &str, setup: impl FnOnce(&mut MockWifi<'_>)) -> String {
        let events = NetworkEvents::new();
        let mut manager = NetworkManager::new(MockWifi::new(&events), &events)
            .with_timeout(Duration::from_millis(50));
        manager.initialize();
        setup(manager.driver_mut());

        let mut out = String::new();
        block_on(handle_line(&mut manager, line, &mut out)).unwrap();
        out
    }

    #[test]
    fn test_connect_usage_is_printed() {
        assert_eq!(
            run("wifi_connect home", |_| {}),
            "Usage: wifi_connect <SSID> <PASSWORD>\r\n"
        );
    }

    #[test]
    fn test_connect_and_report() {
        assert_eq!(
            run("wifi_connect home hunter22", |_| {}),
            "Connected to home\r\n"
        );
    }

    #[test]
    fn test_connect_failure_is_printed() {
        let out = run("wifi_connect home wrong", |wifi| wifi.connect_status = Some(-2));
        assert_eq!(out, "Error: connection failed with status -2\r\n");
    }

    #[test]
    fn test_scan_output() {
        let out = run("wifi_scan", |wifi| wifi.scan_count = 2);
        assert!(out.starts_with("Scanning for Wi-Fi networks...\r\n[0] SSID: ap-0"));
        assert!(out.contains("[1] SSID: ap-1"));
    }

    #[test]
    fn test_scan_without_results() {
        let out = run("wifi_scan", |_| {});
        assert_eq!(out, "Scanning for Wi-Fi networks...\r\nNo networks found\r\n");
    }

    #[test]
    fn test_status_when_disconnected() {
        assert_eq!(run("wifi_status", |_| {}), "WiFi status:\r\n");
    }

    #[test]
    fn test_help_lists_every_command() {
        let out = run("help", |_| {});
        for (name, _) in COMMANDS {
            assert!(out.contains(name));
        }
    }

    #[test]
    fn test_unknown_command_is_printed() {
        assert_eq!(run("reboot", |_| {}), "Error: Unknown command: reboot\r\n");
    }

    #[test]
    fn test_empty_line_prints_nothing() {
        assert_eq!(run("", |_| {}), "");
    }
}
