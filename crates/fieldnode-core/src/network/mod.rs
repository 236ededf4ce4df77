//! Wi-Fi connection management
//!
//! The platform reports association, address and scan progress as
//! asynchronous [`NetEvent`]s delivered to a [`NetworkEvents`] hub from its own
//! dispatch context. [`NetworkManager`] turns those events back into
//! `async` calls with bounded waits: `connect`, `wait_for_ip_address`, `scan`.

mod driver;
mod events;
mod manager;

pub use driver::*;
pub use events::*;
pub use manager::*;

#[cfg(test)]
pub(crate) use manager::tests::MockWifi;

use core::fmt;

use thiserror_no_std::Error;

use crate::config::{MAX_ACCESS_POINTS, SSID_MAX_LEN};

/// Raw SSID bytes as reported by the radio (not guaranteed to be UTF-8)
pub type Ssid = heapless::Vec<u8, SSID_MAX_LEN>;

/// Dotted-decimal IPv4 address, at most `255.255.255.255`
pub type AddressString = heapless::String<15>;

/// Connection progress as seen by the event hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    IpAssigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Open,
    Psk,
    Other,
}

impl Security {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Psk => "WPA/WPA2",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Band2_4GHz,
    Band5GHz,
    Band6GHz,
}

impl Band {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Band2_4GHz => "2.4GHz",
            Self::Band5GHz => "5GHz",
            Self::Band6GHz => "6GHz",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Association state reported by the interface, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WifiState {
    Disconnected,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    Completed,
}

impl WifiState {
    pub fn is_associated(self) -> bool {
        self >= Self::Associated
    }
}

/// One scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: Ssid,
    pub rssi: i8,
    pub security: Security,
}

impl AccessPoint {
    /// Build a record, truncating the SSID to 32 bytes.
    pub fn new(ssid: &[u8], rssi: i8, security: Security) -> Self {
        Self {
            ssid: ssid_from_bytes(ssid),
            rssi,
            security,
        }
    }

    pub fn ssid_str(&self) -> &str {
        ssid_as_str(&self.ssid)
    }
}

/// Results of a single scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub access_points: heapless::Vec<AccessPoint, MAX_ACCESS_POINTS>,
    /// Results that arrived after the buffer was full
    pub dropped: usize,
}

impl ScanReport {
    pub fn len(&self) -> usize {
        self.access_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_points.is_empty()
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ap) in self.access_points.iter().enumerate() {
            write!(
                f,
                "[{}] SSID: {:<32}\r\n    RSSI: {} dBm, Security: {}\r\n",
                i,
                ap.ssid_str(),
                ap.rssi,
                ap.security
            )?;
        }
        if self.dropped > 0 {
            write!(f, "({} more not shown)\r\n", self.dropped)?;
        }
        Ok(())
    }
}

/// Address and gateway captured after the interface obtained an IPv4 lease
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpInfo {
    pub address: AddressString,
    pub gateway: AddressString,
}

impl IpInfo {
    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.gateway.is_empty()
    }
}

/// Details only meaningful while associated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDetails {
    pub ssid: Ssid,
    pub band: Band,
    pub channel: Option<u8>,
    pub security: Security,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub state: WifiState,
    pub link: Option<LinkDetails>,
    pub ip: IpInfo,
}

impl fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WiFi status:\r\n")?;
        let Some(link) = &self.link else {
            return Ok(());
        };

        write!(f, "  SSID: {:<32}\r\n", ssid_as_str(&link.ssid))?;
        write!(f, "  Band: {}\r\n", link.band)?;
        match link.channel {
            Some(channel) => write!(f, "  Channel: {}\r\n", channel)?,
            None => f.write_str("  Channel: unknown\r\n")?,
        }
        write!(f, "  Security: {}\r\n", link.security)?;
        write!(f, "  IP address: {}\r\n", self.ip.address)?;
        write!(f, "  Gateway: {}\r\n", self.ip.gateway)
    }
}

/// Which bounded wait expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Connect,
    IpAddress,
    Scan,
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connection",
            Self::IpAddress => "IPv4 address",
            Self::Scan => "scan completion",
        })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    #[error("SSID must be 1 to 32 bytes")]
    InvalidSsid,
    #[error("passphrase must be at most 64 bytes")]
    InvalidPassphrase,
    #[error("driver rejected the request (code {0})")]
    Request(i32),
    #[error("connection failed with status {0}")]
    ConnectFailed(i32),
    #[error("timed out waiting for {0}")]
    Timeout(WaitKind),
}

pub(crate) fn ssid_from_bytes(bytes: &[u8]) -> Ssid {
    let len = bytes.len().min(SSID_MAX_LEN);
    let mut ssid = Ssid::new();
    // Cannot overflow: `len` is clamped to the capacity.
    let _ = ssid.extend_from_slice(&bytes[..len]);
    ssid
}

pub(crate) fn ssid_as_str(ssid: &[u8]) -> &str {
    core::str::from_utf8(ssid).unwrap_or("<non-utf8 ssid>")
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    #[test]
    fn test_access_point_truncates_long_ssid() {
        let ap = AccessPoint::new(&[b'x'; 40], -40, Security::Psk);
        assert_eq!(ap.ssid.len(), SSID_MAX_LEN);
    }

    #[test]
    fn test_scan_report_formatting() {
        let mut report = ScanReport::default();
        report
            .access_points
            .push(AccessPoint::new(b"home", -42, Security::Psk))
            .unwrap();
        report
            .access_points
            .push(AccessPoint::new(b"cafe", -77, Security::Open))
            .unwrap();

        let text = report.to_string();
        assert!(text.starts_with("[0] SSID: home"));
        assert!(text.contains("    RSSI: -42 dBm, Security: WPA/WPA2\r\n"));
        assert!(text.contains("[1] SSID: cafe"));
        assert!(text.contains("RSSI: -77 dBm, Security: Open"));
        assert!(!text.contains("more not shown"));
    }

    #[test]
    fn test_status_without_link_prints_header_only() {
        let status = InterfaceStatus {
            state: WifiState::Scanning,
            link: None,
            ip: IpInfo::default(),
        };
        assert_eq!(status.to_string(), "WiFi status:\r\n");
    }

    #[test]
    fn test_wifi_state_ordering() {
        assert!(!WifiState::Associating.is_associated());
        assert!(WifiState::Associated.is_associated());
        assert!(WifiState::Completed.is_associated());
    }

    #[test]
    fn test_invalid_utf8_ssid_is_printable() {
        let ap = AccessPoint::new(&[0xff, 0xfe], -60, Security::Other);
        assert_eq!(ap.ssid_str(), "<non-utf8 ssid>");
    }
}
