use core::fmt::Write as _;
use core::net::Ipv4Addr;

use embassy_time::{Duration, with_timeout};
use log::{error, info, warn};

use crate::config::DEFAULT_WAIT_TIMEOUT_SECS;

use super::events::ConnectOutcome;
use super::{
    AddressString, ConnectParams, ConnectionState, EventMask, InterfaceStatus, IpInfo,
    NetworkEvents, ScanReport, WaitKind, WifiDriver, WifiError,
};

/// Event classes the manager needs to hear about
pub const MANAGER_EVENTS: EventMask = EventMask::WIFI_CONNECTION
    .union(EventMask::IPV4_ADDR_ADD)
    .union(EventMask::WIFI_SCAN);

/// Synchronous-looking front end to an event-driven Wi-Fi stack.
///
/// Requests go out through the [`WifiDriver`]; the results come back as events
/// on the shared [`NetworkEvents`] hub and are awaited here with a bounded
/// timeout. Taking `&mut self` on every operation keeps at most one connect
/// and one scan in flight.
pub struct NetworkManager<'a, D> {
    driver: D,
    events: &'a NetworkEvents,
    timeout: Duration,
    ip_info: IpInfo,
}

impl<'a, D: WifiDriver> NetworkManager<'a, D> {
    pub fn new(driver: D, events: &'a NetworkEvents) -> Self {
        Self {
            driver,
            events,
            timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
            ip_info: IpInfo::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.events.connection_state()
    }

    /// Address info captured by the last successful [`Self::wait_for_ip_address`]
    pub fn ip_info(&self) -> &IpInfo {
        &self.ip_info
    }

    /// Register for connection, address and scan events.
    ///
    /// Calling this again is harmless: the subscription is only made once.
    pub fn initialize(&mut self) {
        if self.events.subscriptions().contains(MANAGER_EVENTS) {
            warn!("Wi-Fi events already registered, skipping");
            return;
        }
        self.events.subscribe(MANAGER_EVENTS);
        info!("Wi-Fi events registered");
    }

    /// Associate with `ssid` and wait for the outcome.
    pub async fn connect(&mut self, ssid: &str, passphrase: &str) -> Result<(), WifiError> {
        let params = ConnectParams::new(ssid, passphrase)?;

        // Results left over from an earlier association must not satisfy these waits.
        self.events.clear_connect();
        self.events.clear_ipv4();
        self.events.set_state(ConnectionState::Connecting);

        if let Err(code) = self.driver.request_connect(&params) {
            error!("Error ({}): Connection request failed", code);
            self.events
                .transition(ConnectionState::Connecting, ConnectionState::Disconnected);
            return Err(WifiError::Request(code));
        }

        info!("Connecting to '{}' ({})...", ssid, params.security);
        match with_timeout(self.timeout, self.events.wait_connect()).await {
            Ok(ConnectOutcome::Connected) => Ok(()),
            Ok(ConnectOutcome::Failed(status)) => Err(WifiError::ConnectFailed(status)),
            Err(_) => {
                warn!(
                    "No connection result for '{}' after {} ms",
                    ssid,
                    self.timeout.as_millis()
                );
                self.events
                    .transition(ConnectionState::Connecting, ConnectionState::Disconnected);
                Err(WifiError::Timeout(WaitKind::Connect))
            }
        }
    }

    /// Ask the platform to drop the association. The state changes when the
    /// disconnect result arrives.
    pub fn disconnect(&mut self) -> Result<(), WifiError> {
        self.driver.request_disconnect().map_err(|code| {
            error!("Error ({}): Disconnection request failed", code);
            WifiError::Request(code)
        })
    }

    /// Wait for the interface to be assigned an IPv4 address, then read it back.
    ///
    /// A failing interface query is logged and leaves the fields empty.
    pub async fn wait_for_ip_address(&mut self) -> Result<IpInfo, WifiError> {
        if with_timeout(self.timeout, self.events.wait_ipv4())
            .await
            .is_err()
        {
            warn!(
                "No IPv4 address assigned after {} ms",
                self.timeout.as_millis()
            );
            return Err(WifiError::Timeout(WaitKind::IpAddress));
        }

        let mut info = IpInfo::default();
        match self.driver.ipv4_config() {
            Some(config) => {
                info.address = format_ipv4(config.address);
                match config.gateway {
                    Some(gateway) => info.gateway = format_ipv4(gateway),
                    None => error!("Error: Could not read gateway address"),
                }
            }
            None => error!("Error: Could not read IPv4 configuration"),
        }

        info!("IP address: {}, gateway: {}", info.address, info.gateway);
        self.ip_info = info.clone();
        Ok(info)
    }

    /// Scan for access points and return what arrived before scan-done.
    pub async fn scan(&mut self) -> Result<ScanReport, WifiError> {
        info!("Scanning for Wi-Fi networks...");
        self.events.begin_scan();

        self.driver.request_scan().map_err(|code| {
            error!("Error ({}): Scan request failed", code);
            WifiError::Request(code)
        })?;

        if with_timeout(self.timeout, self.events.wait_scan_done())
            .await
            .is_err()
        {
            warn!("Scan did not complete after {} ms", self.timeout.as_millis());
            return Err(WifiError::Timeout(WaitKind::Scan));
        }

        let report = self.events.scan_report();
        if report.dropped > 0 {
            warn!(
                "Scan returned {} more access points than fit, dropped",
                report.dropped
            );
        }
        Ok(report)
    }

    /// Point query of the interface, combined with the cached address info.
    pub fn status(&mut self) -> Result<InterfaceStatus, WifiError> {
        let status = self.driver.iface_status().map_err(|code| {
            error!("Error ({}): WiFi status request failed", code);
            WifiError::Request(code)
        })?;

        let link = if status.state.is_associated() {
            status.link
        } else {
            None
        };

        Ok(InterfaceStatus {
            state: status.state,
            link,
            ip: self.ip_info.clone(),
        })
    }
}

fn format_ipv4(address: Ipv4Addr) -> AddressString {
    let mut text = AddressString::new();
    if write!(text, "{}", address).is_err() {
        error!("Error: Could not convert address to string");
        text.clear();
    }
    text
}
