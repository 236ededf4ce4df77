//! Node configuration and compile-time defaults

use embassy_time::Duration;

/// Default interval between two sensor poll cycles
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default bound on every asynchronous network wait (connect, IP, scan)
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP server port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Size of the scratch buffer the HTTP client receives into
pub const HTTP_RX_BUFFER_SIZE: usize = 512;

/// Maximum number of access points kept from a single scan
pub const MAX_ACCESS_POINTS: usize = 10;

/// Maximum SSID length in bytes (IEEE 802.11)
pub const SSID_MAX_LEN: usize = 32;

/// Maximum WPA passphrase length in bytes
pub const PASSPHRASE_MAX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

impl<'a> WifiConfig<'a> {
    pub const fn new(ssid: &'a str, password: &'a str) -> Self {
        Self { ssid, password }
    }
}

/// Target of the one-shot HTTP GET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTarget<'a> {
    pub host: &'a str,
    pub path: &'a str,
    pub port: u16,
}

impl<'a> HttpTarget<'a> {
    pub const fn new(host: &'a str, path: &'a str) -> Self {
        Self {
            host,
            path,
            port: DEFAULT_HTTP_PORT,
        }
    }

    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Everything a demo needs to know, baked in at build time on the device.
#[derive(Debug, Clone, Copy)]
pub struct NodeConfig<'a> {
    pub wifi: WifiConfig<'a>,
    pub http: HttpTarget<'a>,
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
}

impl<'a> NodeConfig<'a> {
    pub const fn new(wifi: WifiConfig<'a>, http: HttpTarget<'a>) -> Self {
        Self {
            wifi,
            http,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
        }
    }

    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}
