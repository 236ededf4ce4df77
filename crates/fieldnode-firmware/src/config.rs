//! Configuration baked in at build time (see `build.rs` and `.env.example`)

use fieldnode_core::config::{HttpTarget, NodeConfig, WifiConfig};
use fieldnode_core::sensors::AdcChannelConfig;

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
pub const HTTP_HOST: &str = env!("HTTP_HOST");
pub const HTTP_PATH: &str = env!("HTTP_PATH");

pub const NODE: NodeConfig<'static> = NodeConfig::new(
    WifiConfig::new(WIFI_SSID, WIFI_PASSWORD),
    HttpTarget::new(HTTP_HOST, HTTP_PATH),
);

/// LDR divider on GPIO1 (ADC1 channel 0), 11 dB attenuation.
/// Full scale at that attenuation is roughly 3.1 V.
pub const LDR_CHANNEL: AdcChannelConfig = AdcChannelConfig {
    channel: 0,
    resolution_bits: 12,
    vref_mv: 3100,
};

/// Most access points the radio is asked to report per scan. Larger than what
/// the manager keeps so overflow is visible in the report.
pub const SCAN_MAX_RESULTS: usize = 20;

/// Depth of the request queue between the manager and the Wi-Fi task
pub const WIFI_REQUEST_DEPTH: usize = 4;

pub const TCP_RX_BUFFER_SIZE: usize = 1024;
pub const TCP_TX_BUFFER_SIZE: usize = 512;
pub const TCP_SOCKET_TIMEOUT_SECS: u64 = 10;
