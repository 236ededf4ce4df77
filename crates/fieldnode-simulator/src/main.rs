//! Desktop simulator for the fieldnode sensor node.
//!
//! Runs the fieldnode-core demo flow on the host: a simulated Wi-Fi radio
//! answers connect, scan and disconnect requests, the one-shot HTTP GET goes
//! out over real `std::net` sockets, and synthetic DHT11/LDR readings feed the
//! sensor loop. Afterwards the Wi-Fi console reads commands from stdin.
//!
//! # Environment
//!
//! | Variable            | Default          |
//! |---------------------|------------------|
//! | `WIFI_SSID`         | `fieldnode-lab`  |
//! | `WIFI_PASSWORD`     | `hunter22`       |
//! | `HTTP_HOST`         | `example.com`    |
//! | `HTTP_PATH`         | `/`              |
//! | `HTTP_PORT`         | `80`             |
//! | `SIM_POLL_CYCLES`   | `5`              |
//!
//! Type `quit` or send EOF to leave the console.

use std::convert::Infallible;
use std::io::{self, Write as _};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs};
use std::time::Instant;

use embassy_futures::block_on;
use embassy_time::Timer;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use log::{debug, error, info};

use fieldnode_core::app::{AppRunState, AppState, SensorNode};
use fieldnode_core::config::{DEFAULT_HTTP_PORT, HttpTarget, NodeConfig, WifiConfig};
use fieldnode_core::heartbeat::Heartbeat;
use fieldnode_core::http::{Connection, HttpClient, Resolver, TcpConnector};
use fieldnode_core::network::{
    AccessPoint, ConnectParams, DriverCode, DriverStatus, Ipv4Config, LinkDetails, NetEvent,
    NetworkEvents, NetworkManager, Security, WifiDriver, WifiState,
};
use fieldnode_core::sensors::{
    AdcChannelConfig, AdcReader, ClimateChannel, ClimateDriver, ClimateSensor, LightSensor,
    SensorValue,
};
use fieldnode_core::shell;

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

const PROMPT: &str = "fieldnode:~$ ";

const DEFAULT_POLL_CYCLES: u32 = 5;

/// Socket connect/read/write timeout for the HTTP GET
const TCP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// The simulated DHT11 fails every n-th fetch to exercise stale readings.
const CLIMATE_FAULT_EVERY: u32 = 4;

/// Same divider as the board: 12-bit ADC1, 3.3 V full scale
const LDR_CHANNEL: AdcChannelConfig = AdcChannelConfig {
    channel: 0,
    resolution_bits: 12,
    vref_mv: 3300,
};

/// Result codes carried in simulated connect events
const STATUS_OK: i32 = 0;
const STATUS_NO_SUCH_NETWORK: i32 = -2;
const STATUS_AUTH_FAILED: i32 = -3;

/// Disconnect requested while not associated
const EALREADY: DriverCode = -120;

static NETWORK_EVENTS: NetworkEvents = NetworkEvents::new();

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

struct Settings {
    ssid: String,
    password: String,
    host: String,
    path: String,
    port: u16,
    poll_cycles: u32,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    fn from_env() -> Self {
        Self {
            ssid: env_or("WIFI_SSID", "fieldnode-lab"),
            password: env_or("WIFI_PASSWORD", "hunter22"),
            host: env_or("HTTP_HOST", "example.com"),
            path: env_or("HTTP_PATH", "/"),
            port: env_parse_or("HTTP_PORT", DEFAULT_HTTP_PORT),
            poll_cycles: env_parse_or("SIM_POLL_CYCLES", DEFAULT_POLL_CYCLES),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulated radio
// ---------------------------------------------------------------------------

/// An access point the simulated radio can see
struct SimNetwork {
    ssid: String,
    /// Empty for an open network
    passphrase: String,
    rssi: i8,
    channel: u8,
}

impl SimNetwork {
    fn new(ssid: &str, passphrase: &str, rssi: i8, channel: u8) -> Self {
        Self {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
            rssi,
            channel,
        }
    }

    fn security(&self) -> Security {
        if self.passphrase.is_empty() {
            Security::Open
        } else {
            Security::Psk
        }
    }
}

/// The configured network plus a few neighbours to show up in scans.
fn neighbourhood(settings: &Settings) -> Vec<SimNetwork> {
    vec![
        SimNetwork::new(&settings.ssid, &settings.password, -48, 6),
        SimNetwork::new("CoffeeShop", "", -71, 1),
        SimNetwork::new("Printer-Setup", "", -83, 11),
        SimNetwork::new("neighbour-2.4", "correct horse", -77, 6),
    ]
}

struct Association {
    params: ConnectParams,
    channel: u8,
}

/// Radio stand-in that answers each request by dispatching its events inline.
struct SimWifi<'a> {
    events: &'a NetworkEvents,
    networks: Vec<SimNetwork>,
    association: Option<Association>,
    lease: Option<Ipv4Config>,
}

impl<'a> SimWifi<'a> {
    fn new(events: &'a NetworkEvents, networks: Vec<SimNetwork>) -> Self {
        Self {
            events,
            networks,
            association: None,
            lease: None,
        }
    }
}

impl WifiDriver for SimWifi<'_> {
    fn request_connect(&mut self, params: &ConnectParams) -> Result<(), DriverCode> {
        let Some(index) = self
            .networks
            .iter()
            .position(|network| network.ssid == params.ssid.as_str())
        else {
            debug!("No network named '{}' in range", params.ssid);
            self.events.dispatch(NetEvent::ConnectResult {
                status: STATUS_NO_SUCH_NETWORK,
            });
            return Ok(());
        };

        let network = &self.networks[index];
        if network.passphrase != params.passphrase.as_str() {
            debug!("Passphrase rejected by '{}'", network.ssid);
            self.events.dispatch(NetEvent::ConnectResult {
                status: STATUS_AUTH_FAILED,
            });
            return Ok(());
        }

        self.association = Some(Association {
            params: params.clone(),
            channel: network.channel,
        });
        self.events
            .dispatch(NetEvent::ConnectResult { status: STATUS_OK });

        // DHCP answers immediately on the simulated network.
        self.lease = Some(Ipv4Config {
            address: Ipv4Addr::new(192, 168, 4, 10 + index as u8),
            gateway: Some(Ipv4Addr::new(192, 168, 4, 1)),
        });
        self.events.dispatch(NetEvent::Ipv4AddrAdded);
        Ok(())
    }

    fn request_disconnect(&mut self) -> Result<(), DriverCode> {
        if self.association.take().is_none() {
            return Err(EALREADY);
        }
        self.lease = None;
        self.events
            .dispatch(NetEvent::DisconnectResult { status: STATUS_OK });
        Ok(())
    }

    fn request_scan(&mut self) -> Result<(), DriverCode> {
        for network in &self.networks {
            self.events.dispatch(NetEvent::ScanResult(AccessPoint::new(
                network.ssid.as_bytes(),
                network.rssi,
                network.security(),
            )));
        }
        self.events.dispatch(NetEvent::ScanDone);
        Ok(())
    }

    fn iface_status(&mut self) -> Result<DriverStatus, DriverCode> {
        let Some(association) = &self.association else {
            return Ok(DriverStatus {
                state: WifiState::Disconnected,
                link: None,
            });
        };

        let params = &association.params;
        Ok(DriverStatus {
            state: WifiState::Completed,
            link: Some(LinkDetails {
                ssid: heapless::Vec::from_slice(params.ssid.as_bytes()).unwrap_or_default(),
                band: params.band,
                channel: Some(association.channel),
                security: params.security,
            }),
        })
    }

    fn ipv4_config(&mut self) -> Option<Ipv4Config> {
        self.lease
    }
}

// ---------------------------------------------------------------------------
// Host TCP stack
// ---------------------------------------------------------------------------

/// Resolves through the host's resolver and keeps the first IPv4 answer.
struct StdResolver;

impl Resolver for StdResolver {
    type Error = io::Error;

    async fn resolve_ipv4(&mut self, host: &str) -> Result<Ipv4Addr, io::Error> {
        (host, 0)
            .to_socket_addrs()?
            .find_map(|address| match address {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no IPv4 address"))
    }
}

struct StdConnector {
    timeout: std::time::Duration,
}

impl TcpConnector for StdConnector {
    type Error = io::Error;
    type Connection<'c>
        = StdConnection
    where
        Self: 'c;

    async fn connect(&mut self, remote: SocketAddrV4) -> Result<Self::Connection<'_>, io::Error> {
        let stream = TcpStream::connect_timeout(&SocketAddr::V4(remote), self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(StdConnection { stream })
    }
}

/// Blocking socket behind the async traits; the simulator runs one task.
struct StdConnection {
    stream: TcpStream,
}

fn error_kind(e: io::Error) -> ErrorKind {
    match e.kind() {
        io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted => ErrorKind::ConnectionAborted,
        io::ErrorKind::NotConnected => ErrorKind::NotConnected,
        io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::TimedOut,
        io::ErrorKind::Interrupted => ErrorKind::Interrupted,
        _ => ErrorKind::Other,
    }
}

impl ErrorType for StdConnection {
    type Error = ErrorKind;
}

impl Read for StdConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        io::Read::read(&mut self.stream, buf).map_err(error_kind)
    }
}

impl Write for StdConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        io::Write::write(&mut self.stream, buf).map_err(error_kind)
    }

    async fn flush(&mut self) -> Result<(), ErrorKind> {
        io::Write::flush(&mut self.stream).map_err(error_kind)
    }
}

impl Connection for StdConnection {
    fn close(&mut self) {
        if let Err(e) = self.stream.shutdown(std::net::Shutdown::Both) {
            debug!("Socket shutdown: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Mock peripherals
// ---------------------------------------------------------------------------

struct SimLed;

impl PinErrorType for SimLed {
    type Error = Infallible;
}

impl OutputPin for SimLed {
    fn set_low(&mut self) -> Result<(), Infallible> {
        debug!("LED off");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        debug!("LED on");
        Ok(())
    }
}

#[derive(Debug)]
enum SimFault {
    ChecksumMismatch,
    NoSample,
}

/// Synthetic DHT11: whole-degree readings that drift slowly over time.
struct SimClimate {
    start: Instant,
    fetches: u32,
    sample: Option<(i32, i32)>,
}

impl SimClimate {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            fetches: 0,
            sample: None,
        }
    }
}

impl ClimateDriver for SimClimate {
    type Error = SimFault;

    fn is_ready(&mut self) -> bool {
        true
    }

    async fn sample_fetch(&mut self) -> Result<(), SimFault> {
        self.fetches += 1;
        if self.fetches % CLIMATE_FAULT_EVERY == 0 {
            return Err(SimFault::ChecksumMismatch);
        }

        let t = self.start.elapsed().as_secs_f64();
        // Temperature: 20-26 °C, humidity: 40-60 %
        let temperature = 23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos();
        let humidity = 50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos();
        self.sample = Some((temperature as i32, humidity as i32));
        Ok(())
    }

    fn channel_get(&mut self, channel: ClimateChannel) -> Result<SensorValue, SimFault> {
        let (temperature, humidity) = self.sample.ok_or(SimFault::NoSample)?;
        let integer = match channel {
            ClimateChannel::AmbientTemperature => temperature,
            ClimateChannel::Humidity => humidity,
        };
        Ok(SensorValue::new(integer, 0))
    }
}

/// Synthetic LDR divider: a slow day/night swing across the ADC range.
struct SimAdc {
    start: Instant,
}

impl AdcReader for SimAdc {
    type Error = Infallible;

    fn is_ready(&mut self) -> bool {
        true
    }

    fn setup(&mut self, config: &AdcChannelConfig) -> Result<(), Infallible> {
        info!(
            "Simulated ADC channel {} ({} bit, {} mV)",
            config.channel, config.resolution_bits, config.vref_mv
        );
        Ok(())
    }

    fn read_raw(&mut self, config: &AdcChannelConfig) -> Result<u16, Infallible> {
        Ok(synthetic_light(self.start.elapsed().as_secs_f64(), config))
    }
}

fn synthetic_light(t: f64, config: &AdcChannelConfig) -> u16 {
    let full_scale = f64::from((1u32 << config.resolution_bits) - 1);
    let level = 0.5 + 0.4 * (t / 30.0).sin() + 0.05 * (t / 3.0).cos();
    (level.clamp(0.0, 1.0) * full_scale) as u16
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

fn run_console(manager: &mut NetworkManager<'_, SimWifi<'_>>) {
    info!("Console ready, type 'help' ('quit' to exit)");
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}", PROMPT);
        if let Err(e) = stdout.flush() {
            error!("Console write failed: {}", e);
            break;
        }

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("Console read failed: {}", e);
                break;
            }
        }

        let line = line.trim();
        if matches!(line, "quit" | "exit") {
            break;
        }

        let mut out = String::new();
        if block_on(shell::handle_line(manager, line, &mut out)).is_err() {
            error!("Console output failed");
        }
        print!("{}", out.replace("\r\n", "\n"));
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_chunk(chunk: &[u8]) {
    info!("{}", String::from_utf8_lossy(chunk));
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting fieldnode simulator");

    let settings = Settings::from_env();
    let node = NodeConfig::new(
        WifiConfig::new(&settings.ssid, &settings.password),
        HttpTarget::new(&settings.host, &settings.path).with_port(settings.port),
    );

    let mut manager = NetworkManager::new(
        SimWifi::new(&NETWORK_EVENTS, neighbourhood(&settings)),
        &NETWORK_EVENTS,
    )
    .with_timeout(node.wait_timeout);
    let mut app = AppState::new();

    block_on(async {
        if let Err(e) = app.connect(&mut manager, &node.wifi).await {
            error!("Network bring-up failed, continuing offline: {}", e);
            return;
        }

        let mut client = HttpClient::new(StdResolver, StdConnector { timeout: TCP_TIMEOUT });
        if let Ok(summary) = app.fetch(&mut client, &node.http, log_chunk).await {
            info!(
                "Fetched http://{}{}: {} bytes",
                node.http.host, node.http.path, summary.bytes_received
            );
        }
    });

    app.set_run_state(AppRunState::SensorsRunning);
    let climate = ClimateSensor::new(SimClimate::new())
        .inspect_err(|e| error!("Climate sensor disabled: {}", e))
        .ok();
    let light = LightSensor::new(
        SimAdc {
            start: Instant::now(),
        },
        LDR_CHANNEL,
    )
    .inspect_err(|e| error!("Light sensor disabled: {}", e))
    .ok();
    let mut sensors = SensorNode::new(Heartbeat::new(SimLed), climate, light);

    block_on(async {
        for _ in 0..settings.poll_cycles {
            let report = sensors.poll_once().await;
            info!(
                "Cycle {}: LED {}",
                report.cycle,
                if report.led_lit { "on" } else { "off" }
            );
            Timer::after(node.poll_interval).await;
        }
    });

    run_console(&mut manager);
    info!("Simulator exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnode_core::network::{ConnectionState, WifiError};

    fn lab() -> Vec<SimNetwork> {
        vec![
            SimNetwork::new("lab", "hunter22", -40, 6),
            SimNetwork::new("cafe", "", -70, 1),
        ]
    }

    #[test]
    fn test_connect_assigns_address() {
        let events = NetworkEvents::new();
        let mut manager = NetworkManager::new(SimWifi::new(&events, lab()), &events);
        manager.initialize();

        block_on(manager.connect("lab", "hunter22")).unwrap();
        let info = block_on(manager.wait_for_ip_address()).unwrap();
        assert_eq!(info.address.as_str(), "192.168.4.10");
        assert_eq!(info.gateway.as_str(), "192.168.4.1");
        assert_eq!(manager.connection_state(), ConnectionState::IpAssigned);

        let status = manager.status().unwrap();
        let link = status.link.unwrap();
        assert_eq!(link.channel, Some(6));
        assert_eq!(link.security, Security::Psk);
    }

    #[test]
    fn test_wrong_passphrase_fails_connect() {
        let events = NetworkEvents::new();
        let mut manager = NetworkManager::new(SimWifi::new(&events, lab()), &events);
        manager.initialize();

        assert_eq!(
            block_on(manager.connect("lab", "letmein1")),
            Err(WifiError::ConnectFailed(STATUS_AUTH_FAILED))
        );
        assert_eq!(
            block_on(manager.connect("elsewhere", "")),
            Err(WifiError::ConnectFailed(STATUS_NO_SUCH_NETWORK))
        );
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_scan_reports_every_network() {
        let events = NetworkEvents::new();
        let mut manager = NetworkManager::new(SimWifi::new(&events, lab()), &events);
        manager.initialize();

        let report = block_on(manager.scan()).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.access_points[1].ssid_str(), "cafe");
        assert_eq!(report.access_points[1].security, Security::Open);
    }

    #[test]
    fn test_disconnect_requires_association() {
        let events = NetworkEvents::new();
        let mut manager = NetworkManager::new(SimWifi::new(&events, lab()), &events);
        manager.initialize();

        assert_eq!(manager.disconnect(), Err(WifiError::Request(EALREADY)));

        block_on(manager.connect("cafe", "")).unwrap();
        manager.disconnect().unwrap();
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert_eq!(manager.status().unwrap().state, WifiState::Disconnected);
    }

    #[test]
    fn test_synthetic_light_stays_in_range() {
        for second in 0..120 {
            let raw = synthetic_light(f64::from(second), &LDR_CHANNEL);
            assert!(raw <= 4095);
        }
    }
}
