//! Application-wide state, error types and the demo flow
//!
//! Bring-up runs once, in order: register for network events, connect,
//! wait for an address, fetch one page. The sensor loop runs after that until
//! the device is reset.

use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::config::{HttpTarget, WifiConfig};
use crate::heartbeat::Heartbeat;
use crate::http::{HttpClient, HttpError, HttpGetSummary, Resolver, TcpConnector};
use crate::network::{IpInfo, NetworkManager, WifiDriver, WifiError};
use crate::sensors::{
    AdcReader, ClimateDriver, ClimateReading, ClimateSensor, LightSample, LightSensor, SensorError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    WifiConnecting,
    WifiConnected,
    Fetching,
    SensorsRunning,
    Error,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("WiFi connection failed: {0}")]
    Wifi(WifiError),
    #[error("HTTP request failed: {0}")]
    Http(HttpError),
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
}

impl From<WifiError> for AppError {
    fn from(e: WifiError) -> Self {
        Self::Wifi(e)
    }
}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl From<SensorError> for AppError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

/// Main application state container
#[derive(Debug, Clone)]
pub struct AppState {
    pub run_state: AppRunState,
    pub ip_info: Option<IpInfo>,
    pub last_fetch: Option<HttpGetSummary>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Create a new uninitialized app state
    pub const fn new() -> Self {
        Self {
            run_state: AppRunState::Uninitialized,
            ip_info: None,
            last_fetch: None,
        }
    }

    pub fn set_run_state(&mut self, next: AppRunState) {
        if self.run_state != next {
            info!("App state: {:?} -> {:?}", self.run_state, next);
            self.run_state = next;
        }
    }

    /// Bring the network up and record the outcome.
    pub async fn connect<D: WifiDriver>(
        &mut self,
        manager: &mut NetworkManager<'_, D>,
        wifi: &WifiConfig<'_>,
    ) -> Result<(), AppError> {
        self.set_run_state(AppRunState::WifiConnecting);
        match bring_up_network(manager, wifi).await {
            Ok(info) => {
                self.ip_info = Some(info);
                self.set_run_state(AppRunState::WifiConnected);
                Ok(())
            }
            Err(e) => {
                self.set_run_state(AppRunState::Error);
                Err(e)
            }
        }
    }

    /// Fetch `target` once and record the outcome. Failure is not fatal to
    /// the node: the state moves on to the sensor loop either way.
    pub async fn fetch<R, C, F>(
        &mut self,
        client: &mut HttpClient<R, C>,
        target: &HttpTarget<'_>,
        sink: F,
    ) -> Result<HttpGetSummary, AppError>
    where
        R: Resolver,
        C: TcpConnector,
        F: FnMut(&[u8]),
    {
        self.set_run_state(AppRunState::Fetching);
        let result = fetch_once(client, target, sink).await;
        if let Ok(summary) = &result {
            self.last_fetch = Some(*summary);
        }
        self.set_run_state(AppRunState::SensorsRunning);
        result
    }
}

/// Register for network events, associate, and wait for an IPv4 address.
pub async fn bring_up_network<D: WifiDriver>(
    manager: &mut NetworkManager<'_, D>,
    wifi: &WifiConfig<'_>,
) -> Result<IpInfo, AppError> {
    manager.initialize();

    manager.connect(wifi.ssid, wifi.password).await.map_err(|e| {
        error!("WiFi connect to '{}' failed: {}", wifi.ssid, e);
        e
    })?;
    info!("Connected to '{}', waiting for an IP address", wifi.ssid);

    let info = manager.wait_for_ip_address().await?;
    Ok(info)
}

/// One GET against `target`, chunks forwarded to `sink`.
pub async fn fetch_once<R, C, F>(
    client: &mut HttpClient<R, C>,
    target: &HttpTarget<'_>,
    sink: F,
) -> Result<HttpGetSummary, AppError>
where
    R: Resolver,
    C: TcpConnector,
    F: FnMut(&[u8]),
{
    let summary = client.get(target, sink).await.map_err(|e| {
        error!("HTTP GET http://{}{} failed: {}", target.host, target.path, e);
        e
    })?;
    Ok(summary)
}

/// What one poll cycle produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub cycle: u32,
    pub led_lit: bool,
    pub climate: Option<ClimateReading>,
    pub light: Option<Result<LightSample, SensorError>>,
}

/// The periodic half of the demo: LED heartbeat plus whichever sensors are
/// fitted.
pub struct SensorNode<P, C, A> {
    heartbeat: Heartbeat<P>,
    climate: Option<ClimateSensor<C>>,
    light: Option<LightSensor<A>>,
    cycle: u32,
}

impl<P, C, A> SensorNode<P, C, A>
where
    P: OutputPin,
    C: ClimateDriver,
    A: AdcReader,
{
    pub fn new(
        heartbeat: Heartbeat<P>,
        climate: Option<ClimateSensor<C>>,
        light: Option<LightSensor<A>>,
    ) -> Self {
        Self {
            heartbeat,
            climate,
            light,
            cycle: 0,
        }
    }

    pub fn heartbeat(&self) -> &Heartbeat<P> {
        &self.heartbeat
    }

    pub fn climate_mut(&mut self) -> Option<&mut ClimateSensor<C>> {
        self.climate.as_mut()
    }

    pub fn light_mut(&mut self) -> Option<&mut LightSensor<A>> {
        self.light.as_mut()
    }

    /// Toggle the LED and read every fitted sensor once.
    pub async fn poll_once(&mut self) -> PollReport {
        self.cycle = self.cycle.wrapping_add(1);
        self.heartbeat.toggle();

        let climate = match self.climate.as_mut() {
            Some(sensor) => Some(sensor.read_temperature_humidity().await),
            None => None,
        };

        let light = self.light.as_mut().map(|sensor| {
            let sample = sensor.read_light_sample();
            match &sample {
                Ok(sample) => info!("LDR raw value: {}, mV: {}", sample.raw, sample.millivolts),
                Err(e) => warn!("ADC read failed: {}", e),
            }
            sample
        });

        PollReport {
            cycle: self.cycle,
            led_lit: self.heartbeat.is_lit(),
            climate,
            light,
        }
    }

    /// Poll forever, sleeping `interval` between cycles.
    pub async fn run(&mut self, interval: Duration) -> ! {
        info!("Sensor loop running every {} ms", interval.as_millis());
        loop {
            self.poll_once().await;
            Timer::after(interval).await;
        }
    }
}
