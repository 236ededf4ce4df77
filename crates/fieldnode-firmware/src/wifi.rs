//! esp-radio backend for the core network manager
//!
//! [`EspWifi`] only queues requests. The Wi-Fi controller is owned by
//! [`wifi_task`], which performs each request and reports the outcome to the
//! shared [`NetworkEvents`] hub. Address changes are picked up from the
//! embassy-net stack by [`ip_watch_task`].

use embassy_futures::select::{Either, select};
use embassy_net::{Runner, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{
    AuthMethod, ClientConfig, ModeConfig, ScanConfig, WifiController, WifiDevice, WifiEvent,
    WifiStaState,
};
use fieldnode_core::network::{
    AccessPoint, ConnectParams, DriverCode, DriverStatus, Ipv4Config, LinkDetails, NetEvent,
    NetworkEvents, Security, WifiDriver, WifiState,
};
use log::{error, info, warn};

use crate::config::{SCAN_MAX_RESULTS, WIFI_REQUEST_DEPTH};

/// Request queue is full
const EBUSY: DriverCode = -16;

/// Result codes reported in connect/disconnect events
const STATUS_OK: i32 = 0;
const STATUS_CONFIG_REJECTED: i32 = -1;
const STATUS_START_FAILED: i32 = -2;
const STATUS_ASSOCIATION_FAILED: i32 = -3;
const STATUS_DISCONNECT_FAILED: i32 = -4;

const IP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub enum WifiRequest {
    Connect(ConnectParams),
    Disconnect,
    Scan,
}

pub type WifiRequests = Channel<CriticalSectionRawMutex, WifiRequest, WIFI_REQUEST_DEPTH>;

pub struct EspWifi {
    requests: Sender<'static, CriticalSectionRawMutex, WifiRequest, WIFI_REQUEST_DEPTH>,
    stack: Stack<'static>,
    last_params: Option<ConnectParams>,
}

impl EspWifi {
    pub fn new(requests: &'static WifiRequests, stack: Stack<'static>) -> Self {
        Self {
            requests: requests.sender(),
            stack,
            last_params: None,
        }
    }

    fn enqueue(&self, request: WifiRequest) -> Result<(), DriverCode> {
        self.requests.try_send(request).map_err(|_| {
            warn!("Wi-Fi request queue full");
            EBUSY
        })
    }
}

impl WifiDriver for EspWifi {
    fn request_connect(&mut self, params: &ConnectParams) -> Result<(), DriverCode> {
        self.enqueue(WifiRequest::Connect(params.clone()))?;
        self.last_params = Some(params.clone());
        Ok(())
    }

    fn request_disconnect(&mut self) -> Result<(), DriverCode> {
        self.enqueue(WifiRequest::Disconnect)
    }

    fn request_scan(&mut self) -> Result<(), DriverCode> {
        self.enqueue(WifiRequest::Scan)
    }

    fn iface_status(&mut self) -> Result<DriverStatus, DriverCode> {
        let state = match esp_radio::wifi::sta_state() {
            WifiStaState::Connected => WifiState::Completed,
            WifiStaState::Started => WifiState::Inactive,
            _ => WifiState::Disconnected,
        };

        let link = self.last_params.as_ref().map(|params| LinkDetails {
            ssid: heapless::Vec::from_slice(params.ssid.as_bytes()).unwrap_or_default(),
            band: params.band,
            channel: params.channel,
            security: params.security,
        });

        Ok(DriverStatus { state, link })
    }

    fn ipv4_config(&mut self) -> Option<Ipv4Config> {
        self.stack.config_v4().map(|config| Ipv4Config {
            address: config.address.address(),
            gateway: config.gateway,
        })
    }
}

fn client_config(params: &ConnectParams) -> ModeConfig {
    let client = ClientConfig::default().with_ssid(params.ssid.as_str().into());
    let client = match params.security {
        Security::Open => client.with_auth_method(AuthMethod::None),
        _ => client.with_password(params.passphrase.as_str().into()),
    };
    ModeConfig::Client(client)
}

fn security_of(auth: Option<AuthMethod>) -> Security {
    match auth {
        None | Some(AuthMethod::None) => Security::Open,
        Some(AuthMethod::Wpa)
        | Some(AuthMethod::Wpa2Personal)
        | Some(AuthMethod::WpaWpa2Personal) => Security::Psk,
        Some(_) => Security::Other,
    }
}

async fn connect(controller: &mut WifiController<'static>, params: &ConnectParams) -> i32 {
    if let Err(e) = controller.set_config(&client_config(params)) {
        error!("Wi-Fi config rejected: {:?}", e);
        return STATUS_CONFIG_REJECTED;
    }
    if !matches!(controller.is_started(), Ok(true)) {
        if let Err(e) = controller.start_async().await {
            error!("Wi-Fi start failed: {:?}", e);
            return STATUS_START_FAILED;
        }
        info!("Wi-Fi started");
    }
    match controller.connect_async().await {
        Ok(()) => STATUS_OK,
        Err(e) => {
            error!("Wi-Fi association failed: {:?}", e);
            STATUS_ASSOCIATION_FAILED
        }
    }
}

async fn scan(controller: &mut WifiController<'static>, events: &NetworkEvents) {
    // Scanning needs a started station; start one with an empty client config.
    if !matches!(controller.is_started(), Ok(true)) {
        let default_client = ModeConfig::Client(ClientConfig::default());
        let started = match controller.set_config(&default_client) {
            Ok(()) => controller.start_async().await,
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            error!("Wi-Fi start for scan failed: {:?}", e);
            events.dispatch(NetEvent::ScanDone);
            return;
        }
    }

    let config = ScanConfig::default().with_max(SCAN_MAX_RESULTS);
    match controller.scan_with_config_async(config).await {
        Ok(results) => {
            for ap in results.iter() {
                events.dispatch(NetEvent::ScanResult(AccessPoint::new(
                    ap.ssid.as_bytes(),
                    ap.signal_strength,
                    security_of(ap.auth_method),
                )));
            }
        }
        Err(e) => error!("Wi-Fi scan failed: {:?}", e),
    }
    events.dispatch(NetEvent::ScanDone);
}

/// Owns the Wi-Fi controller: performs queued requests and reports link loss.
#[embassy_executor::task]
pub async fn wifi_task(
    mut controller: WifiController<'static>,
    requests: Receiver<'static, CriticalSectionRawMutex, WifiRequest, WIFI_REQUEST_DEPTH>,
    events: &'static NetworkEvents,
) {
    loop {
        let request = if esp_radio::wifi::sta_state() == WifiStaState::Connected {
            match select(
                requests.receive(),
                controller.wait_for_event(WifiEvent::StaDisconnected),
            )
            .await
            {
                Either::First(request) => request,
                Either::Second(()) => {
                    warn!("Wi-Fi link lost");
                    events.dispatch(NetEvent::DisconnectResult { status: STATUS_OK });
                    continue;
                }
            }
        } else {
            requests.receive().await
        };

        match request {
            WifiRequest::Connect(params) => {
                let status = connect(&mut controller, &params).await;
                events.dispatch(NetEvent::ConnectResult { status });
            }
            WifiRequest::Disconnect => {
                let status = match controller.disconnect_async().await {
                    Ok(()) => STATUS_OK,
                    Err(e) => {
                        error!("Wi-Fi disconnect failed: {:?}", e);
                        STATUS_DISCONNECT_FAILED
                    }
                };
                events.dispatch(NetEvent::DisconnectResult { status });
            }
            WifiRequest::Scan => scan(&mut controller, events).await,
        }
    }
}

/// Report an IPv4-address-added event each time DHCP configures the stack.
#[embassy_executor::task]
pub async fn ip_watch_task(stack: Stack<'static>, events: &'static NetworkEvents) {
    loop {
        while stack.config_v4().is_none() {
            Timer::after(IP_POLL_INTERVAL).await;
        }
        events.dispatch(NetEvent::Ipv4AddrAdded);

        while stack.config_v4().is_some() {
            Timer::after(IP_POLL_INTERVAL).await;
        }
        info!("IPv4 configuration lost");
    }
}

/// Background task for running the network stack
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
