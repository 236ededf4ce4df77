#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::StackResources;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Flex, Level, Output, OutputConfig, Pull};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::usb_serial_jtag::UsbSerialJtag;
use fieldnode_core::app::{AppRunState, AppState, SensorNode};
use fieldnode_core::heartbeat::Heartbeat;
use fieldnode_core::http::HttpClient;
use fieldnode_core::network::{NetworkEvents, NetworkManager};
use fieldnode_core::sensors::{ClimateSensor, LightSensor};
use fieldnode_firmware::config::{
    self, LDR_CHANNEL, NODE, TCP_RX_BUFFER_SIZE, TCP_TX_BUFFER_SIZE,
};
use fieldnode_firmware::console::console_task;
use fieldnode_firmware::net::{StackConnector, StackResolver};
use fieldnode_firmware::sensors::{Dht11Driver, EspAdc};
use fieldnode_firmware::wifi::{EspWifi, WifiRequests, ip_watch_task, net_task, wifi_task};
use log::{error, info};
use static_cell::StaticCell;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static NETWORK_EVENTS: NetworkEvents = NetworkEvents::new();
static WIFI_REQUESTS: WifiRequests = WifiRequests::new();

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static TCP_RX_BUFFER: StaticCell<[u8; TCP_RX_BUFFER_SIZE]> = StaticCell::new();
static TCP_TX_BUFFER: StaticCell<[u8; TCP_TX_BUFFER_SIZE]> = StaticCell::new();

fn log_chunk(chunk: &[u8]) {
    info!("{}", core::str::from_utf8(chunk).unwrap_or("<binary data>"));
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    // Sensors are checked before the network wait so a missing one shows up at boot.
    let led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let mut dht_pin = Flex::new(peripherals.GPIO4);
    dht_pin.apply_output_config(
        &OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    dht_pin.set_input_enable(true);
    dht_pin.set_output_enable(true);
    let climate = ClimateSensor::new(Dht11Driver::new(dht_pin, Delay::new()))
        .inspect_err(|e| error!("Climate sensor disabled: {}", e))
        .ok();

    let mut adc_config = AdcConfig::new();
    let ldr_pin = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    let light = LightSensor::new(EspAdc::new(adc, ldr_pin), LDR_CHANNEL)
        .inspect_err(|e| error!("Light sensor disabled: {}", e))
        .ok();

    // Wi-Fi and network stack
    let radio =
        RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );

    if let Err(e) = spawner.spawn(wifi_task(
        controller,
        WIFI_REQUESTS.receiver(),
        &NETWORK_EVENTS,
    )) {
        error!("Failed to spawn Wi-Fi task: {:?}", e);
    }
    if let Err(e) = spawner.spawn(net_task(runner)) {
        error!("Failed to spawn network task: {:?}", e);
    }
    if let Err(e) = spawner.spawn(ip_watch_task(stack, &NETWORK_EVENTS)) {
        error!("Failed to spawn IP watch task: {:?}", e);
    }

    let mut manager = NetworkManager::new(EspWifi::new(&WIFI_REQUESTS, stack), &NETWORK_EVENTS)
        .with_timeout(NODE.wait_timeout);
    let mut app = AppState::new();

    match app.connect(&mut manager, &NODE.wifi).await {
        Ok(()) => {
            let mut client = HttpClient::new(
                StackResolver::new(stack),
                StackConnector::new(
                    stack,
                    TCP_RX_BUFFER.init([0; TCP_RX_BUFFER_SIZE]),
                    TCP_TX_BUFFER.init([0; TCP_TX_BUFFER_SIZE]),
                ),
            );
            if let Ok(summary) = app.fetch(&mut client, &NODE.http, log_chunk).await {
                info!(
                    "Fetched http://{}{}: {} bytes",
                    config::HTTP_HOST,
                    config::HTTP_PATH,
                    summary.bytes_received
                );
            }
        }
        Err(e) => error!("Network bring-up failed, continuing offline: {}", e),
    }

    // The console takes over the manager so connections can be retried by hand.
    let usb = UsbSerialJtag::new(peripherals.USB_DEVICE);
    if let Err(e) = spawner.spawn(console_task(usb, manager)) {
        error!("Failed to spawn console task: {:?}", e);
    }

    app.set_run_state(AppRunState::SensorsRunning);
    let mut node = SensorNode::new(Heartbeat::new(led), climate, light);
    node.run(NODE.poll_interval).await
}
