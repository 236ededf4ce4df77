//! Wi-Fi console on the USB serial/JTAG port

use core::fmt;

use embassy_time::{Duration, Timer};
use esp_hal::Blocking;
use esp_hal::usb_serial_jtag::UsbSerialJtag;
use fieldnode_core::network::NetworkManager;
use fieldnode_core::shell;
use log::{error, info};

use crate::wifi::EspWifi;

const LINE_CAPACITY: usize = 128;
const OUTPUT_CAPACITY: usize = 1024;
const IDLE_POLL: Duration = Duration::from_millis(10);
const PROMPT: &str = "fieldnode:~$ ";

/// Console output is collected per command, then written in one go.
struct Output(heapless::String<OUTPUT_CAPACITY>);

impl fmt::Write for Output {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.push_str(s).map_err(|_| fmt::Error)
    }
}

fn write_bytes(usb: &mut UsbSerialJtag<'static, Blocking>, bytes: &[u8]) {
    if let Err(e) = usb.write(bytes) {
        error!("Console write failed: {:?}", e);
    }
}

#[embassy_executor::task]
pub async fn console_task(
    mut usb: UsbSerialJtag<'static, Blocking>,
    mut manager: NetworkManager<'static, EspWifi>,
) {
    info!("Console ready, type 'help'");
    let mut line: heapless::String<LINE_CAPACITY> = heapless::String::new();
    write_bytes(&mut usb, PROMPT.as_bytes());

    loop {
        let byte = match usb.read_byte() {
            Ok(byte) => byte,
            Err(_) => {
                Timer::after(IDLE_POLL).await;
                continue;
            }
        };

        match byte {
            b'\r' | b'\n' => {
                write_bytes(&mut usb, b"\r\n");
                let mut out = Output(heapless::String::new());
                if shell::handle_line(&mut manager, &line, &mut out).await.is_err() {
                    error!("Console output truncated");
                }
                write_bytes(&mut usb, out.0.as_bytes());
                write_bytes(&mut usb, PROMPT.as_bytes());
                line.clear();
            }
            // Backspace / DEL
            0x08 | 0x7f => {
                if line.pop().is_some() {
                    write_bytes(&mut usb, b"\x08 \x08");
                }
            }
            byte if byte.is_ascii_graphic() || byte == b' ' => {
                if line.push(byte as char).is_ok() {
                    write_bytes(&mut usb, &[byte]);
                }
            }
            _ => {}
        }
    }
}
