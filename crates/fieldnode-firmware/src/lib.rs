//! ESP32-S3 firmware-specific modules for fieldnode
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the esp-radio Wi-Fi controller task, the embassy-net resolver and
//! TCP connector, the DHT11 and ADC drivers, the USB serial console and the
//! build-time configuration.

#![no_std]

extern crate alloc;

pub mod config;
pub mod console;
pub mod net;
pub mod sensors;
pub mod wifi;
