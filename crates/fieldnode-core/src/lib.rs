//! Hardware-independent core library for fieldnode
//!
//! This crate contains the platform-agnostic logic of the fieldnode sensor
//! node: the Wi-Fi event/wait handshake, the one-shot HTTP GET client, the
//! sensor read-and-convert wrappers, the LED heartbeat, the Wi-Fi console and
//! the demo main loop.
//!
//! Hardware is only reached through traits ([`network::WifiDriver`],
//! [`http::Resolver`], [`http::TcpConnector`], [`sensors::ClimateDriver`],
//! [`sensors::AdcReader`] and `embedded_hal::digital::OutputPin`), so it
//! compiles on both embedded targets (ESP32-S3) and desktop hosts (for the
//! simulator and tests).

#![no_std]

pub mod app;
pub mod config;
pub mod heartbeat;
pub mod http;
pub mod network;
pub mod sensors;
pub mod shell;
