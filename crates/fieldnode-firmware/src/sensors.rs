//! On-board peripherals behind the core sensor traits

use core::fmt;

use dht_sensor::{DhtError, dht11};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::peripherals::{ADC1, GPIO1};
use fieldnode_core::sensors::{
    AdcChannelConfig, AdcReader, ClimateChannel, ClimateDriver, SensorValue,
};
use log::info;
use thiserror_no_std::Error;

#[derive(Error, Debug)]
pub enum DhtFault<E: fmt::Debug> {
    #[error("DHT11 transfer failed: {0:?}")]
    Read(DhtError<E>),
    /// A channel was read before any sample was fetched
    #[error("no DHT11 sample fetched yet")]
    NoSample,
}

/// DHT11 on a single open-drain data line.
pub struct Dht11Driver<P, D> {
    pin: P,
    delay: D,
    last: Option<dht11::Reading>,
}

impl<P, D> Dht11Driver<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            last: None,
        }
    }
}

impl<P, D> ClimateDriver for Dht11Driver<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    type Error = DhtFault<P::Error>;

    /// The line idles high; a sensor that cannot be driven is not usable.
    fn is_ready(&mut self) -> bool {
        self.pin.set_high().is_ok()
    }

    async fn sample_fetch(&mut self) -> Result<(), Self::Error> {
        let reading =
            dht11::blocking::read(&mut self.delay, &mut self.pin).map_err(DhtFault::Read)?;
        self.last = Some(reading);
        Ok(())
    }

    fn channel_get(&mut self, channel: ClimateChannel) -> Result<SensorValue, Self::Error> {
        let reading = self.last.as_ref().ok_or(DhtFault::NoSample)?;
        let integer = match channel {
            ClimateChannel::AmbientTemperature => i32::from(reading.temperature),
            ClimateChannel::Humidity => i32::from(reading.relative_humidity),
        };
        Ok(SensorValue::new(integer, 0))
    }
}

pub type LdrAdc = Adc<'static, ADC1<'static>, Blocking>;
pub type LdrAdcPin = AdcPin<GPIO1<'static>, ADC1<'static>>;

/// ADC1 one-shot conversions on the LDR pin.
///
/// Attenuation is fixed when the pin is enabled, so channel setup has nothing
/// left to do at runtime.
pub struct EspAdc {
    adc: LdrAdc,
    pin: LdrAdcPin,
}

#[derive(Error, Debug)]
#[error("ADC1 one-shot conversion failed")]
pub struct AdcFault;

impl EspAdc {
    pub fn new(adc: LdrAdc, pin: LdrAdcPin) -> Self {
        Self { adc, pin }
    }
}

impl AdcReader for EspAdc {
    type Error = AdcFault;

    fn is_ready(&mut self) -> bool {
        true
    }

    fn setup(&mut self, config: &AdcChannelConfig) -> Result<(), AdcFault> {
        info!(
            "ADC1 channel {} ready ({} bit, {} mV full scale)",
            config.channel, config.resolution_bits, config.vref_mv
        );
        Ok(())
    }

    fn read_raw(&mut self, _config: &AdcChannelConfig) -> Result<u16, AdcFault> {
        nb::block!(self.adc.read_oneshot(&mut self.pin)).map_err(|_| AdcFault)
    }
}
