use core::fmt;

use log::{error, info};

use super::{Sensor, SensorError};

const SENSOR_NAME: &str = "LDR";

/// Light level expressed as the voltage across the divider
pub type Millivolts = u16;

/// Static description of the ADC channel the LDR divider is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcChannelConfig {
    pub channel: u8,
    pub resolution_bits: u8,
    pub vref_mv: u16,
}

/// Single-channel, one-shot ADC access.
pub trait AdcReader {
    type Error: fmt::Debug;

    fn is_ready(&mut self) -> bool;

    fn setup(&mut self, config: &AdcChannelConfig) -> Result<(), Self::Error>;

    /// One conversion on the configured channel, as a raw code.
    fn read_raw(&mut self, config: &AdcChannelConfig) -> Result<u16, Self::Error>;
}

/// `raw * vref / 2^resolution`, truncated toward zero.
///
/// Codes above full scale are clamped to it, so the result never exceeds
/// `vref`. A resolution of 32 bits or more converts everything to 0 mV.
pub const fn raw_to_millivolts(raw: u16, config: &AdcChannelConfig) -> Millivolts {
    let bits = config.resolution_bits as u32;
    let raw = if bits < 16 && raw as u32 > (1 << bits) - 1 {
        ((1u32 << bits) - 1) as u16
    } else {
        raw
    };
    match (raw as u32 * config.vref_mv as u32).checked_shr(bits) {
        Some(scaled) => scaled as Millivolts,
        None => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSample {
    pub raw: u16,
    pub millivolts: Millivolts,
}

pub struct LightSensor<A> {
    adc: A,
    config: AdcChannelConfig,
}

impl<A: AdcReader> LightSensor<A> {
    /// A missing ADC is fatal. A channel setup failure is only logged, the
    /// conversions that follow will report their own errors.
    pub fn new(mut adc: A, config: AdcChannelConfig) -> Result<Self, SensorError> {
        if !adc.is_ready() {
            error!("Failed to get ADC device binding");
            return Err(SensorError::NotReady {
                sensor: SENSOR_NAME,
            });
        }
        if let Err(e) = adc.setup(&config) {
            error!("Failed to configure ADC channel {}: {:?}", config.channel, e);
        }
        Ok(Self { adc, config })
    }

    pub fn config(&self) -> &AdcChannelConfig {
        &self.config
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    pub fn read_light_sample(&mut self) -> Result<LightSample, SensorError> {
        let raw = self.adc.read_raw(&self.config).map_err(|e| {
            error!("Failed to read ADC value: {:?}", e);
            SensorError::ReadFailed {
                sensor: SENSOR_NAME,
                operation: "adc read",
                details: "conversion on the LDR channel failed",
            }
        })?;
        let millivolts = raw_to_millivolts(raw, &self.config);
        info!("{}: raw {} -> {} mV", SENSOR_NAME, raw, millivolts);
        Ok(LightSample { raw, millivolts })
    }

    pub fn read_light_level(&mut self) -> Result<Millivolts, SensorError> {
        self.read_light_sample().map(|sample| sample.millivolts)
    }
}

impl<A: AdcReader> Sensor for LightSensor<A> {
    type Reading = LightSample;

    async fn read(&mut self) -> Result<LightSample, SensorError> {
        self.read_light_sample()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CONFIG: AdcChannelConfig = AdcChannelConfig {
        channel: 0,
        resolution_bits: 12,
        vref_mv: 3300,
    };

    pub(crate) struct MockAdc {
        pub ready: bool,
        pub fail_setup: bool,
        pub fail_read: bool,
        pub raw: u16,
        pub setups: usize,
    }

    impl MockAdc {
        pub(crate) fn new(raw: u16) -> Self {
            Self {
                ready: true,
                fail_setup: false,
                fail_read: false,
                raw,
                setups: 0,
            }
        }
    }

    impl AdcReader for MockAdc {
        type Error = i32;

        fn is_ready(&mut self) -> bool {
            self.ready
        }

        fn setup(&mut self, _config: &AdcChannelConfig) -> Result<(), i32> {
            self.setups += 1;
            if self.fail_setup { Err(-5) } else { Ok(()) }
        }

        fn read_raw(&mut self, _config: &AdcChannelConfig) -> Result<u16, i32> {
            if self.fail_read { Err(-5) } else { Ok(self.raw) }
        }
    }

    #[test]
    fn test_conversion_formula_for_every_code() {
        for raw in 0..(1u16 << CONFIG.resolution_bits) {
            let expected = (raw as u32 * 3300 / 4096) as u16;
            assert_eq!(raw_to_millivolts(raw, &CONFIG), expected, "raw {}", raw);
        }
    }

    #[test]
    fn test_conversion_end_points() {
        assert_eq!(raw_to_millivolts(0, &CONFIG), 0);
        assert_eq!(raw_to_millivolts(4095, &CONFIG), 3299);
        assert_eq!(raw_to_millivolts(2048, &CONFIG), 1650);
    }

    #[test]
    fn test_conversion_other_resolution() {
        let config = AdcChannelConfig {
            channel: 3,
            resolution_bits: 10,
            vref_mv: 1100,
        };
        assert_eq!(raw_to_millivolts(1023, &config), 1098);
        assert_eq!(raw_to_millivolts(512, &config), 550);
    }

    #[test]
    fn test_conversion_clamps_out_of_range_codes() {
        assert_eq!(raw_to_millivolts(5000, &CONFIG), 3299);
        assert_eq!(raw_to_millivolts(u16::MAX, &CONFIG), 3299);

        let wide = AdcChannelConfig {
            resolution_bits: 16,
            ..CONFIG
        };
        assert_eq!(raw_to_millivolts(u16::MAX, &wide), 3299);

        let oversized = AdcChannelConfig {
            resolution_bits: 40,
            ..CONFIG
        };
        assert_eq!(raw_to_millivolts(4095, &oversized), 0);

        let zero_bits = AdcChannelConfig {
            resolution_bits: 0,
            ..CONFIG
        };
        assert_eq!(raw_to_millivolts(1, &zero_bits), 0);
    }

    #[test]
    fn test_not_ready_is_fatal() {
        let mut adc = MockAdc::new(0);
        adc.ready = false;
        assert_eq!(
            LightSensor::new(adc, CONFIG).err(),
            Some(SensorError::NotReady { sensor: "LDR" })
        );
    }

    #[test]
    fn test_setup_failure_is_not_fatal() {
        let mut adc = MockAdc::new(1000);
        adc.fail_setup = true;
        let mut sensor = LightSensor::new(adc, CONFIG).unwrap();
        assert_eq!(sensor.adc_mut().setups, 1);
        assert_eq!(sensor.read_light_level(), Ok(805));
    }

    #[test]
    fn test_read_failure_is_an_error() {
        let mut sensor = LightSensor::new(MockAdc::new(1000), CONFIG).unwrap();
        sensor.adc_mut().fail_read = true;
        assert!(matches!(
            sensor.read_light_level(),
            Err(SensorError::ReadFailed { sensor: "LDR", .. })
        ));
    }

    #[test]
    fn test_sample_carries_raw_code() {
        let mut sensor = LightSensor::new(MockAdc::new(2048), CONFIG).unwrap();
        assert_eq!(
            sensor.read_light_sample(),
            Ok(LightSample {
                raw: 2048,
                millivolts: 1650
            })
        );
    }
}
