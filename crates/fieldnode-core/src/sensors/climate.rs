use core::fmt;

use log::{error, info};

use super::{Sensor, SensorError, SensorValue};

const SENSOR_NAME: &str = "DHT11";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateChannel {
    AmbientTemperature,
    Humidity,
}

/// Fetch-then-read access to a temperature/humidity sampler.
pub trait ClimateDriver {
    type Error: fmt::Debug;

    fn is_ready(&mut self) -> bool;

    /// Take a new sample into the driver.
    fn sample_fetch(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Read one channel of the last fetched sample.
    fn channel_get(&mut self, channel: ClimateChannel) -> Result<SensorValue, Self::Error>;
}

/// Typed readings from the climate sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClimateReading {
    /// Degrees Celsius
    pub temperature: SensorValue,
    /// Percent relative humidity
    pub humidity: SensorValue,
    /// False when any step failed and at least one value is carried over
    pub fresh: bool,
}

pub struct ClimateSensor<D> {
    driver: D,
    last: ClimateReading,
}

impl<D: ClimateDriver> ClimateSensor<D> {
    pub fn new(mut driver: D) -> Result<Self, SensorError> {
        if !driver.is_ready() {
            error!("Error initializing temperature sensor");
            return Err(SensorError::NotReady {
                sensor: SENSOR_NAME,
            });
        }
        Ok(Self {
            driver,
            last: ClimateReading::default(),
        })
    }

    /// Fetch a sample and read both channels.
    ///
    /// Every failing step is logged on its own and never stops the remaining
    /// steps. A channel that cannot be read keeps its previous value.
    pub async fn read_temperature_humidity(&mut self) -> ClimateReading {
        let mut fresh = true;

        if let Err(e) = self.driver.sample_fetch().await {
            error!("Error fetching sensor data: {:?}", e);
            fresh = false;
        }

        match self.driver.channel_get(ClimateChannel::AmbientTemperature) {
            Ok(value) => self.last.temperature = value,
            Err(e) => {
                error!("Error reading temperature: {:?}", e);
                fresh = false;
            }
        }

        match self.driver.channel_get(ClimateChannel::Humidity) {
            Ok(value) => self.last.humidity = value,
            Err(e) => {
                error!("Error reading humidity: {:?}", e);
                fresh = false;
            }
        }

        self.last.fresh = fresh;
        info!(
            "{}: temperature {} C, humidity {} %",
            SENSOR_NAME, self.last.temperature, self.last.humidity
        );
        self.last
    }

    pub fn last_reading(&self) -> ClimateReading {
        self.last
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: ClimateDriver> Sensor for ClimateSensor<D> {
    type Reading = ClimateReading;

    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        Ok(self.read_temperature_humidity().await)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embassy_futures::block_on;

    /// Returns the configured values; each step can be made to fail.
    pub(crate) struct MockClimate {
        pub ready: bool,
        pub fail_fetch: bool,
        pub fail_temperature: bool,
        pub fail_humidity: bool,
        pub temperature: SensorValue,
        pub humidity: SensorValue,
        pub fetches: usize,
    }

    impl MockClimate {
        pub(crate) fn new(temperature: SensorValue, humidity: SensorValue) -> Self {
            Self {
                ready: true,
                fail_fetch: false,
                fail_temperature: false,
                fail_humidity: false,
                temperature,
                humidity,
                fetches: 0,
            }
        }
    }

    impl ClimateDriver for MockClimate {
        type Error = i32;

        fn is_ready(&mut self) -> bool {
            self.ready
        }

        async fn sample_fetch(&mut self) -> Result<(), i32> {
            self.fetches += 1;
            if self.fail_fetch { Err(-5) } else { Ok(()) }
        }

        fn channel_get(&mut self, channel: ClimateChannel) -> Result<SensorValue, i32> {
            match channel {
                ClimateChannel::AmbientTemperature if self.fail_temperature => Err(-22),
                ClimateChannel::AmbientTemperature => Ok(self.temperature),
                ClimateChannel::Humidity if self.fail_humidity => Err(-22),
                ClimateChannel::Humidity => Ok(self.humidity),
            }
        }
    }

    fn sensor() -> ClimateSensor<MockClimate> {
        ClimateSensor::new(MockClimate::new(
            SensorValue::new(22, 0),
            SensorValue::new(45, 0),
        ))
        .unwrap()
    }

    #[test]
    fn test_not_ready_is_fatal() {
        let mut driver = MockClimate::new(SensorValue::default(), SensorValue::default());
        driver.ready = false;
        assert_eq!(
            ClimateSensor::new(driver).err(),
            Some(SensorError::NotReady { sensor: "DHT11" })
        );
    }

    #[test]
    fn test_read_both_channels() {
        let mut sensor = sensor();
        let reading = block_on(sensor.read_temperature_humidity());
        assert_eq!(reading.temperature, SensorValue::new(22, 0));
        assert_eq!(reading.humidity, SensorValue::new(45, 0));
        assert!(reading.fresh);
    }

    #[test]
    fn test_failed_fetch_keeps_previous_values() {
        let mut sensor = sensor();
        block_on(sensor.read_temperature_humidity());

        // The driver would serve new values, but the fetch failure must not
        // reset what callers already have.
        let driver = sensor.driver_mut();
        driver.fail_fetch = true;
        driver.fail_temperature = true;
        driver.fail_humidity = true;
        let reading = block_on(sensor.read_temperature_humidity());

        assert_eq!(reading.temperature, SensorValue::new(22, 0));
        assert_eq!(reading.humidity, SensorValue::new(45, 0));
        assert!(!reading.fresh);
    }

    #[test]
    fn test_temperature_failure_does_not_abort_humidity() {
        let mut sensor = sensor();
        block_on(sensor.read_temperature_humidity());

        let driver = sensor.driver_mut();
        driver.fail_temperature = true;
        driver.temperature = SensorValue::new(30, 0);
        driver.humidity = SensorValue::new(60, 500_000);
        let reading = block_on(sensor.read_temperature_humidity());

        assert_eq!(reading.temperature, SensorValue::new(22, 0));
        assert_eq!(reading.humidity, SensorValue::new(60, 500_000));
        assert!(!reading.fresh);
    }

    #[test]
    fn test_first_read_failure_yields_zero() {
        let mut sensor = sensor();
        sensor.driver_mut().fail_humidity = true;
        let reading = block_on(sensor.read_temperature_humidity());
        assert_eq!(reading.humidity, SensorValue::default());
        assert_eq!(sensor.last_reading(), reading);
    }

    #[test]
    fn test_sensor_trait_never_fails() {
        let mut sensor = sensor();
        sensor.driver_mut().fail_fetch = true;
        assert!(block_on(Sensor::read(&mut sensor)).is_ok());
    }
}
