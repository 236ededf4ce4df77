//! Status LED that flips once per poll cycle to show the node is alive

use embedded_hal::digital::OutputPin;
use log::error;

pub struct Heartbeat<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> Heartbeat<P> {
    /// Takes the pin as-is and assumes the LED starts off.
    pub fn new(pin: P) -> Self {
        Self { pin, lit: false }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Flip the LED. A pin error is logged and the tracked level is kept.
    pub fn toggle(&mut self) {
        let result = if self.lit {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        match result {
            Ok(()) => self.lit = !self.lit,
            Err(e) => error!("Failed to toggle heartbeat LED: {:?}", e),
        }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    #[derive(Default)]
    pub(crate) struct MockPin {
        pub high: bool,
        pub writes: usize,
        pub broken: bool,
    }

    impl ErrorType for MockPin {
        type Error = ErrorKind;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), ErrorKind> {
            if self.broken {
                return Err(ErrorKind::Other);
            }
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), ErrorKind> {
            if self.broken {
                return Err(ErrorKind::Other);
            }
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_toggle_alternates() {
        let mut heartbeat = Heartbeat::new(MockPin::default());
        heartbeat.toggle();
        assert!(heartbeat.is_lit());
        heartbeat.toggle();
        assert!(!heartbeat.is_lit());
        heartbeat.toggle();

        let pin = heartbeat.release();
        assert!(pin.high);
        assert_eq!(pin.writes, 3);
    }

    #[test]
    fn test_pin_error_is_swallowed() {
        let mut heartbeat = Heartbeat::new(MockPin {
            broken: true,
            ..Default::default()
        });
        heartbeat.toggle();
        heartbeat.toggle();
        assert!(!heartbeat.is_lit());
    }
}
