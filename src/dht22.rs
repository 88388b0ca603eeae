//! DHT22 (AM2302) on an open-drain GPIO, read through `dht-sensor`.

use dht_sensor::dht22;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::logging::log_sensor_error;
use crate::models::HumidityReading;
use crate::sensors::{HUMIDITY_SENSOR_NAME, HumiditySensor};

pub struct Dht22<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// `pin` must idle high (open drain with pull-up).
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }
}

impl From<dht22::Reading> for HumidityReading {
    fn from(reading: dht22::Reading) -> Self {
        Self {
            humidity: reading.relative_humidity,
            temperature: reading.temperature,
        }
    }
}

impl<P, D> HumiditySensor for Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn read(&mut self) -> HumidityReading {
        match dht22::blocking::read(&mut self.delay, &mut self.pin) {
            Ok(reading) => reading.into(),
            Err(e) => {
                log_sensor_error(HUMIDITY_SENSOR_NAME, e);
                HumidityReading::UNREADABLE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    /// A line that rejects every access, like a pin claimed elsewhere.
    struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = ErrorKind;
    }

    impl InputPin for BrokenPin {
        fn is_high(&mut self) -> Result<bool, ErrorKind> {
            Err(ErrorKind::Other)
        }

        fn is_low(&mut self) -> Result<bool, ErrorKind> {
            Err(ErrorKind::Other)
        }
    }

    impl OutputPin for BrokenPin {
        fn set_low(&mut self) -> Result<(), ErrorKind> {
            Err(ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), ErrorKind> {
            Err(ErrorKind::Other)
        }
    }

    /// A line the sensor never pulls low.
    struct SilentPin;

    impl ErrorType for SilentPin {
        type Error = core::convert::Infallible;
    }

    impl InputPin for SilentPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(false)
        }
    }

    impl OutputPin for SilentPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn reading_maps_onto_humidity_reading() {
        let reading = HumidityReading::from(dht22::Reading {
            temperature: -10.1,
            relative_humidity: 65.2,
        });
        assert_eq!(reading.humidity, 65.2);
        assert_eq!(reading.temperature, -10.1);
    }

    #[test]
    fn pin_failure_surfaces_as_nan() {
        let mut dht = Dht22::new(BrokenPin, NoDelay);
        let reading = dht.read();
        assert!(reading.humidity.is_nan());
        assert!(reading.temperature.is_nan());
    }

    #[test]
    fn silent_sensor_surfaces_as_nan() {
        let mut dht = Dht22::new(SilentPin, NoDelay);
        let reading = dht.read();
        assert!(reading.humidity.is_nan());
        assert!(reading.temperature.is_nan());
    }
}
