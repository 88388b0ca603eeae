use crate::error::SensorFault;
use crate::models::{BarometricReading, HumidityReading, Measurement};
use embassy_futures::yield_now;

pub const HUMIDITY_SENSOR_NAME: &str = "DHT22";
pub const BAROMETRIC_SENSOR_NAME: &str = "BMP180";

/// Humidity/temperature sensor. Failed reads come back as NaN.
pub trait HumiditySensor {
    fn begin(&mut self) -> Result<(), SensorFault> {
        Ok(())
    }

    fn read(&mut self) -> HumidityReading;
}

/// Pressure/temperature sensor. A failed read has a NaN temperature.
pub trait BarometricSensor {
    fn begin(&mut self) -> Result<(), SensorFault> {
        Ok(())
    }

    fn read(&mut self) -> BarometricReading;
}

/// Anything that can report the current WiFi RSSI in dBm.
pub trait SignalStrength {
    fn rssi(&self) -> i32;
}

pub struct WeatherStation<H, B> {
    hygrometer: H,
    barometer: B,
}

impl<H: HumiditySensor, B: BarometricSensor> WeatherStation<H, B> {
    pub fn new(hygrometer: H, barometer: B) -> Self {
        Self {
            hygrometer,
            barometer,
        }
    }

    /// Brings both sensors up; run once while booting.
    pub fn begin(&mut self) -> Result<(), SensorFault> {
        self.hygrometer.begin()?;
        self.barometer.begin()
    }

    /// Reads every sensor into a [`Measurement`].
    ///
    /// The humidity sensor is read and validated first, so a bad DHT22 read
    /// never touches the barometer. Barometric pressure is taken as is; only
    /// its temperature is checked.
    pub async fn sample(&mut self, radio: &impl SignalStrength) -> Result<Measurement, SensorFault> {
        let dht = self.hygrometer.read();
        yield_now().await;

        if dht.humidity.is_nan() || dht.temperature.is_nan() {
            return Err(SensorFault {
                sensor: HUMIDITY_SENSOR_NAME,
            });
        }

        let bmp = self.barometer.read();
        yield_now().await;

        if bmp.temperature.is_nan() {
            return Err(SensorFault {
                sensor: BAROMETRIC_SENSOR_NAME,
            });
        }

        let rssi = radio.rssi();

        Ok(Measurement::new(
            dht.humidity,
            dht.temperature,
            bmp.pressure,
            bmp.temperature,
            rssi,
        ))
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    /// Replays the same reading on every call.
    pub(crate) struct FixedHygrometer {
        pub reading: HumidityReading,
        pub reads: usize,
    }

    impl FixedHygrometer {
        pub fn new(humidity: f32, temperature: f32) -> Self {
            Self {
                reading: HumidityReading {
                    humidity,
                    temperature,
                },
                reads: 0,
            }
        }
    }

    impl HumiditySensor for FixedHygrometer {
        fn read(&mut self) -> HumidityReading {
            self.reads += 1;
            self.reading
        }
    }

    pub(crate) struct FixedBarometer {
        pub reading: BarometricReading,
        pub reads: usize,
        pub present: bool,
    }

    impl FixedBarometer {
        pub fn new(pressure: i32, temperature: f32) -> Self {
            Self {
                reading: BarometricReading {
                    pressure,
                    temperature,
                },
                reads: 0,
                present: true,
            }
        }
    }

    impl BarometricSensor for FixedBarometer {
        fn begin(&mut self) -> Result<(), SensorFault> {
            if self.present {
                Ok(())
            } else {
                Err(SensorFault {
                    sensor: BAROMETRIC_SENSOR_NAME,
                })
            }
        }

        fn read(&mut self) -> BarometricReading {
            self.reads += 1;
            self.reading
        }
    }

    pub(crate) struct FixedRadio(pub i32);

    impl SignalStrength for FixedRadio {
        fn rssi(&self) -> i32 {
            self.0
        }
    }
}
