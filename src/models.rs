use core::fmt;

/// One validated snapshot of every sensor, built by
/// [`WeatherStation::sample`](crate::sensors::WeatherStation::sample).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    humidity: f32,
    air_temperature: f32,
    pressure: i32,
    barometric_temperature: f32,
    signal_strength: i32,
}

impl Measurement {
    pub(crate) fn new(
        humidity: f32,
        air_temperature: f32,
        pressure: i32,
        barometric_temperature: f32,
        signal_strength: i32,
    ) -> Self {
        Self {
            humidity,
            air_temperature,
            pressure,
            barometric_temperature,
            signal_strength,
        }
    }

    /// Relative humidity in percent.
    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    /// Air temperature from the humidity sensor, in °C.
    pub fn air_temperature(&self) -> f32 {
        self.air_temperature
    }

    /// Barometric pressure in Pa.
    pub fn pressure(&self) -> i32 {
        self.pressure
    }

    /// Temperature from the barometric sensor, in °C.
    pub fn barometric_temperature(&self) -> f32 {
        self.barometric_temperature
    }

    /// WiFi RSSI in dBm.
    pub fn signal_strength(&self) -> i32 {
        self.signal_strength
    }
}

/// Raw output of the humidity sensor; NaN marks a failed read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumidityReading {
    pub humidity: f32,
    pub temperature: f32,
}

impl HumidityReading {
    pub const UNREADABLE: Self = Self {
        humidity: f32::NAN,
        temperature: f32::NAN,
    };
}

/// Raw output of the barometric sensor; NaN temperature marks a failed read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarometricReading {
    pub pressure: i32,
    pub temperature: f32,
}

impl BarometricReading {
    pub const UNREADABLE: Self = Self {
        pressure: 0,
        temperature: f32::NAN,
    };
}

/// Chip identifier tagging every record, printed as uppercase hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(u32);

impl DeviceIdentity {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Folds the low four bytes of a factory MAC address into an id.
    pub fn from_mac(mac: [u8; 6]) -> Self {
        Self(u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]]))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_renders_as_uppercase_hex() {
        assert_eq!(DeviceIdentity::new(0xABCD_1234).to_string(), "ABCD1234");
        assert_eq!(DeviceIdentity::new(0x00C0_FFEE).to_string(), "C0FFEE");
    }

    #[test]
    fn identity_from_mac_uses_trailing_bytes() {
        let id = DeviceIdentity::from_mac([0x24, 0x0A, 0xAB, 0xCD, 0x12, 0x34]);
        assert_eq!(id.raw(), 0xABCD_1234);
    }
}
