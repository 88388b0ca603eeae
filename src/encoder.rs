//! InfluxDB line-protocol encoding of a [`Measurement`].
//!
//! Per-metric form, one line each:
//!
//! ```text
//! humidity,platform=esp32,device=ABCD1234,sensor=dht22 value=55.50
//! ```
//!
//! Combined form, one line per cycle:
//!
//! ```text
//! device=ABCD1234 dht22_temperature=21.30,dht22_humuidity=55.50,bmp180_pressure=101325,bmp180_temperature=21.00,rssi=-60
//! ```

use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::config::{
    BAROMETRIC_SENSOR_TAG, HUMIDITY_SENSOR_TAG, LINE_CAPACITY, LineFormat, PLATFORM_TAG,
    RADIO_SENSOR_TAG,
};
use crate::error::EncodeError;
use crate::logging::log_dropped_record;
use crate::models::{DeviceIdentity, Measurement};

/// Upper bound of records produced from one measurement.
pub const MAX_RECORDS: usize = 5;

/// A numeric field value. Floats always carry two fractional digits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue {
    Float(f32),
    Int(i32),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{:.2}", v),
            Self::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Tags that distinguish one deployment's records from another's.
#[derive(Clone, Copy, Debug)]
pub struct Tags {
    pub platform: &'static str,
    pub humidity_sensor: &'static str,
    pub barometric_sensor: &'static str,
    pub radio: &'static str,
}

impl Default for Tags {
    fn default() -> Self {
        Self {
            platform: PLATFORM_TAG,
            humidity_sensor: HUMIDITY_SENSOR_TAG,
            barometric_sensor: BAROMETRIC_SENSOR_TAG,
            radio: RADIO_SENSOR_TAG,
        }
    }
}

struct Metric {
    name: &'static str,
    sensor: &'static str,
    value: FieldValue,
}

pub struct LineEncoder<const N: usize = LINE_CAPACITY> {
    format: LineFormat,
    tags: Tags,
}

impl<const N: usize> LineEncoder<N> {
    pub fn new(format: LineFormat, tags: Tags) -> Self {
        Self { format, tags }
    }

    /// Encodes a measurement into fresh line buffers.
    ///
    /// A line that does not fit in `N` bytes is logged and left out; the
    /// remaining lines are still returned.
    pub fn encode(&self, m: &Measurement, device: &DeviceIdentity) -> Vec<String<N>, MAX_RECORDS> {
        let mut records = Vec::new();

        match self.format {
            LineFormat::PerMetric => {
                for metric in self.metrics(m) {
                    match self.metric_line(&metric, device) {
                        Ok(line) => {
                            // never more metrics than MAX_RECORDS
                            let _ = records.push(line);
                        }
                        Err(e) => log_dropped_record(format_args!("{} ({})", metric.name, e)),
                    }
                }
            }
            LineFormat::Combined => match self.combined_line(m, device) {
                Ok(line) => {
                    let _ = records.push(line);
                }
                Err(e) => log_dropped_record(e),
            },
        }

        records
    }

    fn metrics(&self, m: &Measurement) -> [Metric; MAX_RECORDS] {
        [
            Metric {
                name: "humidity",
                sensor: self.tags.humidity_sensor,
                value: FieldValue::Float(m.humidity()),
            },
            Metric {
                name: "temperature",
                sensor: self.tags.humidity_sensor,
                value: FieldValue::Float(m.air_temperature()),
            },
            Metric {
                name: "pressure",
                sensor: self.tags.barometric_sensor,
                value: FieldValue::Int(m.pressure()),
            },
            Metric {
                name: "temperature",
                sensor: self.tags.barometric_sensor,
                value: FieldValue::Float(m.barometric_temperature()),
            },
            Metric {
                name: "rssi",
                sensor: self.tags.radio,
                value: FieldValue::Int(m.signal_strength()),
            },
        ]
    }

    fn metric_line(&self, metric: &Metric, device: &DeviceIdentity) -> Result<String<N>, EncodeError> {
        let mut line = String::new();
        write!(
            line,
            "{},platform={},device={},sensor={} value={}",
            metric.name, self.tags.platform, device, metric.sensor, metric.value
        )
        .map_err(|_| EncodeError::Overflow { capacity: N })?;
        Ok(line)
    }

    /// Field keys match the series already stored by deployed stations,
    /// including the `humuidity` spelling.
    fn combined_line(&self, m: &Measurement, device: &DeviceIdentity) -> Result<String<N>, EncodeError> {
        let mut line = String::new();
        write!(
            line,
            "device={} {}_temperature={},{}_humuidity={},{}_pressure={},{}_temperature={},rssi={}",
            device,
            self.tags.humidity_sensor,
            FieldValue::Float(m.air_temperature()),
            self.tags.humidity_sensor,
            FieldValue::Float(m.humidity()),
            self.tags.barometric_sensor,
            FieldValue::Int(m.pressure()),
            self.tags.barometric_sensor,
            FieldValue::Float(m.barometric_temperature()),
            FieldValue::Int(m.signal_strength()),
        )
        .map_err(|_| EncodeError::Overflow { capacity: N })?;
        Ok(line)
    }
}
