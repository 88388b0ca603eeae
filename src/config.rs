use core::str::FromStr;

use log::warn;

use crate::error::ConfigError;

/// Picks a build-time `.env` value, or the fallback when the key is missing.
macro_rules! env_or {
    ($key:tt, $default:expr) => {
        match option_env!($key) {
            Some(value) => value,
            None => $default,
        }
    };
}

pub const WIFI_SSID: &str = env_or!("WIFI_SSID", "meteo");
pub const WIFI_PASS: &str = env_or!("WIFI_PASS", "");
pub const TELEMETRY_TRANSPORT: &str = env_or!("TELEMETRY_TRANSPORT", "udp");
pub const INFLUXDB_UDP_ADDR: &str = env_or!("INFLUXDB_UDP_ADDR", "127.0.0.1:8089");
pub const MQTT_BROKER_URL: &str = env_or!("MQTT_BROKER_URL", "mqtt://127.0.0.1:1883");
pub const MQTT_TOPIC: &str = env_or!("MQTT_TOPIC", "meteo/telemetry");
pub const MQTT_CLIENT_ID: &str = env_or!("MQTT_CLIENT_ID", "meteo-rs");
pub const LINE_FORMAT: &str = env_or!("LINE_FORMAT", "per-metric");
pub const PLATFORM_TAG: &str = env_or!("PLATFORM_TAG", "esp32");

/// Loop delay should not be less than 2000 ms due to DHT22 restrictions.
pub const DHT22_MIN_SAMPLING_INTERVAL_MS: u32 = 2_000;
pub const LOOP_DELAY_MS: u32 = 30_000;
pub const REBOOT_LOOPS: u32 = 1_000;
pub const WIFI_MAX_ATTEMPTS: u32 = 100;
pub const SHORT_DELAY_MS: u32 = 500;
pub const RESTART_SETTLE_MS: u32 = 500;
pub const LINE_CAPACITY: usize = 500;

pub const HUMIDITY_SENSOR_TAG: &str = "dht22";
pub const BAROMETRIC_SENSOR_TAG: &str = "bmp180";
pub const RADIO_SENSOR_TAG: &str = env_or!("RADIO_SENSOR_TAG", "esp32");

const _: () = assert!(LOOP_DELAY_MS >= DHT22_MIN_SAMPLING_INTERVAL_MS);

/// Where the encoded records go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// InfluxDB line protocol over UDP.
    Datagram,
    /// MQTT publish to a broker topic.
    Broker,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" | "datagram" => Ok(Self::Datagram),
            "mqtt" | "broker" => Ok(Self::Broker),
            _ => Err(ConfigError::UnknownTransport(s.to_string())),
        }
    }
}

/// Shape of the encoded telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineFormat {
    /// One record per metric, tagged with platform, device and sensor.
    PerMetric,
    /// One record per cycle holding every field.
    Combined,
}

impl FromStr for LineFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-metric" | "per_metric" | "metric" => Ok(Self::PerMetric),
            "combined" | "single" => Ok(Self::Combined),
            _ => Err(ConfigError::UnknownLineFormat(s.to_string())),
        }
    }
}

/// Timing and retry knobs of the acquisition cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub loop_delay_ms: u32,
    pub reboot_loops: u32,
    pub wifi_max_attempts: u32,
    pub short_delay_ms: u32,
    pub restart_settle_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            loop_delay_ms: LOOP_DELAY_MS,
            reboot_loops: REBOOT_LOOPS,
            wifi_max_attempts: WIFI_MAX_ATTEMPTS,
            short_delay_ms: SHORT_DELAY_MS,
            restart_settle_ms: RESTART_SETTLE_MS,
        }
    }
}

impl Settings {
    /// Raises the loop delay to the DHT22 floor when it was set below it.
    pub fn enforce_sampling_floor(mut self) -> Self {
        if self.loop_delay_ms < DHT22_MIN_SAMPLING_INTERVAL_MS {
            warn!(
                "Loop delay {} ms is below the DHT22 minimum, using {} ms",
                self.loop_delay_ms, DHT22_MIN_SAMPLING_INTERVAL_MS
            );
            self.loop_delay_ms = DHT22_MIN_SAMPLING_INTERVAL_MS;
        }
        self
    }
}

/// Destination of the telemetry, resolved from the build environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkSettings {
    pub transport: TransportKind,
    pub format: LineFormat,
    pub udp_addr: &'static str,
    pub mqtt_url: &'static str,
    pub mqtt_topic: &'static str,
    pub mqtt_client_id: &'static str,
}

impl SinkSettings {
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Ok(Self {
            transport: TELEMETRY_TRANSPORT.parse()?,
            format: LINE_FORMAT.parse()?,
            udp_addr: INFLUXDB_UDP_ADDR,
            mqtt_url: MQTT_BROKER_URL,
            mqtt_topic: MQTT_TOPIC,
            mqtt_client_id: MQTT_CLIENT_ID,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_accepts_aliases() {
        assert_eq!("udp".parse::<TransportKind>().unwrap(), TransportKind::Datagram);
        assert_eq!(" MQTT ".parse::<TransportKind>().unwrap(), TransportKind::Broker);
        assert!(matches!(
            "carrier-pigeon".parse::<TransportKind>(),
            Err(ConfigError::UnknownTransport(_))
        ));
    }

    #[test]
    fn line_format_parses() {
        assert_eq!("per-metric".parse::<LineFormat>().unwrap(), LineFormat::PerMetric);
        assert_eq!("Combined".parse::<LineFormat>().unwrap(), LineFormat::Combined);
        assert!("csv".parse::<LineFormat>().is_err());
    }

    #[test]
    fn default_settings_follow_constants() {
        let settings = Settings::default();
        assert_eq!(settings.loop_delay_ms, 30_000);
        assert_eq!(settings.reboot_loops, 1_000);
        assert_eq!(settings.wifi_max_attempts, 100);
        assert_eq!(settings.short_delay_ms, 500);
    }

    #[test]
    fn sampling_floor_is_never_undercut() {
        let settings = Settings {
            loop_delay_ms: 250,
            ..Settings::default()
        }
        .enforce_sampling_floor();
        assert_eq!(settings.loop_delay_ms, DHT22_MIN_SAMPLING_INTERVAL_MS);

        let untouched = Settings::default().enforce_sampling_floor();
        assert_eq!(untouched.loop_delay_ms, LOOP_DELAY_MS);
    }

    #[test]
    fn radio_tag_comes_from_build_env() {
        assert_eq!(
            RADIO_SENSOR_TAG,
            option_env!("RADIO_SENSOR_TAG").unwrap_or("esp32")
        );
    }

    #[test]
    fn build_env_defaults_resolve() {
        let sink = SinkSettings::from_build_env().unwrap();
        assert!(!sink.udp_addr.is_empty());
        assert!(!sink.mqtt_topic.is_empty());
    }
}
