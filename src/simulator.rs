//! Host bindings: synthetic sensors, an always-available WiFi link and a
//! real UDP socket, so the firmware loop can run on a desktop.

use std::net::Ipv4Addr;

use embassy_time::Delay;
use log::info;

use crate::config::{Settings, SinkSettings, TransportKind, WIFI_PASS, WIFI_SSID};
use crate::encoder::{LineEncoder, Tags};
use crate::models::{BarometricReading, DeviceIdentity, HumidityReading};
use crate::network::{ConnectivityManager, WifiLink};
use crate::sensors::{BarometricSensor, HumiditySensor, SignalStrength, WeatherStation};
use crate::supervisor::Supervisor;
use crate::transport::{DatagramTransport, UdpDatagram};

pub const SIMULATED_DEVICE: DeviceIdentity = DeviceIdentity::new(0x5EED_0001);

/// Seconds of simulated time between two reads.
const SAMPLE_STEP_SECS: f64 = 30.0;

pub type Simulation = Supervisor<
    SyntheticHygrometer,
    SyntheticBarometer,
    LoopbackWifi,
    DatagramTransport<UdpDatagram>,
    Delay,
>;

/// DHT22 stand-in: 40-60 %RH and 18-24 °C on slow sinusoids.
#[derive(Default)]
pub struct SyntheticHygrometer {
    elapsed_secs: f64,
}

impl HumiditySensor for SyntheticHygrometer {
    fn read(&mut self) -> HumidityReading {
        self.elapsed_secs += SAMPLE_STEP_SECS;
        let t = self.elapsed_secs;

        let humidity = 50.0 + 8.0 * (t / 1800.0).sin() + 2.0 * (t / 230.0).cos();
        let temperature = 21.0 + 2.5 * (t / 3600.0).sin() + 0.5 * (t / 370.0).cos();

        HumidityReading {
            humidity: humidity as f32,
            temperature: temperature as f32,
        }
    }
}

/// BMP180 stand-in hovering around standard sea-level pressure.
#[derive(Default)]
pub struct SyntheticBarometer {
    elapsed_secs: f64,
}

impl BarometricSensor for SyntheticBarometer {
    fn read(&mut self) -> BarometricReading {
        self.elapsed_secs += SAMPLE_STEP_SECS;
        let t = self.elapsed_secs;

        let pressure = 101_325.0 + 400.0 * (t / 7200.0).sin() + 25.0 * (t / 410.0).cos();
        let temperature = 21.5 + 2.0 * (t / 3600.0).sin();

        BarometricReading {
            pressure: pressure.round() as i32,
            temperature: temperature as f32,
        }
    }
}

/// Associates on the first poll after `begin`.
#[derive(Default)]
pub struct LoopbackWifi {
    associated: bool,
}

impl SignalStrength for LoopbackWifi {
    fn rssi(&self) -> i32 {
        -58
    }
}

impl WifiLink for LoopbackWifi {
    fn begin(&mut self, ssid: &str, _key: &str) -> anyhow::Result<()> {
        info!("📶 Simulated association with '{}'", ssid);
        self.associated = true;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.associated
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::LOCALHOST)
    }
}

/// Wires fresh collaborators into a supervisor, as a reboot would.
pub fn build(sink: &SinkSettings, settings: Settings) -> anyhow::Result<Simulation> {
    if sink.transport != TransportKind::Datagram {
        anyhow::bail!("The simulator only sends over UDP, set TELEMETRY_TRANSPORT=udp");
    }

    let connectivity = ConnectivityManager::new(LoopbackWifi::default(), WIFI_SSID, WIFI_PASS, &settings);
    Ok(Supervisor::new(
        WeatherStation::new(SyntheticHygrometer::default(), SyntheticBarometer::default()),
        connectivity,
        LineEncoder::new(sink.format, Tags::default()),
        DatagramTransport::new(UdpDatagram::new(sink.udp_addr)),
        Delay,
        SIMULATED_DEVICE,
        settings,
    ))
}

/// Runs the simulated module forever, booting again after every restart.
/// Returns only when the configuration cannot be simulated.
pub async fn run() -> anyhow::Result<()> {
    let sink = SinkSettings::from_build_env()?;
    info!("📡 Sending line protocol to udp://{}", sink.udp_addr);

    loop {
        let mut simulation = build(&sink, Settings::default())?;
        let reason = simulation.run().await;
        info!("🔁 Simulated restart ({})", reason);
    }
}
