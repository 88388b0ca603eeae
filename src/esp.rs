//! ESP-IDF bindings: WiFi station, MQTT client, sensor pins and restart.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, anyhow};
use embassy_time::{Delay, Duration, Timer};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::hal::gpio::{AnyIOPin, IOPin, InputOutput, PinDriver, Pull};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration as WifiConfig, EspWifi};
use log::{info, warn};

use crate::bmp180::{Bmp180, Oversampling};
use crate::config::{
    RESTART_SETTLE_MS, Settings, SinkSettings, TransportKind, WIFI_PASS, WIFI_SSID,
};
use crate::dht22::Dht22;
use crate::encoder::{LineEncoder, Tags};
use crate::logging::{log_panic, log_reboot};
use crate::models::DeviceIdentity;
use crate::network::{ConnectivityManager, WifiLink};
use crate::sensors::{SignalStrength, WeatherStation};
use crate::supervisor::Supervisor;
use crate::transport::{
    BrokerSession, BrokerTransport, DatagramTransport, Transport, UdpDatagram,
};

const I2C_BAUDRATE: u32 = 100_000;
const MQTT_POLL_STACK_SIZE: usize = 6 * 1024;

pub type DhtPin = PinDriver<'static, AnyIOPin, InputOutput>;

type Firmware = Supervisor<
    Dht22<DhtPin, Ets>,
    Bmp180<I2cDriver<'static>, FreeRtos>,
    EspWifiLink,
    Box<dyn Transport>,
    Delay,
>;

pub struct EspWifiLink {
    wifi: EspWifi<'static>,
}

impl EspWifiLink {
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self { wifi }
    }
}

impl SignalStrength for EspWifiLink {
    fn rssi(&self) -> i32 {
        let mut ap_info = sys::wifi_ap_record_t::default();
        let rc = unsafe { sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        if rc == sys::ESP_OK {
            ap_info.rssi as i32
        } else {
            0
        }
    }
}

impl WifiLink for EspWifiLink {
    fn begin(&mut self, ssid: &str, key: &str) -> anyhow::Result<()> {
        let auth_method = if key.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        self.wifi
            .set_configuration(&WifiConfig::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| anyhow!("SSID is too long"))?,
                password: key.try_into().map_err(|_| anyhow!("Password is too long"))?,
                auth_method,
                ..Default::default()
            }))?;

        if !self.wifi.is_started()? {
            self.wifi.start()?;
            info!("📶 WiFi starting...");
        }
        self.wifi.connect()?;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }
}

/// MQTT session over the ESP-IDF client. Connection state is tracked from
/// the client's event stream on a dedicated thread.
pub struct EspBrokerSession {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
}

impl EspBrokerSession {
    pub fn new(url: &str, client_id: &str) -> anyhow::Result<Self> {
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            ..Default::default()
        };
        let (client, connection) =
            EspMqttClient::new(url, &conf).with_context(|| format!("Failed to create MQTT client for {}", url))?;

        let connected = Arc::new(AtomicBool::new(false));
        let flag = connected.clone();
        thread::Builder::new()
            .name("mqtt-poll".to_string())
            .stack_size(MQTT_POLL_STACK_SIZE)
            .spawn(move || poll_events(connection, flag))
            .context("Failed to spawn MQTT event thread")?;

        Ok(Self { client, connected })
    }
}

fn poll_events(mut connection: EspMqttConnection, connected: Arc<AtomicBool>) {
    loop {
        match connection.next() {
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => connected.store(true, Ordering::Release),
                EventPayload::Disconnected => connected.store(false, Ordering::Release),
                _ => {}
            },
            Err(e) => {
                warn!("📡 MQTT event stream closed: {:?}", e);
                connected.store(false, Ordering::Release);
                return;
            }
        }
    }
}

impl BrokerSession for EspBrokerSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn reconnect(&mut self) -> anyhow::Result<()> {
        // the IDF client reconnects on its own once started
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .with_context(|| format!("Publish to {} failed", topic))?;
        Ok(())
    }
}

pub fn device_identity() -> anyhow::Result<DeviceIdentity> {
    let mut mac = [0u8; 6];
    sys::esp!(unsafe { sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) })
        .context("Failed to read factory MAC")?;
    Ok(DeviceIdentity::from_mac(mac))
}

fn build_transport(sink: &SinkSettings) -> anyhow::Result<Box<dyn Transport>> {
    Ok(match sink.transport {
        TransportKind::Datagram => {
            info!("📡 Sending line protocol to udp://{}", sink.udp_addr);
            Box::new(DatagramTransport::new(UdpDatagram::new(sink.udp_addr)))
        }
        TransportKind::Broker => {
            info!("📡 Publishing to {} on {}", sink.mqtt_topic, sink.mqtt_url);
            let session = EspBrokerSession::new(sink.mqtt_url, sink.mqtt_client_id)?;
            Box::new(BrokerTransport::new(session, sink.mqtt_topic))
        }
    })
}

fn setup() -> anyhow::Result<Firmware> {
    let sink = SinkSettings::from_build_env().context("Invalid telemetry configuration")?;
    let settings = Settings::default();

    let peripherals = Peripherals::take().context("Failed to take Peripherals")?;
    let sys_loop = EspSystemEventLoop::take().context("Failed to take system event loop")?;
    let nvs = EspDefaultNvsPartition::take().context("Failed to take NVS partition")?;

    let mut dht_pin = PinDriver::input_output_od(peripherals.pins.gpio4.downgrade())
        .context("Failed to initialize DHT22 pin")?;
    dht_pin.set_pull(Pull::Up)?;
    dht_pin.set_high()?;

    let i2c_config = I2cConfig::new().baudrate(Hertz::from(I2C_BAUDRATE));
    let i2c_driver = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6,
        peripherals.pins.gpio7,
        &i2c_config,
    )
    .context("Failed to initialize I2C Driver")?;

    let station = WeatherStation::new(
        Dht22::new(dht_pin, Ets),
        Bmp180::new(i2c_driver, FreeRtos, Oversampling::UltraHighResolution),
    );

    let wifi = EspWifi::new(peripherals.modem, sys_loop, Some(nvs)).context("Failed to create WiFi driver")?;
    let connectivity = ConnectivityManager::new(EspWifiLink::new(wifi), WIFI_SSID, WIFI_PASS, &settings);

    Ok(Supervisor::new(
        station,
        connectivity,
        LineEncoder::new(sink.format, Tags::default()),
        build_transport(&sink)?,
        Delay,
        device_identity()?,
        settings,
    ))
}

/// Runs the firmware until a restart is due, then restarts the chip.
pub async fn run() -> ! {
    match setup() {
        Ok(mut firmware) => {
            firmware.run().await;
        }
        Err(e) => {
            log_panic(format_args!("{:#}", e));
            Timer::after(Duration::from_millis(RESTART_SETTLE_MS as u64)).await;
            log_reboot();
        }
    }
    esp_idf_svc::hal::reset::restart()
}
