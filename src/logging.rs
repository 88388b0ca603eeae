use crate::models::Measurement;
use crate::time_utils::get_uptime_string;
use log::{error, info, warn};

const SPLASH_SCREEN: &str = r#"
                 _
  _ __ ___   ___| |_ ___  ___        _ __ ___
 | '_ ` _ \ / _ \ __/ _ \/ _ \ _____| '__/ __|
 | | | | | |  __/ ||  __/ (_) |_____| |  \__ \
 |_| |_| |_|\___|\__\___|\___/      |_|  |___/
                                              "#;

pub(crate) enum LogLevel {
    Info,
    Warn,
    Error,
}

pub fn print_splash_screen() {
    info!("{}", SPLASH_SCREEN);
}

pub(crate) fn log_measurement(data: &Measurement) {
    let msg = format!(
        "[ 💧 DHT22 humidity {:.2}% | 🌡️ DHT22 temperature {:.2}C | ☁️ BMP180 pressure {} Pa | 🌡️ BMP180 temperature {:.2}C | 📶 RSSI {} dBm ]",
        data.humidity(),
        data.air_temperature(),
        data.pressure(),
        data.barometric_temperature(),
        data.signal_strength()
    );
    log_message(LogLevel::Info, &msg);
}

pub(crate) fn log_sensor_error(sensor_name: &str, error: impl std::fmt::Debug) {
    log_message(
        LogLevel::Error,
        &format!("🚫 {} Error: {:?}", sensor_name, error),
    );
}

pub(crate) fn log_dropped_record(reason: impl std::fmt::Display) {
    log_message(LogLevel::Warn, &format!("〇 Record dropped: {}", reason));
}

pub fn log_panic(reason: impl std::fmt::Display) {
    log_message(LogLevel::Error, &format!("‼️ PANIC: {}", reason));
}

pub fn log_reboot() {
    log_message(LogLevel::Warn, "🔁 Rebooting module...");
}

fn log_message(level: LogLevel, message: &str) {
    let prefix = get_uptime_string();

    match level {
        LogLevel::Error => error!("\x1b[31m{} {}\x1b[0m", prefix, message),
        LogLevel::Warn => warn!("\x1b[38;5;11m{} {}\x1b[0m", prefix, message),
        LogLevel::Info => info!("\x1b[38;5;40m{} {}\x1b[0m", prefix, message),
    }
}
