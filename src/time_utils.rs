use embassy_time::{Duration, Instant};

/// Time since boot, as counted by the embassy time driver.
pub fn uptime() -> Duration {
    Instant::now().duration_since(Instant::MIN)
}

pub(crate) fn get_uptime_string() -> String {
    format_uptime(uptime())
}

fn format_uptime(uptime: Duration) -> String {
    let millis = uptime.as_millis();
    format!("[{:>4}.{:03}s]", millis / 1_000, millis % 1_000)
}
