use core::net::Ipv4Addr;

use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::Settings;
use crate::error::ConnectivityFault;
use crate::sensors::SignalStrength;
use crate::transport::BrokerSession;

/// Station-mode WiFi association.
pub trait WifiLink: SignalStrength {
    /// Hands the credentials to the stack and asks it to associate.
    fn begin(&mut self, ssid: &str, key: &str) -> anyhow::Result<()>;

    fn is_connected(&mut self) -> bool;

    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Keeps WiFi and, for broker transports, the broker session up.
pub struct ConnectivityManager<W> {
    link: W,
    ssid: &'static str,
    key: &'static str,
    max_attempts: u32,
    short_delay_ms: u32,
}

impl<W: WifiLink> ConnectivityManager<W> {
    pub fn new(link: W, ssid: &'static str, key: &'static str, settings: &Settings) -> Self {
        Self {
            link,
            ssid,
            key,
            max_attempts: settings.wifi_max_attempts.max(1),
            short_delay_ms: settings.short_delay_ms,
        }
    }

    pub fn link(&self) -> &W {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut W {
        &mut self.link
    }

    /// Associates with the access point, polling every short delay.
    ///
    /// Running out of polls is fatal; the caller restarts the module.
    pub async fn ensure_wifi(&mut self, delay: &mut impl DelayNs) -> Result<(), ConnectivityFault> {
        if self.link.is_connected() {
            return Ok(());
        }

        info!("📶 Wait for WiFi '{}'...", self.ssid);
        self.link
            .begin(self.ssid, self.key)
            .map_err(|e| ConnectivityFault::WifiSetup(format!("{:#}", e)))?;

        let mut failed_polls = 0;
        while !self.link.is_connected() {
            failed_polls += 1;
            if failed_polls >= self.max_attempts {
                return Err(ConnectivityFault::WifiExhausted {
                    attempts: failed_polls,
                });
            }
            debug!("📶 WiFi not up yet (attempt {})", failed_polls);
            delay.delay_ms(self.short_delay_ms).await;
        }

        match self.link.local_address() {
            Some(ip) => info!("📶 WiFi connected! IP: {}", ip),
            None => info!("📶 WiFi connected"),
        }
        Ok(())
    }

    /// Brings the broker session back, retrying forever at the short delay.
    pub async fn ensure_session(&mut self, session: &mut dyn BrokerSession, delay: &mut impl DelayNs) {
        if session.is_connected() {
            return;
        }

        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            info!("📡 Broker connecting (attempt {})...", attempts);
            if let Err(e) = session.reconnect() {
                warn!("📡 Broker connect call failed: {:#}", e);
            }

            delay.delay_ms(self.short_delay_ms).await;

            if session.is_connected() {
                info!("📡 Broker session established");
                return;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::transport::fakes::FlakySession;
    use embassy_futures::block_on;

    fn settings(max_attempts: u32) -> Settings {
        Settings {
            wifi_max_attempts: max_attempts,
            ..Settings::default()
        }
    }

    #[test]
    fn connected_link_needs_no_work() {
        let mut manager = ConnectivityManager::new(ScriptedWifi::connecting_on(1), "ap", "key", &settings(5));
        let mut delay = RecordingDelay::default();

        block_on(manager.ensure_wifi(&mut delay)).unwrap();

        assert_eq!(manager.link().begins, 0);
        assert!(delay.delays_ms.is_empty());
    }

    #[test]
    fn wifi_polls_until_associated() {
        let mut manager = ConnectivityManager::new(ScriptedWifi::connecting_on(4), "ap", "key", &settings(10));
        let mut delay = RecordingDelay::default();

        block_on(manager.ensure_wifi(&mut delay)).unwrap();

        assert_eq!(manager.link().begins, 1);
        assert_eq!(delay.delays_ms, [500, 500]);
    }

    #[test]
    fn wifi_gives_up_after_bound() {
        let mut manager = ConnectivityManager::new(ScriptedWifi::never(), "ap", "key", &settings(7));
        let mut delay = RecordingDelay::default();

        let fault = block_on(manager.ensure_wifi(&mut delay)).unwrap_err();

        assert_eq!(fault, ConnectivityFault::WifiExhausted { attempts: 7 });
        assert_eq!(delay.delays_ms.len(), 6);
        // one pre-check plus the bounded polls
        assert_eq!(manager.link().polls, 8);
    }

    #[test]
    fn association_on_last_allowed_poll_succeeds() {
        // poll 1 is the pre-check, polls 2..=4 are the three allowed attempts
        let mut manager = ConnectivityManager::new(ScriptedWifi::connecting_on(4), "ap", "key", &settings(3));
        let mut delay = RecordingDelay::default();

        assert!(block_on(manager.ensure_wifi(&mut delay)).is_ok());
    }

    #[test]
    fn session_retries_without_bound() {
        let mut manager = ConnectivityManager::new(ScriptedWifi::connecting_on(1), "ap", "key", &settings(3));
        let mut delay = RecordingDelay::default();
        let mut session = FlakySession::new(250);

        block_on(manager.ensure_session(&mut session, &mut delay));

        assert!(session.is_connected());
        assert_eq!(session.reconnects, 250);
        assert_eq!(delay.delays_ms.len(), 250);
    }

    #[test]
    fn live_session_is_left_alone() {
        let mut manager = ConnectivityManager::new(ScriptedWifi::connecting_on(1), "ap", "key", &settings(3));
        let mut delay = RecordingDelay::default();
        let mut session = FlakySession::new(1);
        session.connected = true;

        block_on(manager.ensure_session(&mut session, &mut delay));

        assert_eq!(session.reconnects, 0);
        assert!(delay.delays_ms.is_empty());
    }
}
