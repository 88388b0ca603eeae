use core::fmt;

use embassy_futures::yield_now;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info};

use crate::config::Settings;
use crate::encoder::LineEncoder;
use crate::error::Fault;
use crate::logging::{log_measurement, log_panic, log_reboot};
use crate::models::DeviceIdentity;
use crate::network::{ConnectivityManager, WifiLink};
use crate::sensors::{BarometricSensor, HumiditySensor, WeatherStation};
use crate::transport::Transport;

/// Completed cycles since boot, compared against the reboot threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleCounter {
    count: u32,
    threshold: u32,
}

impl CycleCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    /// Counts one cycle; `true` once the threshold is reached.
    pub fn advance(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count >= self.threshold
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[derive(Debug)]
pub enum RestartReason {
    Fault(Fault),
    ScheduledReboot { cycles: u32 },
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "{}", fault),
            Self::ScheduledReboot { cycles } => write!(f, "scheduled reboot after {} cycles", cycles),
        }
    }
}

#[derive(Debug)]
pub enum State {
    Booting,
    Running,
    Restarting(RestartReason),
}

/// Owns every collaborator and drives boot, the acquisition cycle and the
/// restart decision.
pub struct Supervisor<H, B, W, T, D> {
    station: WeatherStation<H, B>,
    connectivity: ConnectivityManager<W>,
    encoder: LineEncoder,
    transport: T,
    delay: D,
    device: DeviceIdentity,
    counter: CycleCounter,
    settings: Settings,
}

impl<H, B, W, T, D> Supervisor<H, B, W, T, D>
where
    H: HumiditySensor,
    B: BarometricSensor,
    W: WifiLink,
    T: Transport,
    D: DelayNs,
{
    pub fn new(
        station: WeatherStation<H, B>,
        connectivity: ConnectivityManager<W>,
        encoder: LineEncoder,
        transport: T,
        delay: D,
        device: DeviceIdentity,
        settings: Settings,
    ) -> Self {
        let settings = settings.enforce_sampling_floor();
        Self {
            station,
            connectivity,
            encoder,
            transport,
            delay,
            device,
            counter: CycleCounter::new(settings.reboot_loops),
            settings,
        }
    }

    pub fn cycles(&self) -> u32 {
        self.counter.count()
    }

    /// Runs until a restart is due and returns why. The caller performs the
    /// actual restart.
    pub async fn run(&mut self) -> RestartReason {
        let mut state = State::Booting;
        loop {
            debug!("Supervisor state: {:?}", state);
            state = match state {
                State::Booting => match self.boot().await {
                    Ok(()) => State::Running,
                    Err(fault) => State::Restarting(RestartReason::Fault(fault)),
                },
                State::Running => State::Restarting(self.run_cycles().await),
                State::Restarting(reason) => {
                    self.announce_restart(&reason).await;
                    return reason;
                }
            };
        }
    }

    async fn boot(&mut self) -> Result<(), Fault> {
        self.station.begin()?;
        info!("✅ Sensors initialized successfully!");

        self.connectivity.ensure_wifi(&mut self.delay).await?;
        if let Some(session) = self.transport.session() {
            self.connectivity.ensure_session(session, &mut self.delay).await;
        }
        Ok(())
    }

    async fn run_cycles(&mut self) -> RestartReason {
        loop {
            match self.cycle().await {
                Err(fault) => return RestartReason::Fault(fault),
                Ok(true) => {
                    return RestartReason::ScheduledReboot {
                        cycles: self.counter.count(),
                    };
                }
                Ok(false) => {
                    info!("wait...");
                    self.delay.delay_ms(self.settings.loop_delay_ms).await;
                }
            }
        }
    }

    /// One sample, encode and send pass. Returns whether the reboot threshold
    /// was reached.
    async fn cycle(&mut self) -> Result<bool, Fault> {
        self.connectivity.ensure_wifi(&mut self.delay).await?;
        if let Some(session) = self.transport.session() {
            self.connectivity.ensure_session(session, &mut self.delay).await;
        }

        let measurement = self.station.sample(self.connectivity.link()).await?;
        log_measurement(&measurement);

        let records = self.encoder.encode(&measurement, &self.device);
        for record in records.iter() {
            self.transport.send(record.as_str())?;
            yield_now().await;
        }

        Ok(self.counter.advance())
    }

    async fn announce_restart(&mut self, reason: &RestartReason) {
        if let RestartReason::Fault(fault) = reason {
            log_panic(fault);
        }
        self.delay.delay_ms(self.settings.restart_settle_ms).await;
        log_reboot();
    }
}
