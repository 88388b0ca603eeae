use core::fmt;

/// A sensor returned an unreadable value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Error reading {sensor}")]
pub struct SensorFault {
    pub sensor: &'static str,
}

/// The step of a datagram exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStep {
    Open,
    Write,
    Close,
}

impl fmt::Display for TransportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::Open => "open",
            Self::Write => "write",
            Self::Close => "close",
        };
        f.write_str(step)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Send packet to telemetry sink failed at {step}: {source}")]
pub struct TransportFault {
    pub step: TransportStep,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectivityFault {
    #[error("Wifi connection failed after {attempts} attempts")]
    WifiExhausted { attempts: u32 },

    #[error("Wifi stack rejected credentials: {0}")]
    WifiSetup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Line exceeds {capacity} bytes")]
    Overflow { capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown telemetry transport '{0}', expected 'udp' or 'mqtt'")]
    UnknownTransport(String),

    #[error("Unknown line format '{0}', expected 'per-metric' or 'combined'")]
    UnknownLineFormat(String),
}

/// Everything that sends the module into a restart.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error(transparent)]
    Sensor(#[from] SensorFault),

    #[error(transparent)]
    Transport(#[from] TransportFault),

    #[error(transparent)]
    Connectivity(#[from] ConnectivityFault),
}
