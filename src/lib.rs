pub mod bmp180;
pub mod config;
pub mod dht22;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod models;
pub mod network;
pub mod sensors;
pub mod supervisor;
pub mod time_utils;
pub mod transport;

#[cfg(target_os = "espidf")]
pub mod esp;

#[cfg(not(target_os = "espidf"))]
pub mod simulator;

pub use error::Fault;
pub use models::{DeviceIdentity, Measurement};
pub use supervisor::{RestartReason, Supervisor};
