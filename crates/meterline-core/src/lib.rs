//! Core engine of the meterline serial-to-MQTT bridge.
//!
//! This crate is deliberately I/O-free (apart from the totals file):
//! it parses delimited serial records, maps configured fields to MQTT
//! publications, detects energy-counter resets by quorum vote and keeps
//! a persisted cumulative total across resets. The transports live in
//! the `meterline-bridge` binary.

pub mod config;
pub mod error;
pub mod mapper;
pub mod processor;
pub mod record;
pub mod reset;
pub mod totals;

pub use config::{BridgeConfig, DeviceClass, SensorSpec, Transform};
pub use error::ConfigError;
pub use mapper::Publication;
pub use processor::{process_line, BridgeState, ProcessOutcome};
pub use reset::{ResetDetector, RESET_DROP_RATIO, RESET_QUORUM};
pub use totals::CumulativeTotals;
