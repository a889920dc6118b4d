//! Bridge configuration.
//!
//! Loaded once at startup from a TOML file. A load or validation failure
//! is fatal; everything after startup runs off the immutable
//! [`BridgeConfig`].
//!
//! Sensors are declared as a table keyed by the numeric field index of
//! the comma-separated serial record:
//!
//! ```toml
//! [sensors.2]
//! name = "Grid import"
//! device_class = "energy"
//! unit_of_measurement = "Wh"
//! transform = "cumulative"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Serial transport parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    /// Device path of the serial port.
    #[serde(default = "default_serial_port")]
    pub port: String,
    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Seconds without any incoming data before the watchdog logs a
    /// warning. Absent means no watchdog.
    pub data_timeout_secs: Option<u64>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            data_timeout_secs: None,
        }
    }
}

/// Message-bus parameters and topic layout.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker host.
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    /// Broker port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Prefix under which discovery payloads are announced.
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    /// Prefix under which per-sensor state topics live.
    #[serde(default = "default_state_prefix")]
    pub state_prefix: String,
    /// Device identifier used in topics and discovery payloads.
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            discovery_prefix: default_discovery_prefix(),
            state_prefix: default_state_prefix(),
            device_id: default_device_id(),
        }
    }
}

/// Device metadata announced in discovery payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            manufacturer: default_manufacturer(),
            model: default_model(),
        }
    }
}

/// Durable-state parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the cumulative-totals file (JSON, fully rewritten on
    /// every update).
    #[serde(default = "default_totals_path")]
    pub totals_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            totals_path: default_totals_path(),
        }
    }
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_state_prefix() -> String {
    "home/sensors/home_power".to_string()
}

fn default_device_id() -> String {
    "default_device_id".to_string()
}

fn default_device_name() -> String {
    "SerialDevice".to_string()
}

fn default_manufacturer() -> String {
    "Unknown Manufacturer".to_string()
}

fn default_model() -> String {
    "Unknown Model".to_string()
}

fn default_totals_path() -> PathBuf {
    PathBuf::from("cumulative_totals.json")
}

fn default_loglevel() -> String {
    "info".to_string()
}

/// Sensor device class, forwarded into discovery payloads.
///
/// `Energy` is the counter class: those sensors participate in reset
/// voting (see the reset detector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Energy,
    Power,
    Voltage,
    Current,
    Frequency,
    PowerFactor,
    Temperature,
    Humidity,
    Battery,
}

/// Declarative per-field value transform, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Pass the numeric value through unchanged.
    #[default]
    Identity,
    /// Invert the sign (fields wired with opposite polarity).
    Negate,
    /// Multiply by a factor and format to two decimal places, e.g.
    /// `factor = 0.39215686` maps a 0..255 field to a percentage.
    Scale { factor: f64 },
    /// Publish `persisted_total + raw` instead of the raw reading.
    Cumulative,
}

impl Transform {
    /// Render a non-cumulative transform of `value` as the outbound
    /// payload string. Cumulative substitution needs the totals store
    /// and is handled by the mapper.
    pub fn apply(&self, value: f64) -> String {
        match self {
            Transform::Identity | Transform::Cumulative => format!("{value}"),
            Transform::Negate => format!("{}", -value),
            Transform::Scale { factor } => format!("{:.2}", value * factor),
        }
    }
}

/// One configured sensor, keyed by its field index in the serial record.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorSpec {
    /// Position in the comma-separated record. Injected from the table
    /// key during validation, not read from the table body.
    #[serde(skip)]
    pub field_index: usize,
    /// Display name. A spec without a name is a disabled field: it is
    /// neither announced nor published.
    pub name: Option<String>,
    /// Device class for discovery and counter classification.
    pub device_class: Option<DeviceClass>,
    /// Unit forwarded into the discovery payload.
    pub unit_of_measurement: Option<String>,
    /// Value transform applied before publication.
    #[serde(default)]
    pub transform: Transform,
    /// Any further attributes are forwarded verbatim into the discovery
    /// payload (state_class, icon, ...).
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SensorSpec {
    /// Whether this sensor participates in reset voting.
    pub fn is_counter(&self) -> bool {
        self.device_class == Some(DeviceClass::Energy)
    }

    /// Whether this sensor carries the persisted cumulative total.
    pub fn is_cumulative(&self) -> bool {
        matches!(self.transform, Transform::Cumulative)
    }
}

/// Validated sensor table: specs sorted by ascending field index.
#[derive(Debug, Clone, Default)]
pub struct SensorTable {
    specs: Vec<SensorSpec>,
}

impl SensorTable {
    /// Build from the raw config map, injecting field indices from the
    /// table keys.
    fn from_map(raw: HashMap<String, SensorSpec>) -> Result<Self, ConfigError> {
        let mut specs = Vec::with_capacity(raw.len());
        for (key, mut spec) in raw {
            spec.field_index = key
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidSensorKey(key))?;
            specs.push(spec);
        }
        // Map keys are unique, so field indices are too.
        specs.sort_by_key(|s| s.field_index);
        Ok(Self { specs })
    }

    /// Specs in ascending field-index order.
    pub fn specs(&self) -> &[SensorSpec] {
        &self.specs
    }

    /// Expected width of a serial record: highest field index plus one.
    pub fn expected_fields(&self) -> usize {
        self.specs.last().map(|s| s.field_index + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'de> Deserialize<'de> for SensorTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = HashMap::<String, SensorSpec>::deserialize(deserializer)?;
        SensorTable::from_map(raw).map_err(serde::de::Error::custom)
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Default log verbosity; RUST_LOG still overrides.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default)]
    pub sensors: SensorTable,
}

impl BridgeConfig {
    /// Load and validate the configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(raw)?;
        if config.sensors.is_empty() {
            return Err(ConfigError::NoSensors);
        }
        Ok(config)
    }

    /// Configured sensors in ascending field-index order.
    pub fn sensors(&self) -> &[SensorSpec] {
        self.sensors.specs()
    }

    /// Expected field count of a serial record.
    pub fn expected_fields(&self) -> usize {
        self.sensors.expected_fields()
    }
}
