//! Core types for the event engine
//!
//! This module defines the values read from the controller, the signal configuration
//! that describes them, and the persisted event records. Events are immutable once
//! created; everything that changes over time lives in the detector, the store or the
//! monitor.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp type used throughout the engine (local wall-clock time)
pub type Timestamp = DateTime<Local>;

/// Pseudo-signal name used for controller communication events
pub const COMMUNICATION_SIGNAL: &str = "plc_communication";

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EventLogError>;

/// Errors that can occur inside the engine
///
/// Storage errors never escape the public store API; they are logged and the
/// operation degrades to a safe default. Configuration errors are returned to the
/// caller as values so one bad signal cannot stop a batch.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Signal not configured: {0}")]
    UnknownSignal(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Data type of a configured signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Single bit (DBX)
    Bit,
    /// Unsigned 8-bit (DBB)
    Byte,
    /// Signed 16-bit (DBW)
    Word,
    /// Unsigned 32-bit (DBD)
    #[serde(rename = "dword")]
    DWord,
    /// IEEE-754 32-bit float (DBD)
    Real,
}

impl SignalType {
    /// True for signals whose changes use the activated/deactivated vocabulary
    pub fn is_boolean(&self) -> bool {
        matches!(self, SignalType::Bit)
    }

    /// Number of bytes read from the data block for this type
    pub fn byte_len(&self) -> usize {
        match self {
            SignalType::Bit | SignalType::Byte => 1,
            SignalType::Word => 2,
            SignalType::DWord | SignalType::Real => 4,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalType::Bit => "bit",
            SignalType::Byte => "byte",
            SignalType::Word => "word",
            SignalType::DWord => "dword",
            SignalType::Real => "real",
        };
        f.write_str(name)
    }
}

/// A decoded signal value
///
/// Serialized untagged so the log files hold plain JSON scalars
/// (`true`, `42`, `12.5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Boolean value (bit signals)
    Boolean(bool),
    /// Integer value (byte/word/dword signals)
    Integer(i64),
    /// Floating-point value (real signals or scaled integers)
    Float(f64),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Boolean(v) => write!(f, "{}", v),
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl SignalValue {
    /// Convert signal value to f64
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Boolean(v) => if *v { 1.0 } else { 0.0 },
            SignalValue::Integer(v) => *v as f64,
            SignalValue::Float(v) => *v,
        }
    }

    /// Convert signal value to i64 if possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SignalValue::Boolean(v) => Some(if *v { 1 } else { 0 }),
            SignalValue::Integer(v) => Some(*v),
            SignalValue::Float(v) if v.is_finite() => Some(*v as i64),
            SignalValue::Float(_) => None,
        }
    }

    /// Truthiness: `true`, or any non-zero number
    pub fn as_bool(&self) -> bool {
        match self {
            SignalValue::Boolean(v) => *v,
            SignalValue::Integer(v) => *v != 0,
            SignalValue::Float(v) => *v != 0.0,
        }
    }

    /// Reading-level equality: two NaN floats count as the same reading
    pub fn same_as(&self, other: &SignalValue) -> bool {
        match (self, other) {
            (SignalValue::Float(a), SignalValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// True for values that read as a plain on/off flag (`true`/`false`, `0`, `1`)
    pub fn is_flag(&self) -> bool {
        matches!(self, SignalValue::Boolean(_) | SignalValue::Integer(0) | SignalValue::Integer(1))
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Boolean(v)
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Integer(v)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Float(v)
    }
}

/// Read status of a signal for one polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    /// Value was read
    Online,
    /// Controller reachable but the address could not be read
    Error,
    /// Controller not connected
    Offline,
}

/// One signal as read during a polling cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub name: String,
    pub value: Option<SignalValue>,
    pub status: SignalStatus,
}

impl SignalReading {
    /// Reading from a connected controller; a missing value means a read error
    pub fn read(name: impl Into<String>, value: Option<SignalValue>) -> Self {
        let status = if value.is_some() { SignalStatus::Online } else { SignalStatus::Error };
        Self { name: name.into(), value, status }
    }

    /// Placeholder reading while the controller is unreachable
    pub fn offline(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None, status: SignalStatus::Offline }
    }
}

/// Configuration of a single named signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Unique signal name
    pub name: String,
    /// Data type at the address
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Data block address, e.g. `DB1.DBX0.0`
    pub address: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Engineering unit (e.g. "bar", "L/min")
    #[serde(default)]
    pub unit: Option<String>,
    /// Raw value multiplier; scaled values are reported as floats
    #[serde(default)]
    pub scale_factor: Option<f64>,
}

impl SignalConfig {
    /// Create a signal configuration with an empty description
    pub fn new(name: impl Into<String>, signal_type: SignalType, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signal_type,
            address: address.into(),
            description: String::new(),
            unit: None,
            scale_factor: None,
        }
    }

    /// Builder method: set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method: set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Builder method: set the scale factor
    pub fn with_scale_factor(mut self, factor: f64) -> Self {
        self.scale_factor = Some(factor);
        self
    }

    /// Priority this signal's events get from its name alone
    pub fn priority_hint(&self, value: Option<&SignalValue>) -> Priority {
        crate::classifier::priority_for(&self.name, value)
    }
}

/// Safety priority of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = EventLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(EventLogError::InvalidData(format!("unknown priority: {}", other))),
        }
    }
}

/// Kind of a logged event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Initialization,
    Change,
    Activated,
    Deactivated,
    Error,
    EmergencyStopPressed,
    EmergencyStopReset,
    SystemSnapshot,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Initialization => "initialization",
            EventType::Change => "change",
            EventType::Activated => "activated",
            EventType::Deactivated => "deactivated",
            EventType::Error => "error",
            EventType::EmergencyStopPressed => "emergency_stop_pressed",
            EventType::EmergencyStopReset => "emergency_stop_reset",
            EventType::SystemSnapshot => "system_snapshot",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate counts carried by a system snapshot event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounts {
    pub total: usize,
    pub online: usize,
    pub errors: usize,
    #[serde(default)]
    pub offline: usize,
    pub faults_active: usize,
}

/// A persisted event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub io_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    pub old_value: Option<SignalValue>,
    pub new_value: Option<SignalValue>,
    pub event_type: EventType,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_counts: Option<SnapshotCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_values: Option<BTreeMap<String, Option<SignalValue>>>,
}

impl Event {
    /// Build a per-signal event from its configuration
    pub fn for_signal(
        timestamp: Timestamp,
        config: &SignalConfig,
        old_value: Option<SignalValue>,
        new_value: Option<SignalValue>,
        event_type: EventType,
        priority: Priority,
    ) -> Self {
        Self {
            timestamp,
            io_name: config.name.clone(),
            description: config.description.clone(),
            address: config.address.clone(),
            old_value,
            new_value,
            event_type,
            priority,
            snapshot_counts: None,
            snapshot_values: None,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.event_type == EventType::SystemSnapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signal_value_conversions() {
        let int_val = SignalValue::Integer(42);
        assert_eq!(int_val.as_f64(), 42.0);
        assert_eq!(int_val.as_i64(), Some(42));
        assert!(int_val.as_bool());

        let float_val = SignalValue::Float(3.5);
        assert_eq!(float_val.as_i64(), Some(3));
        assert_eq!(SignalValue::Float(f64::NAN).as_i64(), None);

        assert!(!SignalValue::Boolean(false).as_bool());
        assert!(!SignalValue::Integer(0).as_bool());
        assert!(SignalValue::Integer(1).is_flag());
        assert!(!SignalValue::Integer(7).is_flag());
    }

    #[test]
    fn test_same_as_treats_nan_as_one_reading() {
        let nan = SignalValue::Float(f64::from(f32::from_bits(0x7FC0_0000)));
        assert!(nan.same_as(&SignalValue::Float(f64::NAN)));
        assert!(!nan.same_as(&SignalValue::Float(0.0)));
        assert!(SignalValue::Float(2.5).same_as(&SignalValue::Float(2.5)));
        assert!(!SignalValue::Integer(1).same_as(&SignalValue::Float(1.0)));
        assert!(SignalValue::Boolean(true).same_as(&SignalValue::Boolean(true)));
    }

    #[test]
    fn test_signal_value_json_is_plain_scalar() {
        assert_eq!(serde_json::to_string(&SignalValue::Boolean(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&SignalValue::Integer(42)).unwrap(), "42");

        let parsed: Vec<Option<SignalValue>> = serde_json::from_str("[true, 7, 2.5, null]").unwrap();
        assert_eq!(
            parsed,
            vec![
                Some(SignalValue::Boolean(true)),
                Some(SignalValue::Integer(7)),
                Some(SignalValue::Float(2.5)),
                None,
            ]
        );
    }

    #[test]
    fn test_event_field_names() {
        let config = SignalConfig::new("pump_running", SignalType::Bit, "DB1.DBX0.1")
            .with_description("Pump Running Status");
        let ts = Local.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let event = Event::for_signal(
            ts,
            &config,
            Some(SignalValue::Boolean(false)),
            Some(SignalValue::Boolean(true)),
            EventType::Activated,
            Priority::Normal,
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["io_name"], "pump_running");
        assert_eq!(json["address"], "DB1.DBX0.1");
        assert_eq!(json["event_type"], "activated");
        assert_eq!(json["priority"], "normal");
        assert_eq!(json["new_value"], true);
        assert!(json.get("snapshot_counts").is_none());
    }

    #[test]
    fn test_signal_config_from_json_uses_type_key() {
        let config: SignalConfig = serde_json::from_str(
            r#"{"name": "flow_rate", "type": "word", "address": "DB1.DBW2", "scale_factor": 0.1}"#,
        )
        .unwrap();
        assert_eq!(config.signal_type, SignalType::Word);
        assert_eq!(config.scale_factor, Some(0.1));
        assert!(config.description.is_empty());
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!("CRITICAL".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
        assert!(Priority::Critical > Priority::High);
    }
}
