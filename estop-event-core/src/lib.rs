//! E-Stop Event Core Library
//!
//! Change detection and event persistence for a set of named controller signals,
//! plus a debounced edge monitor for the emergency stop.
//!
//! # Architecture
//!
//! - [`ChangeDetector`] diffs each polling cycle against the previous one and
//!   classifies transitions by safety priority
//! - [`EventStore`] keeps one JSON file per calendar day, newest first, capped
//! - [`EventLogger`] ties both together and is the surface the application calls
//! - [`EdgeMonitor`] polls the emergency stop on its own thread and writes its
//!   confirmed triggers through the same store
//! - [`ConnectionSupervisor`] holds the single long-lived controller connection
//!
//! The library does NOT:
//! - Serve HTTP or render pages
//! - Generate reports
//! - Own a process-wide instance; callers build one logger and pass it around
//!
//! # Example Usage
//!
//! ```no_run
//! use estop_event_core::{
//!     ConnectionSupervisor, DataBlockImage, EventLogger, ReconnectConfig, SignalConfig,
//!     SignalType, StoreConfig,
//! };
//!
//! let signals = vec![
//!     SignalConfig::new("emergency_stop", SignalType::Bit, "DB1.DBX0.0"),
//!     SignalConfig::new("motor_running", SignalType::Bit, "DB1.DBX0.1"),
//! ];
//! let plc = ConnectionSupervisor::new(
//!     DataBlockImage::from_file("plc_image.json"),
//!     signals,
//!     ReconnectConfig::default(),
//! )
//! .unwrap();
//!
//! let logger = EventLogger::new(&StoreConfig::new("event_logs"));
//! let configs = plc.signal_map();
//!
//! let readings = plc.read_all();
//! logger.log_communication_event(plc.is_connected());
//! let detection = logger.check_and_log_changes(&readings, &configs);
//! for event in &detection.events {
//!     println!("{} {} -> {:?}", event.io_name, event.event_type, event.new_value);
//! }
//! ```

// Public modules
pub mod classifier;
pub mod clock;
pub mod config;
pub mod detector;
pub mod display;
pub mod logger;
pub mod monitor;
pub mod plc;
pub mod stats;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MonitorConfig, ReconnectConfig, StoreConfig};
pub use detector::{ChangeDetector, Detection, SignalMap};
pub use display::DisplayRecord;
pub use logger::EventLogger;
pub use monitor::{EdgeMonitor, MonitorEvent, MonitorEventKind, MonitorStatus, SelfTest};
pub use plc::{AddressDecoder, ConnectionSupervisor, DataBlockImage, PlcLink};
pub use stats::Statistics;
pub use store::EventStore;
pub use types::{
    Event, EventLogError, EventType, Priority, Result, SignalConfig, SignalReading,
    SignalStatus, SignalType, SignalValue, SnapshotCounts, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
