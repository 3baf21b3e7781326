//! Controller access
//!
//! Address parsing and decoding, the byte-level link and the supervisor that
//! keeps one connection alive across polling cycles.

mod address;
mod link;

pub use address::{Address, AddressKind};
pub use link::{ConnectionSupervisor, DataBlockImage, PlcLink};

use crate::types::{SignalReading, SignalValue};

/// Name-based access to decoded signal values
///
/// Implementations never fail across this boundary: an unreadable signal is `None`.
pub trait AddressDecoder: Send + Sync {
    fn read(&self, name: &str) -> Option<SignalValue>;

    fn is_connected(&self) -> bool {
        true
    }

    /// Try to (re)establish the connection; true when usable
    fn ensure_connected(&self) -> bool {
        true
    }

    /// Every signal the decoder knows, for attaching to trigger reports
    fn read_summary(&self) -> Vec<SignalReading> {
        Vec::new()
    }
}
