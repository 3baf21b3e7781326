//! Presentation records for the dashboard
//!
//! A pure projection from a stored [`Event`] to what an operator sees: clock
//! time, date, a relative age and a short change description keyed off the
//! event type.

use crate::types::{Event, EventType, Priority, SignalValue, Timestamp, COMMUNICATION_SIGNAL};
use serde::Serialize;

/// Suffix stripped from bit descriptions; the change text already says ON/OFF
const ON_OFF_HINT: &str = " (0=OFF, 1=ON)";

/// An event formatted for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRecord {
    pub timestamp: String,
    pub formatted_time: String,
    pub formatted_date: String,
    pub time_ago: String,
    pub io_name: String,
    pub description: String,
    pub change_description: String,
    pub event_type: EventType,
    pub priority: Priority,
    pub address: String,
}

/// Format `event` relative to `now`
pub fn format_event(event: &Event, now: Timestamp) -> DisplayRecord {
    DisplayRecord {
        timestamp: event.timestamp.to_rfc3339(),
        formatted_time: event.timestamp.format("%H:%M:%S").to_string(),
        formatted_date: event.timestamp.format("%Y-%m-%d").to_string(),
        time_ago: time_ago(event.timestamp, now),
        io_name: event.io_name.clone(),
        description: event.description.replace(ON_OFF_HINT, ""),
        change_description: change_description(event),
        event_type: event.event_type,
        priority: event.priority,
        address: event.address.clone(),
    }
}

/// Short human-readable description of what changed
pub fn change_description(event: &Event) -> String {
    let old = format_value(event.old_value.as_ref());
    let new = format_value(event.new_value.as_ref());

    if event.io_name == COMMUNICATION_SIGNAL && event.event_type != EventType::SystemSnapshot {
        let connected = event.new_value.as_ref().is_some_and(SignalValue::as_bool);
        return if connected { "COMMUNICATION RESTORED" } else { "COMMUNICATION LOST" }.to_string();
    }

    match event.event_type {
        EventType::Initialization => format!("Started: {}", new),
        EventType::EmergencyStopPressed => "E-STOP PRESSED".to_string(),
        EventType::EmergencyStopReset => "E-STOP RESET".to_string(),
        EventType::Activated => "ON".to_string(),
        EventType::Deactivated => "OFF".to_string(),
        EventType::Error => "ERROR".to_string(),
        EventType::SystemSnapshot => match &event.snapshot_counts {
            Some(c) => format!(
                "Snapshot: {}/{} online, {} errors, {} offline, {} faults active",
                c.online, c.total, c.errors, c.offline, c.faults_active
            ),
            None => "Snapshot".to_string(),
        },
        EventType::Change => format!("{} → {}", old, new),
    }
}

/// Display form of a single value: flags as ON/OFF, missing as NULL
pub fn format_value(value: Option<&SignalValue>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) if v.is_flag() => if v.as_bool() { "ON" } else { "OFF" }.to_string(),
        Some(v) => v.to_string(),
    }
}

/// Relative age of `then` as seen from `now`
pub fn time_ago(then: Timestamp, now: Timestamp) -> String {
    let diff = now.signed_duration_since(then);
    let days = diff.num_days();
    let seconds = diff.num_seconds() - days * 86_400;

    if diff.num_seconds() < 0 {
        "Just now".to_string()
    } else if days > 0 {
        format!("{} day{} ago", days, plural(days))
    } else if seconds > 3600 {
        let hours = seconds / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if seconds > 60 {
        let minutes = seconds / 60;
        format!("{} minute{} ago", minutes, plural(minutes))
    } else {
        "Just now".to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
