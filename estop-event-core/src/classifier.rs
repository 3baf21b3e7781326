//! Event classification
//!
//! Maps a single observed transition of a signal to an event type and a priority.
//! Classification is pure: it looks only at the old value, the new value and the
//! signal configuration.
//!
//! Rules, first match wins:
//! 1. No previous value: `initialization`, priority from the name rule.
//! 2. Name contains "stop"/"estop": `critical`, and the pressed/reset vocabulary.
//!    The safety signal is normally-true: a falsy value means the stop is pressed,
//!    a truthy value means it has been reset.
//! 3. Name contains "alarm" and the new value is truthy: `high`.
//! 4. Bit signals: falsy→truthy is `activated`, truthy→falsy is `deactivated`.
//!    Everything else is a generic `change`.

use crate::types::{EventType, Priority, SignalConfig, SignalValue};

/// Result of classifying one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub event_type: EventType,
    pub priority: Priority,
}

/// True for names of safety-critical stop signals (case-insensitive)
pub fn is_critical_signal(name: &str) -> bool {
    // also covers "estop" and "e_stop"
    name.to_ascii_lowercase().contains("stop")
}

/// True for names of alarm signals (case-insensitive)
pub fn is_alarm_signal(name: &str) -> bool {
    name.to_ascii_lowercase().contains("alarm")
}

/// True for names of fault indicators counted as active faults in snapshots
pub fn is_fault_signal(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    is_alarm_signal(&name) || name.contains("fault") || name.ends_with("_high") || name.ends_with("_low")
}

/// Priority implied by a signal name and its current value
pub fn priority_for(name: &str, value: Option<&SignalValue>) -> Priority {
    if is_critical_signal(name) {
        Priority::Critical
    } else if is_alarm_signal(name) && value.is_some_and(SignalValue::as_bool) {
        Priority::High
    } else {
        Priority::Normal
    }
}

/// Classify a transition of `config`'s signal from `old` to `new`
pub fn classify(old: Option<&SignalValue>, new: &SignalValue, config: &SignalConfig) -> Classification {
    let priority = priority_for(&config.name, Some(new));

    let Some(old) = old else {
        return Classification {
            event_type: EventType::Initialization,
            priority,
        };
    };

    if is_critical_signal(&config.name) {
        let event_type = if new.as_bool() {
            EventType::EmergencyStopReset
        } else {
            EventType::EmergencyStopPressed
        };
        return Classification { event_type, priority };
    }

    let event_type = if config.signal_type.is_boolean() {
        match (old.as_bool(), new.as_bool()) {
            (false, true) => EventType::Activated,
            (true, false) => EventType::Deactivated,
            _ => EventType::Change,
        }
    } else {
        EventType::Change
    };

    Classification { event_type, priority }
}
