//! Change detection
//!
//! Holds the last observed value of every signal and diffs each polling cycle
//! against it. Only genuine transitions to a readable value become events; a
//! value turning unreadable is a communication loss and only updates memory.

use crate::classifier;
use crate::types::{Event, EventLogError, SignalConfig, SignalReading, SignalValue, Timestamp};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Signal configurations keyed by name
pub type SignalMap = HashMap<String, SignalConfig>;

/// Build a [`SignalMap`] from a list of configurations
pub fn signal_map(configs: impl IntoIterator<Item = SignalConfig>) -> SignalMap {
    configs.into_iter().map(|c| (c.name.clone(), c)).collect()
}

/// Outcome of one detection pass
#[derive(Debug, Default)]
pub struct Detection {
    /// Events in the order their signals appeared in the readings
    pub events: Vec<Event>,
    /// Recoverable per-signal problems (e.g. readings for unconfigured signals)
    pub errors: Vec<EventLogError>,
}

/// Diffs readings against the previous-value map
#[derive(Debug, Default)]
pub struct ChangeDetector {
    previous: Mutex<HashMap<String, Option<SignalValue>>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `readings` against memory and return the events they produce
    ///
    /// The whole pass runs under the map lock, so concurrent callers are
    /// serialized and never lose each other's updates.
    pub fn detect(&self, readings: &[SignalReading], configs: &SignalMap, now: Timestamp) -> Detection {
        let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
        let mut detection = Detection::default();

        for reading in readings {
            let Some(config) = configs.get(&reading.name) else {
                log::warn!("Reading for unconfigured signal '{}' skipped", reading.name);
                detection.errors.push(EventLogError::UnknownSignal(reading.name.clone()));
                continue;
            };

            let current = reading.value.clone();
            match previous.get(&reading.name).cloned() {
                None => {
                    previous.insert(reading.name.clone(), current.clone());
                    if let Some(value) = current {
                        let class = classifier::classify(None, &value, config);
                        log::debug!("Signal '{}' initialized to {}", reading.name, value);
                        detection.events.push(Event::for_signal(
                            now,
                            config,
                            None,
                            Some(value),
                            class.event_type,
                            class.priority,
                        ));
                    }
                }
                Some(old) if same_reading(old.as_ref(), current.as_ref()) => {}
                Some(old) => {
                    previous.insert(reading.name.clone(), current.clone());
                    match current {
                        Some(value) => {
                            let class = classifier::classify(old.as_ref(), &value, config);
                            log::debug!(
                                "Signal '{}' changed: {:?} -> {} ({})",
                                reading.name,
                                old,
                                value,
                                class.event_type
                            );
                            detection.events.push(Event::for_signal(
                                now,
                                config,
                                old,
                                Some(value),
                                class.event_type,
                                class.priority,
                            ));
                        }
                        None => log::debug!("Signal '{}' became unreadable", reading.name),
                    }
                }
            }
        }

        detection
    }

    /// Last stored value for `name`; `None` if the signal was never seen
    pub fn previous_value(&self, name: &str) -> Option<Option<SignalValue>> {
        self.previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Number of signals seen so far
    pub fn tracked_signals(&self) -> usize {
        self.previous.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn same_reading(old: Option<&SignalValue>, new: Option<&SignalValue>) -> bool {
    match (old, new) {
        (Some(a), Some(b)) => a.same_as(b),
        (None, None) => true,
        _ => false,
    }
}
