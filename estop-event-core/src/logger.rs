//! Event logger facade
//!
//! The operations the dashboard and the polling loop call. One `EventLogger` is
//! built at process start and shared by reference; it owns the change detector
//! and the communication state and writes through a shared [`EventStore`].

use crate::classifier;
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::detector::{ChangeDetector, Detection, SignalMap};
use crate::display::{self, DisplayRecord};
use crate::stats::{self, Statistics};
use crate::store::EventStore;
use crate::types::{
    Event, EventType, Priority, SignalReading, SignalStatus, SignalValue, SnapshotCounts,
    COMMUNICATION_SIGNAL,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Name under which daily snapshots are recorded
pub const SNAPSHOT_SIGNAL: &str = "system";

/// Change detection and persistence for one controller
pub struct EventLogger {
    store: Arc<EventStore>,
    detector: ChangeDetector,
    clock: Arc<dyn Clock>,
    /// Serializes detect-then-persist so events land in detection order
    cycle: Mutex<()>,
    communication: Mutex<Option<bool>>,
    snapshot_values: bool,
    retention_days: Option<u32>,
}

impl EventLogger {
    /// Create a logger on the system clock
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a logger whose store and timestamps follow `clock`
    pub fn with_clock(config: &StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(EventStore::new(config, Arc::clone(&clock)));
        Self {
            store,
            detector: ChangeDetector::new(),
            clock,
            cycle: Mutex::new(()),
            communication: Mutex::new(None),
            snapshot_values: config.snapshot_values,
            retention_days: config.retention_days,
        }
    }

    /// The underlying store, for sharing with the edge monitor
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Diff `readings` against the last cycle and persist every resulting event
    pub fn check_and_log_changes(&self, readings: &[SignalReading], configs: &SignalMap) -> Detection {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let detection = self.detector.detect(readings, configs, self.clock.now());
        for event in &detection.events {
            self.store.append(event.clone());
        }
        if !detection.events.is_empty() {
            log::info!("Logged {} signal events", detection.events.len());
        }
        detection
    }

    /// Record a change of controller connectivity
    ///
    /// The first observation only sets the baseline and steady state is never
    /// logged, so routine polling does not spam the log.
    pub fn log_communication_event(&self, connected: bool) -> Option<Event> {
        let previous = self
            .communication
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(connected);

        match previous {
            None => {
                log::debug!("Initial communication state: connected={}", connected);
                None
            }
            Some(was) if was == connected => None,
            Some(was) => {
                let (event_type, priority, description) = if connected {
                    log::info!("PLC communication restored");
                    (EventType::Change, Priority::Normal, "PLC communication restored")
                } else {
                    log::warn!("PLC communication lost");
                    (EventType::Error, Priority::High, "PLC communication lost")
                };
                let event = Event {
                    timestamp: self.clock.now(),
                    io_name: COMMUNICATION_SIGNAL.to_string(),
                    description: description.to_string(),
                    address: String::new(),
                    old_value: Some(SignalValue::Boolean(was)),
                    new_value: Some(SignalValue::Boolean(connected)),
                    event_type,
                    priority,
                    snapshot_counts: None,
                    snapshot_values: None,
                };
                self.store.append(event.clone());
                Some(event)
            }
        }
    }

    /// Record today's system snapshot; empty if one already exists
    pub fn log_system_snapshot(&self, readings: &[SignalReading]) -> Vec<Event> {
        let counts = snapshot_counts(readings);
        let values = self.snapshot_values.then(|| {
            readings
                .iter()
                .map(|r| (r.name.clone(), r.value.clone()))
                .collect::<BTreeMap<_, _>>()
        });

        let event = Event {
            timestamp: self.clock.now(),
            io_name: SNAPSHOT_SIGNAL.to_string(),
            description: "Daily system snapshot".to_string(),
            address: String::new(),
            old_value: None,
            new_value: None,
            event_type: EventType::SystemSnapshot,
            priority: Priority::Normal,
            snapshot_counts: Some(counts),
            snapshot_values: values,
        };

        if self.store.append_snapshot(event.clone()) {
            log::info!(
                "System snapshot recorded: {}/{} online, {} faults active",
                counts.online,
                counts.total,
                counts.faults_active
            );
            vec![event]
        } else {
            Vec::new()
        }
    }

    /// Most recent events across all days, newest first
    pub fn get_recent_events(&self, limit: usize) -> Vec<Event> {
        self.store.recent_events(limit, |_| true)
    }

    /// Most recent events of one priority, newest first
    pub fn get_events_by_priority(&self, priority: Priority, limit: usize) -> Vec<Event> {
        self.store.recent_events(limit, |e| e.priority == priority)
    }

    pub fn get_event_statistics(&self) -> Statistics {
        stats::collect(&self.store)
    }

    pub fn format_event_for_display(&self, event: &Event) -> DisplayRecord {
        display::format_event(event, self.clock.now())
    }

    /// Remove all daily files
    pub fn clear(&self) -> usize {
        self.store.clear()
    }

    /// Drop daily files outside the configured retention window
    pub fn apply_retention(&self) -> usize {
        match self.retention_days {
            Some(days) => self.store.prune_older_than(days),
            None => 0,
        }
    }
}

fn snapshot_counts(readings: &[SignalReading]) -> SnapshotCounts {
    let by_status = |status: SignalStatus| readings.iter().filter(|r| r.status == status).count();
    SnapshotCounts {
        total: readings.len(),
        online: by_status(SignalStatus::Online),
        errors: by_status(SignalStatus::Error),
        offline: by_status(SignalStatus::Offline),
        faults_active: readings
            .iter()
            .filter(|r| classifier::is_fault_signal(&r.name))
            .filter(|r| r.value.as_ref().is_some_and(SignalValue::as_bool))
            .count(),
    }
}
