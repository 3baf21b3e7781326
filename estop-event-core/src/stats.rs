//! Event statistics
//!
//! Totals are recomputed from every daily file on each call. The file count grows
//! by one per day, so there is nothing worth caching.

use crate::store::EventStore;
use crate::types::{Event, Priority};
use rayon::prelude::*;
use serde::Serialize;

/// Aggregate view over the event log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_events: usize,
    pub critical_events: usize,
    pub high_priority_events: usize,
    pub events_today: usize,
    pub latest_event: Option<Event>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    total: usize,
    critical: usize,
    high: usize,
}

impl Counts {
    fn of(events: &[Event]) -> Self {
        Self {
            total: events.len(),
            critical: events.iter().filter(|e| e.priority == Priority::Critical).count(),
            high: events.iter().filter(|e| e.priority == Priority::High).count(),
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            critical: self.critical + other.critical,
            high: self.high + other.high,
        }
    }
}

/// Compute statistics over every daily file of `store`
pub fn collect(store: &EventStore) -> Statistics {
    let files = store.daily_files();
    log::trace!("Aggregating statistics over {} daily files", files.len());

    let counts = files
        .par_iter()
        .map(|(_, path)| Counts::of(&store.load_file(path)))
        .reduce(Counts::default, Counts::merge);

    let today = store.load_today();

    Statistics {
        total_events: counts.total,
        critical_events: counts.critical,
        high_priority_events: counts.high,
        events_today: today.len(),
        latest_event: today.into_iter().next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::StoreConfig;
    use crate::types::{EventType, SignalConfig, SignalType, SignalValue};
    use chrono::{Duration, Local, TimeZone};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn event(clock: &ManualClock, name: &str, priority: Priority) -> Event {
        let config = SignalConfig::new(name, SignalType::Bit, "DB1.DBX0.0");
        Event::for_signal(
            clock.now(),
            &config,
            Some(SignalValue::Boolean(false)),
            Some(SignalValue::Boolean(true)),
            EventType::Activated,
            priority,
        )
    }

    #[test]
    fn test_empty_log() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Local::now()));
        let store = EventStore::new(&StoreConfig::new(dir.path()), clock);
        assert_eq!(collect(&store), Statistics::default());
    }

    #[test]
    fn test_totals_span_files_today_does_not() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Local.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()));
        let store = EventStore::new(&StoreConfig::new(dir.path()), clock.clone());

        store.append(event(&clock, "emergency_stop", Priority::Critical));
        store.append(event(&clock, "alarm_relay", Priority::High));
        store.append(event(&clock, "pump_running", Priority::Normal));

        clock.advance(Duration::days(1));
        store.append(event(&clock, "alarm_relay", Priority::High));
        store.append(event(&clock, "valve_open", Priority::Normal));

        let stats = collect(&store);
        assert_eq!(stats.total_events, 5);
        assert_eq!(stats.critical_events, 1);
        assert_eq!(stats.high_priority_events, 2);
        assert_eq!(stats.events_today, 2);
        assert_eq!(stats.latest_event.map(|e| e.io_name), Some("valve_open".to_string()));
    }
}
