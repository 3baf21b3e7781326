//! Daily event store
//!
//! Events live in one JSON file per calendar day, `events_<YYYY-MM-DD>.json`,
//! holding an array with the newest event first. Every write is a full
//! read-modify-write of today's file: load, insert at index 0, truncate to the
//! cap, replace the file. "Today" is recomputed on every write, so a process
//! that runs past midnight rotates to a new file on its own.
//!
//! The cap never evicts today's system snapshot while there is room for at
//! least one other event, and the store remembers the day it last recorded a
//! snapshot, so a day never gets a second one.
//!
//! Writers are serialized by a store-wide lock. I/O and parse failures never
//! escape this module: reads degrade to "no events", writes are skipped, and
//! both are logged.

use crate::clock::Clock;
use crate::config::StoreConfig;
use crate::types::{Event, Result};
use chrono::{Days, NaiveDate};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const FILE_PREFIX: &str = "events_";
const FILE_EXTENSION: &str = "json";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Owner of the on-disk daily log files
pub struct EventStore {
    dir: PathBuf,
    max_events: usize,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<WriteState>,
}

#[derive(Default)]
struct WriteState {
    snapshot_day: Option<NaiveDate>,
}

impl EventStore {
    /// Create a store; the directory is created lazily on the first write
    pub fn new(config: &StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: config.log_dir.clone(),
            max_events: config.max_events.max(1),
            clock,
            write_lock: Mutex::new(WriteState::default()),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// Current local date according to the store's clock
    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Path of the daily file for `date`
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}{}.{}", FILE_PREFIX, date.format(DATE_FORMAT), FILE_EXTENSION))
    }

    /// Path of today's file
    pub fn current_path(&self) -> PathBuf {
        self.path_for(self.today())
    }

    /// Append `event` to today's file, returns false if the write was skipped
    pub fn append(&self, event: Event) -> bool {
        let _state = self.lock();
        self.update_day(self.today(), move |events| {
            events.insert(0, event);
            true
        })
    }

    /// Append a snapshot unless one was already recorded today
    pub fn append_snapshot(&self, event: Event) -> bool {
        let mut state = self.lock();
        let today = self.today();
        if state.snapshot_day == Some(today) {
            log::debug!("System snapshot already recorded today, skipping");
            return false;
        }

        let mut on_file = false;
        let written = self.update_day(today, |events| {
            on_file = events.iter().any(Event::is_snapshot);
            if !on_file {
                events.insert(0, event);
            }
            !on_file
        });
        if on_file {
            log::debug!("System snapshot already recorded today, skipping");
        }
        if written || on_file {
            state.snapshot_day = Some(today);
        }
        written
    }

    /// All events of `date`, newest first
    pub fn load_day(&self, date: NaiveDate) -> Vec<Event> {
        self.load_file(&self.path_for(date))
    }

    /// All events of today, newest first
    pub fn load_today(&self) -> Vec<Event> {
        self.load_day(self.today())
    }

    /// Daily files present on disk, oldest first
    pub fn daily_files(&self) -> Vec<(NaiveDate, PathBuf)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                log::error!("Failed to list event log directory {:?}: {}", self.dir, e);
                return Vec::new();
            }
        };

        let mut files: Vec<(NaiveDate, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let date = parse_file_date(name.to_str()?)?;
                Some((date, entry.path()))
            })
            .collect();
        files.sort_by_key(|(date, _)| *date);
        files
    }

    /// Up to `limit` events matching `filter`, newest first across all days
    pub fn recent_events<F>(&self, limit: usize, filter: F) -> Vec<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let mut found = Vec::new();
        for (_, path) in self.daily_files().into_iter().rev() {
            if found.len() >= limit {
                break;
            }
            let remaining = limit - found.len();
            found.extend(self.load_file(&path).into_iter().filter(|e| filter(e)).take(remaining));
        }
        found
    }

    /// Remove every daily file, returns how many were removed
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        state.snapshot_day = None;
        let removed = self.remove_files(|_| true);
        log::info!("Event log cleared ({} daily files removed)", removed);
        removed
    }

    /// Remove daily files older than `retention_days` days before today
    pub fn prune_older_than(&self, retention_days: u32) -> usize {
        let _state = self.lock();
        let Some(cutoff) = self.today().checked_sub_days(Days::new(u64::from(retention_days))) else {
            return 0;
        };
        let removed = self.remove_files(|date| date < cutoff);
        if removed > 0 {
            log::info!("Pruned {} daily event files older than {}", removed, cutoff);
        }
        removed
    }

    /// Load one daily file, degrading to an empty list on any failure
    pub(crate) fn load_file(&self, path: &Path) -> Vec<Event> {
        match read_events(path) {
            Ok(events) => events,
            Err(e) => {
                log::error!("Failed to load events from {:?}: {}", path, e);
                Vec::new()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriteState> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read-modify-write of one daily file; callers hold the write lock
    fn update_day<F>(&self, date: NaiveDate, apply: F) -> bool
    where
        F: FnOnce(&mut Vec<Event>) -> bool,
    {
        let path = self.path_for(date);

        let mut events = self.load_file(&path);
        if !apply(&mut events) {
            return false;
        }
        cap_events(&mut events, self.max_events);

        match self.write_events(&path, &events) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save event to {:?}: {}", path, e);
                false
            }
        }
    }

    fn write_events(&self, path: &Path, events: &[Event]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Replace the file in one step so readers never see a half-written array
        let tmp_path = path.with_extension(format!("{}.tmp", FILE_EXTENSION));
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, events)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn remove_files<P>(&self, predicate: P) -> usize
    where
        P: Fn(NaiveDate) -> bool,
    {
        let mut removed = 0;
        for (date, path) in self.daily_files() {
            if !predicate(date) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::error!("Failed to remove {:?}: {}", path, e),
            }
        }
        removed
    }
}

/// Drop the oldest events beyond `max`, keeping the day's snapshot if `max` allows
fn cap_events(events: &mut Vec<Event>, max: usize) {
    if events.len() <= max {
        return;
    }
    if max > 1 {
        if let Some(pos) = events.iter().position(Event::is_snapshot) {
            if pos >= max {
                let snapshot = events.remove(pos);
                events.truncate(max - 1);
                events.push(snapshot);
                return;
            }
        }
    }
    events.truncate(max);
}

fn read_events(path: &Path) -> Result<Vec<Event>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn parse_file_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_EXTENSION)?
        .strip_suffix('.')?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{EventType, Priority, SignalConfig, SignalType, SignalValue, Timestamp};
    use chrono::{Duration, Local, TimeZone};
    use tempfile::TempDir;

    fn start() -> Timestamp {
        Local.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
    }

    fn setup(max_events: usize) -> (TempDir, Arc<ManualClock>, EventStore) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let config = StoreConfig::new(dir.path()).with_max_events(max_events);
        let store = EventStore::new(&config, clock.clone());
        (dir, clock, store)
    }

    fn event(clock: &ManualClock, n: i64) -> Event {
        let config = SignalConfig::new("flow_rate", SignalType::Word, "DB1.DBW2");
        Event::for_signal(
            clock.now(),
            &config,
            Some(SignalValue::Integer(n - 1)),
            Some(SignalValue::Integer(n)),
            EventType::Change,
            Priority::Normal,
        )
    }

    fn snapshot(clock: &ManualClock) -> Event {
        let mut e = event(clock, 0);
        e.event_type = EventType::SystemSnapshot;
        e
    }

    #[test]
    fn test_file_name_policy() {
        let (dir, _clock, store) = setup(10);
        assert_eq!(store.current_path(), dir.path().join("events_2026-10-19.json"));
        assert_eq!(parse_file_date("events_2026-10-19.json"), NaiveDate::from_ymd_opt(2026, 10, 19));
        assert_eq!(parse_file_date("events_2026-10-19.json.tmp"), None);
        assert_eq!(parse_file_date("notes.json"), None);
    }

    #[test]
    fn test_append_round_trip_newest_first() {
        let (_dir, clock, store) = setup(10);
        let written: Vec<Event> = (1..=3).map(|n| event(&clock, n)).collect();
        for e in &written {
            assert!(store.append(e.clone()));
        }

        let loaded = store.load_today();
        let expected: Vec<Event> = written.into_iter().rev().collect();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let (_dir, clock, store) = setup(5);
        for n in 1..=12 {
            store.append(event(&clock, n));
            assert!(store.load_today().len() <= 5);
        }

        let values: Vec<_> = store.load_today().iter().map(|e| e.new_value.clone()).collect();
        let expected: Vec<_> = (8..=12).rev().map(|n| Some(SignalValue::Integer(n))).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_rotation_past_midnight() {
        let (dir, clock, store) = setup(10);
        clock.set(Local.with_ymd_and_hms(2026, 10, 19, 23, 59, 30).unwrap());
        store.append(event(&clock, 1));
        clock.advance(Duration::minutes(1));
        store.append(event(&clock, 2));

        assert!(dir.path().join("events_2026-10-19.json").exists());
        assert!(dir.path().join("events_2026-10-20.json").exists());
        assert_eq!(store.load_today().len(), 1);
        assert_eq!(store.daily_files().len(), 2);
        assert_eq!(store.daily_files()[0].0, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[test]
    fn test_snapshot_once_per_day() {
        let (_dir, clock, store) = setup(10);
        assert!(store.append_snapshot(snapshot(&clock)));
        store.append(event(&clock, 1));
        assert!(!store.append_snapshot(snapshot(&clock)));
        assert!(!store.append_snapshot(snapshot(&clock)));

        let snapshots = store.load_today().iter().filter(|e| e.is_snapshot()).count();
        assert_eq!(snapshots, 1);

        clock.advance(Duration::days(1));
        assert!(store.append_snapshot(snapshot(&clock)));
    }

    #[test]
    fn test_cap_keeps_todays_snapshot() {
        let (dir, clock, store) = setup(2);
        assert!(store.append_snapshot(snapshot(&clock)));
        for n in 1..=5 {
            store.append(event(&clock, n));
        }

        let today = store.load_today();
        assert_eq!(today.len(), 2);
        assert_eq!(today[0].new_value, Some(SignalValue::Integer(5)));
        assert!(today[1].is_snapshot());
        assert!(!store.append_snapshot(snapshot(&clock)));

        // a restarted process finds the snapshot on file
        let reopened = EventStore::new(&StoreConfig::new(dir.path()).with_max_events(2), clock.clone());
        assert!(!reopened.append_snapshot(snapshot(&clock)));
        assert_eq!(reopened.load_today().iter().filter(|e| e.is_snapshot()).count(), 1);
    }

    #[test]
    fn test_single_slot_cap_still_one_snapshot_per_day() {
        let (_dir, clock, store) = setup(1);
        assert!(store.append_snapshot(snapshot(&clock)));
        store.append(event(&clock, 1));
        assert!(!store.load_today()[0].is_snapshot());

        assert!(!store.append_snapshot(snapshot(&clock)));
        assert!(!store.load_today()[0].is_snapshot());

        clock.advance(Duration::days(1));
        assert!(store.append_snapshot(snapshot(&clock)));

        store.clear();
        assert!(store.append_snapshot(snapshot(&clock)));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let (_dir, clock, store) = setup(10);
        fs::write(store.current_path(), "{ not json").unwrap();
        assert!(store.load_today().is_empty());

        assert!(store.append(event(&clock, 1)));
        assert_eq!(store.load_today().len(), 1);
    }

    #[test]
    fn test_write_failure_is_skipped() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let store = EventStore::new(&StoreConfig::new(&blocker), clock.clone());

        assert!(!store.append(event(&clock, 1)));
        assert!(store.load_today().is_empty());
        assert!(store.daily_files().is_empty());
    }

    #[test]
    fn test_recent_events_span_days() {
        let (_dir, clock, store) = setup(10);
        store.append(event(&clock, 1));
        store.append(event(&clock, 2));
        clock.advance(Duration::days(1));
        store.append(event(&clock, 3));

        let recent = store.recent_events(2, |_| true);
        let values: Vec<_> = recent.iter().map(|e| e.new_value.clone()).collect();
        assert_eq!(values, vec![Some(SignalValue::Integer(3)), Some(SignalValue::Integer(2))]);
        assert_eq!(store.recent_events(10, |_| true).len(), 3);
        assert!(store.recent_events(0, |_| true).is_empty());
    }

    #[test]
    fn test_clear_and_prune() {
        let (_dir, clock, store) = setup(10);
        for _ in 0..5 {
            store.append(event(&clock, 1));
            clock.advance(Duration::days(1));
        }
        // files for 10-19 .. 10-23, today is 10-24
        assert_eq!(store.prune_older_than(3), 2);
        assert_eq!(store.daily_files().len(), 3);

        assert_eq!(store.clear(), 3);
        assert!(store.daily_files().is_empty());
        assert!(store.recent_events(10, |_| true).is_empty());
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        use std::thread;

        let (_dir, clock, store) = setup(1000);
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for n in 0..10 {
                        store.append(event(&clock, t * 100 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load_today().len(), 80);
    }
}
