//! Edge monitor for the emergency stop signal
//!
//! Runs its own polling loop on a dedicated thread, independent of the
//! request-driven change detector. An OFF→ON edge is confirmed by a single
//! re-sample after the debounce delay; a confirmed edge becomes a trigger. Every
//! raw state change additionally produces a status-change notification.
//!
//! A trigger carries the readings of every signal at that moment. When the
//! monitor shares an [`EventStore`], the trigger is also persisted, classified
//! with the same rules the change detector uses.

use crate::classifier;
use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::plc::AddressDecoder;
use crate::store::EventStore;
use crate::types::{Event, SignalConfig, SignalReading, SignalType, SignalValue, Timestamp};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Notification callback
pub type MonitorCallback = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

/// Kind of monitor notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorEventKind {
    /// Debounced OFF→ON edge
    Triggered,
    /// Any raw state change
    StatusChanged,
}

/// Entry of the in-memory monitor history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorEvent {
    pub timestamp: Timestamp,
    pub kind: MonitorEventKind,
    pub description: String,
    /// Signal state the event refers to
    pub state: bool,
    /// Every signal at trigger time; absent on status changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_summary: Option<Vec<SignalReading>>,
}

/// Outcome of [`EdgeMonitor::self_test`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTest {
    pub plc_connected: bool,
    pub estop_readable: bool,
    pub current_state: Option<bool>,
    pub error: Option<String>,
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub monitoring: bool,
    pub connected: bool,
    pub last_estop_state: bool,
    pub estop_triggered: bool,
    pub last_trigger_time: Option<Timestamp>,
    pub event_count: usize,
    pub polling_interval_ms: u64,
}

#[derive(Default)]
struct MonitorState {
    last_state: bool,
    triggered: bool,
    last_trigger_time: Option<Timestamp>,
    history: VecDeque<MonitorEvent>,
}

struct Shared {
    decoder: Arc<dyn AddressDecoder>,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    store: Option<Arc<EventStore>>,
    state: Mutex<MonitorState>,
    on_triggered: Mutex<Option<MonitorCallback>>,
    on_status_changed: Mutex<Option<MonitorCallback>>,
}

struct LoopHandle {
    thread: JoinHandle<()>,
    exited: Receiver<()>,
    /// Run flag of this loop only; a detached loop keeps its own cleared flag
    running: Arc<AtomicBool>,
}

/// Debounced edge detector for one critical boolean signal
pub struct EdgeMonitor {
    shared: Arc<Shared>,
    handle: Mutex<Option<LoopHandle>>,
}

impl EdgeMonitor {
    pub fn new(decoder: Arc<dyn AddressDecoder>, config: MonitorConfig) -> Self {
        Self::build(decoder, config, Arc::new(SystemClock), None)
    }

    /// Monitor that also persists triggers through `store`, timestamped by `clock`
    pub fn with_store(
        decoder: Arc<dyn AddressDecoder>,
        config: MonitorConfig,
        store: Arc<EventStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(decoder, config, clock, Some(store))
    }

    fn build(
        decoder: Arc<dyn AddressDecoder>,
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        store: Option<Arc<EventStore>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                decoder,
                config,
                clock,
                store,
                state: Mutex::new(MonitorState::default()),
                on_triggered: Mutex::new(None),
                on_status_changed: Mutex::new(None),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Register the callback for confirmed triggers
    pub fn on_triggered(&self, callback: impl Fn(&MonitorEvent) + Send + Sync + 'static) {
        *lock(&self.shared.on_triggered) = Some(Arc::new(callback));
    }

    /// Register the callback for raw state changes
    pub fn on_status_changed(&self, callback: impl Fn(&MonitorEvent) + Send + Sync + 'static) {
        *lock(&self.shared.on_status_changed) = Some(Arc::new(callback));
    }

    /// Start the polling thread
    ///
    /// Returns `true` if the loop is running afterwards. Calling this while
    /// already running does nothing.
    pub fn start_monitoring(&self) -> bool {
        let mut handle = lock(&self.handle);
        if handle.is_some() {
            log::warn!("E-Stop monitoring already running");
            return true;
        }
        if !self.shared.decoder.ensure_connected() {
            log::error!("Failed to connect to PLC for monitoring");
            return false;
        }

        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&running);
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new().name("estop-monitor".to_string()).spawn(move || {
            log::info!("E-Stop monitoring loop started");
            shared.run(&flag);
            log::info!("E-Stop monitoring loop ended");
            let _ = tx.send(());
        });

        match spawned {
            Ok(thread) => {
                *handle = Some(LoopHandle {
                    thread,
                    exited: rx,
                    running,
                });
                log::info!("E-Stop monitoring started");
                true
            }
            Err(e) => {
                log::error!("Error starting E-Stop monitoring: {}", e);
                false
            }
        }
    }

    /// Ask the loop to stop and wait a bounded time for it
    ///
    /// Waits at most twice the polling interval; a loop stuck in a slow read is
    /// left to finish on its own.
    pub fn stop_monitoring(&self) {
        let Some(handle) = lock(&self.handle).take() else {
            return;
        };
        handle.running.store(false, Ordering::SeqCst);

        match handle.exited.recv_timeout(self.shared.config.stop_timeout()) {
            Ok(()) => {
                if handle.thread.join().is_err() {
                    log::error!("E-Stop monitoring thread panicked");
                }
            }
            Err(_) => log::warn!(
                "E-Stop monitoring loop did not exit within {:?}, detaching",
                self.shared.config.stop_timeout()
            ),
        }
        log::info!("E-Stop monitoring stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.handle).is_some()
    }

    /// Run one loop iteration on the calling thread
    pub fn poll_once(&self) {
        self.shared.poll();
    }

    pub fn get_current_status(&self) -> MonitorStatus {
        let monitoring = self.is_monitoring();
        let connected = self.shared.decoder.is_connected();
        let state = lock(&self.shared.state);
        MonitorStatus {
            monitoring,
            connected,
            last_estop_state: state.last_state,
            estop_triggered: state.triggered,
            last_trigger_time: state.last_trigger_time,
            event_count: state.history.len(),
            polling_interval_ms: self.shared.config.polling_interval_ms,
        }
    }

    /// History oldest first; with a limit, only the most recent `limit` entries
    pub fn get_event_history(&self, limit: Option<usize>) -> Vec<MonitorEvent> {
        let state = lock(&self.shared.state);
        let skip = limit.map_or(0, |n| state.history.len().saturating_sub(n));
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Check that the controller is connected and the E-Stop signal readable
    pub fn self_test(&self) -> SelfTest {
        let mut result = SelfTest {
            plc_connected: self.shared.decoder.is_connected(),
            estop_readable: false,
            current_state: None,
            error: None,
        };
        if !result.plc_connected {
            result.error = Some("PLC not connected".to_string());
            return result;
        }

        match self.shared.read_state() {
            Some(state) => {
                result.estop_readable = true;
                result.current_state = Some(state);
            }
            None => result.error = Some(format!("Could not read E-Stop signal '{}'", self.shared.config.signal)),
        }
        result
    }

    /// Clear the triggered flag and last trigger time
    pub fn reset_trigger(&self) {
        let mut state = lock(&self.shared.state);
        state.triggered = false;
        state.last_trigger_time = None;
        log::info!("E-Stop state reset");
    }

    /// Multi-line status report for operators
    pub fn summary(&self) -> String {
        let status = self.get_current_status();
        let yes_no = |b: bool| if b { "yes" } else { "no" };

        let mut out = String::new();
        let _ = writeln!(out, "E-Stop monitor ({})", self.shared.config.signal);
        let _ = writeln!(out, "  Monitoring:    {}", yes_no(status.monitoring));
        let _ = writeln!(out, "  PLC connected: {}", yes_no(status.connected));
        let _ = writeln!(out, "  Signal state:  {}", if status.last_estop_state { "ON" } else { "OFF" });
        let _ = writeln!(out, "  Triggered:     {}", yes_no(status.estop_triggered));
        match status.last_trigger_time {
            Some(t) => {
                let _ = writeln!(out, "  Last trigger:  {}", t.format("%Y-%m-%d %H:%M:%S"));
            }
            None => {
                let _ = writeln!(out, "  Last trigger:  never");
            }
        }
        let _ = writeln!(out, "  History:       {} events", status.event_count);
        let _ = write!(out, "  Interval:      {} ms", status.polling_interval_ms);
        out
    }
}

impl Drop for EdgeMonitor {
    fn drop(&mut self) {
        if self.is_monitoring() {
            self.stop_monitoring();
        }
    }
}

impl Shared {
    fn run(&self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            // A panicking decoder or store must not end the loop
            if panic::catch_unwind(AssertUnwindSafe(|| self.poll())).is_err() {
                log::error!("Error in E-Stop monitoring loop");
            }
            thread::sleep(self.config.polling_interval());
        }
    }

    fn read_state(&self) -> Option<bool> {
        self.decoder.read(&self.config.signal).map(|v| v.as_bool())
    }

    fn poll(&self) {
        let Some(current) = self.read_state() else {
            log::warn!("Could not read E-Stop state");
            return;
        };

        let previous = lock(&self.state).last_state;
        if self.config.edge_detection && current && !previous {
            self.handle_edge();
        }
        if current != previous {
            self.handle_status_change(current);
        }
        lock(&self.state).last_state = current;
    }

    fn handle_edge(&self) {
        log::warn!("EMERGENCY STOP TRIGGERED!");
        thread::sleep(self.config.debounce_time());

        if self.read_state() != Some(true) {
            log::info!("E-Stop debounced - false trigger");
            return;
        }

        let now = self.clock.now();
        let event = MonitorEvent {
            timestamp: now,
            kind: MonitorEventKind::Triggered,
            description: "E-Stop trigger confirmed after debounce".to_string(),
            state: true,
            io_summary: Some(self.decoder.read_summary()),
        };
        {
            let mut state = lock(&self.state);
            state.triggered = true;
            state.last_trigger_time = Some(now);
            self.push_history(&mut state, event.clone());
        }

        if let Some(store) = &self.store {
            store.append(self.trigger_record(&event));
        }

        self.notify(&self.on_triggered, &event, "E-Stop");
        log::info!("E-Stop trigger handled");
    }

    /// Persistent form of a trigger, OFF→ON classified like any other transition
    fn trigger_record(&self, trigger: &MonitorEvent) -> Event {
        let config = SignalConfig::new(self.config.signal.clone(), SignalType::Bit, String::new())
            .with_description(trigger.description.clone());
        let old = SignalValue::Boolean(false);
        let new = SignalValue::Boolean(true);
        let class = classifier::classify(Some(&old), &new, &config);
        Event::for_signal(trigger.timestamp, &config, Some(old), Some(new), class.event_type, class.priority)
    }

    fn handle_status_change(&self, new_state: bool) {
        let status = if new_state { "activated" } else { "deactivated" };
        log::info!("E-Stop status changed: {}", status.to_uppercase());

        let event = MonitorEvent {
            timestamp: self.clock.now(),
            kind: MonitorEventKind::StatusChanged,
            description: format!("E-Stop {}", status),
            state: new_state,
            io_summary: None,
        };
        self.push_history(&mut lock(&self.state), event.clone());
        self.notify(&self.on_status_changed, &event, "status change");
    }

    fn push_history(&self, state: &mut MonitorState, event: MonitorEvent) {
        state.history.push_back(event);
        while state.history.len() > self.config.max_history {
            state.history.pop_front();
        }
    }

    fn notify(&self, slot: &Mutex<Option<MonitorCallback>>, event: &MonitorEvent, what: &str) {
        let Some(callback) = lock(slot).clone() else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            log::error!("Error in {} callback", what);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StoreConfig;
    use crate::types::{EventType, Priority};
    use chrono::{Local, TimeZone};
    use std::sync::atomic::AtomicUsize;
    use std::thread::ThreadId;
    use std::time::{Duration, Instant};

    /// Decoder replaying a fixed sequence, repeating the last value once exhausted
    struct Scripted {
        values: Mutex<VecDeque<Option<bool>>>,
        last: Mutex<Option<bool>>,
    }

    impl Scripted {
        fn new(values: &[Option<bool>]) -> Arc<Self> {
            Arc::new(Self {
                values: Mutex::new(values.iter().copied().collect()),
                last: Mutex::new(None),
            })
        }
    }

    impl AddressDecoder for Scripted {
        fn read(&self, name: &str) -> Option<SignalValue> {
            assert_eq!(name, "emergency_stop");
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.values.lock().unwrap().pop_front() {
                *last = next;
            }
            last.map(SignalValue::Boolean)
        }

        fn read_summary(&self) -> Vec<SignalReading> {
            let last = *self.last.lock().unwrap();
            vec![
                SignalReading::read("emergency_stop", last.map(SignalValue::Boolean)),
                SignalReading::read("pump_running", Some(SignalValue::Boolean(false))),
            ]
        }
    }

    /// Decoder whose first read blocks for `stall`, recording the reading threads
    struct Stalling {
        stall: Duration,
        readers: Mutex<Vec<ThreadId>>,
    }

    impl Stalling {
        fn new(stall: Duration) -> Arc<Self> {
            Arc::new(Self {
                stall,
                readers: Mutex::new(Vec::new()),
            })
        }

        fn reads_by(&self, id: ThreadId) -> usize {
            self.readers.lock().unwrap().iter().filter(|&&t| t == id).count()
        }

        fn first_reader(&self, within: Duration) -> ThreadId {
            let deadline = Instant::now() + within;
            loop {
                if let Some(&id) = self.readers.lock().unwrap().first() {
                    return id;
                }
                assert!(Instant::now() < deadline, "monitor loop never read");
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    impl AddressDecoder for Stalling {
        fn read(&self, _: &str) -> Option<SignalValue> {
            let first = {
                let mut readers = self.readers.lock().unwrap();
                readers.push(thread::current().id());
                readers.len() == 1
            };
            if first {
                thread::sleep(self.stall);
            }
            Some(SignalValue::Boolean(false))
        }
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig::default()
            .with_polling_interval(Duration::from_millis(5))
            .with_debounce(Duration::from_millis(1))
    }

    fn counter(monitor: &EdgeMonitor) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let triggers = Arc::new(AtomicUsize::new(0));
        let changes = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&triggers);
        monitor.on_triggered(move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&changes);
        monitor.on_status_changed(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (triggers, changes)
    }

    #[test]
    fn test_bounce_discarded_but_status_changes_reported() {
        // third value is the debounce re-sample
        let monitor = EdgeMonitor::new(Scripted::new(&[Some(false), Some(true), Some(false)]), fast_config());
        let (triggers, changes) = counter(&monitor);

        for _ in 0..3 {
            monitor.poll_once();
        }

        assert_eq!(triggers.load(Ordering::SeqCst), 0);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
        let status = monitor.get_current_status();
        assert!(!status.estop_triggered);
        assert!(status.last_trigger_time.is_none());

        let states: Vec<_> = monitor.get_event_history(None).iter().map(|e| e.state).collect();
        assert_eq!(states, vec![true, false]);
    }

    #[test]
    fn test_sustained_edge_triggers_once() {
        let monitor = EdgeMonitor::new(Scripted::new(&[Some(false), Some(true), Some(true)]), fast_config());
        let (triggers, changes) = counter(&monitor);

        for _ in 0..4 {
            monitor.poll_once();
        }

        assert_eq!(triggers.load(Ordering::SeqCst), 1);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        let status = monitor.get_current_status();
        assert!(status.estop_triggered);
        assert!(status.last_trigger_time.is_some());
        assert!(status.last_estop_state);

        let history = monitor.get_event_history(None);
        let kinds: Vec<_> = history.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![MonitorEventKind::Triggered, MonitorEventKind::StatusChanged]);

        // the trigger carries every signal as read at that moment
        let summary = history[0].io_summary.as_ref().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].value, Some(SignalValue::Boolean(true)));
        assert!(history[1].io_summary.is_none());

        monitor.reset_trigger();
        assert!(!monitor.get_current_status().estop_triggered);
        assert!(monitor.summary().contains("Last trigger:  never"));
    }

    #[test]
    fn test_edge_detection_disabled() {
        let config = fast_config().with_edge_detection(false);
        let monitor = EdgeMonitor::new(Scripted::new(&[Some(false), Some(true), Some(true)]), config);
        let (triggers, changes) = counter(&monitor);

        monitor.poll_once();
        monitor.poll_once();

        assert_eq!(triggers.load(Ordering::SeqCst), 0);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unreadable_signal_keeps_state() {
        let monitor = EdgeMonitor::new(Scripted::new(&[Some(true), None, None, Some(true)]), fast_config());
        let (_, changes) = counter(&monitor);

        // edge whose re-sample is unreadable, then an unreadable poll
        monitor.poll_once();
        monitor.poll_once();
        monitor.poll_once();

        assert!(!monitor.get_current_status().estop_triggered);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert!(monitor.get_current_status().last_estop_state);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let monitor = EdgeMonitor::new(Scripted::new(&[Some(true), Some(true)]), fast_config());
        monitor.on_triggered(|_| panic!("callback failure"));

        monitor.poll_once();
        assert!(monitor.get_current_status().estop_triggered);
        assert_eq!(monitor.get_event_history(None).len(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let values: Vec<_> = (0..20).map(|i| Some(i % 2 == 0)).collect();
        let config = fast_config().with_edge_detection(false).with_max_history(5);
        let monitor = EdgeMonitor::new(Scripted::new(&values), config);

        for _ in 0..20 {
            monitor.poll_once();
        }

        assert_eq!(monitor.get_event_history(None).len(), 5);
        assert_eq!(monitor.get_event_history(Some(2)).len(), 2);
        assert_eq!(monitor.get_event_history(Some(50)).len(), 5);
        // the last recorded change is the final false reading
        assert!(!monitor.get_event_history(Some(1))[0].state);
    }

    #[test]
    fn test_trigger_persisted_with_stop_polarity() {
        let dir = tempfile::TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Local.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap()));
        let store = Arc::new(EventStore::new(&StoreConfig::new(dir.path()), clock.clone()));
        let monitor = EdgeMonitor::with_store(
            Scripted::new(&[Some(false), Some(true), Some(true)]),
            fast_config(),
            Arc::clone(&store),
            clock,
        );

        monitor.poll_once();
        monitor.poll_once();

        // OFF→ON of a normally-true stop signal is a reset, never a press
        let events = store.load_today();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::EmergencyStopReset);
        assert_eq!(events[0].priority, Priority::Critical);
        assert_eq!(events[0].io_name, "emergency_stop");
        assert_eq!(events[0].old_value, Some(SignalValue::Boolean(false)));
        assert_eq!(events[0].new_value, Some(SignalValue::Boolean(true)));
    }

    #[test]
    fn test_self_test_reports_connection_and_state() {
        let monitor = EdgeMonitor::new(Scripted::new(&[Some(true)]), fast_config());
        let result = monitor.self_test();
        assert!(result.plc_connected);
        assert!(result.estop_readable);
        assert_eq!(result.current_state, Some(true));
        assert!(result.error.is_none());

        let unreadable = EdgeMonitor::new(Scripted::new(&[None]), fast_config()).self_test();
        assert!(unreadable.plc_connected);
        assert!(!unreadable.estop_readable);
        assert_eq!(unreadable.current_state, None);
        assert!(unreadable.error.unwrap().contains("emergency_stop"));
    }

    #[test]
    fn test_start_is_idempotent_and_stop_is_bounded() {
        let monitor = EdgeMonitor::new(Scripted::new(&[Some(false), Some(true), Some(true)]), fast_config());
        let (triggers, _) = counter(&monitor);

        assert!(monitor.start_monitoring());
        assert!(monitor.start_monitoring());
        assert!(monitor.get_current_status().monitoring);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while triggers.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        monitor.stop_monitoring();
        assert!(!monitor.is_monitoring());
        assert_eq!(triggers.load(Ordering::SeqCst), 1);

        // stopping twice is harmless
        monitor.stop_monitoring();
    }

    #[test]
    fn test_stop_returns_while_read_is_stuck() {
        let decoder = Stalling::new(Duration::from_millis(500));
        let monitor = EdgeMonitor::new(decoder.clone(), fast_config());
        assert!(monitor.start_monitoring());
        decoder.first_reader(Duration::from_secs(5));

        let started = Instant::now();
        monitor.stop_monitoring();
        let waited = started.elapsed();

        assert!(waited >= monitor.config().stop_timeout());
        assert!(waited < Duration::from_millis(300), "stop waited {:?}", waited);
        assert!(!monitor.is_monitoring());
    }

    #[test]
    fn test_detached_loop_exits_after_restart() {
        let stall = Duration::from_millis(100);
        let decoder = Stalling::new(stall);
        let monitor = EdgeMonitor::new(decoder.clone(), fast_config());

        assert!(monitor.start_monitoring());
        let stuck = decoder.first_reader(Duration::from_secs(5));
        monitor.stop_monitoring();

        assert!(monitor.start_monitoring());
        // let the stuck read finish and its loop reach the next flag check
        thread::sleep(stall * 3);
        monitor.stop_monitoring();

        assert_eq!(decoder.reads_by(stuck), 1);
        let total = decoder.readers.lock().unwrap().len();
        assert!(total > 1, "restarted loop never polled");
    }

    #[test]
    fn test_start_fails_without_connection() {
        struct Offline;
        impl AddressDecoder for Offline {
            fn read(&self, _: &str) -> Option<SignalValue> {
                None
            }
            fn is_connected(&self) -> bool {
                false
            }
            fn ensure_connected(&self) -> bool {
                false
            }
        }

        let monitor = EdgeMonitor::new(Arc::new(Offline), fast_config());
        assert!(!monitor.start_monitoring());
        assert!(!monitor.get_current_status().monitoring);
        assert!(!monitor.get_current_status().connected);
    }
}
