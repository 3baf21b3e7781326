//! Controller connection handling
//!
//! A [`PlcLink`] is the raw byte-level connection to the controller. The
//! [`ConnectionSupervisor`] keeps exactly one link alive for the whole process,
//! reconnects with exponential backoff when it drops, and turns configured
//! signals into decoded values.

use super::address::Address;
use super::AddressDecoder;
use crate::config::ReconnectConfig;
use crate::detector::SignalMap;
use crate::types::{EventLogError, Result, SignalConfig, SignalReading, SignalValue};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Byte-level access to controller data blocks
pub trait PlcLink: Send {
    fn connect(&mut self) -> Result<()>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Read `len` bytes of data block `db_number` starting at `start`
    fn read_area(&mut self, db_number: u16, start: usize, len: usize) -> Result<Vec<u8>>;
}

/// In-memory data block image, optionally backed by a JSON file
///
/// The file maps data block numbers to byte arrays, e.g. `{"1": [1, 0, 0, 250]}`,
/// and is re-read on every access so an external process can update it.
#[derive(Debug, Default)]
pub struct DataBlockImage {
    blocks: HashMap<u16, Vec<u8>>,
    source: Option<PathBuf>,
    connected: bool,
}

impl DataBlockImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image loaded from `path` on connect and on every read
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            ..Self::default()
        }
    }

    /// Replace the contents of one data block
    pub fn set_block(&mut self, db_number: u16, bytes: Vec<u8>) {
        self.blocks.insert(db_number, bytes);
    }

    /// Set a single bit, growing the block if needed
    pub fn set_bit(&mut self, db_number: u16, byte: usize, bit: u8, value: bool) {
        let block = self.blocks.entry(db_number).or_default();
        if block.len() <= byte {
            block.resize(byte + 1, 0);
        }
        let mask = 1u8 << (bit & 0x07);
        if value {
            block[byte] |= mask;
        } else {
            block[byte] &= !mask;
        }
    }

    fn reload(&mut self) -> Result<()> {
        let Some(path) = &self.source else {
            return Ok(());
        };
        self.blocks = load_image(path)?;
        Ok(())
    }
}

fn load_image(path: &Path) -> Result<HashMap<u16, Vec<u8>>> {
    let content = fs::read_to_string(path)?;
    let raw: HashMap<String, Vec<u8>> = serde_json::from_str(&content)?;
    raw.into_iter()
        .map(|(key, bytes)| {
            key.trim_start_matches("DB")
                .parse::<u16>()
                .map(|db| (db, bytes))
                .map_err(|_| EventLogError::InvalidData(format!("invalid data block key '{}'", key)))
        })
        .collect()
}

impl PlcLink for DataBlockImage {
    fn connect(&mut self) -> Result<()> {
        self.reload()
            .map_err(|e| EventLogError::Connection(format!("data block image unavailable: {}", e)))?;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_area(&mut self, db_number: u16, start: usize, len: usize) -> Result<Vec<u8>> {
        if !self.connected {
            return Err(EventLogError::Connection("not connected".to_string()));
        }
        if let Err(e) = self.reload() {
            self.connected = false;
            return Err(EventLogError::Connection(format!("data block image lost: {}", e)));
        }

        let block = self
            .blocks
            .get(&db_number)
            .ok_or_else(|| EventLogError::InvalidData(format!("DB{} does not exist", db_number)))?;
        start
            .checked_add(len)
            .and_then(|end| block.get(start..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                EventLogError::InvalidData(format!(
                    "DB{} has {} bytes, read of {} bytes at {} out of range",
                    db_number,
                    block.len(),
                    len,
                    start
                ))
            })
    }
}

struct LinkState<L> {
    link: L,
    backoff: Duration,
    next_attempt: Option<Instant>,
    failures: u32,
}

/// One long-lived controller connection shared by every polling cycle
pub struct ConnectionSupervisor<L: PlcLink> {
    state: Mutex<LinkState<L>>,
    signals: Vec<(SignalConfig, Address)>,
    index: HashMap<String, usize>,
    reconnect: ReconnectConfig,
}

impl<L: PlcLink> ConnectionSupervisor<L> {
    /// Wrap `link`; fails if a signal has an invalid or mismatched address
    pub fn new(link: L, signals: Vec<SignalConfig>, reconnect: ReconnectConfig) -> Result<Self> {
        let mut parsed = Vec::with_capacity(signals.len());
        let mut index = HashMap::with_capacity(signals.len());

        for config in signals {
            let address: Address = config.address.parse()?;
            address.check_type(config.signal_type)?;
            if index.insert(config.name.clone(), parsed.len()).is_some() {
                return Err(EventLogError::InvalidData(format!("duplicate signal name '{}'", config.name)));
            }
            parsed.push((config, address));
        }

        Ok(Self {
            state: Mutex::new(LinkState {
                link,
                backoff: reconnect.initial_backoff(),
                next_attempt: None,
                failures: 0,
            }),
            signals: parsed,
            index,
            reconnect,
        })
    }

    /// Configured signals in configuration order
    pub fn signals(&self) -> impl Iterator<Item = &SignalConfig> {
        self.signals.iter().map(|(config, _)| config)
    }

    /// Configured signals keyed by name
    pub fn signal_map(&self) -> SignalMap {
        crate::detector::signal_map(self.signals().cloned())
    }

    /// Connect if needed, honouring the backoff window
    pub fn ensure_connected(&self) -> bool {
        let mut state = self.lock();
        self.ensure(&mut state)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().link.is_connected()
    }

    pub fn disconnect(&self) {
        let mut state = self.lock();
        state.link.disconnect();
        log::info!("Disconnected from PLC");
    }

    /// Read every configured signal, in configuration order
    pub fn read_all(&self) -> Vec<SignalReading> {
        let mut state = self.lock();
        if !self.ensure(&mut state) {
            return self.signals().map(|c| SignalReading::offline(&c.name)).collect();
        }

        self.signals
            .iter()
            .map(|(config, address)| SignalReading::read(&config.name, read_signal(&mut state.link, config, address)))
            .collect()
    }

    /// Run `f` against the wrapped link
    pub fn with_link<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        f(&mut self.lock().link)
    }

    fn lock(&self) -> MutexGuard<'_, LinkState<L>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure(&self, state: &mut LinkState<L>) -> bool {
        if state.link.is_connected() {
            return true;
        }
        if let Some(at) = state.next_attempt {
            if Instant::now() < at {
                return false;
            }
        }

        match state.link.connect() {
            Ok(()) => {
                log::info!("Connected to PLC after {} failed attempts", state.failures);
                state.backoff = self.reconnect.initial_backoff();
                state.next_attempt = None;
                state.failures = 0;
                true
            }
            Err(e) => {
                state.failures += 1;
                log::warn!(
                    "PLC connect attempt {} failed: {} (retrying in {:?})",
                    state.failures,
                    e,
                    state.backoff
                );
                state.next_attempt = Some(Instant::now() + state.backoff);
                state.backoff = (state.backoff * 2).min(self.reconnect.max_backoff());
                false
            }
        }
    }
}

impl<L: PlcLink> AddressDecoder for ConnectionSupervisor<L> {
    fn read(&self, name: &str) -> Option<SignalValue> {
        let Some(&i) = self.index.get(name) else {
            log::debug!("Read of unconfigured signal '{}'", name);
            return None;
        };
        let (config, address) = &self.signals[i];

        let mut state = self.lock();
        if !self.ensure(&mut state) {
            return None;
        }
        read_signal(&mut state.link, config, address)
    }

    fn is_connected(&self) -> bool {
        ConnectionSupervisor::is_connected(self)
    }

    fn ensure_connected(&self) -> bool {
        ConnectionSupervisor::ensure_connected(self)
    }

    fn read_summary(&self) -> Vec<SignalReading> {
        self.read_all()
    }
}

fn read_signal<L: PlcLink>(link: &mut L, config: &SignalConfig, address: &Address) -> Option<SignalValue> {
    let result = link
        .read_area(address.db_number, address.byte_offset, address.byte_len())
        .and_then(|data| address.decode(&data, config.signal_type, config.scale_factor));
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Error reading '{}' at {}: {}", config.name, address, e);
            None
        }
    }
}
