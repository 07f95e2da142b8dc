//! Decoded track buffers, keyed by the raw split path as presented to
//! the filesystem adapter. One coarse lock guards the whole map; the
//! external decode runs with the lock released and concurrent openers of
//! the same path wait on a condvar for the single Loading entry to
//! become Ready.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::transcode::{TrackMeta, TranscodeError, Transcoder};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("decode failed in a concurrent open")]
    DecodeAborted,
}

/// Buffer retention tunables.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries untouched for this long are dropped by the idler.
    pub idle_timeout: Duration,
    /// How often each idler wakes to check.
    pub sweep_interval: Duration,
    /// Optional bound on the aggregate size of decoded buffers.
    pub max_bytes: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            max_bytes: None,
        }
    }
}

enum EntryState {
    Loading,
    Ready(Arc<Vec<u8>>),
}

struct Entry {
    state: EntryState,
    /// Last read offset per open handle.
    positions: HashMap<u64, u64>,
    open_count: u32,
    last_access: Instant,
}

impl Entry {
    fn buffer_len(&self) -> u64 {
        match &self.state {
            EntryState::Ready(buffer) => buffer.len() as u64,
            EntryState::Loading => 0,
        }
    }
}

pub struct TrackCache {
    shared: Arc<Shared>,
    transcoder: Arc<dyn Transcoder>,
}

struct Shared {
    entries: Mutex<HashMap<PathBuf, Entry>>,
    ready: Condvar,
    config: CacheConfig,
    next_handle: AtomicU64,
}

impl TrackCache {
    pub fn new(transcoder: Arc<dyn Transcoder>, config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                ready: Condvar::new(),
                config,
                next_handle: AtomicU64::new(1),
            }),
            transcoder,
        }
    }

    /// Fresh handle id. Also used by the adapter for passthrough opens so
    /// the two handle spaces never collide.
    pub fn next_handle(&self) -> u64 {
        self.shared.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    pub fn contains(&self, raw: &Path) -> bool {
        self.shared.entries.lock().contains_key(raw)
    }

    /// Aggregate size of all Ready buffers.
    pub fn buffered_bytes(&self) -> u64 {
        self.shared
            .entries
            .lock()
            .values()
            .map(Entry::buffer_len)
            .sum()
    }

    /// Open the buffer for `raw`, decoding `real` over `[start, end)` if
    /// no entry exists yet. Exactly one decode runs per entry; late
    /// openers share the buffer, concurrent first-openers wait.
    pub fn open_entry(
        &self,
        raw: &Path,
        real: &Path,
        start: f64,
        end: f64,
        meta: &TrackMeta,
    ) -> Result<u64, CacheError> {
        let mut entries = self.shared.entries.lock();
        while matches!(
            entries.get(raw).map(|entry| &entry.state),
            Some(EntryState::Loading)
        ) {
            self.shared.ready.wait(&mut entries);
            // The decoding opener either published the buffer or removed
            // the entry; removal means failure.
            if !entries.contains_key(raw) {
                return Err(CacheError::DecodeAborted);
            }
        }
        if let Some(entry) = entries.get_mut(raw) {
            let handle = self.next_handle();
            entry.positions.insert(handle, 0);
            entry.open_count += 1;
            entry.last_access = Instant::now();
            return Ok(handle);
        }

        // First opener: install the placeholder, decode unlocked.
        entries.insert(
            raw.to_path_buf(),
            Entry {
                state: EntryState::Loading,
                positions: HashMap::new(),
                open_count: 0,
                last_access: Instant::now(),
            },
        );
        drop(entries);

        let decoded = self.transcoder.transcode(real, start, end, meta);

        let mut entries = self.shared.entries.lock();
        match decoded {
            Ok(buffer) => {
                let handle = self.next_handle();
                let mut positions = HashMap::new();
                positions.insert(handle, 0);
                entries.insert(
                    raw.to_path_buf(),
                    Entry {
                        state: EntryState::Ready(Arc::new(buffer)),
                        positions,
                        open_count: 1,
                        last_access: Instant::now(),
                    },
                );
                self.shared.ready.notify_all();
                self.enforce_size_limit(&mut entries, raw);
                self.spawn_idler(raw.to_path_buf());
                Ok(handle)
            }
            Err(error) => {
                log::warn!("decode of {} failed: {error}", real.display());
                entries.remove(raw);
                self.shared.ready.notify_all();
                Err(CacheError::Transcode(error))
            }
        }
    }

    /// Bytes at `[offset, offset + size)` of the buffer, clamped to its
    /// end. Returns `None` when no entry exists for `raw`.
    pub fn read_entry(&self, raw: &Path, handle: u64, offset: u64, size: u32) -> Option<Vec<u8>> {
        let mut entries = self.shared.entries.lock();
        let entry = entries.get_mut(raw)?;
        entry.positions.insert(handle, offset);
        entry.last_access = Instant::now();
        match &entry.state {
            EntryState::Ready(buffer) => {
                let len = buffer.len() as u64;
                let start = offset.min(len) as usize;
                let end = offset.saturating_add(u64::from(size)).min(len) as usize;
                Some(buffer[start..end].to_vec())
            }
            EntryState::Loading => Some(Vec::new()),
        }
    }

    /// Drop one handle. Returns whether an entry for `raw` existed.
    pub fn release_entry(&self, raw: &Path, handle: u64) -> bool {
        let mut entries = self.shared.entries.lock();
        match entries.get_mut(raw) {
            Some(entry) => {
                entry.positions.remove(&handle);
                entry.open_count = entry.open_count.saturating_sub(1);
                entry.last_access = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Evict least-recently-used idle buffers until the aggregate fits
    /// under `max_bytes`. Entries with open handles and the entry just
    /// installed are left alone.
    fn enforce_size_limit(&self, entries: &mut HashMap<PathBuf, Entry>, just_inserted: &Path) {
        let Some(max_bytes) = self.shared.config.max_bytes else {
            return;
        };
        let mut total: u64 = entries.values().map(Entry::buffer_len).sum();
        while total > max_bytes {
            let victim = entries
                .iter()
                .filter(|(path, entry)| {
                    path.as_path() != just_inserted
                        && entry.open_count == 0
                        && matches!(entry.state, EntryState::Ready(_))
                })
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(path, _)| path.clone());
            match victim {
                Some(path) => {
                    if let Some(entry) = entries.remove(&path) {
                        total -= entry.buffer_len();
                        log::debug!("evicted {} over the cache limit", path.display());
                    }
                }
                None => break,
            }
        }
    }

    fn spawn_idler(&self, raw: PathBuf) {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("flaccue-idler".into())
            .spawn(move || idle_sweep(shared, raw));
        if let Err(error) = spawned {
            log::error!("cannot spawn idler: {error}");
        }
    }
}

fn idle_sweep(shared: Arc<Shared>, raw: PathBuf) {
    loop {
        thread::sleep(shared.config.sweep_interval);
        let mut entries = shared.entries.lock();
        let idle_for = match entries.get(&raw) {
            Some(entry) => entry.last_access.elapsed(),
            None => return,
        };
        if idle_for >= shared.config.idle_timeout {
            entries.remove(&raw);
            log::debug!("dropped idle buffer for {}", raw.display());
            return;
        }
    }
}
