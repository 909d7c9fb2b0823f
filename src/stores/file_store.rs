use crate::stores::record_store::{RecordStore, StoreEvent, EVENT_CAPACITY};
use anyhow::{bail, Context, Result};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// One line of the record log
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Set { key: String, value: Value },
    Remove { key: String },
}

impl LogEntry {
    fn to_line(&self) -> Result<String> {
        match self {
            LogEntry::Set { key, value } => {
                let json = serde_json::to_string(value).context("Failed to encode record value")?;
                Ok(format!("SET|{}|{}", key, json))
            }
            LogEntry::Remove { key } => Ok(format!("REMOVE|{}", key)),
        }
    }

    fn from_line(line: &str) -> Result<Self> {
        // The value is JSON and may itself contain '|'
        let parts: Vec<&str> = line.splitn(3, '|').collect();

        match parts.first() {
            Some(&"SET") => {
                if parts.len() != 3 {
                    bail!("Invalid SET format");
                }
                let value = serde_json::from_str(parts[2]).context("Invalid record JSON")?;
                Ok(LogEntry::Set {
                    key: parts[1].to_string(),
                    value,
                })
            }
            Some(&"REMOVE") => {
                if parts.len() != 2 {
                    bail!("Invalid REMOVE format");
                }
                Ok(LogEntry::Remove {
                    key: parts[1].to_string(),
                })
            }
            _ => bail!("Unknown operation type"),
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('|') || key.contains('\n') {
        bail!("Invalid record key '{}'", key);
    }
    Ok(())
}

/// Durable record store backed by an append-only log
///
/// Several processes may share one log. Every operation takes an exclusive
/// lock on a sibling `.lock` file and first catches up with lines appended
/// by others, so reads see the latest write and read-modify-writes never
/// clobber one another. Catching up emits a change event per key that
/// another process changed.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    records: DashMap<String, Value>,
    log_lines: AtomicUsize,
    events: broadcast::Sender<StoreEvent>,
}

/// Exclusive hold on the shared log; released when dropped
struct LogLock {
    _file: File,
}

impl FileStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        open_append(&path)?;
        let lock_path = path.with_extension("lock");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let store = Self {
            path,
            lock_path,
            records: DashMap::new(),
            log_lines: AtomicUsize::new(0),
            events,
        };

        {
            let _lock = store.lock()?;
            store.sync()?;
        }

        info!(
            path = %store.path.display(),
            records = store.records.len(),
            log_lines = store.log_len(),
            "Record log replayed"
        );

        Ok(store)
    }

    /// Lines currently in the log, including superseded ones
    pub fn log_len(&self) -> usize {
        self.log_lines.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn lock(&self) -> Result<LogLock> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .context(format!("Failed to open lock file {}", self.lock_path.display()))?;
        file.lock().context("Failed to lock record log")?;
        Ok(LogLock { _file: file })
    }

    fn append(&self, entry: &LogEntry) -> Result<()> {
        let line = entry.to_line()?;
        let mut file = open_append(&self.path)?;
        writeln!(file, "{}", line).context("Failed to write to record log")?;
        file.flush().context("Failed to flush record log")?;
        self.log_lines.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn notify(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    /// Bring memory in line with the log; caller holds the lock
    fn sync(&self) -> Result<usize> {
        let (snapshot, lines) = replay(&self.path)?;
        let mut changed = Vec::new();

        for (key, value) in &snapshot {
            let differs = self
                .records
                .get(key)
                .map_or(true, |current| current.value() != value);
            if differs {
                self.records.insert(key.clone(), value.clone());
                changed.push(StoreEvent::set(key.clone()));
            }
        }

        let stale: Vec<String> = self
            .records
            .iter()
            .filter(|entry| !snapshot.contains_key(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for key in stale {
            self.records.remove(&key);
            changed.push(StoreEvent::removed(key));
        }

        self.log_lines.store(lines, Ordering::Relaxed);

        let count = changed.len();
        for event in changed {
            self.notify(event);
        }
        Ok(count)
    }

    /// Catch up with writes made by other processes
    ///
    /// Returns how many keys changed. Every operation already does this;
    /// call it directly to surface change events while idle.
    pub fn reload(&self) -> Result<usize> {
        let _lock = self.lock()?;
        let changed = self.sync()?;
        debug!(changed = changed, "Record log reloaded");
        Ok(changed)
    }

    /// Rewrite the log so it holds exactly one SET line per live record
    pub fn compact(&self) -> Result<()> {
        let _lock = self.lock()?;
        self.sync()?;
        self.compact_locked()
    }

    /// Compact once the log has grown past `max_lines`
    pub fn compact_if_needed(&self, max_lines: usize) -> Result<bool> {
        let _lock = self.lock()?;
        self.sync()?;

        if self.log_len() <= max_lines {
            return Ok(false);
        }
        self.compact_locked()?;
        Ok(true)
    }

    fn compact_locked(&self) -> Result<()> {
        let tmp_path = self.path.with_extension("compact");

        let mut lines = 0;
        {
            let mut tmp = File::create(&tmp_path)
                .context(format!("Failed to create {}", tmp_path.display()))?;
            for entry in self.records.iter() {
                let line = LogEntry::Set {
                    key: entry.key().clone(),
                    value: entry.value().clone(),
                }
                .to_line()?;
                writeln!(tmp, "{}", line).context("Failed to write compacted log")?;
                lines += 1;
            }
            tmp.flush().context("Failed to flush compacted log")?;
            tmp.sync_all().context("Failed to sync compacted log")?;
        }

        fs::rename(&tmp_path, &self.path).context("Failed to replace record log")?;

        let before = self.log_lines.swap(lines, Ordering::Relaxed);
        info!(before = before, after = lines, "Record log compacted");
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open record log {}", path.display()))
}

fn replay(path: &Path) -> Result<(HashMap<String, Value>, usize)> {
    let file = File::open(path).context("Failed to open record log for replay")?;
    let reader = BufReader::new(file);
    let mut records = HashMap::new();
    let mut lines = 0;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.context("Failed to read line from record log")?;
        let line = line.trim();

        // Skip empty lines
        if line.is_empty() {
            continue;
        }
        lines += 1;

        match LogEntry::from_line(line) {
            Ok(LogEntry::Set { key, value }) => {
                records.insert(key, value);
            }
            Ok(LogEntry::Remove { key }) => {
                records.remove(&key);
            }
            Err(e) => {
                warn!(
                    line_num = line_num + 1,
                    error = %e,
                    "Failed to parse record log line, skipping"
                );
            }
        }
    }

    Ok((records, lines))
}

impl RecordStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _lock = self.lock()?;
        self.sync()?;
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        check_key(key)?;
        let _lock = self.lock()?;
        self.sync()?;

        self.append(&LogEntry::Set {
            key: key.to_string(),
            value: value.clone(),
        })?;
        self.records.insert(key.to_string(), value);
        self.notify(StoreEvent::set(key));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        check_key(key)?;
        let _lock = self.lock()?;
        self.sync()?;

        if !self.records.contains_key(key) {
            return Ok(());
        }
        self.append(&LogEntry::Remove {
            key: key.to_string(),
        })?;
        self.records.remove(key);
        self.notify(StoreEvent::removed(key));
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()> {
        check_key(key)?;
        let _lock = self.lock()?;
        self.sync()?;

        let current = self.records.get(key).map(|entry| entry.value().clone());
        if let Some(value) = apply(current)? {
            self.append(&LogEntry::Set {
                key: key.to_string(),
                value: value.clone(),
            })?;
            self.records.insert(key.to_string(), value);
            self.notify(StoreEvent::set(key));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
