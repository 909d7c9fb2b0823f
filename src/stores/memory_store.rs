use crate::stores::record_store::{RecordStore, StoreEvent, EVENT_CAPACITY};
use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

/// In-memory record store, used for tests and ephemeral clients
pub struct MemoryStore {
    records: DashMap<String, Value>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            records: DashMap::new(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is not an error
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.records.insert(key.to_string(), value);
        self.notify(StoreEvent::set(key));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.records.remove(key).is_some() {
            self.notify(StoreEvent::removed(key));
        }
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()> {
        // The shard stays locked while `apply` runs
        let written = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match apply(Some(occupied.get().clone()))? {
                Some(value) => {
                    occupied.insert(value);
                    true
                }
                None => false,
            },
            Entry::Vacant(vacant) => match apply(None)? {
                Some(value) => {
                    vacant.insert(value);
                    true
                }
                None => false,
            },
        };

        if written {
            self.notify(StoreEvent::set(key));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
