use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Key holding the ordered list of credential records
pub const REGISTERED_USERS: &str = "registeredUsers";
/// Key holding the snapshot of the signed-in record
pub const AUTH_USER: &str = "authUser";
/// Key holding the `AuthSessionPointer`
pub const AUTH_SESSION_POINTER: &str = "authSessionPointer";

/// Key holding one user's newest-first session list
pub fn sessions_key(user_id: &str) -> String {
    format!("sessions:{}", user_id)
}

/// Capacity of each store's change-notification channel
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    Set,
    Removed,
}

/// Change notification, the equivalent of a browser storage event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    pub kind: StoreEventKind,
}

impl StoreEvent {
    pub fn set(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: StoreEventKind::Set,
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: StoreEventKind::Removed,
        }
    }

    /// Whether this change can affect who is signed in
    pub fn touches_auth(&self) -> bool {
        self.key == AUTH_SESSION_POINTER || self.key == AUTH_USER || self.key == REGISTERED_USERS
    }
}

/// Durable key-value store shared by every client instance
///
/// Implementations must be usable behind `Arc<dyn RecordStore>`. Subscribers
/// that lag behind lose events; the store itself stays authoritative.
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Atomic read-modify-write of one key
    ///
    /// `apply` sees the latest stored value, including writes by other
    /// clients, and no other write to the store lands in between. Returning
    /// `None` leaves the record untouched.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Option<Value>>,
    ) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Read and decode a typed record
pub fn read_json<T: DeserializeOwned>(store: &dyn RecordStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => {
            let decoded = serde_json::from_value(value)
                .context(format!("Failed to decode record '{}'", key))?;
            Ok(Some(decoded))
        }
        None => Ok(None),
    }
}

/// Encode and write a typed record
pub fn write_json<T: Serialize + ?Sized>(store: &dyn RecordStore, key: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_value(value)
        .context(format!("Failed to encode record '{}'", key))?;
    store.set(key, encoded)
}

/// Typed read-modify-write; a missing record starts from `T::default()`
///
/// The record is written back only when `change` succeeds.
pub fn update_json<T, R, E, F>(store: &dyn RecordStore, key: &str, change: F) -> Result<R, E>
where
    T: DeserializeOwned + Serialize + Default,
    E: From<anyhow::Error>,
    F: FnOnce(&mut T) -> Result<R, E>,
{
    let mut change = Some(change);
    let mut outcome = None;

    store.update(key, &mut |current| {
        let mut record: T = match current {
            Some(value) => serde_json::from_value(value)
                .context(format!("Failed to decode record '{}'", key))?,
            None => T::default(),
        };

        let change = change
            .take()
            .ok_or_else(|| anyhow!("Record '{}' was changed twice", key))?;
        let result = change(&mut record);

        let write = match &result {
            Ok(_) => Some(
                serde_json::to_value(&record)
                    .context(format!("Failed to encode record '{}'", key))?,
            ),
            Err(_) => None,
        };
        outcome = Some(result);
        Ok(write)
    })?;

    outcome.unwrap_or_else(|| Err(anyhow!("Record '{}' was not updated", key).into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pointer::AuthSessionPointer;
    use crate::stores::memory_store::MemoryStore;

    #[test]
    fn test_sessions_key_format() {
        assert_eq!(sessions_key("abc"), "sessions:abc");
    }

    #[test]
    fn test_typed_round_trip_through_store() {
        let store = MemoryStore::new();
        let pointer = AuthSessionPointer::new("u1", "s1", 10);

        write_json(&store, AUTH_SESSION_POINTER, &pointer).unwrap();
        let read: Option<AuthSessionPointer> = read_json(&store, AUTH_SESSION_POINTER).unwrap();
        assert_eq!(read, Some(pointer));
    }

    #[test]
    fn test_read_missing_key_is_none() {
        let store = MemoryStore::new();
        let read: Option<AuthSessionPointer> = read_json(&store, AUTH_SESSION_POINTER).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_read_wrong_shape_is_error() {
        let store = MemoryStore::new();
        store.set(AUTH_SESSION_POINTER, serde_json::json!([1, 2, 3])).unwrap();

        let err = read_json::<AuthSessionPointer>(&store, AUTH_SESSION_POINTER).unwrap_err();
        assert!(err.to_string().contains(AUTH_SESSION_POINTER));
    }

    #[test]
    fn test_update_json_starts_from_default() {
        let store = MemoryStore::new();
        let len = update_json(&store, "list", |items: &mut Vec<u32>| -> Result<usize> {
            items.push(7);
            Ok(items.len())
        })
        .unwrap();

        assert_eq!(len, 1);
        assert_eq!(store.get("list").unwrap(), Some(serde_json::json!([7])));
    }

    #[test]
    fn test_update_json_failure_leaves_record() {
        let store = MemoryStore::new();
        store.set("list", serde_json::json!([1])).unwrap();

        let result = update_json(&store, "list", |items: &mut Vec<u32>| -> Result<()> {
            items.clear();
            Err(anyhow!("rejected"))
        });

        assert!(result.is_err());
        assert_eq!(store.get("list").unwrap(), Some(serde_json::json!([1])));
    }

    #[test]
    fn test_touches_auth() {
        assert!(StoreEvent::removed(AUTH_SESSION_POINTER).touches_auth());
        assert!(StoreEvent::set(REGISTERED_USERS).touches_auth());
        assert!(!StoreEvent::set(sessions_key("u1")).touches_auth());
    }
}
