use crate::models::session::{DeviceInfo, Session};
use crate::stores::record_store::{read_json, sessions_key, update_json, write_json, RecordStore};
use crate::utils::id::generate_id;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-user, newest-first session lists under `sessions:<userId>`
///
/// After `create` exactly one session per user is flagged current, and a
/// list never holds more than `cap` entries. Each change is one atomic
/// read-modify-write of the user's list.
pub struct SessionManager {
    store: Arc<dyn RecordStore>,
    cap: usize,
}

type Sessions = Vec<Session>;

impl SessionManager {
    pub fn new(store: Arc<dyn RecordStore>, cap: usize) -> Self {
        Self { store, cap }
    }

    /// Stored list for the user; empty when none exists
    pub fn list_for(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(read_json(self.store.as_ref(), &sessions_key(user_id))?.unwrap_or_default())
    }

    /// Overwrite the user's list, e.g. to undo a half-finished sign-in
    pub fn replace(&self, user_id: &str, sessions: &[Session]) -> Result<()> {
        write_json(self.store.as_ref(), &sessions_key(user_id), sessions)
    }

    pub fn create(&self, user_id: &str, device: &DeviceInfo, now: i64) -> Result<Session> {
        let session = Session {
            id: generate_id(),
            device: device.device.clone(),
            browser: device.browser.clone(),
            location: device.location.clone(),
            last_active: now,
            is_current: true,
        };

        let evicted = update_json(
            self.store.as_ref(),
            &sessions_key(user_id),
            |sessions: &mut Sessions| -> Result<usize> {
                for existing in sessions.iter_mut() {
                    existing.is_current = false;
                }
                sessions.insert(0, session.clone());

                let evicted = sessions.len().saturating_sub(self.cap);
                sessions.truncate(self.cap);
                Ok(evicted)
            },
        )?;

        if evicted > 0 {
            debug!(user_id = %user_id, evicted = evicted, "Oldest sessions evicted");
        }
        info!(
            user_id = %user_id,
            session_id = %session.id,
            device = %session.device,
            browser = %session.browser,
            "Session created"
        );
        Ok(session)
    }

    /// Remove one session whatever its flag; returns whether it existed
    pub fn terminate(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let removed = self.remove_where(user_id, |session| session.id == session_id)?;
        if removed > 0 {
            info!(user_id = %user_id, session_id = %session_id, "Session terminated");
        }
        Ok(removed > 0)
    }

    /// Keep only the sessions flagged current; returns how many were removed
    pub fn terminate_all_others(&self, user_id: &str) -> Result<usize> {
        let removed = self.remove_where(user_id, |session| !session.is_current)?;
        info!(user_id = %user_id, removed = removed, "Other sessions terminated");
        Ok(removed)
    }

    /// Drop every session flagged current, not just the flag
    pub fn on_logout(&self, user_id: &str) -> Result<usize> {
        let removed = self.remove_where(user_id, |session| session.is_current)?;
        debug!(user_id = %user_id, removed = removed, "Current sessions removed on logout");
        Ok(removed)
    }

    fn remove_where(&self, user_id: &str, doomed: impl Fn(&Session) -> bool) -> Result<usize> {
        update_json(
            self.store.as_ref(),
            &sessions_key(user_id),
            |sessions: &mut Sessions| -> Result<usize> {
                let before = sessions.len();
                sessions.retain(|session| !doomed(session));
                Ok(before - sessions.len())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::file_store::FileStore;
    use crate::stores::memory_store::MemoryStore;
    use tempfile::TempDir;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemoryStore::new()), 10)
    }

    fn device() -> DeviceInfo {
        DeviceInfo::new("Windows PC", "Chrome", "Control Room")
    }

    #[test]
    fn test_create_flips_previous_sessions() {
        let sessions = manager();
        let first = sessions.create("u1", &device(), 100).unwrap();
        let second = sessions.create("u1", &device(), 200).unwrap();

        let list = sessions.list_for("u1").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second.id);
        assert!(list[0].is_current);
        assert_eq!(list[0].last_active, 200);
        assert_eq!(list[1].id, first.id);
        assert!(!list[1].is_current);
        assert_eq!(list.iter().filter(|s| s.is_current).count(), 1);
    }

    #[test]
    fn test_cap_keeps_ten_most_recent() {
        let sessions = manager();
        let created: Vec<Session> = (0..11)
            .map(|i| sessions.create("u1", &device(), i).unwrap())
            .collect();

        let list = sessions.list_for("u1").unwrap();
        assert_eq!(list.len(), 10);

        let expected: Vec<&str> = created.iter().rev().take(10).map(|s| s.id.as_str()).collect();
        let actual: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(actual, expected);
        assert!(!list.iter().any(|s| s.id == created[0].id));
    }

    #[test]
    fn test_lists_are_per_user() {
        let sessions = manager();
        sessions.create("u1", &device(), 0).unwrap();
        sessions.create("u2", &device(), 0).unwrap();

        assert_eq!(sessions.list_for("u1").unwrap().len(), 1);
        assert_eq!(sessions.list_for("u2").unwrap().len(), 1);
        assert!(sessions.list_for("u3").unwrap().is_empty());
    }

    #[test]
    fn test_terminate_removes_regardless_of_flag() {
        let sessions = manager();
        let old = sessions.create("u1", &device(), 0).unwrap();
        let current = sessions.create("u1", &device(), 1).unwrap();

        assert!(sessions.terminate("u1", &old.id).unwrap());
        assert!(sessions.terminate("u1", &current.id).unwrap());
        assert!(!sessions.terminate("u1", "missing").unwrap());
        assert!(sessions.list_for("u1").unwrap().is_empty());
    }

    #[test]
    fn test_terminate_all_others_keeps_current() {
        let sessions = manager();
        for i in 0..4 {
            sessions.create("u1", &device(), i).unwrap();
        }

        assert_eq!(sessions.terminate_all_others("u1").unwrap(), 3);
        let list = sessions.list_for("u1").unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].is_current);
    }

    #[test]
    fn test_on_logout_removes_current_sessions() {
        let sessions = manager();
        let old = sessions.create("u1", &device(), 0).unwrap();
        sessions.create("u1", &device(), 1).unwrap();

        assert_eq!(sessions.on_logout("u1").unwrap(), 1);
        let list = sessions.list_for("u1").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, old.id);
        assert!(!list[0].is_current);
    }

    #[test]
    fn test_replace_restores_previous_list() {
        let sessions = manager();
        sessions.create("u1", &device(), 0).unwrap();
        let before = sessions.list_for("u1").unwrap();

        sessions.create("u1", &device(), 1).unwrap();
        sessions.replace("u1", &before).unwrap();

        assert_eq!(sessions.list_for("u1").unwrap(), before);
    }

    #[test]
    fn test_sign_ins_from_two_clients_are_both_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.log");
        let laptop = SessionManager::new(Arc::new(FileStore::open(path.clone()).unwrap()), 10);
        let phone = SessionManager::new(Arc::new(FileStore::open(path).unwrap()), 10);

        let first = laptop.create("u1", &device(), 0).unwrap();
        let second = phone.create("u1", &device(), 1).unwrap();

        let list = laptop.list_for("u1").unwrap();
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        assert_eq!(list.iter().filter(|s| s.is_current).count(), 1);
    }
}
