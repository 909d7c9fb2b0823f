use crate::core::error::AuthError;
use crate::models::user::{NewUser, NotificationPreferences, UserRecord, UserUpdate};
use crate::security::password::CredentialHasher;
use crate::stores::record_store::{read_json, update_json, RecordStore, REGISTERED_USERS};
use crate::utils::id::generate_id;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// CRUD over the `registeredUsers` list
///
/// Every write is a single read-modify-write of the list, so records another
/// client wrote in the meantime are never lost and uniqueness checks see them.
pub struct CredentialStore {
    store: Arc<dyn RecordStore>,
    hasher: Arc<CredentialHasher>,
    default_role: String,
}

type Users = Vec<UserRecord>;

impl CredentialStore {
    pub fn new(
        store: Arc<dyn RecordStore>,
        hasher: Arc<CredentialHasher>,
        default_role: impl Into<String>,
    ) -> Self {
        Self {
            store,
            hasher,
            default_role: default_role.into(),
        }
    }

    /// All records in registration order; empty when nothing is stored yet
    pub fn list(&self) -> Result<Vec<UserRecord>> {
        Ok(read_json(self.store.as_ref(), REGISTERED_USERS)?.unwrap_or_default())
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.list()?.into_iter().find(|user| user.email_matches(email)))
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.list()?.into_iter().find(|user| user.id == id))
    }

    /// Persist a new account with a hashed secret
    pub fn create(&self, new_user: NewUser, now: i64) -> Result<UserRecord, AuthError> {
        let password_hash = self.hasher.hash(&new_user.password)?;
        let role_name = new_user
            .role
            .clone()
            .unwrap_or_else(|| self.default_role.clone());

        let record = update_json(
            self.store.as_ref(),
            REGISTERED_USERS,
            |users: &mut Users| -> Result<UserRecord, AuthError> {
                if users.iter().any(|user| user.email_matches(&new_user.email)) {
                    return Err(AuthError::EmailTaken);
                }

                let record = UserRecord {
                    id: generate_id(),
                    name: new_user.name.trim().to_string(),
                    email: new_user.email.trim().to_string(),
                    password_hash,
                    role_name,
                    status: new_user.status,
                    phone: new_user.phone,
                    department: new_user.department,
                    two_factor_enabled: false,
                    password_last_changed: Some(now),
                    notifications: NotificationPreferences::default(),
                };
                users.push(record.clone());
                Ok(record)
            },
        )?;

        info!(user_id = %record.id, role = %record.role_name, "Account created");
        Ok(record)
    }

    /// Merge `changes` into the stored record; the id is never changed
    pub fn update(&self, id: &str, changes: &UserUpdate) -> Result<UserRecord, AuthError> {
        let updated = update_json(
            self.store.as_ref(),
            REGISTERED_USERS,
            |users: &mut Users| -> Result<UserRecord, AuthError> {
                if let Some(email) = &changes.email {
                    let taken = users
                        .iter()
                        .any(|user| user.id != id && user.email_matches(email));
                    if taken {
                        return Err(AuthError::EmailTaken);
                    }
                }

                let record = users
                    .iter_mut()
                    .find(|user| user.id == id)
                    .ok_or(AuthError::UserNotFound)?;
                record.apply(changes);
                Ok(record.clone())
            },
        )?;

        debug!(user_id = %id, "Account updated");
        Ok(updated)
    }

    /// Replace the secret and stamp `passwordLastChanged`
    pub fn set_password(&self, id: &str, password: &str, now: i64) -> Result<UserRecord, AuthError> {
        let hash = self.hasher.hash(password)?;

        let updated = update_json(
            self.store.as_ref(),
            REGISTERED_USERS,
            |users: &mut Users| -> Result<UserRecord, AuthError> {
                let record = users
                    .iter_mut()
                    .find(|user| user.id == id)
                    .ok_or(AuthError::UserNotFound)?;
                record.password_hash = hash;
                record.password_last_changed = Some(now);
                Ok(record.clone())
            },
        )?;

        info!(user_id = %id, "Password changed");
        Ok(updated)
    }

    /// Resolve the record whose email and password both match
    ///
    /// Does not look at `status`. Unknown emails cost the same as wrong
    /// passwords. Legacy plaintext secrets are upgraded on a match.
    pub fn verify(&self, email: &str, password: &str) -> Result<Option<UserRecord>> {
        let record = match self.find_by_email(email)? {
            Some(record) => record,
            None => {
                self.hasher.verify_dummy(password);
                return Ok(None);
            }
        };

        if !self.password_matches(&record, password) {
            return Ok(None);
        }

        if CredentialHasher::is_legacy(&record.password_hash) {
            return Ok(Some(self.upgrade_legacy(record, password)));
        }

        Ok(Some(record))
    }

    pub fn password_matches(&self, record: &UserRecord, password: &str) -> bool {
        self.hasher.verify(password, &record.password_hash)
    }

    /// Swap a matched plaintext secret for a hash, unless it changed meanwhile
    fn upgrade_legacy(&self, record: UserRecord, password: &str) -> UserRecord {
        let result = self.hasher.hash(password).and_then(|hash| {
            update_json(self.store.as_ref(), REGISTERED_USERS, |users: &mut Users| -> Result<_> {
                let stored = users
                    .iter_mut()
                    .find(|user| user.id == record.id && user.password_hash == record.password_hash);
                Ok(stored.map(|stored| {
                    stored.password_hash = hash;
                    stored.clone()
                }))
            })
        });

        match result {
            Ok(Some(upgraded)) => {
                info!(user_id = %upgraded.id, "Legacy plaintext secret re-hashed");
                upgraded
            }
            Ok(None) => record,
            Err(e) => {
                // The login itself is still valid
                warn!(user_id = %record.id, error = %e, "Failed to re-hash legacy secret");
                record
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::AccountStatus;
    use crate::security::password::test_hashing_config;
    use crate::stores::file_store::FileStore;
    use crate::stores::memory_store::MemoryStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn credential_store() -> (Arc<MemoryStore>, CredentialStore) {
        let store = Arc::new(MemoryStore::new());
        let hasher = Arc::new(CredentialHasher::new(&test_hashing_config()).unwrap());
        let credentials = CredentialStore::new(store.clone(), hasher, "Viewer");
        (store, credentials)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            ..NewUser::default()
        }
    }

    #[test]
    fn test_create_assigns_defaults() {
        let (_store, credentials) = credential_store();
        let record = credentials.create(new_user("a@x.com"), 500).unwrap();

        assert_eq!(record.role_name, "Viewer");
        assert_eq!(record.status, AccountStatus::Active);
        assert_eq!(record.password_last_changed, Some(500));
        assert!(!record.id.is_empty());
        assert_ne!(record.password_hash, "secret1");
        assert_eq!(credentials.list().unwrap().len(), 1);
    }

    #[test]
    fn test_create_keeps_explicit_role() {
        let (_store, credentials) = credential_store();
        let mut user = new_user("a@x.com");
        user.role = Some("Admin".to_string());

        let record = credentials.create(user, 0).unwrap();
        assert_eq!(record.role_name, "Admin");
    }

    #[test]
    fn test_create_rejects_duplicate_email_case_insensitively() {
        let (_store, credentials) = credential_store();
        credentials.create(new_user("a@x.com"), 0).unwrap();

        let err = credentials.create(new_user("A@X.com"), 0).unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        assert_eq!(credentials.list().unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_duplicate_non_ascii_email() {
        let (_store, credentials) = credential_store();
        credentials.create(new_user("émile@x.com"), 0).unwrap();

        let err = credentials.create(new_user("ÉMILE@x.com"), 0).unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        assert!(credentials.find_by_email("Émile@X.com").unwrap().is_some());
    }

    #[test]
    fn test_two_clients_on_one_log_keep_every_account() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.log");
        let hasher = Arc::new(CredentialHasher::new(&test_hashing_config()).unwrap());

        let client_a = CredentialStore::new(
            Arc::new(FileStore::open(path.clone()).unwrap()),
            hasher.clone(),
            "Viewer",
        );
        let client_b = CredentialStore::new(
            Arc::new(FileStore::open(path.clone()).unwrap()),
            hasher.clone(),
            "Viewer",
        );

        client_a.create(new_user("a@x.com"), 0).unwrap();
        client_b.create(new_user("b@x.com"), 0).unwrap();

        // B never reloaded, yet still sees A's account
        let err = client_b.create(new_user("a@x.com"), 0).unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        drop(client_a);
        drop(client_b);

        let reopened =
            CredentialStore::new(Arc::new(FileStore::open(path).unwrap()), hasher, "Viewer");
        let emails: Vec<String> = reopened
            .list()
            .unwrap()
            .into_iter()
            .map(|user| user.email)
            .collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
        assert!(reopened.verify("a@x.com", "secret1").unwrap().is_some());
    }

    #[test]
    fn test_find_by_email_ignores_case() {
        let (_store, credentials) = credential_store();
        let record = credentials.create(new_user("a@x.com"), 0).unwrap();

        let found = credentials.find_by_email("A@x.COM").unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert!(credentials.find_by_email("b@x.com").unwrap().is_none());
    }

    #[test]
    fn test_verify() {
        let (_store, credentials) = credential_store();
        credentials.create(new_user("a@x.com"), 0).unwrap();

        assert!(credentials.verify("a@x.com", "secret1").unwrap().is_some());
        assert!(credentials.verify("a@x.com", "wrong").unwrap().is_none());
        assert!(credentials.verify("nouser@x.com", "secret1").unwrap().is_none());
    }

    #[test]
    fn test_verify_ignores_status() {
        let (_store, credentials) = credential_store();
        let mut user = new_user("a@x.com");
        user.status = AccountStatus::Inactive;
        credentials.create(user, 0).unwrap();

        let record = credentials.verify("a@x.com", "secret1").unwrap().unwrap();
        assert!(!record.is_active());
    }

    #[test]
    fn test_legacy_plaintext_record_is_upgraded_on_verify() {
        let (store, credentials) = credential_store();
        store
            .set(
                REGISTERED_USERS,
                json!([{
                    "id": "1",
                    "name": "Admin User",
                    "email": "admin@opsdash.local",
                    "password": "admin123",
                    "role": "Admin",
                    "status": "active"
                }]),
            )
            .unwrap();

        assert!(credentials.verify("admin@opsdash.local", "nope").unwrap().is_none());

        let record = credentials
            .verify("admin@opsdash.local", "admin123")
            .unwrap()
            .unwrap();
        assert!(record.password_hash.starts_with("$argon2id$"));

        let stored = credentials.find_by_id("1").unwrap().unwrap();
        assert_eq!(stored.password_hash, record.password_hash);
        assert!(credentials.verify("admin@opsdash.local", "admin123").unwrap().is_some());
    }

    #[test]
    fn test_update_merges_fields_and_keeps_id() {
        let (_store, credentials) = credential_store();
        let record = credentials.create(new_user("a@x.com"), 0).unwrap();

        let updated = credentials
            .update(
                &record.id,
                &UserUpdate {
                    department: Some("Ops".to_string()),
                    two_factor_enabled: Some(true),
                    ..UserUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, record.id);
        assert_eq!(updated.department.as_deref(), Some("Ops"));
        assert!(updated.two_factor_enabled);
        assert_eq!(updated.password_hash, record.password_hash);
    }

    #[test]
    fn test_update_rejects_email_of_other_account() {
        let (_store, credentials) = credential_store();
        let first = credentials.create(new_user("a@x.com"), 0).unwrap();
        credentials.create(new_user("b@x.com"), 0).unwrap();

        let taken = UserUpdate {
            email: Some("B@x.com".to_string()),
            ..UserUpdate::default()
        };
        assert!(matches!(
            credentials.update(&first.id, &taken),
            Err(AuthError::EmailTaken)
        ));

        // Re-casing one's own email is fine
        let own = UserUpdate {
            email: Some("A@X.com".to_string()),
            ..UserUpdate::default()
        };
        assert_eq!(credentials.update(&first.id, &own).unwrap().email, "A@X.com");
    }

    #[test]
    fn test_update_unknown_user() {
        let (_store, credentials) = credential_store();
        let err = credentials.update("missing", &UserUpdate::default()).unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[test]
    fn test_set_password() {
        let (_store, credentials) = credential_store();
        let record = credentials.create(new_user("a@x.com"), 10).unwrap();

        let updated = credentials.set_password(&record.id, "secret2", 20).unwrap();
        assert_eq!(updated.password_last_changed, Some(20));
        assert!(credentials.verify("a@x.com", "secret1").unwrap().is_none());
        assert!(credentials.verify("a@x.com", "secret2").unwrap().is_some());
    }
}
