use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::service::AuthService;
use crate::core::config::{SeedUser, StorageConfig};
use crate::core::error::AuthError;
use crate::models::user::NewUser;
use crate::stores::file_store::FileStore;
use crate::stores::memory_store::MemoryStore;
use crate::stores::record_store::RecordStore;

/// The record store backing this process
#[derive(Clone)]
pub enum Storage {
    Memory(Arc<MemoryStore>),
    File(Arc<FileStore>),
}

impl Storage {
    pub fn open(config: &StorageConfig) -> Result<Self> {
        match &config.path {
            Some(path) => {
                let store = FileStore::open(path.clone())
                    .context(format!("Failed to open record store at {}", path.display()))?;
                Ok(Storage::File(Arc::new(store)))
            }
            None => {
                info!("No storage path configured, records will not outlive this process");
                Ok(Storage::Memory(Arc::new(MemoryStore::new())))
            }
        }
    }

    pub fn records(&self) -> Arc<dyn RecordStore> {
        match self {
            Storage::Memory(store) => store.clone(),
            Storage::File(store) => store.clone(),
        }
    }

    /// Compact the log once it outgrows `compact_after` lines
    pub fn maintain(&self, compact_after: usize) -> Result<()> {
        if let Storage::File(store) = self {
            store.compact_if_needed(compact_after)?;
        }
        Ok(())
    }
}

// this runs at boot time
/// Create configured accounts whose email is not registered yet
pub fn seed_accounts(auth: &AuthService, seeds: &[SeedUser], now: i64) -> Result<usize> {
    let mut created = 0;

    for seed in seeds {
        let new_user = NewUser {
            name: seed.name.clone(),
            email: seed.email.clone(),
            password: seed.password.clone(),
            role: seed.role.clone(),
            status: seed.status,
            phone: seed.phone.clone(),
            department: seed.department.clone(),
        };

        match auth.credentials().create(new_user, now) {
            Ok(record) => {
                info!(user_id = %record.id, email = %record.email, "Seed account created");
                created += 1;
            }
            Err(AuthError::EmailTaken) => {}
            Err(AuthError::Internal(e)) => {
                return Err(e.context(format!("Failed to seed account {}", seed.email)));
            }
            Err(e) => {
                warn!(email = %seed.email, error = %e, "Seed account skipped");
            }
        }
    }

    if created > 0 {
        info!(created = created, "Seed accounts applied");
    }
    Ok(created)
}
