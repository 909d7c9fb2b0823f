// Application state (AppState)

use crate::auth::service::AuthService;
use crate::core::config::Config;
use crate::core::startup::{seed_accounts, Storage};
use crate::utils::time::{Clock, SystemClock};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything one client process needs, wired from the configuration
#[derive(Clone)]
pub struct AppState {
    /// Auth core bound to the shared record store
    pub auth: Arc<AuthService>,

    /// Backing store, kept for maintenance such as compaction
    pub storage: Storage,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, storage: Storage) -> Result<Self> {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    /// Wire the auth core and apply seed accounts
    pub fn with_clock(config: Config, storage: Storage, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = Arc::new(config);

        let auth = AuthService::new(
            &config.auth,
            storage.records(),
            clock.clone(),
            config.client.device_info(),
        )
        .context("Failed to initialise auth service")?;

        seed_accounts(&auth, &config.seed_users, clock.now())?;

        Ok(Self {
            auth: Arc::new(auth),
            storage,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SeedUser;
    use crate::models::user::AccountStatus;
    use crate::security::password::test_hashing_config;
    use crate::utils::time::ManualClock;

    #[tokio::test]
    async fn test_state_seeds_and_restores() {
        let mut config = Config::default();
        config.auth.hashing = test_hashing_config();
        config.client.location = Some("Control Room".to_string());
        config.seed_users.push(SeedUser {
            name: "Admin User".to_string(),
            email: "admin@opsdash.local".to_string(),
            password: "admin123".to_string(),
            role: Some("Admin".to_string()),
            status: AccountStatus::Active,
            phone: None,
            department: None,
        });

        let storage = Storage::open(&config.storage).unwrap();
        let clock = Arc::new(ManualClock::new(5_000));
        let state = AppState::with_clock(config.clone(), storage.clone(), clock.clone()).unwrap();

        state.auth.login("admin@opsdash.local", "admin123").await.unwrap();
        assert_eq!(state.auth.current_sessions()[0].location, "Control Room");

        // A second process on the same store picks the sign-in up
        let next = AppState::with_clock(config, storage, clock).unwrap();
        assert!(next.auth.restore().await.unwrap());
        assert_eq!(next.auth.credentials().list().unwrap().len(), 1);
    }
}
