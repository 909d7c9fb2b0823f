use crate::core::config::AuthConfig;
use crate::core::error::AuthError;
use crate::metrics::collector::AuthMetrics;
use crate::models::pointer::AuthSessionPointer;
use crate::models::session::{DeviceInfo, Session};
use crate::models::user::{ProfileUpdate, PublicUser, UserRecord, UserUpdate};
use crate::security::password::CredentialHasher;
use crate::stores::credential_store::CredentialStore;
use crate::stores::record_store::{
    read_json, write_json, RecordStore, StoreEvent, AUTH_SESSION_POINTER, AUTH_USER,
};
use crate::stores::session_store::SessionManager;
use crate::utils::time::{elapsed_seconds, Clock};
use crate::validation::account::{validate_new_password, validate_profile, RegistrationForm};
use anyhow::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Signed-in user plus the session backing this client
#[derive(Debug, Clone)]
struct CurrentSession {
    user: UserRecord,
    session_id: String,
    sessions: Vec<Session>,
}

/// Store contents a failed sign-in must put back
struct PriorSignIn {
    sessions: Vec<Session>,
    pointer: Option<Value>,
    user: Option<Value>,
}

#[derive(Debug, Clone, Default)]
enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated(CurrentSession),
}

/// Login, registration and account maintenance for one running client
///
/// Operations are `async` for callers that render progress, but none of
/// them yields: each completes or fails as a unit, and every validation
/// runs before the first store write. The in-memory state is only
/// refreshed from the shared store by [`AuthService::restore`] and
/// [`AuthService::reconcile`].
pub struct AuthService {
    store: Arc<dyn RecordStore>,
    credentials: CredentialStore,
    sessions: SessionManager,
    clock: Arc<dyn Clock>,
    device: DeviceInfo,
    min_password_len: usize,
    pointer_ttl_secs: i64,
    state: RwLock<AuthState>,
    loading: AtomicBool,
    metrics: Arc<AuthMetrics>,
}

impl AuthService {
    /// Starts unauthenticated and loading until [`AuthService::restore`] runs
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        device: DeviceInfo,
    ) -> Result<Self> {
        let hasher = Arc::new(CredentialHasher::new(&config.hashing)?);

        Ok(Self {
            credentials: CredentialStore::new(store.clone(), hasher, config.default_role.clone()),
            sessions: SessionManager::new(store.clone(), config.session_cap),
            store,
            clock,
            device,
            min_password_len: config.min_password_len,
            pointer_ttl_secs: config.pointer_ttl_secs,
            state: RwLock::new(AuthState::Unauthenticated),
            loading: AtomicBool::new(true),
            metrics: Arc::new(AuthMetrics::new()),
        })
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn metrics(&self) -> Arc<AuthMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Change notifications of the shared store
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    // ---- projections ----

    fn read_state(&self) -> RwLockReadGuard<'_, AuthState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: AuthState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn current(&self) -> Result<CurrentSession, AuthError> {
        match &*self.read_state() {
            AuthState::Authenticated(current) => Ok(current.clone()),
            AuthState::Unauthenticated => Err(AuthError::NotAuthenticated),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.read_state(), AuthState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn current_user(&self) -> Option<PublicUser> {
        match &*self.read_state() {
            AuthState::Authenticated(current) => Some(PublicUser::from(&current.user)),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn current_role(&self) -> Option<String> {
        match &*self.read_state() {
            AuthState::Authenticated(current) => Some(current.user.role_name.clone()),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn current_session_id(&self) -> Option<String> {
        match &*self.read_state() {
            AuthState::Authenticated(current) => Some(current.session_id.clone()),
            AuthState::Unauthenticated => None,
        }
    }

    /// Newest-first session list of the signed-in user; empty when signed out
    pub fn current_sessions(&self) -> Vec<Session> {
        match &*self.read_state() {
            AuthState::Authenticated(current) => current.sessions.clone(),
            AuthState::Unauthenticated => Vec::new(),
        }
    }

    // ---- state transitions ----

    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, AuthError> {
        let record = match self.credentials.verify(email, password)? {
            Some(record) => record,
            None => {
                self.metrics.record_login(false);
                warn!("Login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !record.is_active() {
            self.metrics.record_login(false);
            warn!(user_id = %record.id, "Login rejected: account inactive");
            return Err(AuthError::AccountInactive);
        }

        let user = self.establish(record)?;
        self.metrics.record_login(true);
        Ok(user)
    }

    /// Create an account with the default role and sign it in
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<PublicUser, AuthError> {
        let new_user = RegistrationForm::new(name, email, password, confirm_password)
            .validate(self.min_password_len)?;

        let record = self.credentials.create(new_user, self.clock.now())?;
        self.metrics.increment_registrations();

        self.establish(record)
    }

    /// Open a session for `record` and bind the pointer to it
    ///
    /// All or nothing: if any write fails the session list, pointer and
    /// snapshot are put back as they were.
    fn establish(&self, record: UserRecord) -> Result<PublicUser, AuthError> {
        let now = self.clock.now();
        let prior = PriorSignIn {
            sessions: self.sessions.list_for(&record.id)?,
            pointer: self.store.get(AUTH_SESSION_POINTER)?,
            user: self.store.get(AUTH_USER)?,
        };

        let session = self.sessions.create(&record.id, &self.device, now)?;

        let pointer = AuthSessionPointer::new(record.id.clone(), session.id.clone(), now);
        let bound = write_json(self.store.as_ref(), AUTH_SESSION_POINTER, &pointer)
            .and_then(|_| write_json(self.store.as_ref(), AUTH_USER, &record));
        if let Err(e) = bound {
            warn!(user_id = %record.id, error = %e, "Sign-in failed, rolling back");
            self.roll_back(&record.id, prior);
            return Err(e.into());
        }

        let sessions = self.sessions.list_for(&record.id)?;
        let user = PublicUser::from(&record);

        info!(user_id = %record.id, session_id = %session.id, role = %record.role_name, "Signed in");

        self.set_state(AuthState::Authenticated(CurrentSession {
            user: record,
            session_id: session.id,
            sessions,
        }));
        Ok(user)
    }

    /// Sign out; a no-op when nobody is signed in
    pub async fn logout(&self) -> Result<(), AuthError> {
        let current = match self.current() {
            Ok(current) => current,
            Err(_) => {
                debug!("Logout without a signed-in user");
                return Ok(());
            }
        };

        self.sessions.on_logout(&current.user.id)?;
        self.clear_pointer()?;
        self.set_state(AuthState::Unauthenticated);
        self.metrics.increment_logouts();

        info!(user_id = %current.user.id, session_id = %current.session_id, "Signed out");
        Ok(())
    }

    fn roll_back(&self, user_id: &str, prior: PriorSignIn) {
        let restore = |key: &str, value: Option<Value>| match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };

        let result = self
            .sessions
            .replace(user_id, &prior.sessions)
            .and_then(|_| restore(AUTH_SESSION_POINTER, prior.pointer))
            .and_then(|_| restore(AUTH_USER, prior.user));
        if let Err(e) = result {
            warn!(user_id = %user_id, error = %e, "Failed to roll back partial sign-in");
        }
    }

    fn clear_pointer(&self) -> Result<()> {
        self.store.remove(AUTH_SESSION_POINTER)?;
        self.store.remove(AUTH_USER)
    }

    /// Self-service profile edit; the secret is only changed by `change_password`
    pub async fn update_user(&self, update: ProfileUpdate) -> Result<PublicUser, AuthError> {
        let current = self.current()?;
        let update = validate_profile(update)?;
        self.apply_update(current, &UserUpdate::from(update))
    }

    fn apply_update(&self, current: CurrentSession, changes: &UserUpdate) -> Result<PublicUser, AuthError> {
        let record = self.credentials.update(&current.user.id, changes)?;
        Ok(self.replace_user(current, record)?)
    }

    fn replace_user(&self, current: CurrentSession, record: UserRecord) -> Result<PublicUser> {
        write_json(self.store.as_ref(), AUTH_USER, &record)?;
        let user = PublicUser::from(&record);
        self.set_state(AuthState::Authenticated(CurrentSession {
            user: record,
            ..current
        }));
        Ok(user)
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        let current = self.current()?;
        let stored = self
            .credentials
            .find_by_id(&current.user.id)?
            .ok_or(AuthError::UserNotFound)?;

        if !self.credentials.password_matches(&stored, current_password) {
            warn!(user_id = %stored.id, "Password change rejected: wrong current password");
            return Err(AuthError::WrongCurrentPassword);
        }

        validate_new_password(
            current_password,
            new_password,
            confirm_password,
            self.min_password_len,
        )?;

        let record = self
            .credentials
            .set_password(&stored.id, new_password, self.clock.now())?;
        self.replace_user(current, record)?;
        self.metrics.increment_password_changes();
        Ok(())
    }

    /// Flip two-factor authentication; returns the new setting
    pub async fn toggle_two_factor(&self) -> Result<bool, AuthError> {
        let current = self.current()?;
        let enabled = !current.user.two_factor_enabled;

        let changes = UserUpdate {
            two_factor_enabled: Some(enabled),
            ..UserUpdate::default()
        };
        self.apply_update(current, &changes)?;

        info!(enabled = enabled, "Two-factor authentication toggled");
        Ok(enabled)
    }

    /// Remove one session of the signed-in user; returns the refreshed list
    pub async fn terminate_session(&self, session_id: &str) -> Result<Vec<Session>, AuthError> {
        let current = self.current()?;
        self.sessions.terminate(&current.user.id, session_id)?;
        Ok(self.refresh_sessions(current)?)
    }

    pub async fn terminate_all_other_sessions(&self) -> Result<Vec<Session>, AuthError> {
        let current = self.current()?;
        self.sessions.terminate_all_others(&current.user.id)?;
        Ok(self.refresh_sessions(current)?)
    }

    fn refresh_sessions(&self, current: CurrentSession) -> Result<Vec<Session>> {
        let sessions = self.sessions.list_for(&current.user.id)?;
        self.set_state(AuthState::Authenticated(CurrentSession {
            sessions: sessions.clone(),
            ..current
        }));
        Ok(sessions)
    }

    /// Resume a persisted sign-in if its pointer is still fresh
    ///
    /// Freshness is measured from when the pointer was established, so a
    /// busy session still expires. Stale or dangling pointers are cleared.
    pub async fn restore(&self) -> Result<bool, AuthError> {
        self.loading.store(true, Ordering::SeqCst);
        let result = self.restore_pointer();
        self.loading.store(false, Ordering::SeqCst);
        Ok(result?)
    }

    fn restore_pointer(&self) -> Result<bool> {
        let pointer = match read_json::<AuthSessionPointer>(self.store.as_ref(), AUTH_SESSION_POINTER) {
            Ok(Some(pointer)) => pointer,
            Ok(None) => {
                debug!("No persisted session to restore");
                return Ok(false);
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session pointer");
                self.clear_pointer()?;
                return Ok(false);
            }
        };

        let now = self.clock.now();
        if !pointer.is_fresh(now, self.pointer_ttl_secs) {
            info!(
                user_id = %pointer.user_id,
                age_secs = elapsed_seconds(pointer.established_at, now),
                "Persisted session expired"
            );
            self.clear_pointer()?;
            return Ok(false);
        }

        let Some(user) = self.credentials.find_by_id(&pointer.user_id)? else {
            warn!(user_id = %pointer.user_id, "Persisted session names an unknown user");
            self.clear_pointer()?;
            return Ok(false);
        };

        let sessions = self.sessions.list_for(&user.id)?;
        info!(user_id = %user.id, session_id = %pointer.session_id, "Session restored");

        self.set_state(AuthState::Authenticated(CurrentSession {
            user,
            session_id: pointer.session_id,
            sessions,
        }));
        Ok(true)
    }

    /// Best-effort catch-up after another client changed the shared store
    ///
    /// Signs this client out when the pointer was cleared or now names a
    /// different user or session; otherwise refreshes the user and session
    /// list. Returns whether this client is still signed in.
    pub async fn reconcile(&self) -> Result<bool, AuthError> {
        let current = match self.current() {
            Ok(current) => current,
            Err(_) => return Ok(false),
        };

        let pointer: Option<AuthSessionPointer> =
            read_json(self.store.as_ref(), AUTH_SESSION_POINTER).unwrap_or(None);

        let still_bound = pointer.is_some_and(|pointer| {
            pointer.user_id == current.user.id && pointer.session_id == current.session_id
        });
        if !still_bound {
            info!(user_id = %current.user.id, "Signed out by another client");
            self.set_state(AuthState::Unauthenticated);
            return Ok(false);
        }

        let Some(user) = self.credentials.find_by_id(&current.user.id)? else {
            warn!(user_id = %current.user.id, "Signed-in account no longer exists");
            self.set_state(AuthState::Unauthenticated);
            return Ok(false);
        };

        let sessions = self.sessions.list_for(&user.id)?;
        self.set_state(AuthState::Authenticated(CurrentSession {
            user,
            sessions,
            ..current
        }));
        Ok(true)
    }
}
