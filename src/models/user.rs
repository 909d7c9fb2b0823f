use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email_alerts: bool,
    pub sms_alerts: bool,
    pub push_notifications: bool,
    pub weekly_digest: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_alerts: true,
            sms_alerts: false,
            push_notifications: true,
            weekly_digest: false,
        }
    }
}

/// Durable credential record, as stored under `registeredUsers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Opaque, stable for the lifetime of the account
    pub id: String,
    pub name: String,
    /// Unique under case-insensitive comparison
    pub email: String,
    /// Argon2 PHC string; legacy records may still hold plaintext
    #[serde(rename = "password")]
    pub password_hash: String,
    /// Role *name*; unknown names hold no permissions
    #[serde(rename = "role")]
    pub role_name: String,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default)]
    pub two_factor_enabled: bool,
    /// Unix seconds
    #[serde(default)]
    pub password_last_changed: Option<i64>,
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

impl UserRecord {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Case-insensitive over all of Unicode, not just ASCII
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().to_lowercase() == email.trim().to_lowercase()
    }

    /// Merge a partial update; `id` and the secret are never touched
    pub fn apply(&mut self, changes: &UserUpdate) {
        if let Some(name) = &changes.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = &changes.email {
            self.email = email.trim().to_string();
        }
        if let Some(role) = &changes.role {
            self.role_name = role.clone();
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(phone) = &changes.phone {
            self.phone = non_empty(phone);
        }
        if let Some(department) = &changes.department {
            self.department = non_empty(department);
        }
        if let Some(enabled) = changes.two_factor_enabled {
            self.two_factor_enabled = enabled;
        }
        if let Some(notifications) = &changes.notifications {
            self.notifications = notifications.clone();
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Projection handed to the UI; never carries the secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub two_factor_enabled: bool,
    pub password_last_changed: Option<i64>,
    pub notifications: NotificationPreferences,
}

impl From<&UserRecord> for PublicUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            role: record.role_name.clone(),
            status: record.status,
            phone: record.phone.clone(),
            department: record.department.clone(),
            two_factor_enabled: record.two_factor_enabled,
            password_last_changed: record.password_last_changed,
            notifications: record.notifications.clone(),
        }
    }
}

/// Input to `CredentialStore::create`; the password is still plaintext here
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Falls back to the configured default role
    pub role: Option<String>,
    pub status: AccountStatus,
    pub phone: Option<String>,
    pub department: Option<String>,
}

/// Partial record update used by the store; has no password field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<AccountStatus>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub two_factor_enabled: Option<bool>,
    pub notifications: Option<NotificationPreferences>,
}

/// Self-service profile edit; role, status and secret are out of reach
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notifications: Option<NotificationPreferences>,
}

impl From<ProfileUpdate> for UserUpdate {
    fn from(profile: ProfileUpdate) -> Self {
        Self {
            name: profile.name,
            email: profile.email,
            phone: profile.phone,
            department: profile.department,
            notifications: profile.notifications,
            ..Self::default()
        }
    }
}
