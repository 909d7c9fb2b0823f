use crate::core::error::AuthError;
use crate::models::user::{NewUser, ProfileUpdate};
use serde::Deserialize;

/// Self-service sign-up form
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    /// Check every rule in order; the first violation is reported
    pub fn validate(self, min_password_len: usize) -> Result<NewUser, AuthError> {
        let name = validate_name(&self.name)?;
        let email = validate_email(&self.email)?;
        check_length(&self.password, min_password_len)?;

        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        Ok(NewUser {
            name,
            email,
            password: self.password,
            ..NewUser::default()
        })
    }
}

/// Trimmed, non-empty display name
pub fn validate_name(name: &str) -> Result<String, AuthError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidName);
    }
    Ok(trimmed.to_string())
}

/// Trimmed email containing '@'
pub fn validate_email(email: &str) -> Result<String, AuthError> {
    let trimmed = email.trim();
    if !trimmed.contains('@') {
        return Err(AuthError::InvalidEmail);
    }
    Ok(trimmed.to_string())
}

fn check_length(password: &str, min_len: usize) -> Result<(), AuthError> {
    // Length in characters, not bytes
    if password.chars().count() < min_len {
        return Err(AuthError::WeakPassword { min_len });
    }
    Ok(())
}

/// Rules for a replacement password once the current one has been verified
pub fn validate_new_password(
    current: &str,
    new: &str,
    confirm: &str,
    min_len: usize,
) -> Result<(), AuthError> {
    check_length(new, min_len)?;

    if new != confirm {
        return Err(AuthError::PasswordMismatch);
    }

    if new == current {
        return Err(AuthError::SameAsOldPassword);
    }

    Ok(())
}

/// Normalise the name and email of a profile edit, if present
pub fn validate_profile(mut update: ProfileUpdate) -> Result<ProfileUpdate, AuthError> {
    if let Some(name) = &update.name {
        update.name = Some(validate_name(name)?);
    }
    if let Some(email) = &update.email {
        update.email = Some(validate_email(email)?);
    }
    Ok(update)
}
