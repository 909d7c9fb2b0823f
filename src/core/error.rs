// Centralized error handling for the auth core

use thiserror::Error;

/// Errors returned by every account and session operation
///
/// Validation variants are produced before any store write, so a rejected
/// operation leaves prior state intact. `Internal` only wraps faults of the
/// injected record store.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Name must not be empty")]
    InvalidName,

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("New password must differ from the current password")]
    SameAsOldPassword,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable taxonomy name, rendered by callers next to the message
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "InvalidCredentials",
            AuthError::AccountInactive => "AccountInactive",
            AuthError::EmailTaken => "EmailTaken",
            AuthError::InvalidName => "InvalidName",
            AuthError::InvalidEmail => "InvalidEmail",
            AuthError::WeakPassword { .. } => "WeakPassword",
            AuthError::PasswordMismatch => "PasswordMismatch",
            AuthError::WrongCurrentPassword => "WrongCurrentPassword",
            AuthError::SameAsOldPassword => "SameAsOldPassword",
            AuthError::NotAuthenticated => "NotAuthenticated",
            AuthError::UserNotFound => "UserNotFound",
            AuthError::Internal(_) => "Internal",
        }
    }
}
