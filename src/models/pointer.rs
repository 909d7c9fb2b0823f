use crate::utils::time::elapsed_seconds;
use serde::{Deserialize, Serialize};

/// Which user and session the running client is signed in as
///
/// Freshness is measured from `established_at`, never from activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSessionPointer {
    pub user_id: String,
    pub session_id: String,
    /// Unix seconds
    pub established_at: i64,
}

impl AuthSessionPointer {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>, established_at: i64) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            established_at,
        }
    }

    /// A pointer dated after `now` is never fresh
    pub fn is_fresh(&self, now: i64, ttl_secs: i64) -> bool {
        self.established_at <= now && elapsed_seconds(self.established_at, now) < ttl_secs
    }
}
