use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Authorization code and the grant it stands for. Keyed by the code.
#[derive(Debug, Clone, FromRow)]
pub struct AuthSession {
    pub code: String,
    pub user_id: i64,
    pub client_id: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// Why a code could not be redeemed. Only used for logs and audit text;
/// callers always see an invalid grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Unknown,
    AlreadyUsed,
    Expired,
    WrongClient,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Unknown => "unknown_code",
            RejectReason::AlreadyUsed => "code_already_used",
            RejectReason::Expired => "code_expired",
            RejectReason::WrongClient => "client_mismatch",
        }
    }
}

impl AuthSession {
    pub fn new(
        code: String,
        user_id: i64,
        client_id: String,
        scope: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code,
            user_id,
            client_id,
            scope,
            expires_at,
            used: false,
        }
    }

    /// Redeemable iff unused and strictly before expiry.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }

    pub fn reject_reason(&self, client_id: Option<&str>, now: DateTime<Utc>) -> RejectReason {
        if client_id.is_some_and(|c| c != self.client_id) {
            RejectReason::WrongClient
        } else if self.used {
            RejectReason::AlreadyUsed
        } else if now >= self.expires_at {
            RejectReason::Expired
        } else {
            RejectReason::Unknown
        }
    }
}
