use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Registered end user. The password digest never leaves the service layer.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update. The outer `None` leaves a field untouched,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar.is_none() && self.phone.is_none() && self.address.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = avatar.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = phone.clone();
        }
        if let Some(address) = &self.address {
            user.address = address.clone();
        }
    }
}

/// User as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SanitizedUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for SanitizedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar: user.avatar,
            phone: user.phone,
            address: user.address,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            name: Some("Ada".to_string()),
            avatar: None,
            phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut u = user();
        let patch = ProfilePatch {
            phone: Some(Some("+44 20 7946 0000".to_string())),
            ..Default::default()
        };
        patch.apply(&mut u);

        assert_eq!(u.name.as_deref(), Some("Ada"));
        assert_eq!(u.phone.as_deref(), Some("+44 20 7946 0000"));
        assert!(!patch.is_empty());
        assert!(ProfilePatch::default().is_empty());
    }

    #[test]
    fn test_patch_clears_explicit_nulls() {
        let mut u = user();
        let patch = ProfilePatch {
            name: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut u);

        assert!(u.name.is_none());
        assert_eq!(u.email, "ada@example.com");
    }

    #[test]
    fn test_sanitized_user_drops_hash() {
        let json = serde_json::to_value(SanitizedUser::from(user())).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }
}
