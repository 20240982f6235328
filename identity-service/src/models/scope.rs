use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use utoipa::ToSchema;

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Scope {
    pub id: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeCategory {
    Core,
    Personal,
    Custom,
}

impl ScopeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeCategory::Core => "core",
            ScopeCategory::Personal => "personal",
            ScopeCategory::Custom => "custom",
        }
    }
}

/// Catalog seeded on first start (mirrored in the initial migration).
pub const DEFAULT_SCOPES: &[(&str, &str, ScopeCategory)] = &[
    ("openid", "Sign you in with your account", ScopeCategory::Core),
    ("profile", "Read your name and avatar", ScopeCategory::Core),
    ("email", "Read your email address", ScopeCategory::Core),
    ("phone", "Read your phone number", ScopeCategory::Personal),
    ("address", "Read your postal address", ScopeCategory::Personal),
    ("documents:read", "Read your documents", ScopeCategory::Custom),
    ("documents:write", "Create and modify your documents", ScopeCategory::Custom),
    ("financial:read", "Read your financial records", ScopeCategory::Custom),
    ("location", "Read your location", ScopeCategory::Custom),
];

impl Scope {
    pub fn defaults() -> Vec<Scope> {
        DEFAULT_SCOPES
            .iter()
            .map(|(id, description, category)| Scope {
                id: id.to_string(),
                description: description.to_string(),
                category: category.as_str().to_string(),
            })
            .collect()
    }
}

/// Ordered, de-duplicated set of scope ids. Parses from and renders to the
/// space separated wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    pub fn parse(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_string).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Members of `self` missing from `other`.
    pub fn missing_from(&self, other: &ScopeSet) -> Vec<String> {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(String::as_str).collect();
        write!(f, "{}", joined.join(" "))
    }
}
