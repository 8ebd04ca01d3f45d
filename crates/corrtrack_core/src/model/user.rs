//! User and role model supplied by the auth provider.
//!
//! # Responsibility
//! - Define user identity, role and preference shapes consumed by core.
//! - Provide the reserved system actor used by scheduled jobs.
//!
//! # Invariants
//! - Role wire strings match the auth provider exactly (case-sensitive).
//! - Core never manages credentials; `User` is always passed in explicitly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Opaque user identifier issued by the auth provider.
pub type UserId = String;

/// Actor id recorded for changes made by scheduled jobs.
pub const SYSTEM_USER_ID: &str = "system";

static USER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._@:-]{0,127}$").expect("valid user id regex"));

/// Returns whether `value` is an acceptable user id.
pub fn is_valid_user_id(value: &str) -> bool {
    USER_ID_RE.is_match(value)
}

/// User role; drives field write access and dashboard visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "level1AO")]
    Level1Ao,
    #[serde(rename = "level2AO")]
    Level2Ao,
    #[serde(rename = "level3AO")]
    Level3Ao,
    #[serde(rename = "secretary")]
    Secretary,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub const ALL: [Self; 5] = [
        Self::Level1Ao,
        Self::Level2Ao,
        Self::Level3Ao,
        Self::Secretary,
        Self::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Level1Ao => "level1AO",
            Self::Level2Ao => "level2AO",
            Self::Level3Ao => "level3AO",
            Self::Secretary => "secretary",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI theme preference. Carried for completeness; persisted elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Jungle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub theme: Theme,
}

/// Authenticated user as supplied by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Another user acting on this user's behalf.
    #[serde(default)]
    pub deputy: Option<UserId>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl User {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        let id = id.into();
        Self {
            email: String::new(),
            display_name: id.clone(),
            id,
            role,
            deputy: None,
            preferences: UserPreferences::default(),
        }
    }

    pub fn with_deputy(mut self, deputy: impl Into<UserId>) -> Self {
        self.deputy = Some(deputy.into());
        self
    }

    /// Reserved actor for scheduled jobs. Holds `admin` so role policy is vacuous.
    pub fn system() -> Self {
        let mut user = Self::new(SYSTEM_USER_ID, Role::Admin);
        user.display_name = "System".to_string();
        user
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_USER_ID
    }
}
