//! Principals: the two kinds of authenticatable account and their permission tiers.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use std::fmt;

/// Which login surface a principal belongs to.
///
/// Each kind has its own signing secrets and its own token-pair table, so a
/// token minted for one kind never authenticates against the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Admin,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Admin => "admin",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal permission level. Declaration order is the ordering: `User < Leader < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    User,
    Leader,
    Admin,
}

impl Tier {
    /// Short marker carried in token claims and API payloads.
    pub fn marker(&self) -> &'static str {
        match self {
            Tier::Admin => "*",
            Tier::Leader => "mod",
            Tier::User => "-",
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "*" => Some(Tier::Admin),
            "mod" => Some(Tier::Leader),
            "-" => Some(Tier::User),
            _ => None,
        }
    }

    /// Value stored in `users.permission_code`.
    pub fn as_code(&self) -> &'static str {
        match self {
            Tier::Admin => "admin",
            Tier::Leader => "leader",
            Tier::User => "user",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "admin" => Some(Tier::Admin),
            "leader" => Some(Tier::Leader),
            "user" => Some(Tier::User),
            _ => None,
        }
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.marker())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let marker = String::deserialize(deserializer)?;
        Tier::from_marker(&marker)
            .ok_or_else(|| de::Error::custom(format!("unknown permission marker: {}", marker)))
    }
}

/// Administrator account. Always tier ADMIN.
#[derive(Debug, Clone, FromRow)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_utc: DateTime<Utc>,
}

/// Employee account.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub employee_id: String,
    pub name: String,
    pub password_hash: String,
    pub department_id: i64,
    pub job_group_id: i64,
    pub permission_code: String,
    pub created_utc: DateTime<Utc>,
    pub last_login_utc: Option<DateTime<Utc>>,
}

impl User {
    pub fn tier(&self) -> Tier {
        Tier::from_code(&self.permission_code).unwrap_or_else(|| {
            tracing::warn!(
                principal_id = self.id,
                code = %self.permission_code,
                "Unknown permission code, treating as user"
            );
            Tier::User
        })
    }
}

/// Fields needed to create an admin; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub employee_id: String,
    pub name: String,
    pub password_hash: String,
    pub department_id: i64,
    pub job_group_id: i64,
    pub tier: Tier,
}

/// User row joined with its department and job group names.
#[derive(Debug, Clone, FromRow)]
pub struct UserListing {
    pub id: i64,
    pub employee_id: String,
    pub name: String,
    pub department_id: i64,
    pub department_name: String,
    pub job_group_id: i64,
    pub job_group_name: String,
    pub permission_code: String,
    pub created_utc: DateTime<Utc>,
    pub last_login_utc: Option<DateTime<Utc>>,
}
