//! User model
//!
//! This module defines the User entity and its role enum.
//! A user is created once at registration and afterwards only mutated by
//! avatar updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
///
/// The email address is unique across all users; the schema enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Occupation shown on the profile
    pub occupation: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2, PHC string); never leaves the process, so it
    /// reads back empty
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Location of the uploaded avatar, if any
    pub avatar_file_name: Option<String>,
    /// User role
    pub role: UserRole,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed; see
    /// `services::password::CredentialHasher`.
    pub fn new(
        name: String,
        email: String,
        occupation: String,
        password_hash: String,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            name,
            occupation,
            email,
            password_hash,
            avatar_file_name: None,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User role.
///
/// Every registration produces `User`; `Admin` is only assigned out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account
    #[default]
    User,
    /// Platform administrator
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}
