use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub email_verified: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Turns a verified sign-up into an active account.
    pub fn from_pending(pending: PendingRegistration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: pending.name,
            email: pending.email,
            password_hash: pending.password_hash,
            role: UserRole::User,
            email_verified: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// Registration fields held alongside the verification code until the
/// user proves control of the address. The password is hashed before it
/// is parked here.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRegistration {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
