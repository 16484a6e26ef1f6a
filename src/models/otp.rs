use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::PendingRegistration;

/// What a stored code is allowed to prove. Codes issued for one purpose
/// never verify against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    Login,
}

impl Default for OtpPurpose {
    fn default() -> Self {
        OtpPurpose::EmailVerification
    }
}

impl std::fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtpPurpose::EmailVerification => write!(f, "email_verification"),
            OtpPurpose::Login => write!(f, "login"),
        }
    }
}

/// The single active code for an email/purpose pair.
#[derive(Debug, Clone)]
pub struct PendingOtp {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    /// Registration fields parked until the code comes back, if the code
    /// was issued as part of a sign-up.
    pub pending: Option<PendingRegistration>,
}

/// What the caller learns after a code was issued.
#[derive(Debug, Clone)]
pub struct OtpIssued {
    pub email_sent: bool,
    pub expires_in: u64,
    /// Populated only when dev mode is on and no transport accepted the
    /// message. Never set in production.
    pub dev_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Success(Option<PendingRegistration>),
    MalformedCode,
    NotFound,
    Expired,
    TooManyAttempts,
    InvalidCode { remaining: u32 },
}
