use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use color_eyre::Result;
use thiserror::Error;
use tracing::{error, info};

use crate::config::config::Config;
use crate::config::crypto::CryptoService;
use crate::models::otp::{OtpIssued, OtpPurpose, VerifyOutcome};
use crate::models::user::{NewUser, PendingRegistration, User};
use crate::service::email_service::EmailService;
use crate::service::otp_service::{IssueError, OtpPolicy, OtpService};

/// Activated accounts, keyed by normalized email. Stands in for the
/// platform's user collection; lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        let mut users = self.users.write().unwrap();
        users.insert(user.email.clone(), user);
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.users.read().unwrap().get(email).cloned()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.users.read().unwrap().contains_key(email)
    }

    pub fn set_verified(&self, email: &str) -> Option<User> {
        let mut users = self.users.write().unwrap();
        users.get_mut(email).map(|user| {
            user.email_verified = true;
            user.updated_at = Utc::now();
            user.clone()
        })
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Verification code must be 6 digits")]
    MalformedCode,
    #[error("Please wait {retry_after} seconds before requesting a new code")]
    Cooldown { retry_after: u64 },
    #[error("No account found for this email")]
    UnknownAccount,
    #[error("An account with this email address already exists")]
    EmailTaken,
    #[error("No verification code is pending for this email")]
    CodeNotFound,
    #[error("This code has expired. Please request a new one")]
    CodeExpired,
    #[error("Too many failed attempts. Please request a new code")]
    TooManyAttempts,
    #[error("Invalid verification code. {remaining} attempts remaining")]
    InvalidCode { remaining: u32 },
    #[error("Internal server error")]
    Internal,
}

impl From<IssueError> for AuthError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::InvalidEmail => AuthError::InvalidEmail,
            IssueError::Cooldown { retry_after } => AuthError::Cooldown { retry_after },
        }
    }
}

pub struct AuthService {
    otp: OtpService,
    users: UserStore,
    crypto: CryptoService,
    email: EmailService,
}

impl AuthService {
    pub fn new(
        otp: OtpService,
        users: UserStore,
        crypto: CryptoService,
        email: EmailService,
    ) -> Self {
        Self {
            otp,
            users,
            crypto,
            email,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let policy = OtpPolicy {
            ttl: Duration::from_secs(config.otp_ttl_secs),
            max_attempts: config.otp_max_attempts,
            resend_cooldown: Duration::from_secs(config.otp_resend_cooldown_secs),
            dev_mode: config.dev_mode,
        };
        let crypto = CryptoService::new();
        Ok(Self {
            otp: OtpService::new(policy, crypto.clone()),
            users: UserStore::new(),
            crypto,
            email: EmailService::from_config(config)?,
        })
    }

    /// Parks the sign-up behind a verification code. The account only
    /// materializes once the code is verified.
    pub async fn register(&self, new_user: NewUser) -> Result<OtpIssued, AuthError> {
        let email = new_user.email.trim().to_lowercase();
        if self.users.contains(&email) {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.crypto.hash_password(&new_user.password).map_err(|err| {
            error!(error = %err, "password hashing failed");
            AuthError::Internal
        })?;
        let name = new_user.name.trim().to_string();
        let pending = PendingRegistration {
            name: name.clone(),
            email: email.clone(),
            password_hash,
        };

        self.issue_and_send(&email, OtpPurpose::EmailVerification, Some(pending), &name)
            .await
    }

    pub async fn request_otp(
        &self,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<OtpIssued, AuthError> {
        let email = email.trim().to_lowercase();
        let name = match purpose {
            OtpPurpose::Login => self
                .users
                .get(&email)
                .ok_or(AuthError::UnknownAccount)?
                .name,
            OtpPurpose::EmailVerification => self
                .users
                .get(&email)
                .map(|user| user.name)
                .unwrap_or_default(),
        };

        self.issue_and_send(&email, purpose, None, &name).await
    }

    async fn issue_and_send(
        &self,
        email: &str,
        purpose: OtpPurpose,
        pending: Option<PendingRegistration>,
        name: &str,
    ) -> Result<OtpIssued, AuthError> {
        // The code lands in the store here, before any await point. A
        // delivery that times out cannot lose it.
        let issued = self.otp.issue(email, purpose, pending)?;

        let email_sent = self
            .email
            .deliver_otp(&issued.email, name, &issued.code, purpose)
            .await;
        if email_sent {
            info!(email = %issued.email, %purpose, "verification code emailed");
        }

        let dev_code = (self.otp.policy().dev_mode && !email_sent).then(|| issued.code.clone());

        Ok(OtpIssued {
            email_sent,
            expires_in: issued.expires_in,
            dev_code,
        })
    }

    /// Checks a submitted code. On success the returned user is the account
    /// the verification acted on: a freshly activated registration, the
    /// account logging in, or an existing account whose address was
    /// confirmed. `Ok(None)` means the code was valid but no account was
    /// involved.
    pub fn verify_otp(
        &self,
        email: &str,
        submitted: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<User>, AuthError> {
        match self.otp.verify(email, submitted, purpose) {
            VerifyOutcome::Success(pending) => Ok(self.complete_verification(email, purpose, pending)),
            VerifyOutcome::MalformedCode => Err(AuthError::MalformedCode),
            VerifyOutcome::NotFound => Err(AuthError::CodeNotFound),
            VerifyOutcome::Expired => Err(AuthError::CodeExpired),
            VerifyOutcome::TooManyAttempts => Err(AuthError::TooManyAttempts),
            VerifyOutcome::InvalidCode { remaining } => Err(AuthError::InvalidCode { remaining }),
        }
    }

    fn complete_verification(
        &self,
        email: &str,
        purpose: OtpPurpose,
        pending: Option<PendingRegistration>,
    ) -> Option<User> {
        if let Some(pending) = pending {
            let user = User::from_pending(pending);
            info!(email = %user.email, "account activated");
            self.users.insert(user.clone());
            return Some(user);
        }

        let email = email.trim().to_lowercase();
        match purpose {
            OtpPurpose::Login => self.users.get(&email),
            OtpPurpose::EmailVerification => self.users.set_verified(&email),
        }
    }
}
