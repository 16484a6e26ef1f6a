use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;
use validator::ValidateEmail;

use crate::config::crypto::CryptoService;
use crate::models::otp::{OtpPurpose, PendingOtp, VerifyOutcome};
use crate::models::user::PendingRegistration;

const CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OtpKey {
    pub email: String,
    pub purpose: OtpPurpose,
}

/// Process-wide holder of pending codes, keyed by normalized email and
/// purpose. Entries expire lazily at verification time; nothing sweeps
/// the map in the background.
#[derive(Debug, Clone, Default)]
pub struct OtpStore {
    records: Arc<RwLock<HashMap<OtpKey, PendingOtp>>>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: OtpKey, record: PendingOtp) {
        self.records.write().unwrap().insert(key, record);
    }

    pub fn get(&self, key: &OtpKey) -> Option<PendingOtp> {
        self.records.read().unwrap().get(key).cloned()
    }

    pub fn delete(&self, key: &OtpKey) {
        self.records.write().unwrap().remove(key);
    }

    /// Removes and returns the entry, making consumption single-use even
    /// when two verifications race on the same key.
    pub fn take(&self, key: &OtpKey) -> Option<PendingOtp> {
        self.records.write().unwrap().remove(key)
    }

    /// Bumps the attempt counter under the write lock and returns the new
    /// count, or `None` when the entry is gone.
    pub fn record_failure(&self, key: &OtpKey) -> Option<u32> {
        let mut records = self.records.write().unwrap();
        records.get_mut(key).map(|record| {
            record.attempts += 1;
            record.attempts
        })
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: u32,
    /// Minimum gap between two issuances for the same key. Zero disables
    /// the cooldown.
    pub resend_cooldown: Duration,
    pub dev_mode: bool,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_attempts: 5,
            resend_cooldown: Duration::from_secs(60),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum IssueError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Please wait {retry_after} seconds before requesting a new code")]
    Cooldown { retry_after: u64 },
}

/// A freshly stored code, before any delivery attempt.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub email: String,
    pub code: String,
    pub expires_in: u64,
}

pub struct OtpService {
    store: OtpStore,
    policy: OtpPolicy,
    crypto: CryptoService,
}

impl OtpService {
    pub fn new(policy: OtpPolicy, crypto: CryptoService) -> Self {
        Self {
            store: OtpStore::new(),
            policy,
            crypto,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Generates and stores a code for the key, replacing whatever code was
    /// active before. A pending registration already parked on the key is
    /// carried over unless the caller supplies a fresh one.
    ///
    /// The store write completes before this returns, so callers may await
    /// delivery afterwards without risking a half-issued code.
    pub fn issue(
        &self,
        email: &str,
        purpose: OtpPurpose,
        pending: Option<PendingRegistration>,
    ) -> Result<IssuedCode, IssueError> {
        let email = email.trim().to_lowercase();
        if !email.validate_email() {
            return Err(IssueError::InvalidEmail);
        }

        let key = OtpKey {
            email: email.clone(),
            purpose,
        };
        let now = Utc::now();

        let previous = self.store.get(&key);
        if let Some(prev) = &previous {
            let cooldown = chrono::Duration::seconds(self.policy.resend_cooldown.as_secs() as i64);
            let elapsed = now - prev.issued_at;
            if elapsed < cooldown {
                let retry_after = (cooldown - elapsed).num_seconds().max(1) as u64;
                return Err(IssueError::Cooldown { retry_after });
            }
        }

        let code = self.crypto.generate_otp_code();
        let record = PendingOtp {
            code: code.clone(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(self.policy.ttl.as_secs() as i64),
            attempts: 0,
            pending: pending.or_else(|| previous.and_then(|p| p.pending)),
        };
        self.store.put(key, record);
        debug!(%email, %purpose, "verification code issued");

        Ok(IssuedCode {
            email,
            code,
            expires_in: self.policy.ttl.as_secs(),
        })
    }

    /// Checks a submitted code against the store. A match consumes the
    /// entry; a mismatch burns one attempt. Malformed input is rejected
    /// before the lookup and never burns an attempt.
    pub fn verify(&self, email: &str, submitted: &str, purpose: OtpPurpose) -> VerifyOutcome {
        if submitted.len() != CODE_LEN || !submitted.bytes().all(|b| b.is_ascii_digit()) {
            return VerifyOutcome::MalformedCode;
        }

        let key = OtpKey {
            email: email.trim().to_lowercase(),
            purpose,
        };
        let record = match self.store.get(&key) {
            Some(record) => record,
            None => return VerifyOutcome::NotFound,
        };

        // Lockout wins over everything else, including a correct code.
        if record.attempts >= self.policy.max_attempts {
            return VerifyOutcome::TooManyAttempts;
        }

        if Utc::now() > record.expires_at {
            self.store.delete(&key);
            return VerifyOutcome::Expired;
        }

        if record.code != submitted {
            let attempts = self
                .store
                .record_failure(&key)
                .unwrap_or(self.policy.max_attempts);
            if attempts >= self.policy.max_attempts {
                return VerifyOutcome::TooManyAttempts;
            }
            return VerifyOutcome::InvalidCode {
                remaining: self.policy.max_attempts - attempts,
            };
        }

        match self.store.take(&key) {
            Some(consumed) => VerifyOutcome::Success(consumed.pending),
            None => VerifyOutcome::NotFound,
        }
    }

    #[cfg(test)]
    fn store(&self) -> &OtpStore {
        &self.store
    }
}
