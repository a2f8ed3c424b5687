//! Verification codes: issuance and single-use validation.

use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kiosk_db::codes::{self, Miss};
use kiosk_db::{Database, users};
use kiosk_types::{Purpose, User, VerificationCode};

use crate::clock::Clock;
use crate::config::CodeConfig;
use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier};

/// Generate a numeric code of `length` digits from the thread-local CSPRNG.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

pub struct CodeIssuer {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    config: CodeConfig,
}

impl CodeIssuer {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>, notifier: Notifier, config: CodeConfig) -> Self {
        Self { db, clock, notifier, config }
    }

    /// Create and store a fresh code for `(user, purpose)`, then queue it for
    /// delivery. Delivery problems never undo the issuance.
    pub fn issue(&self, user_id: &Uuid, purpose: Purpose) -> Result<VerificationCode> {
        let now = self.clock.now();
        let code = VerificationCode {
            id: Uuid::new_v4(),
            user_id: *user_id,
            code: generate_code(self.config.length),
            purpose,
            issued_at: now,
            expires_at: now + self.config.ttl,
            used: false,
            used_at: None,
        };

        let user = self.db.with_transaction(|tx| -> Result<User> {
            let user = users::get(tx, user_id)?.ok_or(Error::UserNotFound(*user_id))?;

            if self.config.max_per_window > 0 {
                let since = now - self.config.rate_window;
                let recent = codes::count_issued_since(tx, user_id, since)?;
                if recent >= self.config.max_per_window {
                    warn!(user_id = %user_id, recent, "Verification code rate limit hit");
                    return Err(Error::RateLimited);
                }
            }

            codes::insert(tx, &code)?;
            Ok(user)
        })?;

        info!(user_id = %user_id, purpose = %purpose, code_id = %code.id, "Verification code issued");

        self.notifier.notify(Notification {
            recipient: user.email,
            subject: format!("Your {} verification code", purpose.label()),
            body: format!(
                "Your verification code is {}. It expires in {}.",
                code.code,
                describe_ttl(self.config.ttl)
            ),
        });

        Ok(code)
    }
}

fn describe_ttl(ttl: Duration) -> String {
    let secs = ttl.num_seconds();
    match (secs % 60, secs / 60) {
        (0, 1) => "1 minute".to_string(),
        (0, mins) => format!("{} minutes", mins),
        _ => format!("{} seconds", secs),
    }
}

/// Result of submitting a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The code matched and is now used.
    Consumed(VerificationCode),
    Invalid,
    Expired,
    AlreadyUsed,
}

impl Outcome {
    pub fn is_consumed(&self) -> bool {
        matches!(self, Outcome::Consumed(_))
    }

    pub fn into_result(self) -> Result<VerificationCode> {
        match self {
            Outcome::Consumed(code) => Ok(code),
            Outcome::Invalid => Err(Error::InvalidCode),
            Outcome::Expired => Err(Error::ExpiredCode),
            Outcome::AlreadyUsed => Err(Error::CodeAlreadyUsed),
        }
    }
}

pub struct CodeValidator {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl CodeValidator {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Check `submitted` against the user's codes for `purpose` and consume
    /// it on a match.
    ///
    /// The newest unused, unexpired code with the same value wins. Consuming
    /// it and (for signup/login) setting the user's verified flag commit
    /// together; non-consumed outcomes change nothing.
    pub fn validate(&self, user_id: &Uuid, purpose: Purpose, submitted: &str) -> Result<Outcome> {
        let now = self.clock.now();
        let submitted = submitted.trim();

        let outcome = self.db.with_transaction(|tx| -> Result<Outcome> {
            if !users::exists(tx, user_id)? {
                return Err(Error::UserNotFound(*user_id));
            }

            if submitted.is_empty() || !submitted.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(Outcome::Invalid);
            }

            if let Some(code) = codes::consume(tx, user_id, purpose, submitted, now)? {
                if purpose.verifies_account() && users::mark_verified(tx, user_id)? {
                    info!(user_id = %user_id, "Account verified");
                }
                return Ok(Outcome::Consumed(code));
            }

            let outcome = match codes::classify_miss(tx, user_id, purpose, submitted, now)? {
                Miss::NoMatch => Outcome::Invalid,
                Miss::Expired => Outcome::Expired,
                Miss::Used => Outcome::AlreadyUsed,
            };
            Ok(outcome)
        })?;

        match &outcome {
            Outcome::Consumed(code) => {
                info!(user_id = %user_id, purpose = %purpose, code_id = %code.id, "Verification code consumed")
            }
            other => debug!(user_id = %user_id, purpose = %purpose, "Verification code rejected: {:?}", other),
        }

        Ok(outcome)
    }

    /// Like [`validate`](Self::validate), but non-consumed outcomes become errors.
    pub fn verify(&self, user_id: &Uuid, purpose: Purpose, submitted: &str) -> Result<VerificationCode> {
        self.validate(user_id, purpose, submitted)?.into_result()
    }
}
