//! # One-Time Passwords
//!
//! Records and attempt rules for email OTPs. Storage and delivery live in
//! the API crate; this module decides what a verification attempt means.
//!
//! ## Attempt Flow
//! ```text
//! verify(code, purpose, now)
//!      │
//!      ├── purpose differs            → OtpError::NotFound
//!      ├── code matches, not expired  → Ok (caller deletes the record)
//!      └── otherwise attempts += 1
//!             ├── attempts >= 3       → OtpError::TooManyAttempts (caller purges)
//!             └── else                → OtpError::InvalidOrExpired (caller saves)
//! ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::OtpError;
use crate::{MAX_OTP_ATTEMPTS, OTP_GRACE_MINUTES, OTP_TTL_MINUTES};

/// What an OTP was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Registration,
    PasswordReset,
}

impl OtpPurpose {
    /// Email subject line.
    pub const fn subject(&self) -> &'static str {
        match self {
            OtpPurpose::Registration => "Verify your email address",
            OtpPurpose::PasswordReset => "Reset your password",
        }
    }
}

/// A stored one-time password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    pub code: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl OtpRecord {
    /// A fresh record with zero attempts, expiring after [`OTP_TTL_MINUTES`].
    pub fn new(code: String, purpose: OtpPurpose, now: DateTime<Utc>) -> Self {
        OtpRecord {
            code,
            purpose,
            expires_at: now + ttl(),
            attempts: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// How long the store should keep this record from `now`.
    ///
    /// Outlives `expires_at` by [`OTP_GRACE_MINUTES`], rounded up to whole
    /// seconds, so an expired code is answered as expired (and counted)
    /// instead of vanishing.
    pub fn storage_ttl(&self, now: DateTime<Utc>) -> std::time::Duration {
        let remaining_ms = (self.expires_at - now).num_milliseconds().max(0);
        let remaining_secs = (remaining_ms + 999) / 1000;
        let grace_secs = OTP_GRACE_MINUTES * 60;
        std::time::Duration::from_secs((remaining_secs + grace_secs) as u64)
    }

    /// Checks a presented code, counting failed attempts.
    pub fn verify(&mut self, code: &str, purpose: OtpPurpose, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.purpose != purpose {
            return Err(OtpError::NotFound);
        }

        if self.code == code.trim() && !self.is_expired(now) {
            return Ok(());
        }

        self.attempts += 1;
        if self.attempts >= MAX_OTP_ATTEMPTS {
            return Err(OtpError::TooManyAttempts);
        }

        Err(OtpError::InvalidOrExpired)
    }
}

/// OTP lifetime.
pub fn ttl() -> Duration {
    Duration::minutes(OTP_TTL_MINUTES)
}

/// Six digit code drawn uniformly from 100000..=999999.
pub fn generate_code() -> String {
    generate_code_with(&mut rand::thread_rng())
}

/// [`generate_code`] with a caller-supplied RNG.
pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999u32).to_string()
}

/// Plain-text email body carrying the code.
pub fn email_body(code: &str, purpose: OtpPurpose) -> String {
    let action = match purpose {
        OtpPurpose::Registration => "complete your registration",
        OtpPurpose::PasswordReset => "reset your password",
    };
    format!(
        "Your verification code is {code}.\n\nUse it to {action}. It expires in {OTP_TTL_MINUTES} minutes.\n\nIf you didn't request this, you can ignore this email."
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let code = generate_code_with(&mut rng);
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn test_correct_code_verifies() {
        let now = Utc::now();
        let mut record = OtpRecord::new("123456".to_string(), OtpPurpose::Registration, now);
        assert_eq!(record.verify("123456", OtpPurpose::Registration, now), Ok(()));
        assert_eq!(record.attempts, 0);
    }

    #[test]
    fn test_wrong_purpose_is_not_found() {
        let now = Utc::now();
        let mut record = OtpRecord::new("123456".to_string(), OtpPurpose::Registration, now);
        assert_eq!(
            record.verify("123456", OtpPurpose::PasswordReset, now),
            Err(OtpError::NotFound)
        );
        assert_eq!(record.attempts, 0);
    }

    #[test]
    fn test_three_failures_exhaust_record() {
        let now = Utc::now();
        let mut record = OtpRecord::new("123456".to_string(), OtpPurpose::Registration, now);

        assert_eq!(
            record.verify("000000", OtpPurpose::Registration, now),
            Err(OtpError::InvalidOrExpired)
        );
        assert_eq!(
            record.verify("000000", OtpPurpose::Registration, now),
            Err(OtpError::InvalidOrExpired)
        );
        assert_eq!(
            record.verify("000000", OtpPurpose::Registration, now),
            Err(OtpError::TooManyAttempts)
        );
        assert_eq!(record.attempts, 3);
    }

    #[test]
    fn test_expired_code_counts_as_attempt() {
        let now = Utc::now();
        let mut record = OtpRecord::new("123456".to_string(), OtpPurpose::PasswordReset, now);
        let later = now + ttl() + Duration::seconds(1);

        assert_eq!(
            record.verify("123456", OtpPurpose::PasswordReset, later),
            Err(OtpError::InvalidOrExpired)
        );
        assert_eq!(record.attempts, 1);
    }

    #[test]
    fn test_code_valid_until_exact_expiry() {
        let now = Utc::now();
        let mut record = OtpRecord::new("123456".to_string(), OtpPurpose::Registration, now);
        assert!(record
            .verify("123456", OtpPurpose::Registration, record.expires_at)
            .is_ok());
    }

    #[test]
    fn test_storage_ttl_outlives_expiry() {
        let now = Utc::now();
        let record = OtpRecord::new("123456".to_string(), OtpPurpose::Registration, now);
        let grace = (OTP_GRACE_MINUTES * 60) as u64;
        assert_eq!(record.storage_ttl(now).as_secs(), (OTP_TTL_MINUTES * 60) as u64 + grace);

        // Partial seconds round up
        let later = now + Duration::milliseconds(1500);
        assert_eq!(
            record.storage_ttl(later).as_secs(),
            (OTP_TTL_MINUTES * 60) as u64 - 1 + grace
        );

        // Already expired: kept for the grace window only
        let after = record.expires_at + Duration::minutes(1);
        assert_eq!(record.storage_ttl(after).as_secs(), grace);
    }
}
