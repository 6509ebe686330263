//! One-time password issuance and verification.
//!
//! ```text
//! send:    delete otp:<email> ─► mail code ─► store record (10 min + grace)
//!                                   │
//!                                   └─ failure: DeliveryFailed, nothing stored
//!
//! verify:  load ─► purpose mismatch ─────────► NotFound
//!               ─► wrong / expired ─► attempts+1 ─► 3rd failure: purge, TooManyAttempts
//!               ─► match ─► delete (single use)
//!
//! check_otp is verify without the delete; consume_otp is the delete.
//! ```

use chrono::Utc;
use tracing::{debug, info};

use emporium_core::otp::{self, OtpPurpose, OtpRecord};
use emporium_core::OtpError;

use crate::email::MailTransport;
use crate::error::ApiResult;
use crate::kv::KeyValueStore;
use crate::state::AppState;

fn key(email: &str) -> String {
    format!("otp:{email}")
}

/// Issues a fresh code to `email`, replacing any earlier one.
///
/// `email` must already be normalised.
pub async fn send_otp(state: &AppState, email: &str, purpose: OtpPurpose) -> ApiResult<()> {
    let key = key(email);
    state.kv.delete(&key).await?;

    let code = otp::generate_code();
    state
        .mailer
        .send(email, purpose.subject(), &otp::email_body(&code, purpose))
        .await?;

    let now = Utc::now();
    let record = OtpRecord::new(code, purpose, now);
    state
        .kv
        .set_json(&key, &record, Some(record.storage_ttl(now)))
        .await?;

    info!(email = %email, purpose = ?purpose, "OTP sent");
    Ok(())
}

/// Checks `code` for `email`, consuming the record on success.
pub async fn verify_otp(state: &AppState, email: &str, code: &str, purpose: OtpPurpose) -> ApiResult<()> {
    check_otp(state, email, code, purpose).await?;
    consume_otp(state, email).await
}

/// Checks `code` for `email` without consuming it.
///
/// Failures are counted exactly as in [`verify_otp`]. A matching record stays
/// in place until [`consume_otp`], so a request rejected after this check
/// can be retried with the same code.
pub async fn check_otp(state: &AppState, email: &str, code: &str, purpose: OtpPurpose) -> ApiResult<()> {
    let key = key(email);
    let now = Utc::now();

    let mut record: OtpRecord = state
        .kv
        .get_json(&key)
        .await?
        .ok_or(OtpError::NotFound)?;

    match record.verify(code, purpose, now) {
        Ok(()) => {
            debug!(email = %email, "OTP verified");
            Ok(())
        }
        Err(OtpError::InvalidOrExpired) => {
            state
                .kv
                .set_json(&key, &record, Some(record.storage_ttl(now)))
                .await?;
            Err(OtpError::InvalidOrExpired.into())
        }
        Err(OtpError::TooManyAttempts) => {
            state.kv.delete(&key).await?;
            info!(email = %email, "OTP purged after too many attempts");
            Err(OtpError::TooManyAttempts.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Deletes the record for `email`. Codes are single use.
pub async fn consume_otp(state: &AppState, email: &str) -> ApiResult<()> {
    state.kv.delete(&key(email)).await?;
    Ok(())
}
