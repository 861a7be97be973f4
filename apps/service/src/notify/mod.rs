//! Outbound alert delivery.
//!
//! The scheduler only sees the [`Notifier`] trait. Delivery is best-effort:
//! a failed send is logged by the caller and never retried within a tick.

pub mod twilio;

pub use twilio::TwilioNotifier;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Check, CheckState};
use crate::validation::PHONE_LENGTH;

/// Longest message body the gateway accepts
pub const MAX_MESSAGE_LENGTH: usize = 1600;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("phone number '{0}' is not a {PHONE_LENGTH}-digit subscriber number")]
    InvalidPhone(String),

    #[error("message must be between 1 and {MAX_MESSAGE_LENGTH} characters")]
    InvalidMessage,

    #[error("gateway rejected the message with status {0}")]
    Rejected(u16),

    #[error("gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Sends a short text alert to a phone number
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError>;
}

/// Reduce a phone to its subscriber digits
///
/// Formatting characters are dropped and an 11-digit number with a leading
/// `1` loses the country code.
pub fn normalize_phone(phone: &str) -> Result<String, NotifyError> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.strip_prefix('1') {
        Some(rest) if digits.len() == PHONE_LENGTH + 1 => rest.to_string(),
        _ => digits,
    };

    if digits.len() == PHONE_LENGTH {
        Ok(digits)
    } else {
        Err(NotifyError::InvalidPhone(phone.to_string()))
    }
}

/// Trim and bound a message body
pub fn prepare_message(message: &str) -> Result<&str, NotifyError> {
    let message = message.trim();
    if message.is_empty() || message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(NotifyError::InvalidMessage);
    }
    Ok(message)
}

/// Alert text for a check that moved to `state`
pub fn alert_message(check: &Check, state: CheckState) -> String {
    let message = format!("Alert: Your check for {} is currently {}", check.describe(), state);
    if message.chars().count() <= MAX_MESSAGE_LENGTH {
        return message;
    }
    let mut truncated: String = message.chars().take(MAX_MESSAGE_LENGTH - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Gateway used when no SMS provider is configured: alerts go to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        let phone = normalize_phone(phone)?;
        let message = prepare_message(message)?;
        tracing::warn!(phone = %phone, "ALERT {}", message);
        Ok(())
    }
}
