use url::Url;

use crate::models::Protocol;
use crate::models::record::RECORD_ID_LENGTH;

/// Subscriber numbers are exactly this many digits
pub const PHONE_LENGTH: usize = 10;

pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn into_result(self) -> Result<(), String> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self.error.unwrap_or_else(|| "Validation failed".to_string()))
        }
    }
}

/// Validate a stored or submitted phone (10 digits, no formatting)
pub fn validate_phone(phone: &str) -> ValidationResult {
    if phone.len() != PHONE_LENGTH {
        return ValidationResult::err(format!("Phone must be exactly {PHONE_LENGTH} digits"));
    }

    if !phone.bytes().all(|b| b.is_ascii_digit()) {
        return ValidationResult::err("Phone must contain digits only");
    }

    ValidationResult::ok()
}

/// Validate a generated check or token id
pub fn validate_record_id(id: &str) -> ValidationResult {
    if id.len() != RECORD_ID_LENGTH {
        return ValidationResult::err(format!("Id must be {RECORD_ID_LENGTH} characters"));
    }

    if !id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()) {
        return ValidationResult::err("Id must be lowercase alphanumeric");
    }

    ValidationResult::ok()
}

/// Validate the host/path part of a check against its protocol
pub fn validate_target(protocol: Protocol, target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    if target.contains("://") {
        return ValidationResult::err("Target must not include a scheme, use the protocol field");
    }

    match Url::parse(&format!("{protocol}://{target}")) {
        Ok(url) if url.host_str().is_some_and(|host| !host.is_empty()) => ValidationResult::ok(),
        Ok(_) => ValidationResult::err("URL must have a valid host"),
        Err(e) => ValidationResult::err(format!("Invalid URL: {e}")),
    }
}

/// Validate the accepted status code set
pub fn validate_success_codes(codes: &[u16]) -> ValidationResult {
    if codes.is_empty() {
        return ValidationResult::err("At least one success code is required");
    }

    if let Some(code) = codes.iter().find(|code| !(100..=599).contains(*code)) {
        return ValidationResult::err(format!("Status code {code} is out of range"));
    }

    ValidationResult::ok()
}

/// Validate a probe timeout
pub fn validate_timeout(timeout: u64) -> ValidationResult {
    if timeout < MIN_TIMEOUT_SECONDS {
        return ValidationResult::err(format!(
            "Timeout too short: {timeout} seconds (minimum: {MIN_TIMEOUT_SECONDS})"
        ));
    }

    if timeout > MAX_TIMEOUT_SECONDS {
        return ValidationResult::err(format!(
            "Timeout too long: {timeout} seconds (maximum: {MAX_TIMEOUT_SECONDS})"
        ));
    }

    ValidationResult::ok()
}

/// Collapse duplicate codes, keeping first occurrences in order
pub fn dedup_codes(codes: &[u16]) -> Vec<u16> {
    let mut unique = Vec::with_capacity(codes.len());
    for code in codes {
        if !unique.contains(code) {
            unique.push(*code);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_validation() {
        assert!(validate_phone("5551234567").is_valid);

        assert!(!validate_phone("555123456").is_valid);
        assert!(!validate_phone("55512345678").is_valid);
        assert!(!validate_phone("555-123-45").is_valid);
    }

    #[test]
    fn test_record_id_validation() {
        assert!(validate_record_id("abcdefghij0123456789").is_valid);

        assert!(!validate_record_id("short").is_valid);
        assert!(!validate_record_id("ABCDEFGHIJ0123456789").is_valid);
    }

    #[test]
    fn test_target_validation() {
        assert!(validate_target(Protocol::Https, "example.com").is_valid);
        assert!(validate_target(Protocol::Http, "example.com:8080/path?q=1").is_valid);
        assert!(validate_target(Protocol::Http, "192.168.1.1").is_valid);

        assert!(!validate_target(Protocol::Https, "").is_valid);
        assert!(!validate_target(Protocol::Https, "   ").is_valid);
        assert!(!validate_target(Protocol::Https, "https://example.com").is_valid);
        assert!(!validate_target(Protocol::Http, "exa mple.com").is_valid);
    }

    #[test]
    fn test_success_code_validation() {
        assert!(validate_success_codes(&[200, 301]).is_valid);

        assert!(!validate_success_codes(&[]).is_valid);
        assert!(!validate_success_codes(&[200, 42]).is_valid);
        assert!(!validate_success_codes(&[600]).is_valid);
    }

    #[test]
    fn test_timeout_validation() {
        assert!(validate_timeout(1).is_valid);
        assert!(validate_timeout(5).is_valid);

        assert!(!validate_timeout(0).is_valid);
        assert!(!validate_timeout(6).is_valid);
    }

    #[test]
    fn test_dedup_codes_keeps_order() {
        assert_eq!(dedup_codes(&[200, 201, 200, 204, 201]), vec![200, 201, 204]);
    }

    #[test]
    fn test_into_result_carries_message() {
        let err = validate_timeout(9).into_result().unwrap_err();
        assert!(err.contains("maximum: 5"));
    }
}
