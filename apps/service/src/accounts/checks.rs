use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};

use super::{AccountError, TokenService};
use crate::database::{RecordStore, RecordStoreExt};
use crate::models::{Check, CheckState, HttpMethod, Protocol, RecordKind, User, new_record_id};
use crate::validation::{dedup_codes, validate_record_id, validate_success_codes, validate_target, validate_timeout};

/// Fields supplied when creating a check
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInput {
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPatch {
    pub protocol: Option<Protocol>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub success_codes: Option<Vec<u16>>,
    pub timeout_seconds: Option<u64>,
}

impl CheckPatch {
    pub fn is_empty(&self) -> bool {
        self.protocol.is_none()
            && self.url.is_none()
            && self.method.is_none()
            && self.success_codes.is_none()
            && self.timeout_seconds.is_none()
    }
}

/// Validate the user-editable fields of a check, normalizing url and codes
fn validate_definition(check: &mut Check) -> Result<(), AccountError> {
    check.url = check.url.trim().to_string();
    validate_target(check.protocol, &check.url).into_result().map_err(AccountError::Invalid)?;
    validate_success_codes(&check.success_codes).into_result().map_err(AccountError::Invalid)?;
    validate_timeout(check.timeout_seconds).into_result().map_err(AccountError::Invalid)?;
    check.success_codes = dedup_codes(&check.success_codes);
    Ok(())
}

/// Check CRUD on behalf of a token holder
#[derive(Clone)]
pub struct CheckService {
    store: Arc<dyn RecordStore>,
    tokens: TokenService,
    max_checks: usize,
}

impl CheckService {
    pub fn new(store: Arc<dyn RecordStore>, tokens: TokenService, max_checks: usize) -> Self {
        Self { store, tokens, max_checks }
    }

    /// Create a check for the token's owner
    ///
    /// The check record is written first and then linked into the user; if
    /// linking fails the check is removed again.
    pub async fn create(&self, token_id: &str, input: CheckInput) -> Result<Check, AccountError> {
        let mut check = Check {
            id: new_record_id(),
            user_phone: String::new(),
            protocol: input.protocol,
            url: input.url,
            method: input.method,
            success_codes: input.success_codes,
            timeout_seconds: input.timeout_seconds,
            state: CheckState::Unknown,
            last_checked: None,
        };
        validate_definition(&mut check)?;

        let token = self.tokens.get(token_id).await.map_err(|_| AccountError::Unauthorized)?;
        self.tokens.authorize(token_id, &token.phone).await?;

        let mut user: User = self.store.read_record(&token.phone).await?;
        if user.checks.len() >= self.max_checks {
            return Err(AccountError::QuotaExceeded(self.max_checks));
        }

        check.user_phone = user.phone.clone();
        self.store.create_record(&check).await?;

        user.add_check(&check.id);
        if let Err(e) = self.store.update_record(&user).await {
            if let Err(cleanup) = self.store.delete(RecordKind::Check, &check.id).await {
                error!(check_id = %check.id, "Failed to remove unlinked check: {}", cleanup);
            }
            return Err(e.into());
        }

        info!(check_id = %check.id, phone = %check.user_phone, target = %check.describe(), "Check created");
        Ok(check)
    }

    /// Read a check and make sure the token owns it
    async fn owned(&self, token_id: &str, check_id: &str) -> Result<Check, AccountError> {
        validate_record_id(check_id).into_result().map_err(AccountError::Invalid)?;
        let check: Check = self.store.read_record(check_id).await?;
        self.tokens.authorize(token_id, &check.user_phone).await?;
        Ok(check)
    }

    pub async fn get(&self, token_id: &str, check_id: &str) -> Result<Check, AccountError> {
        self.owned(token_id, check_id).await
    }

    /// Apply a patch; monitoring state and ownership are left untouched
    pub async fn update(&self, token_id: &str, check_id: &str, patch: CheckPatch) -> Result<Check, AccountError> {
        if patch.is_empty() {
            return Err(AccountError::Invalid("nothing to update".into()));
        }

        let mut check = self.owned(token_id, check_id).await?;
        if let Some(protocol) = patch.protocol {
            check.protocol = protocol;
        }
        if let Some(url) = patch.url {
            check.url = url;
        }
        if let Some(method) = patch.method {
            check.method = method;
        }
        if let Some(codes) = patch.success_codes {
            check.success_codes = codes;
        }
        if let Some(timeout) = patch.timeout_seconds {
            check.timeout_seconds = timeout;
        }
        validate_definition(&mut check)?;

        // The monitor may have stored a result since `owned` read the check
        let mut current: Check = self.store.read_record(check_id).await?;
        current.protocol = check.protocol;
        current.url = check.url;
        current.method = check.method;
        current.success_codes = check.success_codes;
        current.timeout_seconds = check.timeout_seconds;

        self.store.update_record(&current).await?;
        Ok(current)
    }

    /// Delete a check and unlink it from its owner
    pub async fn delete(&self, token_id: &str, check_id: &str) -> Result<(), AccountError> {
        let check = self.owned(token_id, check_id).await?;
        self.store.delete(RecordKind::Check, &check.id).await?;

        let mut user: User = self.store.read_record(&check.user_phone).await?;
        if user.remove_check(&check.id) {
            self.store.update_record(&user).await?;
        }

        info!(check_id = %check.id, phone = %check.user_phone, "Check deleted");
        Ok(())
    }
}
