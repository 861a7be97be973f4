use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{info, warn};

use super::{AccountError, TokenService};
use crate::database::{RecordStore, RecordStoreExt, StoreError};
use crate::models::{RecordKind, User, UserView};
use crate::validation::validate_phone;

/// Result of a fully successful user deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub phone: String,
    pub checks_deleted: Vec<String>,
}

/// Name change; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Trimmed name, refusing blanks
fn required_name(field: &str, value: &str) -> Result<String, AccountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AccountError::Invalid(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RecordStore>,
    tokens: TokenService,
}

impl UserService {
    pub fn new(store: Arc<dyn RecordStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    async fn authorized(&self, token_id: &str, phone: &str) -> Result<(), AccountError> {
        validate_phone(phone).into_result().map_err(AccountError::Invalid)?;
        self.tokens.authorize(token_id, phone).await
    }

    pub async fn get(&self, token_id: &str, phone: &str) -> Result<UserView, AccountError> {
        self.authorized(token_id, phone).await?;
        let user: User = self.store.read_record(phone).await?;
        Ok(user.into())
    }

    pub async fn update(&self, token_id: &str, phone: &str, update: UserUpdate) -> Result<UserView, AccountError> {
        if update.first_name.is_none() && update.last_name.is_none() {
            return Err(AccountError::Invalid("nothing to update".into()));
        }
        let first_name = update.first_name.as_deref().map(|name| required_name("firstName", name)).transpose()?;
        let last_name = update.last_name.as_deref().map(|name| required_name("lastName", name)).transpose()?;

        self.authorized(token_id, phone).await?;
        let mut user: User = self.store.read_record(phone).await?;
        if let Some(first_name) = first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            user.last_name = last_name;
        }
        self.store.update_record(&user).await?;

        info!(phone = %phone, "User updated");
        Ok(user.into())
    }

    /// Delete the user, then every check it owns
    ///
    /// Check deletions run concurrently. A check that is already gone
    /// counts as deleted. If any deletion fails the user stays deleted and
    /// the split is reported through [`AccountError::PartialCascade`].
    pub async fn delete(&self, token_id: &str, phone: &str) -> Result<DeletionReport, AccountError> {
        self.authorized(token_id, phone).await?;

        let user: User = self.store.read_record(phone).await?;
        self.store.delete(RecordKind::User, phone).await?;

        let results = join_all(user.checks.iter().map(|id| async move {
            match self.store.delete(RecordKind::Check, id).await {
                Ok(()) => Ok(id.clone()),
                Err(StoreError::NotFound { .. }) => Ok(id.clone()),
                Err(e) => {
                    warn!(check_id = %id, phone = %phone, "Failed to delete check of deleted user: {}", e);
                    Err(id.clone())
                }
            }
        }))
        .await;

        let (deleted, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
        let deleted: Vec<String> = deleted.into_iter().flatten().collect();
        let failed: Vec<String> = failed.into_iter().filter_map(Result::err).collect();

        if !failed.is_empty() {
            return Err(AccountError::PartialCascade { deleted, failed });
        }

        info!(phone = %phone, checks = deleted.len(), "User deleted");
        Ok(DeletionReport { phone: phone.to_string(), checks_deleted: deleted })
    }
}
