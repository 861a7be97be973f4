//! Account services used by the request layer.
//!
//! Every operation here is authorized by a token bound to a phone. Errors
//! carry an HTTP-style status through [`AccountError::status_code`] so the
//! caller can map them without inspecting variants.

pub mod checks;
pub mod tokens;
pub mod users;

pub use checks::{CheckInput, CheckPatch, CheckService};
pub use tokens::TokenService;
pub use users::{DeletionReport, UserService, UserUpdate};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::AccountSettings;
use crate::database::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Missing required field or invalid field: {0}")]
    Invalid(String),

    #[error("Missing required token or token is invalid")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Token already expired")]
    Expired,

    #[error("The user already has the maximum number of checks ({0})")]
    QuotaExceeded(usize),

    #[error("User deleted but {} of its checks could not be removed", failed.len())]
    PartialCascade { deleted: Vec<String>, failed: Vec<String> },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { kind, id } => AccountError::NotFound(format!("{kind} '{id}'")),
            other => AccountError::Store(other),
        }
    }
}

impl AccountError {
    pub fn status_code(&self) -> u16 {
        match self {
            AccountError::Invalid(_) | AccountError::Expired | AccountError::QuotaExceeded(_) => 400,
            AccountError::Unauthorized => 403,
            AccountError::NotFound(_) => 404,
            AccountError::Store(StoreError::AlreadyExists { .. }) => 400,
            AccountError::PartialCascade { .. } | AccountError::Store(_) => 500,
        }
    }
}

/// The three account services over one shared store
#[derive(Clone)]
pub struct Accounts {
    pub tokens: TokenService,
    pub checks: CheckService,
    pub users: UserService,
}

impl Accounts {
    pub fn new(store: Arc<dyn RecordStore>, settings: &AccountSettings) -> Self {
        let tokens = TokenService::new(store.clone(), Duration::from_secs(settings.token_ttl_seconds));
        Self {
            checks: CheckService::new(store.clone(), tokens.clone(), settings.max_checks),
            users: UserService::new(store, tokens.clone()),
            tokens,
        }
    }
}
