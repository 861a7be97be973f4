use serde::{Deserialize, Serialize};

use super::record::{Record, RecordKind};

/// Account record, keyed by phone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub hashed_password: String,
    pub tos_agreement: bool,
    /// Ids of owned checks, in creation order
    #[serde(default)]
    pub checks: Vec<String>,
}

impl User {
    /// Append a check id unless it is already owned
    pub fn add_check(&mut self, check_id: &str) -> bool {
        if self.checks.iter().any(|id| id == check_id) {
            return false;
        }
        self.checks.push(check_id.to_string());
        true
    }

    /// Remove a check id, reporting whether it was present
    pub fn remove_check(&mut self, check_id: &str) -> bool {
        let before = self.checks.len();
        self.checks.retain(|id| id != check_id);
        self.checks.len() != before
    }
}

impl Record for User {
    const KIND: RecordKind = RecordKind::User;

    fn key(&self) -> &str {
        &self.phone
    }
}

/// User as exposed to callers, without the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub tos_agreement: bool,
    pub checks: Vec<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            tos_agreement: user.tos_agreement,
            checks: user.checks,
        }
    }
}

/// Short-lived credential bound to one phone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub phone: String,
    /// Unix milliseconds after which the token is no longer valid
    pub expires: i64,
}

impl Token {
    pub fn is_live_at(&self, now_ms: i64) -> bool {
        self.expires > now_ms
    }
}

impl Record for Token {
    const KIND: RecordKind = RecordKind::Token;

    fn key(&self) -> &str {
        &self.id
    }
}
