use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::AccountError;
use crate::database::{RecordStore, RecordStoreExt};
use crate::models::{RecordKind, Token, User, new_record_id, now_millis};
use crate::validation::{validate_phone, validate_record_id};

/// Issues and checks session tokens
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn RecordStore>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(store: Arc<dyn RecordStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn expiry_from(&self, now_ms: i64) -> i64 {
        now_ms.saturating_add(self.ttl.as_millis().try_into().unwrap_or(i64::MAX))
    }

    /// Issue a token for an already authenticated user
    pub async fn issue(&self, phone: &str) -> Result<Token, AccountError> {
        validate_phone(phone).into_result().map_err(AccountError::Invalid)?;

        // The user must exist
        self.store.read_record::<User>(phone).await?;

        let token = Token { id: new_record_id(), phone: phone.to_string(), expires: self.expiry_from(now_millis()) };
        self.store.create_record(&token).await?;

        info!(phone = %phone, "Token issued");
        Ok(token)
    }

    pub async fn get(&self, id: &str) -> Result<Token, AccountError> {
        validate_record_id(id).into_result().map_err(AccountError::Invalid)?;
        Ok(self.store.read_record(id).await?)
    }

    /// Push the expiry of a live token one period past now
    pub async fn extend(&self, id: &str) -> Result<Token, AccountError> {
        let mut token = self.get(id).await?;

        let now = now_millis();
        if !token.is_live_at(now) {
            return Err(AccountError::Expired);
        }

        token.expires = self.expiry_from(now);
        self.store.update_record(&token).await?;
        debug!(phone = %token.phone, "Token extended");
        Ok(token)
    }

    pub async fn revoke(&self, id: &str) -> Result<(), AccountError> {
        validate_record_id(id).into_result().map_err(AccountError::Invalid)?;
        self.store.delete(RecordKind::Token, id).await?;
        Ok(())
    }

    /// True iff the token exists, belongs to `phone` and has not expired
    pub async fn verify(&self, id: &str, phone: &str) -> bool {
        match self.get(id).await {
            Ok(token) => token.phone == phone && token.is_live_at(now_millis()),
            Err(_) => false,
        }
    }

    pub(crate) async fn authorize(&self, id: &str, phone: &str) -> Result<(), AccountError> {
        if self.verify(id, phone).await { Ok(()) } else { Err(AccountError::Unauthorized) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::{PHONE, user};
    use crate::database::memory::MemoryRecordStore;

    async fn service() -> (Arc<MemoryRecordStore>, TokenService) {
        let store = Arc::new(MemoryRecordStore::new());
        store.create_record(&user(PHONE)).await.unwrap();
        let tokens = TokenService::new(store.clone(), Duration::from_secs(3600));
        (store, tokens)
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let (_store, tokens) = service().await;
        let before = now_millis();
        let token = tokens.issue(PHONE).await.unwrap();

        assert_eq!(token.id.len(), 20);
        assert!(token.expires >= before + 3_600_000);
        assert!(tokens.verify(&token.id, PHONE).await);
        assert!(!tokens.verify(&token.id, "5550000000").await);
        assert!(!tokens.verify("zzzzzzzzzzzzzzzzzzzz", PHONE).await);
        assert!(!tokens.verify("bad", PHONE).await);
    }

    #[tokio::test]
    async fn test_issue_requires_existing_user() {
        let (_store, tokens) = service().await;
        let err = tokens.issue("5550000000").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(matches!(tokens.issue("123").await, Err(AccountError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_expired_token_fails_verification_and_extension() {
        let (store, tokens) = service().await;
        let expired = Token { id: new_record_id(), phone: PHONE.into(), expires: now_millis() - 1 };
        store.create_record(&expired).await.unwrap();

        assert!(!tokens.verify(&expired.id, PHONE).await);
        assert!(matches!(tokens.extend(&expired.id).await, Err(AccountError::Expired)));
    }

    #[tokio::test]
    async fn test_extend_live_token() {
        let (store, tokens) = service().await;
        let token = Token { id: new_record_id(), phone: PHONE.into(), expires: now_millis() + 1000 };
        store.create_record(&token).await.unwrap();

        let extended = tokens.extend(&token.id).await.unwrap();
        assert!(extended.expires > token.expires + 3_000_000);
        assert_eq!(tokens.get(&token.id).await.unwrap(), extended);
    }

    #[tokio::test]
    async fn test_revoke() {
        let (_store, tokens) = service().await;
        let token = tokens.issue(PHONE).await.unwrap();

        tokens.revoke(&token.id).await.unwrap();
        assert!(!tokens.verify(&token.id, PHONE).await);
        assert_eq!(tokens.revoke(&token.id).await.unwrap_err().status_code(), 404);
    }
}
