use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};

/// Length of generated check and token identifiers
pub const RECORD_ID_LENGTH: usize = 20;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// The three kinds of documents held by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    User,
    Token,
    Check,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Token => "token",
            RecordKind::Check => "check",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait for typed documents kept in the record store
///
/// Implement this trait for any struct that is persisted as one keyed
/// document, so it can go through the typed helpers of
/// [`RecordStoreExt`](crate::database::RecordStoreExt).
///
/// # Example
/// ```ignore
/// let check: Check = store.read_record(&id).await?;
/// store.update_record(&check).await?;
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Kind under which documents of this type are stored
    const KIND: RecordKind;

    /// Primary key of this document
    fn key(&self) -> &str;
}

/// Generate a random identifier of [`RECORD_ID_LENGTH`] lowercase
/// alphanumeric characters
pub fn new_record_id() -> String {
    let mut rng = rand::thread_rng();
    (0..RECORD_ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_shape() {
        let id = new_record_id();
        assert_eq!(id.len(), RECORD_ID_LENGTH);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_record_ids_differ() {
        assert_ne!(new_record_id(), new_record_id());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(RecordKind::Check.to_string(), "check");
        assert_eq!(RecordKind::Token.as_str(), "token");
    }
}
