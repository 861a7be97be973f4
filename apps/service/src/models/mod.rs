pub mod check;
pub mod record;
pub mod user;

pub use check::{Check, CheckState, HttpMethod, Protocol};
pub use record::{Record, RecordKind, new_record_id};
pub use user::{Token, User, UserView};

/// Current time in Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
