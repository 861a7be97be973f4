use std::sync::Arc;

use serde_json::Value;

use crate::database::{RecordStore, StoreError};
use crate::models::{Check, CheckState, RecordKind};

use super::types::Outcome;

/// Whether moving from `prior` to `observed` warrants an alert
///
/// The first observation has no baseline and never alerts; an unchanged
/// state never re-alerts.
pub fn should_alert(prior: CheckState, observed: CheckState) -> bool {
    prior != CheckState::Unknown && prior != observed
}

/// A check after its new state was persisted
#[derive(Debug, Clone)]
pub struct Transition {
    pub check: Check,
    pub previous: CheckState,
    pub alert_needed: bool,
}

impl Transition {
    pub fn state(&self) -> CheckState {
        self.check.state
    }
}

/// Compares fresh outcomes against the persisted state and records them
pub struct TransitionDetector {
    store: Arc<dyn RecordStore>,
}

impl TransitionDetector {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Apply `outcome` to `check` and persist it
    ///
    /// Only `state` and `lastChecked` of the stored record are rewritten, on
    /// a copy read right before the write, so edits made while the probe ran
    /// survive. The alert decision compares against that stored state.
    ///
    /// The returned transition exists only once the update was stored; on
    /// error nothing downstream (alerts) may act on the new state.
    pub async fn process(&self, mut check: Check, outcome: &Outcome) -> Result<Transition, StoreError> {
        let observed = CheckState::from(outcome.status);

        let mut stored = self.store.read(RecordKind::Check, &check.id).await?;
        let Some(record) = stored.as_object_mut() else {
            return Err(StoreError::Serialization(serde::de::Error::custom("check record is not an object")));
        };
        // Anything unreadable counts as no baseline
        let previous: CheckState = record
            .get("state")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        record.insert("state".into(), serde_json::to_value(observed)?);
        record.insert("lastChecked".into(), Value::from(outcome.checked_at));
        self.store.update(RecordKind::Check, &check.id, &stored).await?;

        check.state = observed;
        check.last_checked = Some(outcome.checked_at);

        if previous != observed {
            tracing::info!(
                check_id = %check.id,
                from = %previous,
                to = %observed,
                "Check changed state"
            );
        }

        Ok(Transition { alert_needed: should_alert(previous, observed), previous, check })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RecordStoreExt;
    use crate::database::memory::{MemoryRecordStore, Op};
    use crate::models::{HttpMethod, Protocol};
    use crate::monitoring::types::FailureReason;

    fn check(state: CheckState) -> Check {
        Check {
            id: "abcdefghij0123456789".into(),
            user_phone: "5551234567".into(),
            protocol: Protocol::Https,
            url: "example.com".into(),
            method: HttpMethod::Get,
            success_codes: vec![200],
            timeout_seconds: 3,
            state,
            last_checked: None,
        }
    }

    async fn detector_with(check: &Check) -> (TransitionDetector, Arc<MemoryRecordStore>) {
        let store = Arc::new(MemoryRecordStore::new());
        store.create_record(check).await.unwrap();
        (TransitionDetector::new(store.clone()), store)
    }

    #[test]
    fn test_alert_rule() {
        use CheckState::*;

        assert!(!should_alert(Unknown, Up));
        assert!(!should_alert(Unknown, Down));
        assert!(!should_alert(Up, Up));
        assert!(!should_alert(Down, Down));
        assert!(should_alert(Up, Down));
        assert!(should_alert(Down, Up));
    }

    #[tokio::test]
    async fn test_up_to_down_alerts_and_persists() {
        let check = check(CheckState::Up);
        let (detector, store) = detector_with(&check).await;
        let outcome = Outcome::down(&check.id, FailureReason::UnexpectedStatus, 10)
            .with_status_code(503)
            .at(1234);

        let transition = detector.process(check.clone(), &outcome).await.unwrap();
        assert!(transition.alert_needed);
        assert_eq!(transition.previous, CheckState::Up);
        assert_eq!(transition.state(), CheckState::Down);

        let stored: Check = store.read_record(&check.id).await.unwrap();
        assert_eq!(stored.state, CheckState::Down);
        assert_eq!(stored.last_checked, Some(1234));
    }

    #[tokio::test]
    async fn test_repeated_down_does_not_alert() {
        let check = check(CheckState::Down);
        let (detector, _store) = detector_with(&check).await;
        let outcome = Outcome::down(&check.id, FailureReason::UnexpectedStatus, 10);

        let transition = detector.process(check, &outcome).await.unwrap();
        assert!(!transition.alert_needed);
        assert_eq!(transition.state(), CheckState::Down);
    }

    #[tokio::test]
    async fn test_first_observation_never_alerts() {
        let check = check(CheckState::Unknown);
        let (detector, store) = detector_with(&check).await;

        let transition = detector.process(check.clone(), &Outcome::up(&check.id, 200, 5)).await.unwrap();
        assert!(!transition.alert_needed);

        let stored: Check = store.read_record(&check.id).await.unwrap();
        assert_eq!(stored.state, CheckState::Up);
    }

    #[tokio::test]
    async fn test_persist_failure_surfaces() {
        let check = check(CheckState::Up);
        let (detector, store) = detector_with(&check).await;
        store.fail(Op::Update, Some(&check.id));

        let outcome = Outcome::down(&check.id, FailureReason::Timeout, 3000);
        assert!(detector.process(check.clone(), &outcome).await.is_err());

        store.heal();
        let stored: Check = store.read_record(&check.id).await.unwrap();
        assert_eq!(stored.state, CheckState::Up);
    }

    #[tokio::test]
    async fn test_deleted_check_is_not_found() {
        let check = check(CheckState::Up);
        let detector = TransitionDetector::new(Arc::new(MemoryRecordStore::new()));

        let err = detector.process(check.clone(), &Outcome::up(&check.id, 200, 5)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stored_fields_edited_meanwhile_are_kept() {
        let check = check(CheckState::Unknown);
        let (detector, store) = detector_with(&check).await;

        // Edited and probed by someone else after `check` was read
        let mut edited = check.clone();
        edited.url = "edited.example.com/health".into();
        edited.success_codes = vec![200, 204];
        edited.state = CheckState::Up;
        store.update_record(&edited).await.unwrap();

        let outcome = Outcome::down(&check.id, FailureReason::Timeout, 3000).at(99);
        let transition = detector.process(check.clone(), &outcome).await.unwrap();
        // Baseline is the stored state, not the stale copy
        assert_eq!(transition.previous, CheckState::Up);
        assert!(transition.alert_needed);

        let stored: Check = store.read_record(&check.id).await.unwrap();
        assert_eq!(stored.url, "edited.example.com/health");
        assert_eq!(stored.success_codes, vec![200, 204]);
        assert_eq!(stored.state, CheckState::Down);
        assert_eq!(stored.last_checked, Some(99));
    }
}
