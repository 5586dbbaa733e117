//! Bounded, outcome-tagged action history with dedup-on-append.

use std::collections::VecDeque;

use crate::domain::action::ActionRecord;

/// The candidate entry's (action, target, outcome) is compared to the most
/// recent entry before appending; an exact repeat is dropped. A genuine
/// change of outcome for the same action always lands as a new entry, so the
/// history reads as a state timeline, not an event firehose.
#[derive(Debug)]
pub struct ActionLog {
    entries: VecDeque<ActionRecord>,
    capacity: usize,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::new(), capacity: capacity.max(1) }
    }

    /// Returns `false` when the record was deduplicated away.
    pub fn append(&mut self, record: ActionRecord) -> bool {
        if let Some(last) = self.entries.back() {
            if last.dedup_key() == record.dedup_key() {
                return false;
            }
        }

        self.entries.push_back(record);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&ActionRecord> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionRecord> {
        self.entries.iter()
    }

    /// Owned copy for publication, oldest first.
    pub fn to_vec(&self) -> Vec<ActionRecord> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::action::ActionOutcome;
    use crate::domain::decision::{ActionKind, ActionTarget, Decision};
    use crate::domain::hypothesis::RootCause;
    use crate::domain::metrics::WindowId;

    fn record(kind: ActionKind, target: &str, outcome: ActionOutcome) -> ActionRecord {
        let decision = Decision {
            action: kind,
            target: Some(ActionTarget::Issuer(target.to_string())),
            cause: RootCause::IssuerDegradation,
            confidence: 0.9,
            risk: 0.35,
            requires_human_approval: false,
            approval_reason: None,
            rationale: "test".to_string(),
            window: WindowId(1),
            decided_at: Utc::now(),
        };
        ActionRecord::new(decision, outcome, Utc::now())
    }

    #[test]
    fn consecutive_identical_entries_are_dropped() {
        let mut log = ActionLog::new(10);

        assert!(log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::Executed)));
        assert!(!log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::Executed)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn outcome_change_is_a_new_entry() {
        let mut log = ActionLog::new(10);

        assert!(log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::Executed)));
        assert!(log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::SkippedCooldown)));
        assert!(!log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::SkippedCooldown)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn different_target_is_never_deduplicated() {
        let mut log = ActionLog::new(10);

        assert!(log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::Executed)));
        assert!(log.append(record(ActionKind::Reroute, "ICICI", ActionOutcome::Executed)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut log = ActionLog::new(2);

        log.append(record(ActionKind::Reroute, "A", ActionOutcome::Executed));
        log.append(record(ActionKind::Reroute, "B", ActionOutcome::Executed));
        log.append(record(ActionKind::Reroute, "C", ActionOutcome::Executed));

        let targets: Vec<String> =
            log.iter().map(|r| r.decision.target_label()).collect();
        assert_eq!(targets, vec!["issuer:B".to_string(), "issuer:C".to_string()]);
    }

    #[test]
    fn interleaved_repeat_is_kept() {
        let mut log = ActionLog::new(10);

        log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::Executed));
        log.append(record(ActionKind::Reroute, "ICICI", ActionOutcome::Executed));
        assert!(log.append(record(ActionKind::Reroute, "AXIS", ActionOutcome::Executed)));
        assert_eq!(log.len(), 3);
    }
}
