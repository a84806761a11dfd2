//! Status transition policy.

use std::collections::BTreeMap;

use repairdesk_core::models::round::RoundStatus;
use serde::Deserialize;

/// Which status may follow which.
///
/// The default lets any status follow any other. An allow list restricts
/// transitions to the listed targets per source status; a source status
/// missing from the list may not be left at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransitionPolicy {
    #[default]
    Unrestricted,
    AllowList {
        transitions: BTreeMap<RoundStatus, Vec<RoundStatus>>,
    },
}

impl TransitionPolicy {
    pub fn permits(&self, from: RoundStatus, to: RoundStatus) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::AllowList { transitions } => transitions
                .get(&from)
                .is_some_and(|targets| targets.contains(&to)),
        }
    }

    /// A restrictive policy needs the round to still be in the status the
    /// check was made against when the transition commits.
    pub fn is_restrictive(&self) -> bool {
        !matches!(self, Self::Unrestricted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_permits_everything() {
        let policy = TransitionPolicy::default();
        assert!(!policy.is_restrictive());
        for from in RoundStatus::ALL {
            for to in RoundStatus::ALL {
                assert!(policy.permits(from, to));
            }
        }
    }

    #[test]
    fn allow_list_only_permits_listed_targets() {
        let policy = TransitionPolicy::AllowList {
            transitions: BTreeMap::from([(
                RoundStatus::Pending,
                vec![RoundStatus::Received, RoundStatus::Cancelled],
            )]),
        };

        assert!(policy.is_restrictive());
        assert!(policy.permits(RoundStatus::Pending, RoundStatus::Received));
        assert!(!policy.permits(RoundStatus::Pending, RoundStatus::Closed));
        assert!(!policy.permits(RoundStatus::Received, RoundStatus::Diagnosing));
    }

    #[test]
    fn deserializes_from_tagged_config() {
        let policy: TransitionPolicy = serde_json::from_value(serde_json::json!({
            "mode": "allow_list",
            "transitions": { "QA": ["READY_TO_SHIP", "REPAIRING"] }
        }))
        .unwrap();

        assert!(policy.permits(RoundStatus::Qa, RoundStatus::Repairing));
        assert!(!policy.permits(RoundStatus::Qa, RoundStatus::Closed));
    }
}
