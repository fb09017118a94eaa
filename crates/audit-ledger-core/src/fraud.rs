//! Pluggable fraud assessment.
//!
//! The ledger records whatever verdict it is handed. Detection heuristics live
//! outside this crate behind [`FraudDetector`].

use crate::changes::ChangeSet;
use crate::entry::{Action, Actor, FraudVerdict};
use crate::types::RecordId;

/// The mutation being assessed.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    pub record_id: &'a RecordId,
    pub action: &'a Action,
    pub actor: Option<&'a Actor>,
    pub changes: &'a ChangeSet,
}

/// Strategy that decides the fraud verdict for a mutation.
pub trait FraudDetector: Send + Sync {
    fn assess(&self, mutation: &MutationContext<'_>) -> FraudVerdict;
}

/// Detector that never flags anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFraudDetected;

impl FraudDetector for NoFraudDetected {
    fn assess(&self, _mutation: &MutationContext<'_>) -> FraudVerdict {
        FraudVerdict::Clean
    }
}

impl<F> FraudDetector for F
where
    F: Fn(&MutationContext<'_>) -> FraudVerdict + Send + Sync,
{
    fn assess(&self, mutation: &MutationContext<'_>) -> FraudVerdict {
        self(mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_detector_is_clean() {
        let record = RecordId::new("prop-1");
        let changes = ChangeSet::new().with("location", "Austin");
        let ctx = MutationContext {
            record_id: &record,
            action: &Action::Create,
            actor: None,
            changes: &changes,
        };
        assert_eq!(NoFraudDetected.assess(&ctx), FraudVerdict::Clean);
    }

    fn payment_terms(m: &MutationContext<'_>) -> FraudVerdict {
        if m.changes.get("terms").and_then(|v| v.as_str()) == Some("Wire transfer only") {
            FraudVerdict::flagged("suspicious payment terms")
        } else {
            FraudVerdict::Clean
        }
    }

    #[test]
    fn test_function_detector() {
        let record = RecordId::new("prop-2");
        let changes = ChangeSet::new().with("terms", "Wire transfer only");
        let ctx = MutationContext {
            record_id: &record,
            action: &Action::Update,
            actor: None,
            changes: &changes,
        };
        assert_eq!(payment_terms.assess(&ctx).reason(), Some("suspicious payment terms"));
    }
}
