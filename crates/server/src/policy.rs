//! What happens when persistence rejects a mutation.

use std::collections::BTreeMap;
use texter_core::Field;

/// Failure handling for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Restore the previous value and broadcast nothing.
    Rollback,
    /// Keep the new value in memory and broadcast it anyway.
    BestEffort,
}

impl FailurePolicy {
    /// Parse `rollback` / `best_effort`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "rollback" => Some(Self::Rollback),
            "best_effort" => Some(Self::BestEffort),
            _ => None,
        }
    }
}

/// Built-in policy: placement is rollback-safe, presentation and identity
/// are best-effort.
pub const fn default_failure_policy(field: Field) -> FailurePolicy {
    match field {
        Field::X | Field::Y | Field::Z | Field::Position | Field::World => FailurePolicy::Rollback,
        Field::Title | Field::Text | Field::Invisible | Field::EntityId => {
            FailurePolicy::BestEffort
        }
    }
}

/// Synchronizer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    overrides: BTreeMap<Field, FailurePolicy>,
    /// Re-send the creation message to the restored world after a rolled-back
    /// world change. Observers already saw the removal when this runs.
    pub rebroadcast_after_world_rollback: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            rebroadcast_after_world_rollback: true,
        }
    }
}

impl SyncPolicy {
    /// Override the failure policy for one field.
    pub fn with_failure_policy(mut self, field: Field, policy: FailurePolicy) -> Self {
        self.overrides.insert(field, policy);
        self
    }

    /// Toggle the post-rollback re-broadcast.
    pub fn with_rebroadcast_after_world_rollback(mut self, enabled: bool) -> Self {
        self.rebroadcast_after_world_rollback = enabled;
        self
    }

    /// Effective policy for `field`.
    pub fn failure_policy(&self, field: Field) -> FailurePolicy {
        self.overrides
            .get(&field)
            .copied()
            .unwrap_or_else(|| default_failure_policy(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_split_placement_from_presentation() {
        let policy = SyncPolicy::default();
        for field in [Field::X, Field::Y, Field::Z, Field::Position, Field::World] {
            assert_eq!(policy.failure_policy(field), FailurePolicy::Rollback);
        }
        for field in [Field::Title, Field::Text, Field::Invisible, Field::EntityId] {
            assert_eq!(policy.failure_policy(field), FailurePolicy::BestEffort);
        }
        assert!(policy.rebroadcast_after_world_rollback);
    }

    #[test]
    fn overrides_win() {
        let policy =
            SyncPolicy::default().with_failure_policy(Field::Title, FailurePolicy::Rollback);
        assert_eq!(policy.failure_policy(Field::Title), FailurePolicy::Rollback);
        assert_eq!(policy.failure_policy(Field::Text), FailurePolicy::BestEffort);
    }

    #[test]
    fn parses_config_names() {
        assert_eq!(FailurePolicy::parse("rollback"), Some(FailurePolicy::Rollback));
        assert_eq!(FailurePolicy::parse("best_effort"), Some(FailurePolicy::BestEffort));
        assert_eq!(FailurePolicy::parse("yolo"), None);
    }
}
