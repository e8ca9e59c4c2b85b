//! Decision Engine (§4.5): answers `AuthQuery(userId, objectId, action)` either by a
//! local flag match over stored roles, or by delegating to a [`PolicyOracle`] with
//! enriched context. Both shapes are pure over the store snapshot observed at call
//! time — neither writes. The two shapes are interchangeable implementations of one
//! trait, swapped at construction rather than per request.

use crate::error::Error;
use crate::models::{flag_of, Action};
use crate::store::{CancellationToken, StoreOps};

use super::oracle::{OracleInput, OracleUserRole, PolicyOracle};

/// One method, two implementations selected at construction (§9: "the source toggles
/// between two decision strategies... both must be supported as interchangeable
/// implementations").
pub trait DecisionEngine {
    fn decide(
        &self,
        store: &dyn StoreOps,
        user_id: u64,
        object_id: u64,
        action: Action,
        cancel: &CancellationToken,
    ) -> Result<bool, Error>;
}

/// Shape A: local flag match, no external collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagMatchEngine;

impl FlagMatchEngine {
    pub fn new() -> Self {
        FlagMatchEngine
    }
}

impl DecisionEngine for FlagMatchEngine {
    fn decide(
        &self,
        store: &dyn StoreOps,
        user_id: u64,
        object_id: u64,
        action: Action,
        cancel: &CancellationToken,
    ) -> Result<bool, Error> {
        cancel.check()?;

        if object_id == 0 {
            return Ok(action == Action::Access || user_id != 0);
        }
        if user_id == 0 {
            return Ok(false);
        }

        let flag = flag_of(action);
        let roles = store.find_roles_for_user(user_id, cancel)?;
        Ok(roles.iter().any(|r| r.object_id == object_id && r.action_flags & flag != 0))
    }
}

/// Shape B: delegates to a [`PolicyOracle`] after assembling the user's full role set
/// (no object filter) into the input document of §4.5.
pub struct OracleEngine<O> {
    oracle: O,
}

impl<O: PolicyOracle> OracleEngine<O> {
    pub fn new(oracle: O) -> Self {
        OracleEngine { oracle }
    }
}

impl<O: PolicyOracle> DecisionEngine for OracleEngine<O> {
    fn decide(
        &self,
        store: &dyn StoreOps,
        user_id: u64,
        object_id: u64,
        action: Action,
        cancel: &CancellationToken,
    ) -> Result<bool, Error> {
        cancel.check()?;

        let roles = store.find_roles_for_user(user_id, cancel)?;
        let input = OracleInput {
            user_id,
            object_id,
            action_flag: flag_of(action),
            user_roles: roles.iter().map(|r| OracleUserRole { object_id: r.object_id, action_flags: r.action_flags }).collect(),
        };

        self.oracle.eval(&input, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::oracle::NullOracle;
    use crate::store::memory::MemoryStore;
    use crate::store::Store;

    #[test]
    fn flag_match_public_object_allows_access_to_anyone() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let engine = FlagMatchEngine::new();

        assert!(engine.decide(&store, 0, 0, Action::Access, &cancel).unwrap());
        assert!(!engine.decide(&store, 0, 0, Action::Update, &cancel).unwrap());
        assert!(engine.decide(&store, 5, 0, Action::Update, &cancel).unwrap());
    }

    #[test]
    fn flag_match_unauthenticated_user_is_always_denied_on_real_objects() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let engine = FlagMatchEngine::new();

        assert!(!engine.decide(&store, 0, 7, Action::Access, &cancel).unwrap());
    }

    #[test]
    fn flag_match_checks_object_scoped_flags() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let engine = FlagMatchEngine::new();

        let name = store.insert_role_name("editor", &cancel).unwrap();
        let role = store.insert_role(name.id, 7, 0b0101, &cancel).unwrap();
        store.insert_user_role(42, role.id, &cancel).unwrap();

        assert!(engine.decide(&store, 42, 7, Action::Access, &cancel).unwrap());
        assert!(engine.decide(&store, 42, 7, Action::Update, &cancel).unwrap());
        assert!(!engine.decide(&store, 42, 7, Action::Create, &cancel).unwrap());
        assert!(!engine.decide(&store, 42, 9, Action::Access, &cancel).unwrap());
    }

    #[test]
    fn oracle_engine_delegates_and_ignores_public_object_shortcut() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let engine = OracleEngine::new(NullOracle::deny_all());

        assert!(!engine.decide(&store, 0, 0, Action::Access, &cancel).unwrap());
    }
}
