//! Query API (§4.7): the thin dispatcher exposing the six RPC operations of §6. Each
//! method acquires whatever store handle the operation needs, calls into Role Assembly,
//! the Decision Engine or the Mutation Engine, and maps the result into a wire response.
//!
//! A thin layer whose only job is translating between the transport-shaped
//! request/response structs and the lower layers' own types, without owning any
//! decision logic itself. The RPC transport that would actually drive these methods is
//! out of scope (§1); a transport adapter calls straight into this struct.

use log::debug;

use crate::authorization::{assemble, DecisionEngine};
use crate::cache::NameCache;
use crate::error::Error;
use crate::models::{
    actions_of, ActionListResponse, AuthQueryRequest, ListRolesRequest, ListUserRolesRequest, RoleListResponse,
    RoleRightRequest, SuccessResponse, UpdateRoleRequest, UpdateUserRequest,
};
use crate::mutation;
use crate::store::{CancellationToken, Store};

/// Owns the store handle, the process-wide Name Cache, and whichever `DecisionEngine`
/// was selected at construction. One instance is shared across concurrent requests; all
/// of its state is either immutable (`store`, `decision`) or internally synchronized
/// (`cache`).
pub struct QueryApi<S, D> {
    store: S,
    cache: NameCache,
    decision: D,
}

impl<S: Store, D: DecisionEngine> QueryApi<S, D> {
    pub fn new(store: S, decision: D) -> Self {
        QueryApi { store, cache: NameCache::new(), decision }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `AuthQuery` (§4.5): may `userId` perform `action` on `objectId`.
    pub fn auth_query(&self, request: AuthQueryRequest, cancel: &CancellationToken) -> Result<SuccessResponse, Error> {
        debug!("auth query: user {} action {:?} on object {}", request.user_id, request.action, request.object_id);
        let success = self.decision.decide(&self.store, request.user_id, request.object_id, request.action, cancel)?;
        Ok(SuccessResponse { success })
    }

    /// `ListRoles` (§4.4): every `Role` for the given object ids, assembled into wire views.
    pub fn list_roles(&self, request: ListRolesRequest, cancel: &CancellationToken) -> Result<RoleListResponse, Error> {
        debug!("listing roles for {} object ids", request.ids.len());
        let roles = self.store.find_roles_by_object_ids(&request.ids, cancel)?;
        let list = assemble(&roles, &self.cache, &self.store, cancel)?;
        Ok(RoleListResponse { list })
    }

    /// `RoleRight`: the action list granted by `(name, objectId)`, or empty if no such
    /// role exists (NotFound is recovered locally, per §7).
    pub fn role_right(&self, request: RoleRightRequest, cancel: &CancellationToken) -> Result<ActionListResponse, Error> {
        debug!("role right for {:?}@{}", request.name, request.object_id);
        let role = self.store.find_role_by_name_and_object(&request.name, request.object_id, cancel)?;
        let list = role.map(|r| actions_of(r.action_flags)).unwrap_or_default();
        Ok(ActionListResponse { list })
    }

    /// `UpdateUser` (§4.6): replace `userId`'s role assignments atomically.
    pub fn update_user(&self, request: UpdateUserRequest, cancel: &CancellationToken) -> Result<SuccessResponse, Error> {
        let requested: Vec<(String, u64)> = request.list.into_iter().map(|r| (r.name, r.object_id)).collect();
        let success = mutation::update_user(&self.store, request.user_id, &requested, cancel)?;
        Ok(SuccessResponse { success })
    }

    /// `UpdateRole` (§4.6): set, update or clear `(name, objectId)`'s action flags.
    pub fn update_role(&self, request: UpdateRoleRequest, cancel: &CancellationToken) -> Result<SuccessResponse, Error> {
        let success = mutation::update_role(&self.store, &self.cache, &request.name, request.object_id, &request.list, cancel)?;
        Ok(SuccessResponse { success })
    }

    /// `ListUserRoles`: every `Role` reachable from `userId` through `UserRole`, assembled
    /// into wire views.
    pub fn list_user_roles(&self, request: ListUserRolesRequest, cancel: &CancellationToken) -> Result<RoleListResponse, Error> {
        debug!("listing roles for user {}", request.id);
        let roles = self.store.find_roles_for_user(request.id, cancel)?;
        let list = assemble(&roles, &self.cache, &self.store, cancel)?;
        Ok(RoleListResponse { list })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{FlagMatchEngine, NullOracle, OracleEngine};
    use crate::models::{Action, UserRoleRequest};
    use crate::store::memory::MemoryStore;

    fn api() -> QueryApi<MemoryStore, FlagMatchEngine> {
        QueryApi::new(MemoryStore::new(), FlagMatchEngine::new())
    }

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    // Seed scenario 1 (§8): empty store, grant, then read it back.
    #[test]
    fn seed_scenario_grant_then_read_back() {
        let api = api();
        let cancel = cancel();

        let resp = api
            .update_role(
                UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Access, Action::Update] },
                &cancel,
            )
            .unwrap();
        assert!(resp.success);

        let resp = api.role_right(RoleRightRequest { name: "editor".to_string(), object_id: 7 }, &cancel).unwrap();
        assert_eq!(resp.list, vec![Action::Access, Action::Update]);
        assert_eq!(api.store().role_name_count(), 1);
        assert_eq!(api.store().role_count(), 1);
    }

    // Seed scenario 2: assign the role to a user, then query it both ways.
    #[test]
    fn seed_scenario_assign_user_then_query() {
        let api = api();
        let cancel = cancel();

        api.update_role(
            UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Access, Action::Update] },
            &cancel,
        )
        .unwrap();
        api.update_user(
            UpdateUserRequest { user_id: 42, list: vec![UserRoleRequest { name: "editor".to_string(), object_id: 7 }] },
            &cancel,
        )
        .unwrap();

        let ok = api.auth_query(AuthQueryRequest { user_id: 42, object_id: 7, action: Action::Update }, &cancel).unwrap();
        assert!(ok.success);

        let denied = api.auth_query(AuthQueryRequest { user_id: 42, object_id: 7, action: Action::Delete }, &cancel).unwrap();
        assert!(!denied.success);
    }

    // Seed scenario 3: clearing the role sweeps the name and empties ListRoles.
    #[test]
    fn seed_scenario_clear_role_sweeps_name() {
        let api = api();
        let cancel = cancel();

        api.update_role(
            UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Access, Action::Update] },
            &cancel,
        )
        .unwrap();
        api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![] }, &cancel).unwrap();

        let resp = api.list_roles(ListRolesRequest { ids: vec![7] }, &cancel).unwrap();
        assert!(resp.list.is_empty());
        assert_eq!(api.store().role_name_count(), 0);
    }

    // Seed scenario 4: the public-object rule, Shape A.
    #[test]
    fn seed_scenario_public_object_rule() {
        let api = api();
        let cancel = cancel();

        assert!(api.auth_query(AuthQueryRequest { user_id: 0, object_id: 0, action: Action::Access }, &cancel).unwrap().success);
        assert!(!api.auth_query(AuthQueryRequest { user_id: 0, object_id: 0, action: Action::Update }, &cancel).unwrap().success);
        assert!(api.auth_query(AuthQueryRequest { user_id: 5, object_id: 0, action: Action::Update }, &cancel).unwrap().success);
    }

    // Seed scenario 6 (single-process approximation): repeated identical UpdateRole calls
    // converge to exactly one Role row and one RoleName row.
    #[test]
    fn seed_scenario_repeated_identical_update_role_converges() {
        let api = api();
        let cancel = cancel();

        for _ in 0..5 {
            let resp = api
                .update_role(UpdateRoleRequest { name: "viewer".to_string(), object_id: 9, list: vec![Action::Access] }, &cancel)
                .unwrap();
            assert!(resp.success);
        }

        assert_eq!(api.store().role_name_count(), 1);
        assert_eq!(api.store().role_count(), 1);
    }

    #[test]
    fn list_user_roles_reflects_assignment() {
        let api = api();
        let cancel = cancel();

        api.update_role(
            UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Update] },
            &cancel,
        )
        .unwrap();
        api.update_user(
            UpdateUserRequest { user_id: 42, list: vec![UserRoleRequest { name: "editor".to_string(), object_id: 7 }] },
            &cancel,
        )
        .unwrap();

        let resp = api.list_user_roles(ListUserRolesRequest { id: 42 }, &cancel).unwrap();
        assert_eq!(resp.list.len(), 1);
        assert_eq!(resp.list[0].name, "editor");
        assert_eq!(resp.list[0].object_id, 7);
    }

    // P7: a removed role's name never resurfaces in a subsequent listing.
    #[test]
    fn cache_coherence_after_role_removal() {
        let api = api();
        let cancel = cancel();

        api.update_role(
            UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Update] },
            &cancel,
        )
        .unwrap();
        api.update_user(
            UpdateUserRequest { user_id: 42, list: vec![UserRoleRequest { name: "editor".to_string(), object_id: 7 }] },
            &cancel,
        )
        .unwrap();

        // Populate the cache before the name is removed.
        api.list_user_roles(ListUserRolesRequest { id: 42 }, &cancel).unwrap();

        api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![] }, &cancel).unwrap();

        let resp = api.list_roles(ListRolesRequest { ids: vec![7] }, &cancel).unwrap();
        assert!(resp.list.iter().all(|v| v.name != "editor"));
    }

    #[test]
    fn oracle_backed_api_delegates_decisions() {
        let api = QueryApi::new(MemoryStore::new(), OracleEngine::new(NullOracle::allow_all()));
        let cancel = cancel();

        let resp = api.auth_query(AuthQueryRequest { user_id: 7, object_id: 3, action: Action::Delete }, &cancel).unwrap();
        assert!(resp.success);
    }
}
