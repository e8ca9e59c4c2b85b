//! End-to-end scenarios over `QueryApi` backed by `MemoryStore`, exercising the seed
//! scenarios and testable properties (§8) the unit tests colocated with each module
//! don't already cover on their own.

use rbac_core::authorization::{FlagMatchEngine, NullOracle, OracleEngine};
use rbac_core::models::{Action, AuthQueryRequest, ListRolesRequest, ListUserRolesRequest, RoleRightRequest, UpdateRoleRequest, UpdateUserRequest, UserRoleRequest};
use rbac_core::query_api::QueryApi;
use rbac_core::store::memory::MemoryStore;
use rbac_core::store::CancellationToken;

fn api() -> QueryApi<MemoryStore, FlagMatchEngine> {
    QueryApi::new(MemoryStore::new(), FlagMatchEngine::new())
}

#[test]
fn full_seed_scenario_walkthrough() {
    let _ = env_logger::try_init();

    let api = api();
    let cancel = CancellationToken::new();

    // 1. Empty store, grant editor@7 access+update.
    let resp = api
        .update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Access, Action::Update] }, &cancel)
        .unwrap();
    assert!(resp.success);
    let rights = api.role_right(RoleRightRequest { name: "editor".to_string(), object_id: 7 }, &cancel).unwrap();
    assert_eq!(rights.list, vec![Action::Access, Action::Update]);
    assert_eq!(api.store().role_name_count(), 1);
    assert_eq!(api.store().role_count(), 1);

    // 2. Assign to user 42, then check both allowed and denied actions.
    api.update_user(UpdateUserRequest { user_id: 42, list: vec![UserRoleRequest { name: "editor".to_string(), object_id: 7 }] }, &cancel)
        .unwrap();
    assert!(api.auth_query(AuthQueryRequest { user_id: 42, object_id: 7, action: Action::Update }, &cancel).unwrap().success);
    assert!(!api.auth_query(AuthQueryRequest { user_id: 42, object_id: 7, action: Action::Delete }, &cancel).unwrap().success);

    // 3. Clear the role: ListRoles empties out, RoleName count drops to zero.
    api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![] }, &cancel).unwrap();
    assert!(api.list_roles(ListRolesRequest { ids: vec![7] }, &cancel).unwrap().list.is_empty());
    assert_eq!(api.store().role_name_count(), 0);

    // 4. Public object rule.
    assert!(api.auth_query(AuthQueryRequest { user_id: 0, object_id: 0, action: Action::Access }, &cancel).unwrap().success);
    assert!(!api.auth_query(AuthQueryRequest { user_id: 0, object_id: 0, action: Action::Update }, &cancel).unwrap().success);
    assert!(api.auth_query(AuthQueryRequest { user_id: 5, object_id: 0, action: Action::Update }, &cancel).unwrap().success);
}

#[test]
fn empty_name_is_treated_as_any_other_name_once_it_reaches_the_core() {
    // Scenario 5 (§8): wire-layer validation is out of scope for this crate; the core
    // itself must not special-case an empty name.
    let api = api();
    let cancel = CancellationToken::new();

    let resp = api.update_role(UpdateRoleRequest { name: String::new(), object_id: 1, list: vec![Action::Access] }, &cancel).unwrap();
    assert!(resp.success);

    let rights = api.role_right(RoleRightRequest { name: String::new(), object_id: 1 }, &cancel).unwrap();
    assert_eq!(rights.list, vec![Action::Access]);
}

#[test]
fn p3_orphan_cleanup_removes_role_name_only_when_last_role_is_gone() {
    let api = api();
    let cancel = CancellationToken::new();

    api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Access] }, &cancel).unwrap();
    api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 9, list: vec![Action::Access] }, &cancel).unwrap();
    assert_eq!(api.store().role_name_count(), 1);
    assert_eq!(api.store().role_count(), 2);

    // Removing one of the two roles under "editor" must not sweep the name yet.
    api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![] }, &cancel).unwrap();
    assert_eq!(api.store().role_name_count(), 1);
    assert_eq!(api.store().role_count(), 1);

    // Removing the last one does sweep it.
    api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 9, list: vec![] }, &cancel).unwrap();
    assert_eq!(api.store().role_name_count(), 0);
    assert_eq!(api.store().role_count(), 0);
}

#[test]
fn p4_no_public_mutation() {
    let api = api();
    let cancel = CancellationToken::new();

    let resp = api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 0, list: vec![Action::Access] }, &cancel).unwrap();
    assert!(!resp.success);
    assert_eq!(api.store().role_count(), 0);
    assert_eq!(api.store().role_name_count(), 0);
}

#[test]
fn p6_decision_soundness_shape_a() {
    let api = api();
    let cancel = CancellationToken::new();

    api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Update] }, &cancel).unwrap();
    api.update_user(UpdateUserRequest { user_id: 42, list: vec![UserRoleRequest { name: "editor".to_string(), object_id: 7 }] }, &cancel)
        .unwrap();

    for &(object_id, action, expected) in &[
        (7u64, Action::Update, true),
        (7u64, Action::Access, false),
        (9u64, Action::Update, false),
    ] {
        let resp = api.auth_query(AuthQueryRequest { user_id: 42, object_id, action }, &cancel).unwrap();
        assert_eq!(resp.success, expected, "object {} action {:?}", object_id, action);
    }
}

#[test]
fn list_roles_covers_multiple_objects_in_input_order() {
    let api = api();
    let cancel = CancellationToken::new();

    api.update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Update] }, &cancel).unwrap();
    api.update_role(UpdateRoleRequest { name: "viewer".to_string(), object_id: 9, list: vec![Action::Access] }, &cancel).unwrap();

    let resp = api.list_roles(ListRolesRequest { ids: vec![7, 9] }, &cancel).unwrap();
    let names: Vec<&str> = resp.list.iter().map(|v| v.name.as_str()).collect();
    assert!(names.contains(&"editor"));
    assert!(names.contains(&"viewer"));
    assert_eq!(resp.list.len(), 2);
}

#[test]
fn oracle_engine_is_a_drop_in_replacement_for_flag_match() {
    let api = QueryApi::new(MemoryStore::new(), OracleEngine::new(NullOracle::allow_all()));
    let cancel = CancellationToken::new();

    // Shape B is pure delegation; even an unassigned user is "allowed" by this oracle.
    let resp = api.auth_query(AuthQueryRequest { user_id: 99, object_id: 7, action: Action::Delete }, &cancel).unwrap();
    assert!(resp.success);
}

#[test]
fn cancellation_short_circuits_before_any_store_access() {
    let api = api();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = api
        .update_role(UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Access] }, &cancel)
        .unwrap_err();
    assert!(matches!(err, rbac_core::error::Error::Canceled));
    assert_eq!(api.store().role_count(), 0);
}
