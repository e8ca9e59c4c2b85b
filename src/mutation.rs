//! Mutation Engine (§4.6): `update_user` and `update_role`, the two transactional
//! procedures that keep the RBAC graph's orphan-cleanup invariants (I1-I6) intact.
//!
//! Both resolve their targets through the store first, then mutate under a single
//! transaction — whole-set replace semantics for `update_user`, a three-branch state
//! machine for `update_role` — with the §7 `Conflict`-then-retry-once policy covering
//! both unique indexes along the way.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error};

use crate::cache::NameCache;
use crate::error::Error;
use crate::models::{flags_of, Action, RoleName};
use crate::store::{CancellationToken, Store, StoreOps, StoreTransaction};

/// Runs `body` under `catch_unwind`, folding a caught panic into the same `Result` shape
/// as a regular failure so both paths rejoin before the commit/rollback decision (§4.6:
/// "a `recover` from a runtime panic inside a transaction scope forces rollback").
fn guarded<F>(body: F) -> Result<(), Error>
where
    F: FnOnce() -> Result<(), Error>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(Error::internal(failure::err_msg(format!("transaction panicked: {}", panic_message(&payload))))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Resolves a race on a unique index: if the insert lost to a concurrent writer, the row
/// it wanted now exists, so a single re-read recovers it. A second failure is surfaced as
/// the `Internal` error the conflicting insert already carries (§7: "if it recurs it is
/// reported as Internal").
fn find_or_create_role_name<T: StoreOps + ?Sized>(tx: &T, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
    match tx.find_role_name_by_name(name, cancel) {
        Ok(row) => Ok(row),
        Err(e) if e.is_not_found() => match tx.insert_role_name(name, cancel) {
            Ok(row) => Ok(row),
            Err(e) if e.is_conflict() => tx.find_role_name_by_name(name, cancel),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    }
}

/// Set-or-update a `Role`'s flags, retrying once through the same race window as
/// [`find_or_create_role_name`] (`(nameId, objectId)` is also unique, §3 I4).
fn set_role_flags<T: StoreOps + ?Sized>(
    tx: &T,
    name_id: u64,
    object_id: u64,
    flags: u8,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    match tx.find_role_by_name_id_and_object(name_id, object_id, cancel)? {
        Some(role) => tx.update_role_action_flags(role.id, flags, cancel),
        None => match tx.insert_role(name_id, object_id, flags, cancel) {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => match tx.find_role_by_name_id_and_object(name_id, object_id, cancel)? {
                Some(role) => tx.update_role_action_flags(role.id, flags, cancel),
                None => Err(Error::internal(failure::err_msg("role vanished after unique-index conflict"))),
            },
            Err(e) => Err(e),
        },
    }
}

/// `UpdateUser(userId, requestedRoles)` (§4.6). `requested` is the raw `(name, objectId)`
/// list from the wire request; duplicates are folded per-name into an object-id set before
/// the resolving query, matching the source's `extractNamesToObjectIds` grouping.
pub fn update_user<S: Store>(
    store: &S,
    user_id: u64,
    requested: &[(String, u64)],
    cancel: &CancellationToken,
) -> Result<bool, Error> {
    cancel.check()?;
    debug!("updating roles for user {}, {} requested pairs", user_id, requested.len());

    let mut by_name: HashMap<&str, Vec<u64>> = HashMap::new();
    for (name, object_id) in requested {
        let object_ids = by_name.entry(name.as_str()).or_insert_with(Vec::new);
        if !object_ids.contains(object_id) {
            object_ids.push(*object_id);
        }
    }

    // Unknown names or missing (name, objectId) rows are silently skipped: a name that
    // doesn't resolve to any role just contributes nothing to `role_ids`.
    let mut role_ids = Vec::new();
    for (name, object_ids) in &by_name {
        let roles = store.find_roles_by_name_and_object_ids(name, object_ids, cancel)?;
        role_ids.extend(roles.into_iter().map(|r| r.id));
    }

    if role_ids.is_empty() {
        store.delete_user_roles_by_user(user_id, cancel)?;
        return Ok(true);
    }

    let tx = store.begin(cancel)?;
    let outcome = guarded(|| {
        tx.delete_user_roles_by_user(user_id, cancel)?;
        for role_id in &role_ids {
            tx.insert_user_role(user_id, *role_id, cancel)?;
        }
        Ok(())
    });

    match outcome {
        Ok(()) => {
            tx.commit()?;
            Ok(true)
        }
        Err(Error::Canceled) => {
            let _ = tx.rollback();
            Err(Error::Canceled)
        }
        Err(e) => {
            error!("rolling back update_user for user {}: {}", user_id, e);
            let _ = tx.rollback();
            Err(Error::internal(e))
        }
    }
}

/// `UpdateRole(name, objectId, requestedActions)` (§4.6), implementing the state machine
/// of §4.6: `Absent -> Present(flags)` on a non-empty set, `Present(f) -> Present(flags)`
/// on update, `Present(f) -> Absent` (with orphan sweep and cache invalidation) when the
/// requested set is empty.
pub fn update_role<S: Store>(
    store: &S,
    cache: &NameCache,
    name: &str,
    object_id: u64,
    requested_actions: &[Action],
    cancel: &CancellationToken,
) -> Result<bool, Error> {
    cancel.check()?;
    debug!("updating role {:?}@{} to {} requested actions", name, object_id, requested_actions.len());

    // I6: the public object is never mutated by the core.
    if object_id == 0 {
        return Ok(false);
    }

    let flags = flags_of(requested_actions);

    if flags == 0 {
        return clear_role(store, cache, name, object_id, cancel);
    }

    let tx = store.begin(cancel)?;
    let outcome = guarded(|| {
        let role_name = find_or_create_role_name(&tx, name, cancel)?;
        set_role_flags(&tx, role_name.id, object_id, flags, cancel)
    });

    match outcome {
        Ok(()) => {
            tx.commit()?;
            Ok(true)
        }
        Err(Error::Canceled) => {
            let _ = tx.rollback();
            Err(Error::Canceled)
        }
        Err(e) => {
            error!("rolling back update_role {:?}@{}: {}", name, object_id, e);
            let _ = tx.rollback();
            Err(Error::internal(e))
        }
    }
}

/// The `flags == 0` branch of `update_role`: delete the `Role`, sweep any `RoleName` left
/// without a `Role`, and invalidate the Name Cache (it may now hold a stale entry for a
/// deleted name). A missing `Role` is not an error — the state machine's `Absent` case is
/// idempotent, so the call just reports success without writing anything.
fn clear_role<S: Store>(store: &S, cache: &NameCache, name: &str, object_id: u64, cancel: &CancellationToken) -> Result<bool, Error> {
    let role_name = match store.find_role_name_by_name(name, cancel) {
        Ok(row) => row,
        Err(e) if e.is_not_found() => return Ok(true),
        Err(e) => return Err(e),
    };

    let role = match store.find_role_by_name_id_and_object(role_name.id, object_id, cancel)? {
        Some(role) => role,
        None => return Ok(true),
    };

    store.delete_role(role.id, cancel)?;
    store.delete_orphan_role_names(cancel)?;
    cache.invalidate_all();

    Ok(true)
}
