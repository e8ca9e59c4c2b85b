//! In-process `Store` implementation used by this crate's own tests: a hand-written
//! stand-in for the real, diesel-backed repo.
//!
//! All state lives behind an `Arc<Mutex<_>>` shared between the store and any open
//! transaction; every operation takes the lock for the length of the call. A transaction
//! snapshots the tables at `begin()` and restores that snapshot on `rollback()` —
//! sufficient for exercising atomicity in a single-process test, though it does not model
//! true concurrent-writer isolation the way `DieselStore` does.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::models::{Role, RoleName, UserRole};

use super::{CancellationToken, Store, StoreOps, StoreTransaction};

#[derive(Default, Clone)]
struct Tables {
    role_names: Vec<RoleName>,
    roles: Vec<Role>,
    user_roles: Vec<UserRole>,
    next_id: u64,
}

impl Tables {
    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Knobs used by the mutation engine's atomicity tests: each simulates a fault partway
/// through a transaction so the caller can observe that the rest of the body never runs
/// and the store is left exactly as `rollback` left it.
#[derive(Default)]
struct FailureInjection {
    /// P5: the next `insert_user_role` for the given user fails instead of succeeding.
    fail_user_role_insert_for: Option<u64>,
    /// Cancels the given token right after the next `insert_role_name` succeeds, so the
    /// following store call inside the same transaction observes `Error::Canceled`.
    cancel_after_next_role_name_insert: Option<CancellationToken>,
    /// Cancels the given token right after the next `insert_user_role` succeeds.
    cancel_after_next_user_role_insert: Option<CancellationToken>,
    /// Panics the next time `insert_user_role` is called for the given user.
    panic_on_next_user_role_insert_for: Option<u64>,
}

fn find_role_name_by_id(tables: &Mutex<Tables>, id: u64) -> Result<RoleName, Error> {
    tables.lock().unwrap().role_names.iter().find(|n| n.id == id).cloned().ok_or(Error::NotFound)
}

fn find_role_name_by_name(tables: &Mutex<Tables>, name: &str) -> Result<RoleName, Error> {
    tables.lock().unwrap().role_names.iter().find(|n| n.name == name).cloned().ok_or(Error::NotFound)
}

fn find_role_names_by_ids(tables: &Mutex<Tables>, ids: &[u64]) -> Result<Vec<RoleName>, Error> {
    Ok(tables.lock().unwrap().role_names.iter().filter(|n| ids.contains(&n.id)).cloned().collect())
}

fn insert_role_name(tables: &Mutex<Tables>, inject: &Mutex<FailureInjection>, name: &str) -> Result<RoleName, Error> {
    let row = {
        let mut tables = tables.lock().unwrap();
        if tables.role_names.iter().any(|n| n.name == name) {
            return Err(Error::Conflict(format!("role name {:?} already exists", name)));
        }
        let id = tables.alloc_id();
        let row = RoleName { id, name: name.to_string() };
        tables.role_names.push(row.clone());
        row
    };
    if let Some(cancel) = inject.lock().unwrap().cancel_after_next_role_name_insert.take() {
        cancel.cancel();
    }
    Ok(row)
}

fn delete_orphan_role_names(tables: &Mutex<Tables>) -> Result<u64, Error> {
    let mut tables = tables.lock().unwrap();
    let referenced: HashSet<u64> = tables.roles.iter().map(|r| r.name_id).collect();
    let before = tables.role_names.len();
    tables.role_names.retain(|n| referenced.contains(&n.id));
    Ok((before - tables.role_names.len()) as u64)
}

fn find_role_by_id(tables: &Mutex<Tables>, id: u64) -> Result<Role, Error> {
    tables.lock().unwrap().roles.iter().find(|r| r.id == id).cloned().ok_or(Error::NotFound)
}

fn find_role_by_name_and_object(tables: &Mutex<Tables>, name: &str, object_id: u64) -> Result<Option<Role>, Error> {
    let tables = tables.lock().unwrap();
    let name_id = match tables.role_names.iter().find(|n| n.name == name) {
        Some(n) => n.id,
        None => return Ok(None),
    };
    Ok(tables.roles.iter().find(|r| r.name_id == name_id && r.object_id == object_id).cloned())
}

fn find_role_by_name_id_and_object(tables: &Mutex<Tables>, name_id: u64, object_id: u64) -> Result<Option<Role>, Error> {
    Ok(tables.lock().unwrap().roles.iter().find(|r| r.name_id == name_id && r.object_id == object_id).cloned())
}

fn find_roles_by_object_ids(tables: &Mutex<Tables>, object_ids: &[u64]) -> Result<Vec<Role>, Error> {
    Ok(tables.lock().unwrap().roles.iter().filter(|r| object_ids.contains(&r.object_id)).cloned().collect())
}

fn find_roles_for_user(tables: &Mutex<Tables>, user_id: u64) -> Result<Vec<Role>, Error> {
    let tables = tables.lock().unwrap();
    let role_ids: HashSet<u64> =
        tables.user_roles.iter().filter(|ur| ur.user_id == user_id).map(|ur| ur.role_id).collect();
    Ok(tables.roles.iter().filter(|r| role_ids.contains(&r.id)).cloned().collect())
}

fn find_roles_by_name_and_object_ids(tables: &Mutex<Tables>, name: &str, object_ids: &[u64]) -> Result<Vec<Role>, Error> {
    let tables = tables.lock().unwrap();
    let name_id = match tables.role_names.iter().find(|n| n.name == name) {
        Some(n) => n.id,
        None => return Ok(vec![]),
    };
    Ok(tables
        .roles
        .iter()
        .filter(|r| r.name_id == name_id && object_ids.contains(&r.object_id))
        .cloned()
        .collect())
}

fn insert_role(tables: &Mutex<Tables>, name_id: u64, object_id: u64, action_flags: u8) -> Result<Role, Error> {
    let mut tables = tables.lock().unwrap();
    if tables.roles.iter().any(|r| r.name_id == name_id && r.object_id == object_id) {
        return Err(Error::Conflict(format!("role ({}, {}) already exists", name_id, object_id)));
    }
    let id = tables.alloc_id();
    let row = Role { id, name_id, object_id, action_flags };
    tables.roles.push(row.clone());
    Ok(row)
}

fn update_role_action_flags(tables: &Mutex<Tables>, id: u64, action_flags: u8) -> Result<(), Error> {
    let mut tables = tables.lock().unwrap();
    match tables.roles.iter_mut().find(|r| r.id == id) {
        Some(r) => {
            r.action_flags = action_flags;
            Ok(())
        }
        None => Err(Error::NotFound),
    }
}

fn delete_role(tables: &Mutex<Tables>, id: u64) -> Result<u64, Error> {
    let mut tables = tables.lock().unwrap();
    let before = tables.roles.len();
    tables.roles.retain(|r| r.id != id);
    Ok((before - tables.roles.len()) as u64)
}

fn insert_user_role(tables: &Mutex<Tables>, inject: &Mutex<FailureInjection>, user_id: u64, role_id: u64) -> Result<UserRole, Error> {
    {
        let mut inject = inject.lock().unwrap();
        if inject.fail_user_role_insert_for == Some(user_id) {
            inject.fail_user_role_insert_for = None;
            return Err(Error::internal(failure::err_msg("injected failure")));
        }
        if inject.panic_on_next_user_role_insert_for == Some(user_id) {
            inject.panic_on_next_user_role_insert_for = None;
            drop(inject);
            panic!("injected panic for user {}", user_id);
        }
    }
    let row = {
        let mut tables = tables.lock().unwrap();
        let id = tables.alloc_id();
        let row = UserRole { id, user_id, role_id };
        tables.user_roles.push(row.clone());
        row
    };
    if let Some(cancel) = inject.lock().unwrap().cancel_after_next_user_role_insert.take() {
        cancel.cancel();
    }
    Ok(row)
}

fn delete_user_roles_by_user(tables: &Mutex<Tables>, user_id: u64) -> Result<u64, Error> {
    let mut tables = tables.lock().unwrap();
    let before = tables.user_roles.len();
    tables.user_roles.retain(|ur| ur.user_id != user_id);
    Ok((before - tables.user_roles.len()) as u64)
}

pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    inject: Arc<Mutex<FailureInjection>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            tables: Arc::new(Mutex::new(Tables::default())),
            inject: Arc::new(Mutex::new(FailureInjection::default())),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: make the next `insert_user_role` for `user_id` fail.
    pub fn fail_next_user_role_insert_for(&self, user_id: u64) {
        self.inject.lock().unwrap().fail_user_role_insert_for = Some(user_id);
    }

    /// Test hook: cancel `cancel` right after the next `insert_role_name` succeeds, so a
    /// later call in the same transaction observes cancellation mid-flight.
    pub fn cancel_after_next_role_name_insert(&self, cancel: CancellationToken) {
        self.inject.lock().unwrap().cancel_after_next_role_name_insert = Some(cancel);
    }

    /// Test hook: cancel `cancel` right after the next `insert_user_role` succeeds.
    pub fn cancel_after_next_user_role_insert(&self, cancel: CancellationToken) {
        self.inject.lock().unwrap().cancel_after_next_user_role_insert = Some(cancel);
    }

    /// Test hook: make the next `insert_user_role` for `user_id` panic instead of
    /// returning.
    pub fn panic_on_next_user_role_insert_for(&self, user_id: u64) {
        self.inject.lock().unwrap().panic_on_next_user_role_insert_for = Some(user_id);
    }

    pub fn role_name_count(&self) -> usize {
        self.tables.lock().unwrap().role_names.len()
    }

    pub fn role_count(&self) -> usize {
        self.tables.lock().unwrap().roles.len()
    }

    pub fn user_role_count_for(&self, user_id: u64) -> usize {
        self.tables.lock().unwrap().user_roles.iter().filter(|ur| ur.user_id == user_id).count()
    }
}

impl StoreOps for MemoryStore {
    fn find_role_name_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_id(&self.tables, id)
    }
    fn find_role_name_by_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_name(&self.tables, name)
    }
    fn find_role_names_by_ids(&self, ids: &[u64], cancel: &CancellationToken) -> Result<Vec<RoleName>, Error> {
        cancel.check()?;
        find_role_names_by_ids(&self.tables, ids)
    }
    fn insert_role_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        insert_role_name(&self.tables, &self.inject, name)
    }
    fn delete_orphan_role_names(&self, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_orphan_role_names(&self.tables)
    }
    fn find_role_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        find_role_by_id(&self.tables, id)
    }
    fn find_role_by_name_and_object(&self, name: &str, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_and_object(&self.tables, name, object_id)
    }
    fn find_role_by_name_id_and_object(&self, name_id: u64, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_id_and_object(&self.tables, name_id, object_id)
    }
    fn find_roles_by_object_ids(&self, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_object_ids(&self.tables, object_ids)
    }
    fn find_roles_for_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_for_user(&self.tables, user_id)
    }
    fn find_roles_by_name_and_object_ids(&self, name: &str, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_name_and_object_ids(&self.tables, name, object_ids)
    }
    fn insert_role(&self, name_id: u64, object_id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        insert_role(&self.tables, name_id, object_id, action_flags)
    }
    fn update_role_action_flags(&self, id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<(), Error> {
        cancel.check()?;
        update_role_action_flags(&self.tables, id, action_flags)
    }
    fn delete_role(&self, id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_role(&self.tables, id)
    }
    fn insert_user_role(&self, user_id: u64, role_id: u64, cancel: &CancellationToken) -> Result<UserRole, Error> {
        cancel.check()?;
        insert_user_role(&self.tables, &self.inject, user_id, role_id)
    }
    fn delete_user_roles_by_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_user_roles_by_user(&self.tables, user_id)
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    fn begin(&self, cancel: &CancellationToken) -> Result<MemoryTransaction, Error> {
        cancel.check()?;
        let checkpoint = self.tables.lock().unwrap().clone();
        Ok(MemoryTransaction {
            tables: self.tables.clone(),
            inject: self.inject.clone(),
            checkpoint: Some(checkpoint),
        })
    }
}

/// Owns `Arc` clones of the store's shared state rather than borrowing it, so the
/// transaction handle has no lifetime tied to the `Store` — `Store::Tx` cannot carry a
/// borrowed lifetime without generic associated types.
pub struct MemoryTransaction {
    tables: Arc<Mutex<Tables>>,
    inject: Arc<Mutex<FailureInjection>>,
    checkpoint: Option<Tables>,
}

impl StoreOps for MemoryTransaction {
    fn find_role_name_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_id(&self.tables, id)
    }
    fn find_role_name_by_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_name(&self.tables, name)
    }
    fn find_role_names_by_ids(&self, ids: &[u64], cancel: &CancellationToken) -> Result<Vec<RoleName>, Error> {
        cancel.check()?;
        find_role_names_by_ids(&self.tables, ids)
    }
    fn insert_role_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        insert_role_name(&self.tables, &self.inject, name)
    }
    fn delete_orphan_role_names(&self, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_orphan_role_names(&self.tables)
    }
    fn find_role_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        find_role_by_id(&self.tables, id)
    }
    fn find_role_by_name_and_object(&self, name: &str, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_and_object(&self.tables, name, object_id)
    }
    fn find_role_by_name_id_and_object(&self, name_id: u64, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_id_and_object(&self.tables, name_id, object_id)
    }
    fn find_roles_by_object_ids(&self, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_object_ids(&self.tables, object_ids)
    }
    fn find_roles_for_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_for_user(&self.tables, user_id)
    }
    fn find_roles_by_name_and_object_ids(&self, name: &str, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_name_and_object_ids(&self.tables, name, object_ids)
    }
    fn insert_role(&self, name_id: u64, object_id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        insert_role(&self.tables, name_id, object_id, action_flags)
    }
    fn update_role_action_flags(&self, id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<(), Error> {
        cancel.check()?;
        update_role_action_flags(&self.tables, id, action_flags)
    }
    fn delete_role(&self, id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_role(&self.tables, id)
    }
    fn insert_user_role(&self, user_id: u64, role_id: u64, cancel: &CancellationToken) -> Result<UserRole, Error> {
        cancel.check()?;
        insert_user_role(&self.tables, &self.inject, user_id, role_id)
    }
    fn delete_user_roles_by_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_user_roles_by_user(&self.tables, user_id)
    }
}

impl StoreTransaction for MemoryTransaction {
    fn commit(mut self) -> Result<(), Error> {
        self.checkpoint = None;
        Ok(())
    }

    fn rollback(mut self) -> Result<(), Error> {
        if let Some(checkpoint) = self.checkpoint.take() {
            *self.tables.lock().unwrap() = checkpoint;
        }
        Ok(())
    }
}

/// Safety net for any exit path that reaches neither `commit` nor `rollback` — a stray
/// early return or an unwind that outruns `catch_unwind` upstream. `commit`/`rollback`
/// already clear `checkpoint`, so this is a no-op on the path that called one of them.
impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            *self.tables.lock().unwrap() = checkpoint;
        }
    }
}
