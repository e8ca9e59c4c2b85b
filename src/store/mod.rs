//! Store is the abstract transactional key-table interface the rest of the core
//! speaks through (§4.1). It exposes the four relations of §3 through small,
//! entity-shaped operations rather than a generic SQL builder — each method here is
//! one of a small set of primitive shapes (point read, equality/IN scan, subquery-in,
//! insert, update-single-column, delete-by-key, delete-by-predicate).
//!
//! Two implementations live in this module's submodules: [`diesel_store::DieselStore`]
//! (Postgres, via diesel + r2d2) and [`memory::MemoryStore`] (in-process, used by this
//! crate's own tests).

pub mod diesel_store;
pub mod memory;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::models::{Role, RoleName, UserRole};

/// A clonable cancellation handle, threaded through every Store call and the Policy
/// Oracle invocation (§5). Cooperative: operations check it at entry and return
/// `Error::Canceled` promptly rather than being preempted mid-flight.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Error::Canceled)` if this token has been canceled, `Ok(())` otherwise.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_canceled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Operations common to a `Store` handle and a `StoreTransaction` handle. Bound to a
/// transaction, these observe that transaction's snapshot and its own uncommitted writes.
pub trait StoreOps {
    fn find_role_name_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<RoleName, Error>;
    fn find_role_name_by_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error>;
    fn find_role_names_by_ids(&self, ids: &[u64], cancel: &CancellationToken) -> Result<Vec<RoleName>, Error>;
    fn insert_role_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error>;
    /// Canonical orphan sweep: `DELETE FROM role_names WHERE id NOT IN (SELECT DISTINCT name_id FROM roles)`.
    fn delete_orphan_role_names(&self, cancel: &CancellationToken) -> Result<u64, Error>;

    fn find_role_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<Role, Error>;
    /// Equality scan joining through `RoleName.name`; `None` if no such role exists.
    fn find_role_by_name_and_object(&self, name: &str, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error>;
    fn find_role_by_name_id_and_object(&self, name_id: u64, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error>;
    fn find_roles_by_object_ids(&self, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error>;
    /// Subquery-in: roles reachable from `userId` through `UserRole`.
    fn find_roles_for_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<Vec<Role>, Error>;
    fn find_roles_by_name_and_object_ids(&self, name: &str, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error>;
    fn insert_role(&self, name_id: u64, object_id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<Role, Error>;
    fn update_role_action_flags(&self, id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<(), Error>;
    fn delete_role(&self, id: u64, cancel: &CancellationToken) -> Result<u64, Error>;

    fn insert_user_role(&self, user_id: u64, role_id: u64, cancel: &CancellationToken) -> Result<UserRole, Error>;
    fn delete_user_roles_by_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<u64, Error>;
}

/// A transactional handle. `commit`/`rollback` are total: every code path that opens one
/// must call exactly one of them before the handle is dropped.
pub trait StoreTransaction: StoreOps {
    fn commit(self) -> Result<(), Error>;
    fn rollback(self) -> Result<(), Error>;
}

/// Entry point for obtaining scoped store handles. `StoreOps` methods called directly on
/// a `Store` run outside any transaction (auto-committing, one statement at a time).
pub trait Store: StoreOps {
    type Tx: StoreTransaction;

    fn begin(&self, cancel: &CancellationToken) -> Result<Self::Tx, Error>;
}
