//! Postgres-backed `Store`: one row struct and connection pattern per table, pooled
//! through `r2d2::Pool<ConnectionManager<PgConnection>>`.
//!
//! Diesel has no native unsigned integer column type, so every row here is `i64`/`i16`
//! internally and converted to the `u64`/`u8`-typed domain structs in `crate::models` at
//! the boundary. `DieselTransaction` drives `AnsiTransactionManager` directly (`begin_transaction`
//! / `commit_transaction` / `rollback_transaction`) rather than diesel's `conn.transaction(||..)`
//! closure helper, since `StoreTransaction` hands callers an owned handle spanning several
//! calls instead of one closure body.

use std::convert::TryFrom;

use diesel::connection::TransactionManager;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use log::error;

use crate::error::Error;
use crate::models::{Role, RoleName, UserRole};
use crate::schema::{role_names, roles, user_roles};

use super::{CancellationToken, Store, StoreOps, StoreTransaction};

#[derive(Queryable, Identifiable)]
#[table_name = "role_names"]
struct RoleNameRow {
    id: i64,
    name: String,
}

impl From<RoleNameRow> for RoleName {
    fn from(row: RoleNameRow) -> Self {
        RoleName { id: row.id as u64, name: row.name }
    }
}

#[derive(Insertable)]
#[table_name = "role_names"]
struct NewRoleNameRow<'a> {
    name: &'a str,
}

#[derive(Queryable, Identifiable)]
#[table_name = "roles"]
struct RoleRow {
    id: i64,
    name_id: i64,
    object_id: i64,
    action_flags: i16,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id as u64,
            name_id: row.name_id as u64,
            object_id: row.object_id as u64,
            action_flags: row.action_flags as u8,
        }
    }
}

#[derive(Insertable)]
#[table_name = "roles"]
struct NewRoleRow {
    name_id: i64,
    object_id: i64,
    action_flags: i16,
}

#[derive(Queryable, Identifiable)]
#[table_name = "user_roles"]
struct UserRoleRow {
    id: i64,
    user_id: i64,
    role_id: i64,
}

impl From<UserRoleRow> for UserRole {
    fn from(row: UserRoleRow) -> Self {
        UserRole { id: row.id as u64, user_id: row.user_id as u64, role_id: row.role_id as u64 }
    }
}

#[derive(Insertable)]
#[table_name = "user_roles"]
struct NewUserRoleRow {
    user_id: i64,
    role_id: i64,
}

fn to_i64(id: u64) -> Result<i64, Error> {
    i64::try_from(id).map_err(|e| Error::internal(failure::Error::from_boxed_compat(Box::new(e))))
}

pub struct DieselStore {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl DieselStore {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        DieselStore { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, Error> {
        self.pool.get().map_err(Error::from)
    }
}

fn find_role_name_by_id(conn: &PgConnection, id: u64) -> Result<RoleName, Error> {
    let id = to_i64(id)?;
    role_names::table.find(id).first::<RoleNameRow>(conn).map(RoleName::from).map_err(Error::from)
}

fn find_role_name_by_name(conn: &PgConnection, name: &str) -> Result<RoleName, Error> {
    role_names::table
        .filter(role_names::name.eq(name))
        .first::<RoleNameRow>(conn)
        .map(RoleName::from)
        .map_err(Error::from)
}

fn find_role_names_by_ids(conn: &PgConnection, ids: &[u64]) -> Result<Vec<RoleName>, Error> {
    let ids: Result<Vec<i64>, Error> = ids.iter().copied().map(to_i64).collect();
    let ids = ids?;
    Ok(role_names::table
        .filter(role_names::id.eq_any(ids))
        .load::<RoleNameRow>(conn)?
        .into_iter()
        .map(RoleName::from)
        .collect())
}

fn insert_role_name(conn: &PgConnection, name: &str) -> Result<RoleName, Error> {
    diesel::insert_into(role_names::table)
        .values(NewRoleNameRow { name })
        .get_result::<RoleNameRow>(conn)
        .map(RoleName::from)
        .map_err(Error::from)
}

fn delete_orphan_role_names(conn: &PgConnection) -> Result<u64, Error> {
    let referenced = roles::table.select(roles::name_id).distinct();
    let deleted = diesel::delete(role_names::table.filter(role_names::id.ne_all(referenced))).execute(conn)?;
    Ok(deleted as u64)
}

fn find_role_by_id(conn: &PgConnection, id: u64) -> Result<Role, Error> {
    let id = to_i64(id)?;
    roles::table.find(id).first::<RoleRow>(conn).map(Role::from).map_err(Error::from)
}

fn find_role_by_name_id_and_object(conn: &PgConnection, name_id: u64, object_id: u64) -> Result<Option<Role>, Error> {
    let name_id = to_i64(name_id)?;
    let object_id = to_i64(object_id)?;
    let row = roles::table
        .filter(roles::name_id.eq(name_id))
        .filter(roles::object_id.eq(object_id))
        .first::<RoleRow>(conn)
        .optional()?;
    Ok(row.map(Role::from))
}

fn find_role_by_name_and_object(conn: &PgConnection, name: &str, object_id: u64) -> Result<Option<Role>, Error> {
    let name_row = role_names::table.filter(role_names::name.eq(name)).first::<RoleNameRow>(conn).optional()?;
    match name_row {
        Some(name_row) => find_role_by_name_id_and_object(conn, name_row.id as u64, object_id),
        None => Ok(None),
    }
}

fn find_roles_by_object_ids(conn: &PgConnection, object_ids: &[u64]) -> Result<Vec<Role>, Error> {
    let object_ids: Result<Vec<i64>, Error> = object_ids.iter().copied().map(to_i64).collect();
    let object_ids = object_ids?;
    Ok(roles::table
        .filter(roles::object_id.eq_any(object_ids))
        .load::<RoleRow>(conn)?
        .into_iter()
        .map(Role::from)
        .collect())
}

fn find_roles_for_user(conn: &PgConnection, user_id: u64) -> Result<Vec<Role>, Error> {
    let user_id = to_i64(user_id)?;
    let role_ids = user_roles::table.filter(user_roles::user_id.eq(user_id)).select(user_roles::role_id);
    Ok(roles::table.filter(roles::id.eq_any(role_ids)).load::<RoleRow>(conn)?.into_iter().map(Role::from).collect())
}

fn find_roles_by_name_and_object_ids(conn: &PgConnection, name: &str, object_ids: &[u64]) -> Result<Vec<Role>, Error> {
    let name_row = role_names::table.filter(role_names::name.eq(name)).first::<RoleNameRow>(conn).optional()?;
    let name_row = match name_row {
        Some(row) => row,
        None => return Ok(vec![]),
    };
    let object_ids: Result<Vec<i64>, Error> = object_ids.iter().copied().map(to_i64).collect();
    let object_ids = object_ids?;
    Ok(roles::table
        .filter(roles::name_id.eq(name_row.id))
        .filter(roles::object_id.eq_any(object_ids))
        .load::<RoleRow>(conn)?
        .into_iter()
        .map(Role::from)
        .collect())
}

fn insert_role(conn: &PgConnection, name_id: u64, object_id: u64, action_flags: u8) -> Result<Role, Error> {
    let row = NewRoleRow { name_id: to_i64(name_id)?, object_id: to_i64(object_id)?, action_flags: action_flags as i16 };
    diesel::insert_into(roles::table).values(row).get_result::<RoleRow>(conn).map(Role::from).map_err(Error::from)
}

fn update_role_action_flags(conn: &PgConnection, id: u64, action_flags: u8) -> Result<(), Error> {
    let id = to_i64(id)?;
    let affected = diesel::update(roles::table.find(id)).set(roles::action_flags.eq(action_flags as i16)).execute(conn)?;
    if affected == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}

fn delete_role(conn: &PgConnection, id: u64) -> Result<u64, Error> {
    let id = to_i64(id)?;
    Ok(diesel::delete(roles::table.find(id)).execute(conn)? as u64)
}

fn insert_user_role(conn: &PgConnection, user_id: u64, role_id: u64) -> Result<UserRole, Error> {
    let row = NewUserRoleRow { user_id: to_i64(user_id)?, role_id: to_i64(role_id)? };
    diesel::insert_into(user_roles::table)
        .values(row)
        .get_result::<UserRoleRow>(conn)
        .map(UserRole::from)
        .map_err(Error::from)
}

fn delete_user_roles_by_user(conn: &PgConnection, user_id: u64) -> Result<u64, Error> {
    let user_id = to_i64(user_id)?;
    Ok(diesel::delete(user_roles::table.filter(user_roles::user_id.eq(user_id))).execute(conn)? as u64)
}

impl StoreOps for DieselStore {
    fn find_role_name_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_id(&self.conn()?, id)
    }
    fn find_role_name_by_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_name(&self.conn()?, name)
    }
    fn find_role_names_by_ids(&self, ids: &[u64], cancel: &CancellationToken) -> Result<Vec<RoleName>, Error> {
        cancel.check()?;
        find_role_names_by_ids(&self.conn()?, ids)
    }
    fn insert_role_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        insert_role_name(&self.conn()?, name)
    }
    fn delete_orphan_role_names(&self, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_orphan_role_names(&self.conn()?)
    }
    fn find_role_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        find_role_by_id(&self.conn()?, id)
    }
    fn find_role_by_name_and_object(&self, name: &str, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_and_object(&self.conn()?, name, object_id)
    }
    fn find_role_by_name_id_and_object(&self, name_id: u64, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_id_and_object(&self.conn()?, name_id, object_id)
    }
    fn find_roles_by_object_ids(&self, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_object_ids(&self.conn()?, object_ids)
    }
    fn find_roles_for_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_for_user(&self.conn()?, user_id)
    }
    fn find_roles_by_name_and_object_ids(&self, name: &str, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_name_and_object_ids(&self.conn()?, name, object_ids)
    }
    fn insert_role(&self, name_id: u64, object_id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        insert_role(&self.conn()?, name_id, object_id, action_flags)
    }
    fn update_role_action_flags(&self, id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<(), Error> {
        cancel.check()?;
        update_role_action_flags(&self.conn()?, id, action_flags)
    }
    fn delete_role(&self, id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_role(&self.conn()?, id)
    }
    fn insert_user_role(&self, user_id: u64, role_id: u64, cancel: &CancellationToken) -> Result<UserRole, Error> {
        cancel.check()?;
        insert_user_role(&self.conn()?, user_id, role_id)
    }
    fn delete_user_roles_by_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_user_roles_by_user(&self.conn()?, user_id)
    }
}

impl Store for DieselStore {
    type Tx = DieselTransaction;

    fn begin(&self, cancel: &CancellationToken) -> Result<DieselTransaction, Error> {
        cancel.check()?;
        let conn = self.conn()?;
        conn.transaction_manager().begin_transaction(&*conn).map_err(Error::from)?;
        Ok(DieselTransaction { conn: Some(conn) })
    }
}

/// Holds the pooled connection for the lifetime of the transaction; returned to the pool
/// when the handle is dropped after `commit`/`rollback`.
pub struct DieselTransaction {
    conn: Option<PooledConnection<ConnectionManager<PgConnection>>>,
}

impl DieselTransaction {
    fn conn(&self) -> &PgConnection {
        self.conn.as_ref().expect("DieselTransaction used after commit/rollback")
    }
}

impl StoreOps for DieselTransaction {
    fn find_role_name_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_id(self.conn(), id)
    }
    fn find_role_name_by_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        find_role_name_by_name(self.conn(), name)
    }
    fn find_role_names_by_ids(&self, ids: &[u64], cancel: &CancellationToken) -> Result<Vec<RoleName>, Error> {
        cancel.check()?;
        find_role_names_by_ids(self.conn(), ids)
    }
    fn insert_role_name(&self, name: &str, cancel: &CancellationToken) -> Result<RoleName, Error> {
        cancel.check()?;
        insert_role_name(self.conn(), name)
    }
    fn delete_orphan_role_names(&self, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_orphan_role_names(self.conn())
    }
    fn find_role_by_id(&self, id: u64, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        find_role_by_id(self.conn(), id)
    }
    fn find_role_by_name_and_object(&self, name: &str, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_and_object(self.conn(), name, object_id)
    }
    fn find_role_by_name_id_and_object(&self, name_id: u64, object_id: u64, cancel: &CancellationToken) -> Result<Option<Role>, Error> {
        cancel.check()?;
        find_role_by_name_id_and_object(self.conn(), name_id, object_id)
    }
    fn find_roles_by_object_ids(&self, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_object_ids(self.conn(), object_ids)
    }
    fn find_roles_for_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_for_user(self.conn(), user_id)
    }
    fn find_roles_by_name_and_object_ids(&self, name: &str, object_ids: &[u64], cancel: &CancellationToken) -> Result<Vec<Role>, Error> {
        cancel.check()?;
        find_roles_by_name_and_object_ids(self.conn(), name, object_ids)
    }
    fn insert_role(&self, name_id: u64, object_id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<Role, Error> {
        cancel.check()?;
        insert_role(self.conn(), name_id, object_id, action_flags)
    }
    fn update_role_action_flags(&self, id: u64, action_flags: u8, cancel: &CancellationToken) -> Result<(), Error> {
        cancel.check()?;
        update_role_action_flags(self.conn(), id, action_flags)
    }
    fn delete_role(&self, id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_role(self.conn(), id)
    }
    fn insert_user_role(&self, user_id: u64, role_id: u64, cancel: &CancellationToken) -> Result<UserRole, Error> {
        cancel.check()?;
        insert_user_role(self.conn(), user_id, role_id)
    }
    fn delete_user_roles_by_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<u64, Error> {
        cancel.check()?;
        delete_user_roles_by_user(self.conn(), user_id)
    }
}

impl StoreTransaction for DieselTransaction {
    fn commit(mut self) -> Result<(), Error> {
        let conn = self.conn.take().expect("DieselTransaction used after commit/rollback");
        conn.transaction_manager().commit_transaction(&*conn).map_err(Error::from)
    }

    fn rollback(mut self) -> Result<(), Error> {
        let conn = self.conn.take().expect("DieselTransaction used after commit/rollback");
        conn.transaction_manager().rollback_transaction(&*conn).map_err(Error::from)
    }
}

/// Safety net for any exit path that reaches neither `commit` nor `rollback` — a stray
/// early return or an unwind that outruns `catch_unwind` upstream. Without this, the
/// pooled connection would return to r2d2 with an open Postgres transaction still on it,
/// and the next borrower would inherit it. `commit`/`rollback` already take `self.conn`,
/// so this is a no-op on the path that called one of them.
impl Drop for DieselTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.transaction_manager().rollback_transaction(&*conn) {
                error!("failed to roll back an abandoned transaction: {}", e);
            }
        }
    }
}
