//! `RoleName` is the textual label shared by roles differing only in `objectId`.
//!
//! This is a plain domain type; the diesel-backed `Store` implementation keeps its own
//! row type (`store::diesel_store::RoleNameRow`) and converts at the storage boundary,
//! since Postgres has no native unsigned integer column type.

#[derive(Debug, Clone, PartialEq)]
pub struct RoleName {
    pub id: u64,
    pub name: String,
}
