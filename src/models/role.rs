//! `Role` grants an `actionFlags` bitmask on an `(name, object)` pair.

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: u64,
    pub name_id: u64,
    pub object_id: u64,
    pub action_flags: u8,
}
