//! `UserRole` is a many-to-many assignment row binding a user to a role.

#[derive(Debug, Clone, PartialEq)]
pub struct UserRole {
    pub id: u64,
    pub user_id: u64,
    pub role_id: u64,
}
