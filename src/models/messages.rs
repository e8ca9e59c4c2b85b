//! Plain request/response shapes for the six RPC operations of §6.
//!
//! These are transport-agnostic: the RPC layer (out of scope for this crate, see §1)
//! encodes and frames them however it likes. Deriving `Serialize`/`Deserialize` here
//! only means a transport adapter doesn't need to redeclare the shapes.

use serde_derive::{Deserialize, Serialize};

use super::action::Action;
use super::role_view::RoleView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthQueryRequest {
    pub user_id: u64,
    pub object_id: u64,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRolesRequest {
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleListResponse {
    pub list: Vec<RoleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRightRequest {
    pub name: String,
    pub object_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionListResponse {
    pub list: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRoleRequest {
    pub name: String,
    pub object_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: u64,
    pub list: Vec<UserRoleRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: String,
    pub object_id: u64,
    pub list: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListUserRolesRequest {
    pub id: u64,
}
