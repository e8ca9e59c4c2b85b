//! Wire-shaped role descriptor produced by Role Assembly (§4.4).

use serde_derive::{Deserialize, Serialize};

use super::action::Action;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleView {
    pub name: String,
    pub object_id: u64,
    pub list: Vec<Action>,
}
