//! Data model for the authorization core: role names, roles, user-role assignments,
//! the action codec, and the wire shapes used by the Query API.

pub mod action;
pub mod messages;
pub mod role;
pub mod role_name;
pub mod role_view;
pub mod user_role;

pub use self::action::{actions_of, flag_of, flags_of, Action};
pub use self::messages::*;
pub use self::role::Role;
pub use self::role_name::RoleName;
pub use self::role_view::RoleView;
pub use self::user_role::UserRole;
