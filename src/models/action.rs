//! Action enum and the bit-packing codec between it and `actionFlags`.

use serde_derive::{Deserialize, Serialize};

/// The closed set of actions a `Role` may grant on an object.
///
/// Bit `1 << (action as u8)` is the corresponding bit in `actionFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Access = 0,
    Create = 1,
    Update = 2,
    Delete = 3,
}

/// Canonical ordering used by `actions_of` and everywhere a `Vec<Action>` is emitted.
const ALL_ACTIONS: [Action; 4] = [Action::Access, Action::Create, Action::Update, Action::Delete];

/// `flagOf`: the single bit a given action occupies in `actionFlags`.
pub fn flag_of(action: Action) -> u8 {
    1 << (action as u8)
}

/// `flagsOf`: OR together the flags of every action in `actions`. Empty input yields 0.
///
/// Must be OR, never AND: AND would zero out any multi-action set and force every update
/// through the delete branch.
pub fn flags_of(actions: &[Action]) -> u8 {
    actions.iter().fold(0u8, |acc, &a| acc | flag_of(a))
}

/// `actionsOf`: the set bits of `flags`, in canonical order, deduplicated.
///
/// Bits 4-7 are reserved and are never surfaced here even if present in a stored row.
pub fn actions_of(flags: u8) -> Vec<Action> {
    ALL_ACTIONS.iter().cloned().filter(|&a| flags & flag_of(a) != 0).collect()
}
