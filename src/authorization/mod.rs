//! Authorization logic: joining stored roles into wire-shaped views (§4.4) and deciding
//! authorization queries (§4.5) — role resolution plus a pluggable check, generalized
//! from per-request user ACLs to a cache-backed, store-wide decision procedure.

pub mod decision;
pub mod oracle;

pub use self::decision::{DecisionEngine, FlagMatchEngine, OracleEngine};
pub use self::oracle::{NullOracle, OracleInput, OracleUserRole, PolicyOracle};

use crate::cache::NameCache;
use crate::error::Error;
use crate::models::{actions_of, Role, RoleView};
use crate::store::{CancellationToken, StoreOps};

/// Joins `roles` with their `RoleName.name` through `cache`, per the two-phase protocol
/// of §4.4: optimistic shared-access resolution for every `nameId` at once, then — for
/// whatever is still missing — a single IN-list fetch from `store`, installed into the
/// cache before views are emitted. Output length and order match `roles`.
pub fn assemble<S: StoreOps + ?Sized>(
    roles: &[Role],
    cache: &NameCache,
    store: &S,
    cancel: &CancellationToken,
) -> Result<Vec<RoleView>, Error> {
    let name_ids: Vec<u64> = roles.iter().map(|r| r.name_id).collect();
    let names = cache.lookup_many(&name_ids, cancel, |missing, cancel| {
        Ok(store.find_role_names_by_ids(missing, cancel)?.into_iter().map(|row| (row.id, row.name)).collect())
    })?;

    roles
        .iter()
        .map(|role| {
            let name = names.get(&role.name_id).cloned().ok_or(Error::NotFound)?;
            Ok(RoleView { name, object_id: role.object_id, list: actions_of(role.action_flags) })
        })
        .collect()
}
