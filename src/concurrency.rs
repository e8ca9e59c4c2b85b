//! A thin async surface over the otherwise straight-line core (§5): a boxed-future alias
//! plus a `CpuPool`-backed `spawn_fn` dispatch for running a blocking store call without
//! tying it up with the caller's thread.
//!
//! The RPC executor that would actually schedule concurrent requests is out of scope
//! (§1); this exists so `QueryApi` calls can be driven by more than one logical request
//! at a time — in this crate's own tests — without pulling in a full async runtime.

use futures::Future;
use futures_cpupool::CpuPool;

use crate::error::Error;

pub type BoxFuture<T> = Box<dyn Future<Item = T, Error = Error> + Send>;

/// Runs `f` on `pool`: the closure does its own blocking store I/O, and the returned
/// future resolves once that work completes.
pub fn spawn_blocking<F, T>(pool: &CpuPool, f: F) -> BoxFuture<T>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    Box::new(pool.spawn_fn(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::FlagMatchEngine;
    use crate::models::{Action, AuthQueryRequest, UpdateRoleRequest};
    use crate::query_api::QueryApi;
    use crate::store::memory::MemoryStore;
    use crate::store::CancellationToken;
    use std::sync::Arc;

    #[test]
    fn concurrent_auth_queries_observe_a_consistent_snapshot() {
        let api = Arc::new(QueryApi::new(MemoryStore::new(), FlagMatchEngine::new()));
        let cancel = CancellationToken::new();

        api.update_role(
            UpdateRoleRequest { name: "editor".to_string(), object_id: 7, list: vec![Action::Update] },
            &cancel,
        )
        .unwrap();

        let pool = CpuPool::new(4);
        let futures: Vec<BoxFuture<bool>> = (0..8)
            .map(|_| {
                let api = api.clone();
                let cancel = cancel.clone();
                spawn_blocking(&pool, move || {
                    let resp = api.auth_query(AuthQueryRequest { user_id: 5, object_id: 0, action: Action::Access }, &cancel)?;
                    Ok(resp.success)
                })
            })
            .collect();

        for f in futures {
            assert!(f.wait().unwrap());
        }
    }
}
