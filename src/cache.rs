//! `NameCache` caches the `id -> name` mapping for role names (§4.4): "lock, check entry,
//! fall back to a provided loader" over an `RwLock` rather than a `Mutex`, so concurrent
//! readers never block each other while populating distinct names.
//!
//! Lookups run optimistically under a shared (read) lock; a miss re-checks under an
//! exclusive (write) lock before calling the loader, so two readers racing on the same
//! miss don't both hit the store. The lock is never held across store I/O: the loader
//! runs after the shared lock is dropped and before the exclusive lock is taken.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Error;
use crate::store::CancellationToken;

#[derive(Default)]
pub struct NameCache {
    names: RwLock<HashMap<u64, String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached name for `id`, calling `load` on a miss. `load` must not be
    /// called while holding either lock.
    pub fn get_or_load<F>(&self, id: u64, cancel: &CancellationToken, load: F) -> Result<String, Error>
    where
        F: FnOnce(&CancellationToken) -> Result<String, Error>,
    {
        cancel.check()?;

        if let Some(name) = self.names.read().unwrap().get(&id) {
            return Ok(name.clone());
        }

        let name = load(cancel)?;

        let mut names = self.names.write().unwrap();
        Ok(names.entry(id).or_insert(name).clone())
    }

    /// Resolves `ids` to names in two phases, per §4.4: an optimistic shared-access pass
    /// over every id, then — for whatever remains missing — an exclusive re-check (another
    /// writer may have filled the gap since the shared pass) before calling `load_missing`
    /// with the ids still unresolved. Neither lock is held while `load_missing` runs.
    pub fn lookup_many<F>(&self, ids: &[u64], cancel: &CancellationToken, load_missing: F) -> Result<HashMap<u64, String>, Error>
    where
        F: FnOnce(&[u64], &CancellationToken) -> Result<Vec<(u64, String)>, Error>,
    {
        cancel.check()?;

        let mut resolved = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();
        {
            let names = self.names.read().unwrap();
            for &id in ids {
                match names.get(&id) {
                    Some(name) => {
                        resolved.insert(id, name.clone());
                    }
                    None => missing.push(id),
                }
            }
        }

        if missing.is_empty() {
            return Ok(resolved);
        }

        {
            let names = self.names.read().unwrap();
            missing.retain(|id| {
                if let Some(name) = names.get(id) {
                    resolved.insert(*id, name.clone());
                    false
                } else {
                    true
                }
            });
        }

        if missing.is_empty() {
            return Ok(resolved);
        }

        let fetched = load_missing(&missing, cancel)?;

        let mut names = self.names.write().unwrap();
        for (id, name) in fetched {
            let name = names.entry(id).or_insert(name).clone();
            resolved.insert(id, name);
        }

        Ok(resolved)
    }

    pub fn install_many<I: IntoIterator<Item = (u64, String)>>(&self, entries: I) {
        let mut names = self.names.write().unwrap();
        for (id, name) in entries {
            names.insert(id, name);
        }
    }

    /// Drops all cached entries. Deletions invalidate rather than incrementally update,
    /// since the cache has no way to tell a delete-then-recreate apart from a rename.
    pub fn invalidate_all(&self) {
        self.names.write().unwrap().clear();
    }

    pub fn invalidate(&self, id: u64) {
        self.names.write().unwrap().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.names.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_or_load_caches_after_first_miss() {
        let cache = NameCache::new();
        let loads = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            let name = cache
                .get_or_load(1, &cancel, |_| {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok("admin".to_string())
                })
                .unwrap();
            assert_eq!(name, "admin");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = NameCache::new();
        let cancel = CancellationToken::new();
        cache.install_many(vec![(1, "admin".to_string())]);
        assert_eq!(cache.len(), 1);

        cache.invalidate(1);
        assert!(cache.is_empty());

        let name = cache.get_or_load(1, &cancel, |_| Ok("moderator".to_string())).unwrap();
        assert_eq!(name, "moderator");
    }

    #[test]
    fn canceled_token_short_circuits_loader() {
        let cache = NameCache::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache.get_or_load(1, &cancel, |c| c.check().map(|_| "unused".to_string())).unwrap_err();
        assert!(matches!(err, Error::Canceled));
    }
}
