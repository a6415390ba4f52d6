//! Keyspace Registry
//!
//! The registry maps small integer database ids to [`Keyspace`]
//! instances. Id 0 always exists and cannot be dropped. Keyspaces are
//! handed out as `Arc<Keyspace>`, so a command that has resolved its
//! database can finish even if another session drops that database
//! concurrently; sessions still pointing at a dropped id get a
//! "does not exist" error on their next lookup.

use crate::storage::keyspace::Keyspace;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors from registry mutations. The display strings are the exact
/// messages sent to clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Database {0} does not exist")]
    NotFound(u64),

    #[error("Database {0} already exists")]
    AlreadyExists(u64),

    #[error("Cannot drop default database (0)")]
    DefaultProtected,
}

/// Mapping from database id to keyspace.
#[derive(Debug)]
pub struct Registry {
    databases: RwLock<BTreeMap<u64, Arc<Keyspace>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates a registry seeded with the default database, id 0.
    pub fn new() -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(0, Arc::new(Keyspace::new(0)));

        Self {
            databases: RwLock::new(databases),
        }
    }

    /// Checks out the keyspace for an id.
    pub fn get(&self, id: u64) -> Option<Arc<Keyspace>> {
        self.databases.read().unwrap().get(&id).cloned()
    }

    /// Returns true if the id is currently allocated.
    pub fn contains(&self, id: u64) -> bool {
        self.databases.read().unwrap().contains_key(&id)
    }

    /// Creates a new keyspace.
    ///
    /// With `Some(id)`, fails if the id is taken. With `None`, allocates
    /// the smallest non-negative id not currently present. Returns the
    /// id of the new keyspace.
    pub fn create(&self, id: Option<u64>) -> Result<u64, RegistryError> {
        let mut databases = self.databases.write().unwrap();

        let id = match id {
            Some(id) => {
                if databases.contains_key(&id) {
                    return Err(RegistryError::AlreadyExists(id));
                }
                id
            }
            None => {
                let mut candidate = 0;
                while databases.contains_key(&candidate) {
                    candidate += 1;
                }
                candidate
            }
        };

        databases.insert(id, Arc::new(Keyspace::new(id)));
        Ok(id)
    }

    /// Removes a keyspace. Id 0 is protected.
    pub fn drop_db(&self, id: u64) -> Result<(), RegistryError> {
        if id == 0 {
            return Err(RegistryError::DefaultProtected);
        }

        let mut databases = self.databases.write().unwrap();
        if databases.remove(&id).is_none() {
            return Err(RegistryError::NotFound(id));
        }
        Ok(())
    }

    /// All keyspaces, in id order. Used by the sweeper and timed dumper.
    pub fn all(&self) -> Vec<Arc<Keyspace>> {
        self.databases.read().unwrap().values().cloned().collect()
    }

    /// `(id, live key count)` per database, in id order.
    ///
    /// Expired keys are purged before counting so the report never
    /// includes dead entries.
    pub fn list(&self) -> Vec<(u64, usize)> {
        let keyspaces = self.all();
        keyspaces
            .into_iter()
            .map(|ks| {
                ks.purge_expired();
                (ks.id(), ks.len())
            })
            .collect()
    }

    /// Number of databases.
    pub fn len(&self) -> usize {
        self.databases.read().unwrap().len()
    }

    /// Always false: the default database cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keyspace::TtlUpdate;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_default_database_exists() {
        let registry = Registry::new();
        assert!(registry.contains(0));
        assert!(registry.get(0).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_create_explicit_id() {
        let registry = Registry::new();

        assert_eq!(registry.create(Some(5)), Ok(5));
        assert!(registry.contains(5));
        assert_eq!(
            registry.create(Some(5)),
            Err(RegistryError::AlreadyExists(5))
        );
    }

    #[test]
    fn test_create_auto_assigns_smallest_free_id() {
        let registry = Registry::new();

        assert_eq!(registry.create(None), Ok(1));
        assert_eq!(registry.create(None), Ok(2));

        // A hole left by a drop is reused first.
        registry.drop_db(1).unwrap();
        assert_eq!(registry.create(None), Ok(1));
        assert_eq!(registry.create(None), Ok(3));
    }

    #[test]
    fn test_drop_default_is_protected() {
        let registry = Registry::new();
        assert_eq!(registry.drop_db(0), Err(RegistryError::DefaultProtected));
        assert!(registry.contains(0));
    }

    #[test]
    fn test_drop_missing() {
        let registry = Registry::new();
        assert_eq!(registry.drop_db(99), Err(RegistryError::NotFound(99)));
    }

    #[test]
    fn test_drop_existing() {
        let registry = Registry::new();

        registry.create(Some(2)).unwrap();
        assert_eq!(registry.drop_db(2), Ok(()));
        assert!(!registry.contains(2));
    }

    #[test]
    fn test_checkout_survives_drop() {
        let registry = Registry::new();

        registry.create(Some(1)).unwrap();
        let ks = registry.get(1).unwrap();
        ks.set("key", "value", TtlUpdate::Keep);

        registry.drop_db(1).unwrap();

        // The checked-out handle still works; new lookups fail.
        assert_eq!(ks.get("key"), Some("value".to_string()));
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn test_list_counts_live_keys() {
        let registry = Registry::new();

        let db0 = registry.get(0).unwrap();
        db0.set("a", "1", TtlUpdate::Keep);
        db0.set("b", "2", TtlUpdate::ExpireIn(100));
        db0.force_deadline("b", SystemTime::now() - Duration::from_secs(5));

        registry.create(Some(1)).unwrap();

        assert_eq!(registry.list(), vec![(0, 1), (1, 0)]);
    }
}
