//! Keyspace: One Logical Database
//!
//! A keyspace holds two maps over the same key domain:
//!
//! - `kv`: key -> value
//! - `ttl`: key -> absolute expiration deadline
//!
//! Every key in `ttl` is also in `kv`; a key without a `ttl` entry never
//! expires. Both maps live behind a single `RwLock`, so every operation,
//! including the bulk ones, is atomic with respect to the others.
//!
//! ## Expiry
//!
//! Keys with a deadline are expired in two ways:
//! 1. **Lazy**: every read path checks the deadline and removes the key
//!    from both maps when it has passed.
//! 2. **Active**: the background sweeper calls [`purge_expired`]
//!    periodically so keys that are never read again still get reclaimed.
//!
//! Lazy expiry is the authoritative mechanism; the sweeper only bounds
//! memory.
//!
//! [`purge_expired`]: Keyspace::purge_expired

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

/// What a SET should do to a key's expiration deadline.
///
/// The dispatcher maps the raw TTL token onto this: a positive integer
/// becomes `ExpireIn`, zero or negative becomes `Clear`, and a
/// non-numeric token (or no token at all) becomes `Keep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlUpdate {
    /// Leave any existing deadline unchanged.
    Keep,
    /// Remove any existing deadline.
    Clear,
    /// Set the deadline to now plus this many seconds.
    ExpireIn(u64),
}

#[derive(Debug, Default)]
struct Inner {
    kv: BTreeMap<String, String>,
    ttl: BTreeMap<String, SystemTime>,
}

impl Inner {
    /// Removes `key` from both maps if its deadline has passed.
    /// Returns true if the key was evicted.
    fn evict_if_expired(&mut self, key: &str, now: SystemTime) -> bool {
        match self.ttl.get(key) {
            Some(deadline) if *deadline <= now => {
                self.kv.remove(key);
                self.ttl.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Removes every key whose deadline is at or before `now`.
    /// Returns the number of keys removed.
    fn purge(&mut self, now: SystemTime) -> usize {
        // Collect first: the ttl map cannot be mutated mid-iteration.
        let expired: Vec<String> = self
            .ttl
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.kv.remove(key);
            self.ttl.remove(key);
        }

        expired.len()
    }
}

/// One logical database: string keys to string values, with optional
/// per-key expiration deadlines.
///
/// # Thread Safety
///
/// Designed to be handed out as `Arc<Keyspace>` by the registry and
/// shared across connection tasks, the sweeper, and the timed dumper.
///
/// # Example
///
/// ```
/// use reddb::storage::{Keyspace, TtlUpdate};
///
/// let ks = Keyspace::new(0);
/// ks.set("name", "reddb", TtlUpdate::Keep);
/// assert_eq!(ks.get("name"), Some("reddb".to_string()));
/// ```
#[derive(Debug)]
pub struct Keyspace {
    id: u64,
    inner: RwLock<Inner>,
}

impl Keyspace {
    /// Creates an empty keyspace with the given database id.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// The database id this keyspace was created under.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Gets the value for a key, lazily evicting it when expired.
    ///
    /// Wildcard keys (`*`, `**`) are routed by the dispatcher to
    /// [`values`](Self::values) and [`entries`](Self::entries); here they
    /// are ordinary keys.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = SystemTime::now();

        // Fast path: no deadline, or deadline still in the future.
        {
            let inner = self.inner.read().unwrap();
            match inner.ttl.get(key) {
                Some(deadline) if *deadline <= now => {} // needs eviction below
                _ => return inner.kv.get(key).cloned(),
            }
        }

        let mut inner = self.inner.write().unwrap();
        if inner.evict_if_expired(key, now) {
            return None;
        }
        // Raced with a concurrent SET that refreshed the deadline.
        inner.kv.get(key).cloned()
    }

    /// Writes a value and applies the requested deadline change.
    ///
    /// Writing a value with `TtlUpdate::Keep` leaves an existing deadline
    /// untouched.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: TtlUpdate) {
        let key = key.into();
        let mut inner = self.inner.write().unwrap();

        match ttl {
            TtlUpdate::Keep => {}
            TtlUpdate::Clear => {
                inner.ttl.remove(&key);
            }
            TtlUpdate::ExpireIn(seconds) => {
                let deadline = SystemTime::now() + Duration::from_secs(seconds);
                inner.ttl.insert(key.clone(), deadline);
            }
        }

        inner.kv.insert(key, value.into());
    }

    /// Returns true if the key is present and not expired.
    /// Expired keys are lazily removed.
    pub fn exists(&self, key: &str) -> bool {
        let now = SystemTime::now();

        {
            let inner = self.inner.read().unwrap();
            match inner.ttl.get(key) {
                Some(deadline) if *deadline <= now => {}
                _ => return inner.kv.contains_key(key),
            }
        }

        let mut inner = self.inner.write().unwrap();
        if inner.evict_if_expired(key, now) {
            return false;
        }
        inner.kv.contains_key(key)
    }

    /// Removes a key from both maps.
    ///
    /// Returns true if a value was removed.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        let removed = inner.kv.remove(key).is_some();
        inner.ttl.remove(key);
        removed
    }

    /// Removes any deadline from a key, making it persistent.
    ///
    /// Returns true if a deadline existed.
    pub fn clear_deadline(&self, key: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        inner.ttl.remove(key).is_some()
    }

    /// Clears both maps. Returns the number of values that were stored.
    pub fn flush(&self) -> usize {
        let mut inner = self.inner.write().unwrap();
        let count = inner.kv.len();
        inner.kv.clear();
        inner.ttl.clear();
        count
    }

    /// All non-expired values, in key order. Backs `GET *`.
    ///
    /// Expired entries found along the way are removed.
    pub fn values(&self) -> Vec<String> {
        let mut inner = self.inner.write().unwrap();
        inner.purge(SystemTime::now());
        inner.kv.values().cloned().collect()
    }

    /// All non-expired key/value pairs, in key order. Backs `GET **`.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut inner = self.inner.write().unwrap();
        inner.purge(SystemTime::now());
        inner
            .kv
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Looks up every key in order, under a single lock acquisition.
    ///
    /// Each element is the same as [`get`](Self::get) for that key.
    pub fn bulk_get(&self, keys: &[String]) -> Vec<Option<String>> {
        let now = SystemTime::now();
        let mut inner = self.inner.write().unwrap();

        keys.iter()
            .map(|key| {
                if inner.evict_if_expired(key, now) {
                    None
                } else {
                    inner.kv.get(key).cloned()
                }
            })
            .collect()
    }

    /// Writes every pair under a single lock acquisition, so readers see
    /// either all of them or none. Existing deadlines are left unchanged.
    ///
    /// Returns the number of pairs written.
    pub fn bulk_set(&self, pairs: Vec<(String, String)>) -> usize {
        let mut inner = self.inner.write().unwrap();
        let count = pairs.len();
        for (key, value) in pairs {
            inner.kv.insert(key, value);
        }
        count
    }

    /// Number of stored values, without an expiry check.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().kv.len()
    }

    /// Returns true if no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired key from both maps.
    ///
    /// Called by the background sweeper and before admin reporting.
    /// Returns the number of keys removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write().unwrap();
        inner.purge(SystemTime::now())
    }

    /// Copies out the live contents for a snapshot: the value map and,
    /// for keys with a deadline, the remaining TTL in seconds.
    ///
    /// Expired entries are filtered, not evicted; the clone is taken
    /// under the lock and the file write happens without it.
    pub fn export(&self) -> (BTreeMap<String, String>, BTreeMap<String, f64>) {
        let now = SystemTime::now();
        let inner = self.inner.read().unwrap();

        let mut data = BTreeMap::new();
        let mut remaining = BTreeMap::new();

        for (key, value) in &inner.kv {
            match inner.ttl.get(key) {
                Some(deadline) => {
                    if let Ok(left) = deadline.duration_since(now) {
                        data.insert(key.clone(), value.clone());
                        remaining.insert(key.clone(), left.as_secs_f64());
                    }
                    // Deadline already passed: skip the entry entirely.
                }
                None => {
                    data.insert(key.clone(), value.clone());
                }
            }
        }

        (data, remaining)
    }

    /// Replaces the entire contents with restored entries.
    ///
    /// Each entry optionally carries a remaining TTL in seconds; a
    /// positive one becomes a deadline of now plus that amount.
    ///
    /// Returns `(replaced, loaded)`: how many values were discarded and
    /// how many were inserted.
    pub fn restore(&self, entries: Vec<(String, String, Option<f64>)>) -> (usize, usize) {
        let now = SystemTime::now();
        let mut inner = self.inner.write().unwrap();

        let replaced = inner.kv.len();
        inner.kv.clear();
        inner.ttl.clear();

        let mut loaded = 0;
        for (key, value, remaining) in entries {
            if let Some(seconds) = remaining {
                // Non-positive or absurd TTLs restore the key without a
                // deadline rather than failing the whole load.
                if seconds > 0.0 {
                    if let Ok(left) = Duration::try_from_secs_f64(seconds) {
                        inner.ttl.insert(key.clone(), now + left);
                    }
                }
            }
            inner.kv.insert(key, value);
            loaded += 1;
        }

        (replaced, loaded)
    }

    /// Backdates or sets a deadline directly. Test-only.
    #[cfg(test)]
    pub(crate) fn force_deadline(&self, key: &str, deadline: SystemTime) {
        let mut inner = self.inner.write().unwrap();
        inner.ttl.insert(key.to_string(), deadline);
    }
}
