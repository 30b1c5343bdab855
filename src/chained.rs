use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::BuildHasher;

use crate::config::TableConfig;
use crate::error::TableError;
use crate::hasher::Djb2State;
use crate::hasher::hash_key;
use crate::slot::DebugKey;
use crate::slot::copy_key;
use crate::snapshot::Snapshot;
use crate::snapshot::SnapshotEntry;
use crate::tally::Tally;

/// Bucket count of [`ChainedTable::new`].
pub const DEFAULT_BUCKETS: usize = 1 << 5;

type Link = Option<Box<Node>>;

struct Node {
    hash: u64,
    key: Box<[u8]>,
    counter: i64,
    next: Link,
}

/// A word-frequency table resolving collisions with per-bucket linked lists.
///
/// `ChainedTable` honours the same contract as
/// [`FrequencyTable`](crate::FrequencyTable): byte-string keys, `i64`
/// counters, djb2 hashing, doubling at a load-factor threshold. Removing a
/// node never affects the reachability of other keys, so deletion is a plain
/// unlink. New keys are pushed at the front of their bucket's chain.
///
/// # Example
///
/// ```rust
/// use probe_tally::ChainedTable;
///
/// let mut table = ChainedTable::new();
/// assert_eq!(table.capacity(), 32);
///
/// table.increment("x").unwrap();
/// table.upsert("x", 4).unwrap();
/// assert_eq!(table.find("x"), Some(5));
/// assert_eq!(table.decrement("y").unwrap(), None);
/// assert_eq!(table.remove("x"), Some(5));
/// assert!(table.is_empty());
/// ```
pub struct ChainedTable<S = Djb2State> {
    buckets: Box<[Link]>,
    len: usize,
    load_factor: f64,
    growth_threshold: f64,
    hash_builder: S,
}

/// Allocates `capacity` empty buckets, or reports the failure.
fn try_buckets(capacity: usize) -> Result<Box<[Link]>, TableError> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(capacity)
        .map_err(|_| TableError::AllocationFailure { slots: capacity })?;
    buckets.resize_with(capacity, || None);
    Ok(buckets.into_boxed_slice())
}

/// Drops a chain iteratively so long chains cannot overflow the stack.
fn drop_chain(mut link: Link) {
    while let Some(mut node) = link {
        link = node.next.take();
    }
}

impl ChainedTable<Djb2State> {
    /// Creates an empty table with 32 buckets and a 0.75 growth threshold.
    pub fn new() -> Self {
        Self::with_hasher(Djb2State)
    }

    /// Creates an empty table from a validated [`TableConfig`].
    pub fn with_config(config: TableConfig) -> Result<Self, TableError> {
        Self::with_config_and_hasher(config, Djb2State)
    }
}

impl Default for ChainedTable<Djb2State> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> ChainedTable<S> {
    /// Creates an empty table with 32 buckets and the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        let mut buckets = Vec::with_capacity(DEFAULT_BUCKETS);
        buckets.resize_with(DEFAULT_BUCKETS, || None);
        Self {
            buckets: buckets.into_boxed_slice(),
            len: 0,
            load_factor: 0.0,
            growth_threshold: TableConfig::DEFAULT_GROWTH_THRESHOLD,
            hash_builder,
        }
    }

    /// Creates an empty table from a [`TableConfig`] and the given hasher
    /// builder. The configured capacity is the bucket count.
    pub fn with_config_and_hasher(config: TableConfig, hash_builder: S) -> Result<Self, TableError> {
        let (capacity, growth_threshold) = config.resolve()?;
        Ok(Self {
            buckets: try_buckets(capacity)?,
            len: 0,
            load_factor: 0.0,
            growth_threshold,
            hash_builder,
        })
    }

    /// Returns the number of keys in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `len() / capacity()`, the mean chain length.
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Adds `delta` to `key`'s counter, inserting the key at `delta` if it is
    /// absent. Returns the resulting counter.
    ///
    /// Doubles the bucket array first if the load factor has reached the
    /// growth threshold.
    pub fn upsert(&mut self, key: impl AsRef<[u8]>, delta: i64) -> Result<i64, TableError> {
        let key = key.as_ref();
        if self.load_factor >= self.growth_threshold {
            self.rehash()?;
        }

        let hash = hash_key(&self.hash_builder, key);
        let index = self.bucket_index(hash);
        if let Some(node) = find_node_mut(&mut self.buckets[index], hash, key) {
            return add_delta(node, delta);
        }

        let key = copy_key(key)?;
        let next = self.buckets[index].take();
        self.buckets[index] = Some(Box::new(Node {
            hash,
            key,
            counter: delta,
            next,
        }));
        self.len += 1;
        self.update_load_factor();
        Ok(delta)
    }

    /// Adds `delta` to `key`'s counter only if the key is present.
    pub fn adjust(&mut self, key: impl AsRef<[u8]>, delta: i64) -> Result<Option<i64>, TableError> {
        let key = key.as_ref();
        let hash = hash_key(&self.hash_builder, key);
        let index = self.bucket_index(hash);
        match find_node_mut(&mut self.buckets[index], hash, key) {
            Some(node) => add_delta(node, delta).map(Some),
            None => Ok(None),
        }
    }

    /// Same as `upsert(key, 1)`.
    pub fn increment(&mut self, key: impl AsRef<[u8]>) -> Result<i64, TableError> {
        self.upsert(key, 1)
    }

    /// Same as `adjust(key, -1)`.
    pub fn decrement(&mut self, key: impl AsRef<[u8]>) -> Result<Option<i64>, TableError> {
        self.adjust(key, -1)
    }

    /// Returns `key`'s counter, or `None` if the key is absent.
    pub fn find(&self, key: impl AsRef<[u8]>) -> Option<i64> {
        let key = key.as_ref();
        let hash = hash_key(&self.hash_builder, key);
        let mut cursor = self.buckets[self.bucket_index(hash)].as_deref();
        while let Some(node) = cursor {
            if node.hash == hash && *node.key == *key {
                return Some(node.counter);
            }
            cursor = node.next.as_deref();
        }
        None
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.find(key).is_some()
    }

    /// Removes `key`, returning `true` if it was present.
    pub fn delete(&mut self, key: impl AsRef<[u8]>) -> bool {
        self.remove(key).is_some()
    }

    /// Removes `key`, returning its final counter.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<i64> {
        let key = key.as_ref();
        let hash = hash_key(&self.hash_builder, key);
        let index = self.bucket_index(hash);

        let mut cursor = &mut self.buckets[index];
        while cursor
            .as_ref()
            .is_some_and(|node| node.hash != hash || *node.key != *key)
        {
            cursor = &mut cursor.as_mut()?.next;
        }

        let mut node = cursor.take()?;
        *cursor = node.next.take();
        self.len -= 1;
        self.update_load_factor();
        Some(node.counter)
    }

    /// Removes every key while keeping the bucket array.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            drop_chain(bucket.take());
        }
        self.len = 0;
        self.update_load_factor();
    }

    /// Exports every `(key, counter)` pair in bucket order, then chain order.
    pub fn snapshot(&self) -> Snapshot<'_> {
        let mut entries = Vec::with_capacity(self.len);
        for bucket in self.buckets.iter() {
            let mut cursor = bucket.as_deref();
            while let Some(node) = cursor {
                entries.push(SnapshotEntry {
                    key: &node.key,
                    counter: node.counter,
                });
                cursor = node.next.as_deref();
            }
        }
        Snapshot::from_entries(entries)
    }

    /// Length of the longest chain.
    pub fn longest_chain(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| {
                let mut len = 0;
                let mut cursor = bucket.as_deref();
                while let Some(node) = cursor {
                    len += 1;
                    cursor = node.next.as_deref();
                }
                len
            })
            .max()
            .unwrap_or(0)
    }

    #[inline(always)]
    fn bucket_index(&self, hash: u64) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    #[cold]
    fn rehash(&mut self) -> Result<(), TableError> {
        let capacity = self
            .buckets
            .len()
            .checked_mul(2)
            .ok_or(TableError::AllocationFailure { slots: usize::MAX })?;
        self.resize(capacity)
    }

    /// Relinks every node into `capacity` buckets. Nodes are moved, not
    /// reallocated, and a failed allocation leaves the table untouched.
    fn resize(&mut self, capacity: usize) -> Result<(), TableError> {
        debug_assert!(capacity.is_power_of_two());
        let fresh = try_buckets(capacity)?;
        let old = core::mem::replace(&mut self.buckets, fresh);

        let mask = capacity - 1;
        for mut link in old.into_vec() {
            while let Some(mut node) = link {
                link = node.next.take();
                let index = node.hash as usize & mask;
                node.next = self.buckets[index].take();
                self.buckets[index] = Some(node);
            }
        }
        self.update_load_factor();
        Ok(())
    }

    #[inline(always)]
    fn update_load_factor(&mut self) {
        self.load_factor = self.len as f64 / self.buckets.len() as f64;
    }
}

fn find_node_mut<'a>(head: &'a mut Link, hash: u64, key: &[u8]) -> Option<&'a mut Node> {
    let mut cursor = head.as_deref_mut();
    while let Some(node) = cursor {
        if node.hash == hash && *node.key == *key {
            return Some(node);
        }
        cursor = node.next.as_deref_mut();
    }
    None
}

fn add_delta(node: &mut Node, delta: i64) -> Result<i64, TableError> {
    node.counter = node
        .counter
        .checked_add(delta)
        .ok_or(TableError::CounterOverflow {
            counter: node.counter,
            delta,
        })?;
    Ok(node.counter)
}

impl<S> Drop for ChainedTable<S> {
    fn drop(&mut self) {
        for bucket in self.buckets.iter_mut() {
            drop_chain(bucket.take());
        }
    }
}

impl<S: Clone> Clone for ChainedTable<S> {
    fn clone(&self) -> Self {
        let mut buckets = Vec::with_capacity(self.buckets.len());
        for bucket in self.buckets.iter() {
            // Rebuild each chain in its original order.
            let mut nodes = Vec::new();
            let mut cursor = bucket.as_deref();
            while let Some(node) = cursor {
                nodes.push((node.hash, node.key.clone(), node.counter));
                cursor = node.next.as_deref();
            }

            let mut link = None;
            for (hash, key, counter) in nodes.into_iter().rev() {
                link = Some(Box::new(Node {
                    hash,
                    key,
                    counter,
                    next: link,
                }));
            }
            buckets.push(link);
        }

        Self {
            buckets: buckets.into_boxed_slice(),
            len: self.len,
            load_factor: self.load_factor,
            growth_threshold: self.growth_threshold,
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<S> Debug for ChainedTable<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for bucket in self.buckets.iter() {
            let mut cursor = bucket.as_deref();
            while let Some(node) = cursor {
                map.entry(&DebugKey(&node.key), &node.counter);
                cursor = node.next.as_deref();
            }
        }
        map.finish()
    }
}

impl<S: BuildHasher> Tally for ChainedTable<S> {
    fn upsert(&mut self, key: &[u8], delta: i64) -> Result<i64, TableError> {
        ChainedTable::upsert(self, key, delta)
    }

    fn adjust(&mut self, key: &[u8], delta: i64) -> Result<Option<i64>, TableError> {
        ChainedTable::adjust(self, key, delta)
    }

    fn find(&self, key: &[u8]) -> Option<i64> {
        ChainedTable::find(self, key)
    }

    fn remove(&mut self, key: &[u8]) -> Option<i64> {
        ChainedTable::remove(self, key)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn load_factor(&self) -> f64 {
        self.load_factor
    }

    fn snapshot(&self) -> Snapshot<'_> {
        ChainedTable::snapshot(self)
    }
}
