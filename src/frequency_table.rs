use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::BuildHasher;

use crate::config::TableConfig;
use crate::error::TableError;
use crate::hasher::Djb2State;
use crate::hasher::hash_key;
use crate::slot::DebugKey;
use crate::slot::Occupied;
use crate::slot::Slot;
use crate::slot::SlotArray;
use crate::slot::copy_key;
use crate::snapshot::Snapshot;
use crate::snapshot::SnapshotEntry;
use crate::tally::Tally;

/// Result of walking a probe sequence for a key.
enum Probe {
    /// The key lives at this index.
    Found(usize),
    /// The key is absent; this is the first empty slot on its sequence.
    Vacant(usize),
}

/// Table statistics for tuning and debugging.
///
/// Only available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    /// Number of keys in the table.
    pub len: usize,
    /// Number of slots in the current generation.
    pub capacity: usize,
    /// Occupied slots found by a full scan. Always equal to `len`.
    pub occupied_slots: usize,
    /// `len / capacity`.
    pub load_factor: f64,
    /// Number of times the table has doubled since it was created.
    pub rehashes: usize,
    /// Longest distance any key sits from its ideal slot.
    pub max_probe_len: usize,
    /// Average distance of keys from their ideal slots.
    pub mean_probe_len: f64,
}

#[cfg(feature = "stats")]
impl TableStats {
    /// Pretty-print the statistics to `writer`.
    #[cfg(feature = "std")]
    pub fn print<W: std::io::Write>(&self, mut writer: W) -> std::io::Result<()> {
        writeln!(writer, "=== Frequency Table Statistics ===")?;
        writeln!(
            writer,
            "Population: {}/{} ({:.2}% load factor)",
            self.len,
            self.capacity,
            self.load_factor * 100.0
        )?;
        writeln!(writer, "Occupied slots: {}", self.occupied_slots)?;
        writeln!(writer, "Rehashes: {}", self.rehashes)?;
        writeln!(
            writer,
            "Probe length: max {}, mean {:.3}",
            self.max_probe_len, self.mean_probe_len
        )
    }
}

/// A word-frequency table using open addressing with linear probing.
///
/// `FrequencyTable` maps byte-string keys to signed `i64` counters. Keys are
/// copied into storage owned by the table on first insertion. The slot array
/// always has a power-of-two length and doubles before an insertion once the
/// load factor reaches the growth threshold (0.75 by default). Removal uses
/// backward-shift deletion, so there are no tombstones and lookups never
/// degrade after churn.
///
/// The table is hashed with [`Djb2State`] unless another [`BuildHasher`] is
/// supplied.
///
/// # Example
///
/// ```rust
/// use probe_tally::FrequencyTable;
///
/// let mut table = FrequencyTable::new();
/// table.increment("apple").unwrap();
/// table.increment("apple").unwrap();
/// table.upsert("pear", -3).unwrap();
///
/// // Decrements of unseen keys insert nothing.
/// assert_eq!(table.decrement("plum").unwrap(), None);
///
/// assert_eq!(table.find("apple"), Some(2));
/// assert_eq!(table.find("pear"), Some(-3));
/// assert_eq!(table.len(), 2);
///
/// assert!(table.delete("apple"));
/// assert_eq!(table.find("apple"), None);
/// ```
#[derive(Clone)]
pub struct FrequencyTable<S = Djb2State> {
    slots: SlotArray,
    len: usize,
    load_factor: f64,
    growth_threshold: f64,
    hash_builder: S,

    #[cfg(feature = "stats")]
    rehashes: usize,
}

impl<S> Debug for FrequencyTable<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("FrequencyTable")
                .field("slots", &self.slots)
                .field("len", &self.len)
                .field("capacity", &self.slots.capacity())
                .field("load_factor", &self.load_factor)
                .finish();
        }

        f.debug_map()
            .entries(self.iter().map(|(key, counter)| (DebugKey(key), counter)))
            .finish()
    }
}

impl FrequencyTable<Djb2State> {
    /// Creates an empty table with the default 4 slots and 0.75 growth
    /// threshold.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let table = FrequencyTable::new();
    /// assert_eq!(table.capacity(), 4);
    /// assert!(table.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(Djb2State)
    }

    /// Creates an empty table with at least `capacity` slots.
    ///
    /// The slot count is rounded up to a power of two.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let table = FrequencyTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 128);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Djb2State)
    }

    /// Creates an empty table from a validated [`TableConfig`].
    ///
    /// Fails with [`TableError::InvalidConfig`] if the growth threshold is
    /// not in `(0.0, 1.0]`, or [`TableError::AllocationFailure`] if the slot
    /// array cannot be allocated.
    pub fn with_config(config: TableConfig) -> Result<Self, TableError> {
        Self::with_config_and_hasher(config, Djb2State)
    }
}

impl Default for FrequencyTable<Djb2State> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FrequencyTable<S> {
    /// Iterates over `(key, counter)` pairs in slot index order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }
}

impl<S: BuildHasher> FrequencyTable<S> {
    /// Creates an empty table with default settings and the given hasher
    /// builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    /// use probe_tally::hasher::Djb2State;
    ///
    /// let mut table = FrequencyTable::with_hasher(Djb2State);
    /// table.increment("x").unwrap();
    /// assert_eq!(table.find("x"), Some(1));
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(TableConfig::DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates an empty table with at least `capacity` slots and the given
    /// hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            slots: SlotArray::new(capacity.max(1).next_power_of_two()),
            len: 0,
            load_factor: 0.0,
            growth_threshold: TableConfig::DEFAULT_GROWTH_THRESHOLD,
            hash_builder,
            #[cfg(feature = "stats")]
            rehashes: 0,
        }
    }

    /// Creates an empty table from a [`TableConfig`] and the given hasher
    /// builder.
    pub fn with_config_and_hasher(config: TableConfig, hash_builder: S) -> Result<Self, TableError> {
        let (capacity, growth_threshold) = config.resolve()?;
        Ok(Self {
            slots: SlotArray::try_new(capacity)?,
            len: 0,
            load_factor: 0.0,
            growth_threshold,
            hash_builder,
            #[cfg(feature = "stats")]
            rehashes: 0,
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

    /// Returns the number of slots in the current generation.
    ///
    /// Unlike std collections this is the raw slot count, not the number of
    /// keys that fit before growth.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Returns `len() / capacity()`, recomputed after every mutation.
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Returns the load factor at which the next insertion first doubles the
    /// table.
    pub fn growth_threshold(&self) -> f64 {
        self.growth_threshold
    }

    /// Returns a reference to the table's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Adds `delta` to `key`'s counter, inserting the key with a counter of
    /// `delta` if it is absent. Returns the resulting counter.
    ///
    /// If the load factor has reached the growth threshold the table doubles
    /// first, even when `key` turns out to be present.
    ///
    /// # Errors
    ///
    /// - [`TableError::AllocationFailure`] if growing or copying the key
    ///   fails. The table is unchanged apart from a completed growth.
    /// - [`TableError::CounterOverflow`] if the sum does not fit in `i64`.
    ///   The counter is unchanged.
    /// - [`TableError::InvariantViolation`] if probing visits every slot
    ///   without finding room. This cannot happen for valid configurations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let mut table = FrequencyTable::new();
    /// assert_eq!(table.upsert("a", 5).unwrap(), 5);
    /// assert_eq!(table.upsert("a", -7).unwrap(), -2);
    /// assert_eq!(table.upsert(b"\xffraw", 1).unwrap(), 1);
    /// ```
    pub fn upsert(&mut self, key: impl AsRef<[u8]>, delta: i64) -> Result<i64, TableError> {
        let key = key.as_ref();
        if self.load_factor >= self.growth_threshold {
            self.rehash()?;
        }

        let hash = hash_key(&self.hash_builder, key);
        match self.probe(hash, key)? {
            Probe::Found(index) => self.add_delta(index, delta),
            Probe::Vacant(index) => {
                let key = copy_key(key)?;
                self.slots[index] = Slot::Occupied(Occupied {
                    hash,
                    key,
                    counter: delta,
                });
                self.len += 1;
                self.update_load_factor();
                Ok(delta)
            }
        }
    }

    /// Adds `delta` to `key`'s counter only if the key is present.
    ///
    /// Returns the resulting counter, or `None` if the key is absent. Never
    /// inserts and never grows the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let mut table = FrequencyTable::new();
    /// assert_eq!(table.adjust("a", -1).unwrap(), None);
    /// assert!(table.is_empty());
    ///
    /// table.increment("a").unwrap();
    /// assert_eq!(table.adjust("a", -1).unwrap(), Some(0));
    /// assert_eq!(table.adjust("a", -1).unwrap(), Some(-1));
    /// ```
    pub fn adjust(&mut self, key: impl AsRef<[u8]>, delta: i64) -> Result<Option<i64>, TableError> {
        let key = key.as_ref();
        let hash = hash_key(&self.hash_builder, key);
        match self.lookup(hash, key) {
            Some(index) => self.add_delta(index, delta).map(Some),
            None => Ok(None),
        }
    }

    /// Counts one more occurrence of `key`. Same as `upsert(key, 1)`.
    pub fn increment(&mut self, key: impl AsRef<[u8]>) -> Result<i64, TableError> {
        self.upsert(key, 1)
    }

    /// Counts one fewer occurrence of an already present `key`. Same as
    /// `adjust(key, -1)`.
    pub fn decrement(&mut self, key: impl AsRef<[u8]>) -> Result<Option<i64>, TableError> {
        self.adjust(key, -1)
    }

    /// Returns `key`'s counter, or `None` if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let mut table = FrequencyTable::new();
    /// table.upsert("k", 42).unwrap();
    /// assert_eq!(table.find("k"), Some(42));
    /// assert_eq!(table.find("missing"), None);
    /// ```
    pub fn find(&self, key: impl AsRef<[u8]>) -> Option<i64> {
        let key = key.as_ref();
        let hash = hash_key(&self.hash_builder, key);
        let index = self.lookup(hash, key)?;
        match &self.slots[index] {
            Slot::Occupied(entry) => Some(entry.counter),
            Slot::Empty => None,
        }
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.find(key).is_some()
    }

    /// Removes `key`, returning `true` if it was present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let mut table = FrequencyTable::new();
    /// table.increment("gone").unwrap();
    /// assert!(table.delete("gone"));
    /// assert!(!table.delete("gone"));
    /// ```
    pub fn delete(&mut self, key: impl AsRef<[u8]>) -> bool {
        self.remove(key).is_some()
    }

    /// Removes `key`, returning its final counter.
    ///
    /// Entries displaced past the freed slot are shifted back so every
    /// remaining key stays reachable from its ideal slot without crossing an
    /// empty one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let mut table = FrequencyTable::new();
    /// table.upsert("k", 9).unwrap();
    /// assert_eq!(table.remove("k"), Some(9));
    /// assert_eq!(table.remove("k"), None);
    ///
    /// // Re-inserting starts from the new delta, not the old counter.
    /// assert_eq!(table.increment("k").unwrap(), 1);
    /// ```
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<i64> {
        let key = key.as_ref();
        let hash = hash_key(&self.hash_builder, key);
        let index = self.lookup(hash, key)?;

        let Slot::Occupied(entry) = self.slots.take(index) else {
            return None;
        };
        self.backward_shift(index);
        self.len -= 1;
        self.update_load_factor();

        Some(entry.counter)
    }

    /// Removes every key while keeping the current slot array.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.len = 0;
        self.update_load_factor();
    }

    /// Grows the table so `additional` more keys can be inserted without
    /// another rehash.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    ///
    /// let mut table = FrequencyTable::new();
    /// table.reserve(100).unwrap();
    /// let capacity = table.capacity();
    /// for i in 0..100 {
    ///     table.increment(i.to_string()).unwrap();
    /// }
    /// assert_eq!(table.capacity(), capacity);
    /// ```
    pub fn reserve(&mut self, additional: usize) -> Result<(), TableError> {
        let required = self.len.saturating_add(additional);
        if required == 0 {
            return Ok(());
        }

        // The last of `required` insertions checks the load with
        // `required - 1` keys present.
        let before_last = (required - 1) as f64;
        let mut capacity = self.slots.capacity();
        while before_last / capacity as f64 >= self.growth_threshold {
            capacity = capacity
                .checked_mul(2)
                .ok_or(TableError::AllocationFailure { slots: usize::MAX })?;
        }

        if capacity > self.slots.capacity() {
            self.resize(capacity)?;
        }
        Ok(())
    }

    /// Applies `upsert(key, delta)` for every pair, stopping at the first
    /// error.
    pub fn try_extend<K, I>(&mut self, pairs: I) -> Result<(), TableError>
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, i64)>,
    {
        for (key, delta) in pairs {
            self.upsert(key, delta)?;
        }
        Ok(())
    }

    /// Exports every `(key, counter)` pair in slot index order.
    ///
    /// The snapshot has exactly `len()` entries and borrows the table, so the
    /// table cannot change while it is alive.
    pub fn snapshot(&self) -> Snapshot<'_> {
        let mut entries = Vec::with_capacity(self.len);
        entries.extend(
            self.iter()
                .map(|(key, counter)| SnapshotEntry { key, counter }),
        );
        Snapshot::from_entries(entries)
    }

    /// Walks `key`'s probe sequence to the key itself or the first empty
    /// slot.
    fn probe(&self, hash: u64, key: &[u8]) -> Result<Probe, TableError> {
        let mut index = self.slots.ideal_index(hash);
        for _ in 0..self.slots.capacity() {
            match &self.slots[index] {
                Slot::Empty => return Ok(Probe::Vacant(index)),
                Slot::Occupied(entry) if entry.hash == hash && *entry.key == *key => {
                    return Ok(Probe::Found(index));
                }
                Slot::Occupied(_) => index = self.slots.next_index(index),
            }
        }

        Err(TableError::InvariantViolation {
            len: self.len,
            capacity: self.slots.capacity(),
        })
    }

    #[inline]
    fn lookup(&self, hash: u64, key: &[u8]) -> Option<usize> {
        match self.probe(hash, key) {
            Ok(Probe::Found(index)) => Some(index),
            Ok(Probe::Vacant(_)) | Err(_) => None,
        }
    }

    fn add_delta(&mut self, index: usize, delta: i64) -> Result<i64, TableError> {
        let (len, capacity) = (self.len, self.slots.capacity());
        let Slot::Occupied(entry) = &mut self.slots[index] else {
            return Err(TableError::InvariantViolation { len, capacity });
        };

        entry.counter = entry
            .counter
            .checked_add(delta)
            .ok_or(TableError::CounterOverflow {
                counter: entry.counter,
                delta,
            })?;
        Ok(entry.counter)
    }

    /// Fills the hole at `hole` by pulling back later entries of the same
    /// cluster whose ideal slot does not lie in `(hole, index]`.
    fn backward_shift(&mut self, mut hole: usize) {
        let mut index = self.slots.next_index(hole);
        loop {
            let hash = match &self.slots[index] {
                Slot::Empty => break,
                Slot::Occupied(entry) => entry.hash,
            };

            let gap = index.wrapping_sub(hole) & self.slots.mask();
            if self.slots.displacement(index, hash) >= gap {
                let moved = self.slots.take(index);
                self.slots[hole] = moved;
                hole = index;
            }

            index = self.slots.next_index(index);
        }
    }

    #[cold]
    fn rehash(&mut self) -> Result<(), TableError> {
        let capacity = self
            .slots
            .capacity()
            .checked_mul(2)
            .ok_or(TableError::AllocationFailure { slots: usize::MAX })?;
        self.resize(capacity)
    }

    /// Moves every entry into a new array of `capacity` slots.
    ///
    /// Allocation happens before anything is moved, so a failure leaves the
    /// table untouched.
    fn resize(&mut self, capacity: usize) -> Result<(), TableError> {
        if capacity <= self.len {
            return Err(TableError::InvariantViolation {
                len: self.len,
                capacity,
            });
        }

        let fresh = SlotArray::try_new(capacity)?;
        let old = core::mem::replace(&mut self.slots, fresh);
        for entry in old.into_occupied() {
            self.slots.place(entry);
        }
        self.update_load_factor();

        #[cfg(feature = "stats")]
        {
            self.rehashes += 1;
        }

        Ok(())
    }

    #[inline(always)]
    fn update_load_factor(&mut self) {
        self.load_factor = self.len as f64 / self.slots.capacity() as f64;
    }

    /// Returns a histogram of probe lengths: bin `i` counts keys sitting `i`
    /// slots past their ideal slot.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> Vec<usize> {
        let mut hist = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Slot::Occupied(entry) = slot {
                let distance = self.slots.displacement(index, entry.hash);
                if hist.len() <= distance {
                    hist.resize(distance + 1, 0);
                }
                hist[distance] += 1;
            }
        }
        hist
    }

    /// Returns current occupancy and probe statistics.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> TableStats {
        let hist = self.probe_histogram();
        let occupied_slots: usize = hist.iter().sum();
        let total_distance: usize = hist.iter().enumerate().map(|(d, n)| d * n).sum();

        TableStats {
            len: self.len,
            capacity: self.slots.capacity(),
            occupied_slots,
            load_factor: self.load_factor,
            rehashes: self.rehashes,
            max_probe_len: hist.len().saturating_sub(1),
            mean_probe_len: if occupied_slots == 0 {
                0.0
            } else {
                total_distance as f64 / occupied_slots as f64
            },
        }
    }
}

impl<S: BuildHasher> Tally for FrequencyTable<S> {
    fn upsert(&mut self, key: &[u8], delta: i64) -> Result<i64, TableError> {
        FrequencyTable::upsert(self, key, delta)
    }

    fn adjust(&mut self, key: &[u8], delta: i64) -> Result<Option<i64>, TableError> {
        FrequencyTable::adjust(self, key, delta)
    }

    fn find(&self, key: &[u8]) -> Option<i64> {
        FrequencyTable::find(self, key)
    }

    fn remove(&mut self, key: &[u8]) -> Option<i64> {
        FrequencyTable::remove(self, key)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    fn load_factor(&self) -> f64 {
        self.load_factor
    }

    fn snapshot(&self) -> Snapshot<'_> {
        FrequencyTable::snapshot(self)
    }
}

impl<'a, S> IntoIterator for &'a FrequencyTable<S> {
    type Item = (&'a [u8], i64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the `(key, counter)` pairs of a [`FrequencyTable`], in
/// slot index order.
///
/// This struct is created by [`FrequencyTable::iter`].
pub struct Iter<'a> {
    slots: core::slice::Iter<'a, Slot>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for slot in self.slots.by_ref() {
            if let Slot::Occupied(entry) = slot {
                self.remaining -= 1;
                return Some((&entry.key[..], entry.counter));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::hash::Hasher;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::hasher::hash33;

    /// Sends every key to the same ideal slot.
    #[derive(Clone, Default)]
    struct ConstantState(u64);

    struct ConstantHasher(u64);

    impl Hasher for ConstantHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    impl BuildHasher for ConstantState {
        type Hasher = ConstantHasher;

        fn build_hasher(&self) -> ConstantHasher {
            ConstantHasher(self.0)
        }
    }

    /// Hashes a key to the number it spells, so tests can pick ideal slots.
    #[derive(Clone, Default)]
    struct NumericState;

    struct NumericHasher(u64);

    impl Hasher for NumericHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                if b.is_ascii_digit() {
                    self.0 = self.0 * 10 + (b - b'0') as u64;
                }
            }
        }
    }

    impl BuildHasher for NumericState {
        type Hasher = NumericHasher;

        fn build_hasher(&self) -> NumericHasher {
            NumericHasher(0)
        }
    }

    fn occupied_count<S>(table: &FrequencyTable<S>) -> usize {
        table.slots.iter().filter(|slot| slot.is_occupied()).count()
    }

    /// Every key must be reachable from its ideal slot without crossing an
    /// empty slot.
    fn assert_reachable<S: BuildHasher>(table: &FrequencyTable<S>) {
        for (index, slot) in table.slots.iter().enumerate() {
            if let Slot::Occupied(entry) = slot {
                let mut probe = table.slots.ideal_index(entry.hash);
                while probe != index {
                    assert!(
                        table.slots[probe].is_occupied(),
                        "{:?} at {index} unreachable: {:#?}",
                        DebugKey(&entry.key),
                        table
                    );
                    probe = table.slots.next_index(probe);
                }
            }
        }
    }

    fn assert_consistent<S: BuildHasher>(table: &FrequencyTable<S>) {
        assert_eq!(occupied_count(table), table.len());
        assert_eq!(
            table.load_factor(),
            table.len() as f64 / table.capacity() as f64
        );
        assert!(table.capacity().is_power_of_two());
        assert_reachable(table);
    }

    #[test]
    fn insert_and_find() {
        let mut table = FrequencyTable::new();
        for k in 0..64 {
            let key = format!("key-{k}");
            assert_eq!(table.upsert(&key, k).unwrap(), k);
            assert_eq!(table.find(&key), Some(k), "{:#?}", table);
        }
        assert_eq!(table.len(), 64);
        for k in 0..64 {
            assert_eq!(table.find(format!("key-{k}")), Some(k));
        }
        assert_eq!(table.find("key-64"), None);
        assert_consistent(&table);
    }

    #[test]
    fn upsert_accumulates_and_goes_negative() {
        let mut table = FrequencyTable::new();
        table.upsert("w", 1).unwrap();
        table.upsert("w", 1).unwrap();
        assert_eq!(table.upsert("w", -5).unwrap(), -3);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn tokens_scenario() {
        let mut table = FrequencyTable::new();
        table.increment("a").unwrap();
        table.increment("a").unwrap();
        table.decrement("a").unwrap();
        table.increment("b").unwrap();

        let snapshot = table.snapshot().sorted(crate::SortOrder::Descending);
        let pairs: Vec<(&[u8], i64)> = snapshot.iter().map(|e| (e.key, e.counter)).collect();
        assert_eq!(pairs, vec![(&b"a"[..], 1), (&b"b"[..], 1)]);

        table.increment("a").unwrap();
        assert_eq!(table.find("a"), Some(2));
        assert_eq!(table.find("b"), Some(1));
    }

    #[test]
    fn decrement_of_unseen_key_is_noop() {
        let mut table = FrequencyTable::new();
        assert_eq!(table.decrement("z").unwrap(), None);
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), 4);
        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn growth_happens_once_at_threshold() {
        let mut table = FrequencyTable::new();
        assert_eq!(table.capacity(), 4);

        for key in ["a", "b", "c"] {
            table.increment(key).unwrap();
            assert_eq!(table.capacity(), 4);
        }
        assert_eq!(table.load_factor(), 0.75);

        table.increment("d").unwrap();
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.load_factor(), 0.5);
        assert_consistent(&table);
    }

    #[test]
    fn growth_triggers_on_update_of_existing_key() {
        let mut table = FrequencyTable::new();
        for key in ["a", "b", "c"] {
            table.increment(key).unwrap();
        }
        table.increment("a").unwrap();
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.find("a"), Some(2));
    }

    #[test]
    fn adjust_never_grows() {
        let mut table = FrequencyTable::new();
        for key in ["a", "b", "c"] {
            table.increment(key).unwrap();
        }
        assert_eq!(table.adjust("a", 10).unwrap(), Some(11));
        assert_eq!(table.adjust("q", 10).unwrap(), None);
        assert_eq!(table.capacity(), 4);
    }

    #[test]
    fn rehash_preserves_pairs() {
        let mut table = FrequencyTable::with_capacity(8);
        for (i, key) in ["one", "two", "three", "four", "five", "six"].iter().enumerate() {
            table.upsert(key, i as i64 - 2).unwrap();
        }
        let mut before = table.snapshot().to_owned_pairs();
        table.rehash().unwrap();
        let mut after = table.snapshot().to_owned_pairs();
        before.sort();
        after.sort();
        assert_eq!(before, after);
        assert_eq!(table.capacity(), 16);
        assert_consistent(&table);
    }

    #[test]
    fn explicit_collision() {
        let mut table = FrequencyTable::with_hasher(ConstantState(0));
        for k in 0..40 {
            table.upsert(k.to_string(), k).unwrap();
        }
        assert_eq!(table.len(), 40);
        for k in 0..40 {
            assert_eq!(table.find(k.to_string()), Some(k), "{:#?}", table);
        }
        assert_consistent(&table);
    }

    #[test]
    fn delete_in_middle_of_cluster_keeps_tail_reachable() {
        let mut table = FrequencyTable::with_capacity_and_hasher(16, ConstantState(3));
        for key in ["a", "b", "c", "d"] {
            table.increment(key).unwrap();
        }
        assert!(table.delete("b"));
        assert_eq!(table.find("c"), Some(1));
        assert_eq!(table.find("d"), Some(1));
        assert_eq!(table.find("b"), None);
        assert_consistent(&table);
    }

    #[test]
    fn backward_shift_skips_entries_at_home() {
        // 16 slots. "0" and "0x" want slot 0, "1" wants slot 1.
        // Layout: [0]="0", [1]="1", [2]="00" (displaced by 2).
        let mut table = FrequencyTable::with_capacity_and_hasher(16, NumericState);
        table.increment("0").unwrap();
        table.increment("1").unwrap();
        table.increment("00").unwrap();
        assert!(matches!(&table.slots[2], Slot::Occupied(e) if &*e.key == b"00"));

        assert!(table.delete("0"));

        // "1" stays home; "00" jumps over it into slot 0.
        assert!(matches!(&table.slots[0], Slot::Occupied(e) if &*e.key == b"00"));
        assert!(matches!(&table.slots[1], Slot::Occupied(e) if &*e.key == b"1"));
        assert!(!table.slots[2].is_occupied());
        assert_eq!(table.find("00"), Some(1));
        assert_consistent(&table);
    }

    #[test]
    fn backward_shift_wraps_around() {
        // Keys "15", "31" and "47" all want slot 15 of 16; they wrap to 0 and 1.
        let mut table = FrequencyTable::with_capacity_and_hasher(16, NumericState);
        for key in ["15", "31", "47"] {
            table.increment(key).unwrap();
        }
        assert!(matches!(&table.slots[1], Slot::Occupied(e) if &*e.key == b"47"));

        assert!(table.delete("15"));
        assert!(matches!(&table.slots[15], Slot::Occupied(e) if &*e.key == b"31"));
        assert!(matches!(&table.slots[0], Slot::Occupied(e) if &*e.key == b"47"));
        assert!(!table.slots[1].is_occupied());
        assert_consistent(&table);
    }

    #[test]
    fn delete_then_reinsert_starts_fresh() {
        let mut table = FrequencyTable::new();
        table.upsert("k", 10).unwrap();
        assert_eq!(table.remove("k"), Some(10));
        assert_eq!(table.upsert("k", 3).unwrap(), 3);
        assert_eq!(table.find("k"), Some(3));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn delete_missing_key() {
        let mut table = FrequencyTable::new();
        assert!(!table.delete("nope"));
        table.increment("yes").unwrap();
        assert!(!table.delete("nope"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn counter_overflow_is_rejected() {
        let mut table = FrequencyTable::new();
        table.upsert("max", i64::MAX).unwrap();
        assert_eq!(
            table.upsert("max", 1),
            Err(TableError::CounterOverflow {
                counter: i64::MAX,
                delta: 1
            })
        );
        assert_eq!(table.find("max"), Some(i64::MAX));
    }

    #[test]
    fn full_table_reports_invariant_violation() {
        let config = TableConfig::new().initial_capacity(2).growth_threshold(1.0);
        let mut table = FrequencyTable::with_config(config).unwrap();
        table.increment("a").unwrap();
        table.increment("b").unwrap();
        assert_eq!(table.load_factor(), 1.0);

        // Sabotage the threshold so the next insert cannot grow.
        table.growth_threshold = f64::INFINITY;
        assert_eq!(
            table.increment("c"),
            Err(TableError::InvariantViolation {
                len: 2,
                capacity: 2
            })
        );
        assert_eq!(table.find("c"), None);
        assert_eq!(table.increment("a").unwrap(), 2);
    }

    #[test]
    fn threshold_of_one_fills_then_grows() {
        let config = TableConfig::new().initial_capacity(1).growth_threshold(1.0);
        let mut table = FrequencyTable::with_config(config).unwrap();
        table.increment("a").unwrap();
        assert_eq!(table.capacity(), 1);
        table.increment("b").unwrap();
        assert_eq!(table.capacity(), 2);
        assert_consistent(&table);
    }

    #[test]
    fn snapshot_is_index_ordered_and_complete() {
        let mut table = FrequencyTable::with_capacity_and_hasher(8, NumericState);
        for key in ["5", "2", "7"] {
            table.increment(key).unwrap();
        }
        let keys: Vec<&[u8]> = table.snapshot().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![&b"2"[..], &b"5"[..], &b"7"[..]]);
        assert_eq!(table.iter().len(), 3);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut table = FrequencyTable::new();
        for k in 0..20 {
            table.increment(k.to_string()).unwrap();
        }
        let capacity = table.capacity();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.load_factor(), 0.0);
        assert_eq!(table.find("3"), None);
    }

    #[test]
    fn export_clear_reinsert_round_trip() {
        let mut table = FrequencyTable::new();
        for (i, word) in "the quick brown fox jumps over the lazy dog the end"
            .split(' ')
            .enumerate()
        {
            table.upsert(word, i as i64 - 4).unwrap();
        }
        let exported = table.snapshot().to_owned_pairs();
        table.clear();
        table
            .try_extend(exported.iter().map(|(k, c)| (k, *c)))
            .unwrap();

        let mut expected = exported.clone();
        let mut actual = table.snapshot().to_owned_pairs();
        expected.sort();
        actual.sort();
        assert_eq!(expected, actual);
    }

    #[test]
    fn reserve_avoids_rehash() {
        let mut table = FrequencyTable::new();
        table.reserve(3).unwrap();
        assert_eq!(table.capacity(), 4);
        table.reserve(4).unwrap();
        assert_eq!(table.capacity(), 8);
        for k in 0..4 {
            table.increment(k.to_string()).unwrap();
        }
        assert_eq!(table.capacity(), 8);
    }

    #[test]
    fn failed_growth_leaves_table_intact() {
        let mut table = FrequencyTable::new();
        for key in ["a", "b", "c"] {
            table.increment(key).unwrap();
        }
        let before = table.snapshot().to_owned_pairs();

        assert!(matches!(
            table.reserve(usize::MAX / 8),
            Err(TableError::AllocationFailure { .. })
        ));
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.load_factor(), 0.75);
        assert_eq!(table.snapshot().to_owned_pairs(), before);
        assert_consistent(&table);

        // The next upsert still grows normally.
        assert_eq!(table.increment("d").unwrap(), 1);
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.find("a"), Some(1));
        assert_consistent(&table);
    }

    #[test]
    fn clone_is_independent() {
        let mut original = FrequencyTable::new();
        original.upsert("x", 1).unwrap();
        let mut copy = original.clone();
        copy.upsert("x", 1).unwrap();
        copy.increment("y").unwrap();
        assert_eq!(original.find("x"), Some(1));
        assert_eq!(original.len(), 1);
        assert_eq!(copy.find("x"), Some(2));
    }

    #[test]
    fn debug_output() {
        let mut table = FrequencyTable::new();
        table.upsert("k", 2).unwrap();
        assert_eq!(format!("{:?}", table), "{\"k\": 2}");
        let verbose = format!("{:#?}", table);
        assert!(verbose.contains("load_factor"));
        assert!(verbose.contains(&format!("{:016x}", hash33(b"k"))));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn random_churn_against_model() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut table = FrequencyTable::new();
        let mut model: alloc::collections::BTreeMap<String, i64> = Default::default();

        for step in 0..20_000 {
            let key = format!("w{}", rng.random_range(0..300));
            match rng.random_range(0..10) {
                0..=5 => {
                    let delta = rng.random_range(-3..=3);
                    let expected = *model
                        .entry(key.clone())
                        .and_modify(|c| *c += delta)
                        .or_insert(delta);
                    assert_eq!(table.upsert(&key, delta).unwrap(), expected);
                }
                6 => {
                    let expected = model.get_mut(&key).map(|c| {
                        *c -= 1;
                        *c
                    });
                    assert_eq!(table.decrement(&key).unwrap(), expected);
                }
                _ => {
                    assert_eq!(table.remove(&key), model.remove(&key));
                }
            }

            if step % 997 == 0 {
                assert_consistent(&table);
            }
        }

        assert_consistent(&table);
        assert_eq!(table.len(), model.len());
        for (key, counter) in &model {
            assert_eq!(table.find(key), Some(*counter));
        }
    }

    #[test]
    #[cfg(feature = "stats")]
    fn stats_track_rehashes_and_probes() {
        let mut table = FrequencyTable::with_capacity_and_hasher(8, NumericState);
        for key in ["1", "9", "17"] {
            table.increment(key).unwrap();
        }
        assert_eq!(table.probe_histogram(), vec![1, 1, 1]);

        let stats = table.stats();
        assert_eq!(stats.len, 3);
        assert_eq!(stats.occupied_slots, 3);
        assert_eq!(stats.rehashes, 0);
        assert_eq!(stats.max_probe_len, 2);
        assert_eq!(stats.mean_probe_len, 1.0);

        for k in 100..110 {
            table.increment(k.to_string()).unwrap();
        }
        assert!(table.stats().rehashes >= 1);
    }

    #[test]
    #[cfg(all(feature = "stats", feature = "std"))]
    fn stats_print() {
        let mut table = FrequencyTable::new();
        table.increment("x").unwrap();
        let mut out = Vec::new();
        table.stats().print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Population: 1/4"));
    }
}
