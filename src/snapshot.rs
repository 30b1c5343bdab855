use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use crate::slot::DebugKey;

/// One exported `(key, counter)` pair.
///
/// The key borrows from the table the snapshot was taken from.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotEntry<'a> {
    /// The key bytes, exactly as they were inserted.
    pub key: &'a [u8],
    /// The counter at the time of the snapshot.
    pub counter: i64,
}

impl Debug for SnapshotEntry<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("")
            .field(&DebugKey(self.key))
            .field(&self.counter)
            .finish()
    }
}

/// Ordering applied by [`Snapshot::sort`].
///
/// Ties on the counter are always broken by ascending bytewise key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Highest counter first.
    #[default]
    Descending,
    /// Lowest counter first.
    Ascending,
}

impl SortOrder {
    /// Compares two entries under this order.
    pub fn compare(self, a: &SnapshotEntry<'_>, b: &SnapshotEntry<'_>) -> Ordering {
        let by_counter = match self {
            SortOrder::Descending => b.counter.cmp(&a.counter),
            SortOrder::Ascending => a.counter.cmp(&b.counter),
        };
        by_counter.then_with(|| a.key.cmp(b.key))
    }
}

/// A point-in-time export of every entry in a table.
///
/// Entries start out in storage order (slot index order for
/// [`FrequencyTable`](crate::FrequencyTable), bucket then chain order for
/// [`ChainedTable`](crate::ChainedTable)). Call [`sort`](Snapshot::sort) to
/// get a presentation order.
///
/// # Examples
///
/// ```rust
/// use probe_tally::FrequencyTable;
/// use probe_tally::SortOrder;
///
/// let mut table = FrequencyTable::new();
/// for word in ["b", "a", "b", "c", "a", "b"] {
///     table.increment(word).unwrap();
/// }
///
/// let mut snapshot = table.snapshot();
/// assert_eq!(snapshot.len(), table.len());
/// snapshot.sort(SortOrder::Descending);
///
/// let pairs: Vec<(&[u8], i64)> = snapshot.iter().map(|e| (e.key, e.counter)).collect();
/// assert_eq!(pairs, [(&b"b"[..], 3), (&b"a"[..], 2), (&b"c"[..], 1)]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot<'a> {
    entries: Vec<SnapshotEntry<'a>>,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn from_entries(entries: Vec<SnapshotEntry<'a>>) -> Self {
        Self { entries }
    }

    /// Number of exported entries. Always equal to the table's `len()`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table was empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable sort by `order`, ties broken by ascending key.
    pub fn sort(&mut self, order: SortOrder) {
        self.entries.sort_by(|a, b| order.compare(a, b));
    }

    /// Builder-style [`sort`](Snapshot::sort).
    pub fn sorted(mut self, order: SortOrder) -> Self {
        self.sort(order);
        self
    }

    /// Iterates over the entries in their current order.
    pub fn iter(&self) -> core::slice::Iter<'_, SnapshotEntry<'a>> {
        self.entries.iter()
    }

    /// The entries as a slice.
    pub fn as_slice(&self) -> &[SnapshotEntry<'a>] {
        &self.entries
    }

    /// Copies every key out so the pairs outlive the table borrow.
    pub fn to_owned_pairs(&self) -> Vec<(Vec<u8>, i64)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.to_vec(), entry.counter))
            .collect()
    }

    /// Writes one `"<counter> <key>\n"` line per entry.
    ///
    /// Keys are written as raw bytes; nothing is escaped or re-encoded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_tally::FrequencyTable;
    /// use probe_tally::SortOrder;
    ///
    /// let mut table = FrequencyTable::new();
    /// table.upsert("tea", 3).unwrap();
    /// table.upsert("coffee", -2).unwrap();
    ///
    /// let mut out = Vec::new();
    /// table.snapshot().sorted(SortOrder::Descending).write_lines(&mut out).unwrap();
    /// assert_eq!(out, b"3 tea\n-2 coffee\n");
    /// ```
    #[cfg(feature = "std")]
    pub fn write_lines<W: std::io::Write>(&self, mut writer: W) -> std::io::Result<()> {
        for entry in &self.entries {
            write!(writer, "{} ", entry.counter)?;
            writer.write_all(entry.key)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}

impl Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<'a> IntoIterator for Snapshot<'a> {
    type Item = SnapshotEntry<'a>;
    type IntoIter = alloc::vec::IntoIter<SnapshotEntry<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'s, 'a> IntoIterator for &'s Snapshot<'a> {
    type Item = &'s SnapshotEntry<'a>;
    type IntoIter = core::slice::Iter<'s, SnapshotEntry<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
