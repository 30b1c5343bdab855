use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::Index;
use core::ops::IndexMut;

use crate::error::TableError;

/// A live entry. The hash is cached so growth and backward shifting never
/// rehash keys.
#[derive(Clone)]
pub(crate) struct Occupied {
    pub(crate) hash: u64,
    pub(crate) key: Box<[u8]>,
    pub(crate) counter: i64,
}

#[derive(Clone)]
pub(crate) enum Slot {
    Empty,
    Occupied(Occupied),
}

impl Slot {
    #[inline(always)]
    pub(crate) fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }
}

/// Fixed-size storage for one capacity generation of a
/// [`FrequencyTable`](crate::FrequencyTable).
///
/// The length is always a power of two so ideal positions are computed with a
/// mask.
#[derive(Clone)]
pub(crate) struct SlotArray {
    slots: Box<[Slot]>,
}

impl SlotArray {
    /// Allocates `capacity` empty slots, aborting on allocation failure like
    /// any other collection constructor.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Empty);
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    /// Allocates `capacity` empty slots, reporting allocation failure instead
    /// of aborting.
    pub(crate) fn try_new(capacity: usize) -> Result<Self, TableError> {
        debug_assert!(capacity.is_power_of_two());
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| TableError::AllocationFailure { slots: capacity })?;
        slots.resize_with(capacity, || Slot::Empty);
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub(crate) fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Index a hash maps to before any probing.
    #[inline(always)]
    pub(crate) fn ideal_index(&self, hash: u64) -> usize {
        hash as usize & self.mask()
    }

    /// How far the entry at `index` sits from its ideal slot.
    #[inline(always)]
    pub(crate) fn displacement(&self, index: usize, hash: u64) -> usize {
        index.wrapping_sub(self.ideal_index(hash)) & self.mask()
    }

    #[inline(always)]
    pub(crate) fn next_index(&self, index: usize) -> usize {
        (index + 1) & self.mask()
    }

    /// Moves the slot at `index` out, leaving it empty.
    #[inline]
    pub(crate) fn take(&mut self, index: usize) -> Slot {
        core::mem::replace(&mut self.slots[index], Slot::Empty)
    }

    /// Writes `entry` into the first empty slot of its probe sequence.
    ///
    /// The caller must guarantee at least one empty slot exists. Keys are not
    /// compared: this is only used to move entries that are already known to
    /// be unique.
    pub(crate) fn place(&mut self, entry: Occupied) -> usize {
        let mut index = self.ideal_index(entry.hash);
        while self.slots[index].is_occupied() {
            index = self.next_index(index);
        }
        self.slots[index] = Slot::Occupied(entry);
        index
    }

    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = Slot::Empty);
    }

    #[inline]
    pub(crate) fn iter(&self) -> core::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    /// Consumes the array, yielding live entries in index order.
    pub(crate) fn into_occupied(self) -> impl Iterator<Item = Occupied> {
        self.slots.into_vec().into_iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            Slot::Empty => None,
        })
    }
}

impl Index<usize> for SlotArray {
    type Output = Slot;

    #[inline(always)]
    fn index(&self, index: usize) -> &Slot {
        &self.slots[index]
    }
}

impl IndexMut<usize> for SlotArray {
    #[inline(always)]
    fn index_mut(&mut self, index: usize) -> &mut Slot {
        &mut self.slots[index]
    }
}

impl Debug for SlotArray {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut list = f.debug_list();
        for slot in self.slots.iter() {
            match slot {
                Slot::Empty => list.entry(&format_args!("..")),
                Slot::Occupied(entry) => list.entry(&format_args!(
                    "{:016x} {:?}={}",
                    entry.hash,
                    DebugKey(&entry.key),
                    entry.counter
                )),
            };
        }
        list.finish()
    }
}

/// Copies a caller's key into storage owned by the table.
pub(crate) fn copy_key(key: &[u8]) -> Result<Box<[u8]>, TableError> {
    let mut owned = Vec::new();
    owned
        .try_reserve_exact(key.len())
        .map_err(|_| TableError::AllocationFailure { slots: key.len() })?;
    owned.extend_from_slice(key);
    Ok(owned.into_boxed_slice())
}

/// Formats a byte-string key as a quoted, ASCII-escaped string.
pub(crate) struct DebugKey<'a>(pub(crate) &'a [u8]);

impl Debug for DebugKey<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}
