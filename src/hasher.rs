use core::hash::BuildHasher;
use core::hash::Hasher;

const SEED: u64 = 5381;

/// Hashes a byte string with the multiplicative `h * 33 + byte` scheme
/// (djb2), seeded at 5381.
///
/// Every byte is treated as unsigned and all arithmetic wraps. Hashes
/// written against a signed `char` sum differ for keys containing bytes of
/// `0x80` and above, so slot placement of such keys (and the unsorted
/// snapshot order) is not interchangeable with those implementations.
/// Counts and sorted output are unaffected.
///
/// # Examples
///
/// ```rust
/// use probe_tally::hasher::hash33;
///
/// assert_eq!(hash33(b""), 5381);
/// assert_eq!(hash33(b"a"), 5381 * 33 + 97);
/// ```
#[inline]
pub fn hash33(bytes: &[u8]) -> u64 {
    bytes.iter().fold(SEED, |hash, &byte| {
        (hash << 5).wrapping_add(hash).wrapping_add(byte as u64)
    })
}

/// Streaming form of [`hash33`].
///
/// Writing a key in several chunks yields the same value as hashing the
/// concatenation in one call. Only `write` is meaningful here: the tables in
/// this crate feed raw key bytes, never `Hash` impls, so the `0xff`
/// terminator `str::hash` would add never reaches the state.
#[derive(Debug, Clone, Copy)]
pub struct Djb2Hasher {
    state: u64,
}

impl Default for Djb2Hasher {
    fn default() -> Self {
        Self { state: SEED }
    }
}

impl Hasher for Djb2Hasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state = (self.state << 5)
                .wrapping_add(self.state)
                .wrapping_add(byte as u64);
        }
    }
}

/// Zero-sized [`BuildHasher`] producing [`Djb2Hasher`]s.
///
/// This is the default hasher of [`FrequencyTable`](crate::FrequencyTable)
/// and [`ChainedTable`](crate::ChainedTable).
#[derive(Debug, Clone, Copy, Default)]
pub struct Djb2State;

impl BuildHasher for Djb2State {
    type Hasher = Djb2Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        Djb2Hasher::default()
    }
}

#[inline(always)]
pub(crate) fn hash_key<S: BuildHasher>(hash_builder: &S, key: &[u8]) -> u64 {
    let mut hasher = hash_builder.build_hasher();
    hasher.write(key);
    hasher.finish()
}
