use thiserror::Error;

/// Errors returned by the tally tables.
///
/// A missing key on removal is not an error; those operations return `false`
/// or `None` instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// Backing storage for `slots` slots, or a copy of a key, could not be
    /// allocated. The table is left exactly as it was before the call.
    #[error("failed to allocate storage for {slots} slots")]
    AllocationFailure {
        /// Number of slots (or key bytes, for key copies) requested.
        slots: usize,
    },

    /// A probe visited every slot without finding the key or a free slot.
    ///
    /// This can only happen if the growth threshold let the table fill up
    /// completely, and indicates a bug rather than a recoverable condition.
    #[error("probe sequence exhausted: {len} entries in {capacity} slots")]
    InvariantViolation {
        /// Entries in the table when the probe gave up.
        len: usize,
        /// Slots in the table when the probe gave up.
        capacity: usize,
    },

    /// Applying the delta would overflow the counter. The counter is unchanged.
    #[error("counter overflow: {counter} + {delta} does not fit in i64")]
    CounterOverflow {
        /// The counter before the update.
        counter: i64,
        /// The delta that was rejected.
        delta: i64,
    },

    /// The growth threshold must be finite and within `(0.0, 1.0]`.
    #[error("invalid growth threshold {0}: expected a value in (0.0, 1.0]")]
    InvalidConfig(f64),
}
