use crate::error::TableError;

/// Construction parameters shared by [`FrequencyTable`](crate::FrequencyTable)
/// and [`ChainedTable`](crate::ChainedTable).
///
/// # Examples
///
/// ```rust
/// use probe_tally::FrequencyTable;
/// use probe_tally::TableConfig;
///
/// let config = TableConfig::new().initial_capacity(10).growth_threshold(0.5);
/// let table = FrequencyTable::with_config(config).unwrap();
/// assert_eq!(table.capacity(), 16);
/// assert_eq!(table.growth_threshold(), 0.5);
///
/// let bad = TableConfig::new().growth_threshold(1.5);
/// assert!(FrequencyTable::with_config(bad).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    initial_capacity: usize,
    growth_threshold: f64,
}

impl TableConfig {
    /// Slot count of a freshly created table.
    pub const DEFAULT_CAPACITY: usize = 4;

    /// Load factor at which the table doubles before the next insertion.
    pub const DEFAULT_GROWTH_THRESHOLD: f64 = 0.75;

    /// Returns the default configuration: 4 slots, growth at 0.75.
    pub const fn new() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_CAPACITY,
            growth_threshold: Self::DEFAULT_GROWTH_THRESHOLD,
        }
    }

    /// Sets the initial slot count. It is rounded up to a power of two, and
    /// zero is treated as one.
    pub const fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the load factor that triggers growth. Must be in `(0.0, 1.0]`.
    pub const fn growth_threshold(mut self, threshold: f64) -> Self {
        self.growth_threshold = threshold;
        self
    }

    /// Checks the threshold and normalizes the capacity to a power of two.
    pub(crate) fn resolve(&self) -> Result<(usize, f64), TableError> {
        let threshold = self.growth_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(TableError::InvalidConfig(threshold));
        }

        let capacity = self
            .initial_capacity
            .max(1)
            .checked_next_power_of_two()
            .ok_or(TableError::AllocationFailure {
                slots: self.initial_capacity,
            })?;

        Ok((capacity, threshold))
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        assert_eq!(TableConfig::default().resolve(), Ok((4, 0.75)));
    }

    #[test]
    fn capacity_rounds_up() {
        let resolve = |n| TableConfig::new().initial_capacity(n).resolve().unwrap().0;
        assert_eq!(resolve(0), 1);
        assert_eq!(resolve(1), 1);
        assert_eq!(resolve(5), 8);
        assert_eq!(resolve(64), 64);
    }

    #[test]
    fn rejects_bad_thresholds() {
        for threshold in [0.0, -0.5, 1.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                TableConfig::new().growth_threshold(threshold).resolve(),
                Err(TableError::InvalidConfig(_))
            ));
        }
        assert!(TableConfig::new().growth_threshold(1.0).resolve().is_ok());
    }

    #[test]
    fn oversized_capacity_is_an_allocation_failure() {
        let config = TableConfig::new().initial_capacity(usize::MAX);
        assert!(matches!(
            config.resolve(),
            Err(TableError::AllocationFailure { .. })
        ));
    }
}
