use crate::error::TableError;
use crate::snapshot::Snapshot;
use crate::token::Token;
use crate::token::TokenKind;

/// The counting contract shared by [`FrequencyTable`](crate::FrequencyTable)
/// and [`ChainedTable`](crate::ChainedTable).
///
/// Both tables also expose these operations as inherent methods taking
/// `impl AsRef<[u8]>`; the trait exists so callers can pick a collision
/// strategy at runtime.
pub trait Tally {
    /// Adds `delta` to `key`'s counter, inserting the key at `delta` if it is
    /// absent. Returns the resulting counter.
    fn upsert(&mut self, key: &[u8], delta: i64) -> Result<i64, TableError>;

    /// Adds `delta` to `key`'s counter only if the key is present. Never
    /// inserts and never grows the table.
    fn adjust(&mut self, key: &[u8], delta: i64) -> Result<Option<i64>, TableError>;

    /// Returns `key`'s counter.
    fn find(&self, key: &[u8]) -> Option<i64>;

    /// Removes `key`, returning its final counter.
    fn remove(&mut self, key: &[u8]) -> Option<i64>;

    /// Number of keys in the table.
    fn len(&self) -> usize;

    /// Returns `true` if the table holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot (or bucket) count of the current generation.
    fn capacity(&self) -> usize;

    /// `len() / capacity()` as of the last mutation.
    fn load_factor(&self) -> f64;

    /// Exports every entry in storage order.
    fn snapshot(&self) -> Snapshot<'_>;

    /// Applies one input token: increments insert, decrements of unseen keys
    /// are ignored and yield `None`.
    fn apply(&mut self, token: Token<'_>) -> Result<Option<i64>, TableError> {
        match token.kind {
            TokenKind::Increment => self.upsert(token.key, token.delta()).map(Some),
            TokenKind::Decrement => self.adjust(token.key, token.delta()),
        }
    }
}
