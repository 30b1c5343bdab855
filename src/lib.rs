#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// A word-frequency table resolving collisions with per-bucket linked lists.
pub mod chained;

mod config;
mod error;

/// A word-frequency table using open addressing with linear probing.
///
/// This is the primary table of the crate. Deletion shifts displaced entries
/// backwards instead of leaving tombstones.
pub mod frequency_table;

/// The djb2 byte-string hash and its [`BuildHasher`](core::hash::BuildHasher).
pub mod hasher;

mod slot;

/// Exporting and ordering table contents.
pub mod snapshot;

mod tally;

/// Parsing newline-delimited increment/decrement input.
pub mod token;

pub use chained::ChainedTable;
pub use config::TableConfig;
pub use error::TableError;
pub use frequency_table::FrequencyTable;
pub use frequency_table::Iter;
#[cfg(feature = "stats")]
pub use frequency_table::TableStats;
pub use hasher::Djb2State;
pub use hasher::hash33;
pub use snapshot::Snapshot;
pub use snapshot::SnapshotEntry;
pub use snapshot::SortOrder;
pub use tally::Tally;
pub use token::Token;
pub use token::TokenKind;

/// A [`FrequencyTable`] hashed with foldhash instead of djb2.
///
/// Slot placement differs from the djb2 table, but every counting operation
/// behaves the same.
#[cfg(feature = "foldhash")]
pub type FoldTable = FrequencyTable<foldhash::fast::FixedState>;
