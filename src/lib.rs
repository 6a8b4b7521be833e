#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod group;
mod probe;
mod stats;

/// Hash and equality strategies, seeding modes, and the reference byte hash.
pub mod hash;

/// The table itself and its iterator.
pub mod table;

pub use group::GROUP_SLOTS;
#[cfg(feature = "foldhash")]
pub use hash::StdStrategy;
pub use hash::BytesStrategy;
pub use hash::FnStrategy;
pub use hash::Seeding;
pub use hash::Strategy;
pub use hash::byte_hash;
#[cfg(feature = "stats")]
pub use stats::ProbeStats;
#[cfg(feature = "stats")]
pub use stats::Stats;
pub use table::H64;
pub use table::Iter;
