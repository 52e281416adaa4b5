//! Round coalescing for backing-store writeback.
//!
//! A block commits one round of account deltas at a time, but flushing to
//! the store happens in multi-round batches.  This crate dedups N rounds
//! of per-address updates into one write batch, nets out creatable
//! create/delete churn, and attaches the old record each write will
//! replace, preferring a warm cache over store reads.

mod compact;
mod lru;

pub use compact::{AccountDelta, CompactAccountDeltas, LoadedAccount, OldAccountLoader};
pub use lru::LruAccounts;
