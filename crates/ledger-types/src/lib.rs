//! Ledger data types.
//!
//! This crate holds the account records, transaction fields, block header
//! fields, per-round delta containers, and consensus parameters that the
//! overlay and writeback layers operate on.  It knows nothing about how
//! those layers stage or persist changes.

mod account;
mod deltas;
mod errors;
mod header;
mod params;
mod txn;

pub use account::{
    kv_schema_counts, AccountData, AppLocalState, AppParams, AssetHolding, AssetParams, KvStore,
};
pub use deltas::{
    AccountDeltas, CreatableLocator, EntityAction, EntityDelta, ModifiedCreatable, StateDelta,
};
pub use errors::{LedgerError, LedgerResult};
pub use header::BlockHeader;
pub use params::{
    legacy_local_idx_deltas, ConsensusParams, ProtocolVersion, VERSION_APP_STATE,
    VERSION_INDEXED_LOCAL_DELTAS, VERSION_TX_LEASES,
};
pub use txn::{Transaction, TxLease};
