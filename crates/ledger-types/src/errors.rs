use talus_acct_types::{Address, TxId};
use thiserror::Error;

use crate::txn::TxLease;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error types.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LedgerError {
    /// The transaction id is already present in the ledger or a pending
    /// overlay.
    #[error("transaction already in ledger: {0}")]
    TransactionInLedger(TxId),

    /// The transaction's (sender, lease) pair overlaps a live lease.
    #[error("transaction {txid} using an overlapping lease {}", lease.lease)]
    LeaseInLedger { txid: TxId, lease: TxLease },

    /// An address was referenced that is not in the transaction's account
    /// array.
    #[error("invalid account reference {0}")]
    InvalidAccountReference(Address),
}
