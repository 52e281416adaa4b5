use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use talus_acct_types::{Address, LeaseHash, Round, TxId};

use crate::errors::{LedgerError, LedgerResult};

/// A (sender, lease) pair asserting no-duplicate-in-window at the ledger
/// level.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct TxLease {
    pub sender: Address,
    pub lease: LeaseHash,
}

/// The transaction fields the overlay consumes.
///
/// The full transaction format lives with the protocol layer; the overlay
/// only needs identity, validity, the lease, and the account array used to
/// key local deltas.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Arbitrary)]
pub struct Transaction {
    pub txid: TxId,
    pub sender: Address,
    pub last_valid: Round,
    pub lease: LeaseHash,
    pub accounts: Vec<Address>,
}

impl Transaction {
    /// The offset of `addr` in this transaction's account space: 0 for the
    /// sender, i+1 for position i in the account array.
    pub fn index_by_address(&self, addr: Address, sender: Address) -> LedgerResult<u64> {
        if addr == sender {
            return Ok(0);
        }
        self.accounts
            .iter()
            .position(|a| *a == addr)
            .map(|i| i as u64 + 1)
            .ok_or(LedgerError::InvalidAccountReference(addr))
    }

    pub fn lease_pair(&self) -> TxLease {
        TxLease {
            sender: self.sender,
            lease: self.lease,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new([b; 32])
    }

    #[test]
    fn test_index_by_address() {
        let txn = Transaction {
            sender: addr(1),
            accounts: vec![addr(2), addr(3)],
            ..Default::default()
        };

        assert_eq!(txn.index_by_address(addr(1), txn.sender).unwrap(), 0);
        assert_eq!(txn.index_by_address(addr(2), txn.sender).unwrap(), 1);
        assert_eq!(txn.index_by_address(addr(3), txn.sender).unwrap(), 2);

        let err = txn.index_by_address(addr(9), txn.sender).unwrap_err();
        assert_eq!(err, LedgerError::InvalidAccountReference(addr(9)));
    }
}
