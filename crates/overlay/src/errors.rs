use std::fmt;

use const_hex as hex;
use talus_acct_types::{Address, AppIndex, StorageScope};
use talus_ledger_types::LedgerError;
use thiserror::Error;

pub type OverlayResult<T> = Result<T, OverlayError>;

/// The storage operation an error occurred under, for message context.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageOp {
    FetchKey,
    SetKey,
    DelKey,
    Allocate,
    Deallocate,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageOp::FetchKey => "fetch key",
            StorageOp::SetKey => "set key",
            StorageOp::DelKey => "del key",
            StorageOp::Allocate => "allocate storage",
            StorageOp::Deallocate => "deallocate storage",
        };
        f.write_str(s)
    }
}

/// Overlay error types.
///
/// The message text of the storage variants is stable; tooling downstream
/// matches on it.  The operation context rides along in the variant for
/// programmatic use but stays out of the message.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("app {1} does not exist")]
    NoGlobalStorage(StorageOp, AppIndex),

    #[error("{1} has not opted in to app {2}")]
    NoLocalStorage(StorageOp, Address, AppIndex),

    #[error("app {1} already exists")]
    GlobalAlreadyAllocated(StorageOp, AppIndex),

    #[error("{1} has already opted in to app {2}")]
    LocalAlreadyAllocated(StorageOp, Address, AppIndex),

    #[error("key too long: length was {len}, maximum is {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("value too long for key 0x{}: length was {len}, maximum is {max}", hex::encode(key))]
    ValueTooLong {
        key: Vec<u8>,
        len: usize,
        max: usize,
    },

    #[error("store integer count {count} exceeds schema integer count {max}")]
    UintCountExceeded { count: u64, max: u64 },

    #[error("store bytes count {count} exceeds schema bytes count {max}")]
    ByteCountExceeded { count: u64, max: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// An error surfaced verbatim from the backing store.
    #[error("backing store: {0}")]
    Backend(String),
}

impl OverlayError {
    pub(crate) fn no_storage(
        op: StorageOp,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayError {
        match scope {
            StorageScope::Global => OverlayError::NoGlobalStorage(op, aidx),
            StorageScope::Local => OverlayError::NoLocalStorage(op, addr, aidx),
        }
    }

    pub(crate) fn already_allocated(
        op: StorageOp,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayError {
        match scope {
            StorageScope::Global => OverlayError::GlobalAlreadyAllocated(op, aidx),
            StorageScope::Local => OverlayError::LocalAlreadyAllocated(op, addr, aidx),
        }
    }
}

#[cfg(test)]
mod tests {
    use talus_acct_types::StorageScope;

    use super::*;

    #[test]
    fn test_storage_error_messages() {
        let aidx = AppIndex::new(7);
        let addr = Address::new([2; 32]);

        let e = OverlayError::no_storage(StorageOp::FetchKey, addr, aidx, StorageScope::Global);
        assert_eq!(e.to_string(), "app 7 does not exist");

        let e = OverlayError::no_storage(StorageOp::SetKey, addr, aidx, StorageScope::Local);
        assert_eq!(
            e.to_string(),
            format!("{addr} has not opted in to app 7")
        );

        let e = OverlayError::already_allocated(StorageOp::Allocate, addr, aidx, StorageScope::Global);
        assert_eq!(e.to_string(), "app 7 already exists");

        let e = OverlayError::KeyTooLong { len: 80, max: 64 };
        assert_eq!(e.to_string(), "key too long: length was 80, maximum is 64");

        let e = OverlayError::ValueTooLong {
            key: b"k".to_vec(),
            len: 99,
            max: 64,
        };
        assert_eq!(
            e.to_string(),
            "value too long for key 0x6b: length was 99, maximum is 64"
        );

        let e = OverlayError::UintCountExceeded { count: 2, max: 1 };
        assert_eq!(
            e.to_string(),
            "store integer count 2 exceeds schema integer count 1"
        );

        let e = OverlayError::ByteCountExceeded { count: 3, max: 0 };
        assert_eq!(
            e.to_string(),
            "store bytes count 3 exceeds schema bytes count 0"
        );
    }
}
