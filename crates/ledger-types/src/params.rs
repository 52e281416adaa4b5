use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::header::BlockHeader;

/// Identifies one revision of the consensus rules.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct ProtocolVersion(pub u32);

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// First version supporting transaction leases.
pub const VERSION_TX_LEASES: ProtocolVersion = ProtocolVersion(4);

/// First version supporting app key/value storage.
pub const VERSION_APP_STATE: ProtocolVersion = ProtocolVersion(24);

/// First version where local deltas are keyed strictly by the account's
/// position in the transaction's account array.
pub const VERSION_INDEXED_LOCAL_DELTAS: ProtocolVersion = ProtocolVersion(26);

/// Consensus parameters injected into the overlay at construction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Maximum length of an app storage key, in bytes.
    pub max_app_key_len: usize,

    /// Maximum length of a bytes-typed app storage value, in bytes.
    pub max_app_bytes_value_len: usize,

    /// Whether the duplicate check honors transaction leases.
    pub support_tx_leases: bool,
}

impl ConsensusParams {
    /// The parameters in force for a protocol version.
    pub fn for_version(v: ProtocolVersion) -> ConsensusParams {
        ConsensusParams {
            max_app_key_len: 64,
            max_app_bytes_value_len: 64,
            support_tx_leases: v >= VERSION_TX_LEASES,
        }
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self::for_version(VERSION_INDEXED_LOCAL_DELTAS)
    }
}

/// Whether eval deltas for this block must reproduce the historical
/// local-index assignment, where a local delta is keyed by the index the
/// program supplied rather than by the account's position in the
/// transaction.
///
/// The predicate is this convoluted so that it holds for exactly the blocks
/// that were sealed under the old behavior; changing its shape changes
/// replay.
pub fn legacy_local_idx_deltas(hdr: &BlockHeader) -> bool {
    hdr.current_protocol == VERSION_APP_STATE
        && (hdr.next_protocol != Some(VERSION_INDEXED_LOCAL_DELTAS)
            || (hdr.upgrade_propose.is_none()
                && !hdr.upgrade_approve
                && hdr.round < hdr.next_protocol_vote_before))
}
