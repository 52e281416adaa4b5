use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use talus_acct_types::Round;

use crate::params::ProtocolVersion;

/// The block header fields the overlay consumes.
///
/// Upgrade bookkeeping is carried because the delta-generation mode of a
/// round depends on the upgrade vote state at that round, not just on the
/// current protocol version.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct BlockHeader {
    pub round: Round,
    pub timestamp: i64,

    pub current_protocol: ProtocolVersion,
    pub next_protocol: Option<ProtocolVersion>,
    pub next_protocol_vote_before: Round,

    pub upgrade_propose: Option<ProtocolVersion>,
    pub upgrade_approve: bool,
}
