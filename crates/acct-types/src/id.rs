use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use const_hex as hex;
use serde::{Deserialize, Serialize};

use crate::{impl_buf_wrapper, impl_thin_wrapper};

const ADDR_LEN: usize = 32;
const TXID_LEN: usize = 32;
const LEASE_LEN: usize = 32;

type RawAddress = [u8; ADDR_LEN];

/// Opaque ledger account address.
#[derive(
    Copy,
    Clone,
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
pub struct Address(#[serde(with = "hex::serde")] RawAddress);

impl_buf_wrapper!(Address, ADDR_LEN);

/// Transaction identifier.
#[derive(
    Copy,
    Clone,
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
pub struct TxId(#[serde(with = "hex::serde")] [u8; TXID_LEN]);

impl_buf_wrapper!(TxId, TXID_LEN);

/// The lease half of a (sender, lease) exclusion pair.
///
/// A zero lease means "no lease" at the transaction level, but that is a
/// property of the duplicate check, not of this type.
#[derive(
    Copy,
    Clone,
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
pub struct LeaseHash(#[serde(with = "hex::serde")] [u8; LEASE_LEN]);

impl_buf_wrapper!(LeaseHash, LEASE_LEN);

/// Globally unique application index.
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
pub struct AppIndex(u64);

impl_thin_wrapper!(AppIndex => u64);

impl fmt::Display for AppIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of any on-chain creatable (an asset or an application).
///
/// Creatable indexes and app indexes draw from the same counter, so
/// conversions between the two are value-preserving.
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
pub struct CreatableIndex(u64);

impl_thin_wrapper!(CreatableIndex => u64);

impl fmt::Display for CreatableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AppIndex> for CreatableIndex {
    fn from(value: AppIndex) -> Self {
        Self(value.inner())
    }
}

impl From<CreatableIndex> for AppIndex {
    fn from(value: CreatableIndex) -> Self {
        Self::new(value.inner())
    }
}

/// Distinguishes between creatable kinds.
#[derive(
    Copy,
    Clone,
    Debug,
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
pub enum CreatableType {
    Asset,
    App,
}

impl fmt::Display for CreatableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CreatableType::Asset => "asset",
            CreatableType::App => "app",
        };
        f.write_str(s)
    }
}

/// Block round number.
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
pub struct Round(u64);

impl_thin_wrapper!(Round => u64);

impl Round {
    pub const ZERO: Round = Round(0);

    /// The round immediately before this one, saturating at genesis.
    pub fn prev(&self) -> Round {
        Round(self.0.saturating_sub(1))
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
