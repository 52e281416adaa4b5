use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::impl_thin_wrapper;

/// Describes an amount of the ledger's native unit.
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
#[repr(transparent)]
pub struct MicroUnits(u64);

impl_thin_wrapper!(MicroUnits => u64);

impl MicroUnits {
    pub const ZERO: MicroUnits = MicroUnits(0);

    pub fn checked_add(self, rhs: MicroUnits) -> Option<MicroUnits> {
        self.0.checked_add(rhs.0).map(MicroUnits)
    }

    pub fn checked_sub(self, rhs: MicroUnits) -> Option<MicroUnits> {
        self.0.checked_sub(rhs.0).map(MicroUnits)
    }
}

impl fmt::Display for MicroUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
