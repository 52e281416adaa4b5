use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// A single value held in app key/value storage.
///
/// Equality is structural and includes the tag, so `Uint(0)` and
/// `Bytes(vec![])` are distinct.  Absence of a value is always expressed as
/// `Option<StateValue>`, never as an empty-bytes sentinel.
#[derive(
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
pub enum StateValue {
    Uint(u64),
    Bytes(Vec<u8>),
}

impl StateValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            StateValue::Uint(_) => ValueType::Uint,
            StateValue::Bytes(_) => ValueType::Bytes,
        }
    }
}

/// The tag half of a [`StateValue`], used for schema accounting.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Arbitrary)]
pub enum ValueType {
    Uint,
    Bytes,
}

/// Whether a storage pointer refers to an app's singleton global store or to
/// the per-account local store.
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
pub enum StorageScope {
    Global,
    Local,
}

impl fmt::Display for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageScope::Global => "global",
            StorageScope::Local => "local",
        };
        f.write_str(s)
    }
}

/// Per-scope storage capacity, expressed as counts of each value type.
#[derive(
    Copy,
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
pub struct StateSchema {
    pub num_uint: u64,
    pub num_byte_slice: u64,
}

impl StateSchema {
    pub const EMPTY: StateSchema = StateSchema {
        num_uint: 0,
        num_byte_slice: 0,
    };

    pub const fn new(num_uint: u64, num_byte_slice: u64) -> Self {
        Self {
            num_uint,
            num_byte_slice,
        }
    }

    /// Component-wise comparison against a capacity schema.
    pub fn fits_within(&self, max: &StateSchema) -> bool {
        self.num_uint <= max.num_uint && self.num_byte_slice <= max.num_byte_slice
    }

    /// Component-wise sum, `None` on overflow.
    pub fn checked_add(&self, other: &StateSchema) -> Option<StateSchema> {
        Some(StateSchema {
            num_uint: self.num_uint.checked_add(other.num_uint)?,
            num_byte_slice: self.num_byte_slice.checked_add(other.num_byte_slice)?,
        })
    }

    /// Component-wise difference, `None` on underflow.
    pub fn checked_sub(&self, other: &StateSchema) -> Option<StateSchema> {
        Some(StateSchema {
            num_uint: self.num_uint.checked_sub(other.num_uint)?,
            num_byte_slice: self.num_byte_slice.checked_sub(other.num_byte_slice)?,
        })
    }
}
