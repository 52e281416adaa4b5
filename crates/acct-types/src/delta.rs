use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// One key's change in a wire delta.
///
/// No-op transitions never appear on the wire; producing (or not producing)
/// one of these from a staged change is the serializer's job.
#[derive(
    Clone, Debug, Eq, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize, Arbitrary,
)]
pub enum ValueOp {
    SetUint(u64),
    SetBytes(Vec<u8>),
    Delete,
}

/// Wire-format key/value delta for a single store.
///
/// `BTreeMap` keeps the encoding deterministic.
pub type KvDelta = BTreeMap<Vec<u8>, ValueOp>;

/// Wire-format summary of the state changes produced by one successful
/// stateful program evaluation.
///
/// Local deltas are keyed by the account's offset in the transaction's
/// account array, with 0 meaning the sender.
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
pub struct EvalDelta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub global_delta: KvDelta,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub local_deltas: BTreeMap<u64, KvDelta>,
}

impl EvalDelta {
    pub fn is_empty(&self) -> bool {
        self.global_delta.is_empty() && self.local_deltas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_delta_is_empty() {
        let mut ed = EvalDelta::default();
        assert!(ed.is_empty());

        ed.local_deltas
            .entry(1)
            .or_default()
            .insert(b"k".to_vec(), ValueOp::Delete);
        assert!(!ed.is_empty());
    }

    #[test]
    fn test_eval_delta_borsh_roundtrip() {
        let mut ed = EvalDelta::default();
        ed.global_delta.insert(b"x".to_vec(), ValueOp::SetUint(5));
        ed.local_deltas
            .entry(2)
            .or_default()
            .insert(b"y".to_vec(), ValueOp::SetBytes(b"v".to_vec()));

        let buf = borsh::to_vec(&ed).expect("encode");
        let back: EvalDelta = borsh::from_slice(&buf).expect("decode");
        assert_eq!(back, ed);
    }
}
