//! Model-based checks: arbitrary op sequences against one store must match
//! a plain map, and schema counts must always track the effective state.

#![allow(unused_crate_dependencies)]

use std::collections::HashMap;

use proptest::prelude::*;
use talus_acct_types::{AppIndex, Round, StateSchema, StateValue};
use talus_ledger_types::VERSION_INDEXED_LOCAL_DELTAS;
use talus_overlay::{
    debug_overlay,
    test_utils::{test_addr, MemoryLedger, GLOBAL},
    OverlayBase, StoragePtr,
};

const APP: AppIndex = AppIndex::new(7);
const KEYS: [&[u8]; 5] = [b"k0", b"k1", b"k2", b"k3", b"k4"];

#[derive(Clone, Debug)]
enum Op {
    Alloc,
    Dealloc,
    Set(usize, StateValue),
    Del(usize),
}

fn value_strategy() -> impl Strategy<Value = StateValue> {
    prop_oneof![
        (0u64..4).prop_map(StateValue::Uint),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(StateValue::Bytes),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Alloc),
        1 => Just(Op::Dealloc),
        4 => ((0..KEYS.len()), value_strategy()).prop_map(|(k, v)| Op::Set(k, v)),
        2 => (0..KEYS.len()).prop_map(Op::Del),
    ]
}

fn model_counts(model: &HashMap<Vec<u8>, StateValue>) -> StateSchema {
    let mut counts = StateSchema::EMPTY;
    for v in model.values() {
        match v {
            StateValue::Uint(_) => counts.num_uint += 1,
            StateValue::Bytes(_) => counts.num_byte_slice += 1,
        }
    }
    counts
}

proptest! {
    #[test]
    fn ops_match_model(ops in prop::collection::vec(op_strategy(), 0..48)) {
        let addr = test_addr(1);
        let ledger = MemoryLedger::new();
        let base = OverlayBase::new(&ledger, Round::ZERO, 0, Round::ZERO);
        let mut cow = debug_overlay(&base, Round::new(1), VERSION_INDEXED_LOCAL_DELTAS, 0);

        // capacity large enough that schema checks never reject
        let space = StateSchema::new(64, 64);
        let mut model: Option<HashMap<Vec<u8>, StateValue>> = None;

        for op in ops {
            match op {
                Op::Alloc => {
                    let res = cow.allocate(addr, APP, GLOBAL, space);
                    match &mut model {
                        Some(_) => prop_assert!(res.is_err()),
                        None => {
                            prop_assert!(res.is_ok());
                            model = Some(HashMap::new());
                        }
                    }
                }
                Op::Dealloc => {
                    let res = cow.deallocate(addr, APP, GLOBAL);
                    match &mut model {
                        Some(_) => {
                            prop_assert!(res.is_ok());
                            model = None;
                        }
                        None => prop_assert!(res.is_err()),
                    }
                }
                Op::Set(k, v) => {
                    let res = cow.set_key(addr, APP, GLOBAL, KEYS[k].to_vec(), v.clone(), 0);
                    match &mut model {
                        Some(m) => {
                            prop_assert!(res.is_ok());
                            m.insert(KEYS[k].to_vec(), v);
                        }
                        None => prop_assert!(res.is_err()),
                    }
                }
                Op::Del(k) => {
                    let res = cow.del_key(addr, APP, GLOBAL, KEYS[k], 0);
                    match &mut model {
                        Some(m) => {
                            prop_assert!(res.is_ok());
                            m.remove(KEYS[k]);
                        }
                        None => prop_assert!(res.is_err()),
                    }
                }
            }
        }

        match &model {
            Some(m) => {
                for key in KEYS {
                    prop_assert_eq!(
                        cow.get_key(addr, APP, GLOBAL, key, 0).unwrap(),
                        m.get(key).cloned()
                    );
                }
                let sd = expect_delta(&cow, addr);
                prop_assert_eq!(sd.counts, model_counts(m));
                prop_assert!(sd.counts.fits_within(&sd.max_counts));
            }
            None => {
                prop_assert!(cow.get_key(addr, APP, GLOBAL, b"k0", 0).is_err());
                prop_assert!(!cow.allocated(addr, APP, GLOBAL).unwrap());
            }
        }
    }
}

fn expect_delta<'a>(
    cow: &'a talus_overlay::Overlay<'_>,
    addr: talus_acct_types::Address,
) -> &'a talus_overlay::StorageDelta {
    cow.staged_storage_delta(addr, StoragePtr::global(APP))
        .expect("store was touched, a delta must exist")
}
