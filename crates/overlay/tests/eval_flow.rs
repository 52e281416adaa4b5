//! End-to-end flow: program evaluation through child overlays, commit into
//! a block-level root, the writeback fold, and round compaction.

#![allow(unused_crate_dependencies)]

mod common;

use std::{collections::HashMap, convert::Infallible, num::NonZeroUsize};

use common::{CounterProgram, ProgramWrite, ScriptedProgram};
use talus_acct_types::{Address, AppIndex, Round, StateSchema, StateValue, TxId};
use talus_ledger_types::{AccountData, Transaction, VERSION_INDEXED_LOCAL_DELTAS};
use talus_overlay::{
    debug_overlay,
    test_utils::{test_addr, uint, MemoryLedger, GLOBAL, LOCAL},
    OverlayBase,
};
use talus_writeback::{CompactAccountDeltas, LoadedAccount, LruAccounts, OldAccountLoader};

const APP: AppIndex = AppIndex::new(7);

struct LedgerLoader<'a>(&'a HashMap<Address, AccountData>);

impl OldAccountLoader for LedgerLoader<'_> {
    type Error = Infallible;

    fn load_old_account(&mut self, addr: Address) -> Result<Option<AccountData>, Infallible> {
        Ok(self.0.get(&addr).cloned())
    }
}

#[test]
fn test_app_call_commits_through_block_and_compacts() {
    let creator = test_addr(1);
    let user = test_addr(2);

    let mut ledger = MemoryLedger::new();
    ledger.set_app(creator, APP, StateSchema::new(2, 2), &[(b"count", uint(41))]);
    ledger.set_local_state(user, APP, StateSchema::new(1, 1), &[]);

    let base = OverlayBase::new(&ledger, Round::ZERO, 0, Round::ZERO);
    let mut block = debug_overlay(&base, Round::new(1), VERSION_INDEXED_LOCAL_DELTAS, 0);

    // txn 1: bump the global counter
    let txn1 = Transaction {
        txid: TxId::new([1; 32]),
        sender: creator,
        last_valid: Round::new(10),
        ..Default::default()
    };
    let mut prog = CounterProgram {
        owner: creator,
        key: b"count".to_vec(),
    };
    let (pass, delta) = block.stateful_eval(&mut prog, APP, &txn1, b"counter").unwrap();
    assert!(pass);
    assert_eq!(
        delta.global_delta[b"count".as_slice()],
        talus_acct_types::ValueOp::SetUint(42)
    );
    block.add_tx(&txn1);

    // txn 2: the user's program writes its own local state
    let txn2 = Transaction {
        txid: TxId::new([2; 32]),
        sender: user,
        last_valid: Round::new(10),
        ..Default::default()
    };
    let mut prog = ScriptedProgram {
        writes: vec![ProgramWrite {
            addr: user,
            scope: LOCAL,
            account_idx: 0,
            key: b"seen".to_vec(),
            value: Some(uint(1)),
        }],
        pass: true,
    };
    let (pass, delta) = block.stateful_eval(&mut prog, APP, &txn2, b"local").unwrap();
    assert!(pass);
    assert_eq!(
        delta.local_deltas[&0][b"seen".as_slice()],
        talus_acct_types::ValueOp::SetUint(1)
    );
    block.add_tx(&txn2);

    // both effects visible at the block level, counter read back once more
    assert_eq!(
        block.get_key(creator, APP, GLOBAL, b"count", 0).unwrap(),
        Some(uint(42))
    );
    assert_eq!(block.txn_counter(), 2);

    // seal: fold storage deltas onto records and compact the round
    let state_delta = block.into_state_delta();
    let rounds = [state_delta.accts];

    let mut warm = LruAccounts::new(NonZeroUsize::new(8).unwrap(), 4);
    let mut cd = CompactAccountDeltas::from_rounds(&rounds, &mut warm);
    assert!(cd.has_misses());

    let mut loader = LedgerLoader(&ledger.accounts);
    cd.load_old(&mut loader).unwrap();
    assert!(!cd.has_misses());

    let (_, creator_delta) = cd.get(&creator).unwrap();
    let old_global = &creator_delta.old.as_ref().unwrap().data.app_params[&APP].global_state;
    assert_eq!(old_global[b"count".as_slice()], uint(41));
    let new_global = &creator_delta.new.app_params[&APP].global_state;
    assert_eq!(new_global[b"count".as_slice()], uint(42));

    let (_, user_delta) = cd.get(&user).unwrap();
    assert_eq!(
        user_delta.new.app_local_states[&APP].key_value[b"seen".as_slice()],
        uint(1)
    );

    // the sealed records can warm the cache for the next batch
    for (addr, d) in cd.iter() {
        warm.write_pending(LoadedAccount {
            addr: *addr,
            data: d.new.clone(),
        });
    }
    assert_eq!(warm.flush_pending(), 2);
}

#[test]
fn test_rejected_program_leaves_block_unchanged() {
    let creator = test_addr(1);

    let mut ledger = MemoryLedger::new();
    ledger.set_app(creator, APP, StateSchema::new(2, 2), &[(b"count", uint(5))]);

    let base = OverlayBase::new(&ledger, Round::ZERO, 0, Round::ZERO);
    let mut block = debug_overlay(&base, Round::new(1), VERSION_INDEXED_LOCAL_DELTAS, 0);

    let txn = Transaction {
        txid: TxId::new([1; 32]),
        sender: creator,
        last_valid: Round::new(10),
        ..Default::default()
    };
    let mut prog = ScriptedProgram {
        writes: vec![ProgramWrite {
            addr: creator,
            scope: GLOBAL,
            account_idx: 0,
            key: b"count".to_vec(),
            value: Some(StateValue::Uint(99)),
        }],
        pass: false,
    };

    let (pass, delta) = block.stateful_eval(&mut prog, APP, &txn, b"reject").unwrap();
    assert!(!pass);
    assert!(delta.is_empty());
    assert_eq!(
        block.get_key(creator, APP, GLOBAL, b"count", 0).unwrap(),
        Some(uint(5))
    );

    // nothing staged, so sealing produces an empty delta
    let state_delta = block.into_state_delta();
    assert!(state_delta.accts.is_empty());
}
