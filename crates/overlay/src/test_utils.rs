//! Test utilities for the overlay: an in-memory ledger view and record
//! builders shared by unit and integration tests.

use std::collections::HashMap;

use talus_acct_types::{
    Address, AppIndex, CreatableIndex, CreatableType, Round, StateSchema, StateValue, StorageScope,
    TxId,
};
use talus_ledger_types::{
    AccountData, AppLocalState, AppParams, BlockHeader, LedgerError, TxLease,
};

use crate::{base::LedgerReader, errors::OverlayResult};

/// A ledger view held entirely in memory.  Unknown accounts read back as
/// empty records, like a fresh ledger.
#[derive(Default)]
pub struct MemoryLedger {
    pub accounts: HashMap<Address, AccountData>,
    pub creators: HashMap<(CreatableIndex, CreatableType), Address>,
    pub headers: HashMap<Round, BlockHeader>,
    pub txids: HashMap<TxId, Round>,
    pub leases: HashMap<TxLease, Round>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an app's global store on `creator`'s record.
    pub fn set_app(
        &mut self,
        creator: Address,
        aidx: AppIndex,
        global_schema: StateSchema,
        global_state: &[(&[u8], StateValue)],
    ) {
        let params = AppParams {
            global_schema,
            global_state: global_state
                .iter()
                .map(|(k, v)| (k.to_vec(), v.clone()))
                .collect(),
            ..Default::default()
        };
        let data = self.accounts.entry(creator).or_default();
        data.app_params.insert(aidx, params);
        data.total_app_schema = data
            .total_app_schema
            .checked_add(&global_schema)
            .expect("test ledger: schema total overflow");
        self.creators
            .insert((CreatableIndex::from(aidx), CreatableType::App), creator);
    }

    /// Opts `addr` in to an app with a local store.
    pub fn set_local_state(
        &mut self,
        addr: Address,
        aidx: AppIndex,
        schema: StateSchema,
        key_value: &[(&[u8], StateValue)],
    ) {
        let state = AppLocalState {
            schema,
            key_value: key_value
                .iter()
                .map(|(k, v)| (k.to_vec(), v.clone()))
                .collect(),
        };
        let data = self.accounts.entry(addr).or_default();
        data.app_local_states.insert(aidx, state);
        data.total_app_schema = data
            .total_app_schema
            .checked_add(&schema)
            .expect("test ledger: schema total overflow");
    }
}

impl LedgerReader for MemoryLedger {
    fn lookup(&self, _rnd: Round, addr: Address) -> OverlayResult<AccountData> {
        Ok(self.accounts.get(&addr).cloned().unwrap_or_default())
    }

    fn get_creator(
        &self,
        cidx: CreatableIndex,
        ctype: CreatableType,
    ) -> OverlayResult<Option<Address>> {
        Ok(self.creators.get(&(cidx, ctype)).copied())
    }

    fn block_hdr(&self, rnd: Round) -> OverlayResult<BlockHeader> {
        Ok(self.headers.get(&rnd).cloned().unwrap_or(BlockHeader {
            round: rnd,
            ..Default::default()
        }))
    }

    fn check_dup(
        &self,
        _first_valid: Round,
        _last_valid: Round,
        txid: TxId,
        lease: TxLease,
    ) -> OverlayResult<()> {
        if self.txids.contains_key(&txid) {
            return Err(LedgerError::TransactionInLedger(txid).into());
        }
        if !lease.lease.is_zero() && self.leases.contains_key(&lease) {
            return Err(LedgerError::LeaseInLedger { txid, lease }.into());
        }
        Ok(())
    }
}

/// A test address with a recognizable pattern.
pub fn test_addr(b: u8) -> Address {
    Address::new([b; 32])
}

pub fn uint(u: u64) -> StateValue {
    StateValue::Uint(u)
}

pub fn bytes(b: &[u8]) -> StateValue {
    StateValue::Bytes(b.to_vec())
}

/// Shorthand for the scope pair, keeping test tables compact.
pub const GLOBAL: StorageScope = StorageScope::Global;
pub const LOCAL: StorageScope = StorageScope::Local;
