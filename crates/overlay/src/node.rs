use std::{
    cell::RefCell,
    collections::{hash_map::Entry, HashMap},
    mem,
};

use talus_acct_types::{
    Address, AppIndex, CreatableIndex, CreatableType, Round, StateSchema, StateValue, StorageScope,
    TxId,
};
use talus_ledger_types::{
    legacy_local_idx_deltas, AccountData, BlockHeader, ConsensusParams, CreatableLocator, KvStore,
    LedgerError, ModifiedCreatable, StateDelta, Transaction, TxLease,
};
use tracing::trace;

use crate::{
    errors::OverlayResult,
    parent::OverlayParent,
    storage::{StorageAction, StorageDelta, StoragePtr, ValueDelta},
};

/// One layer of the copy-on-write stack.
///
/// A node stages account mutations, the txid/lease exclusion sets,
/// creatable mutations, and per-store key/value deltas against a parent it
/// only ever reads.  The parent is borrowed shared for the node's entire
/// lifetime, so the borrow checker enforces the single-writer rule: nobody
/// can mutate a parent while a child is outstanding.
///
/// Committing is split in two so the borrow can end first:
///
/// ```ignore
/// let parts = child.into_parts();
/// parent.absorb(parts);
/// ```
pub struct Overlay<'p> {
    pub(crate) parent: &'p dyn OverlayParent,
    proto: ConsensusParams,

    pub(crate) mods: StateDelta,

    // Storage deltas populated as side effects of app transactions:
    // opt-in/close actions (allocate/deallocate) and stateful program
    // evaluation (set_key/del_key).  Folded into mods.accts by
    // `into_state_delta` before the deltas move toward the store.
    pub(crate) sdeltas: HashMap<Address, HashMap<StoragePtr, StorageDelta>>,

    // Records fetched from below, kept so `put` can verify the
    // get-before-put discipline and so writeback starts from the freshest
    // view seen.  Interior mutability because it fills on read paths.
    base_cache: RefCell<HashMap<Address, AccountData>>,

    // Historical eval-delta replay: key local deltas by the account index
    // the program supplied, captured at first touch per (address, store).
    pub(crate) legacy_idx_mode: bool,
    pub(crate) legacy_idx_cache: HashMap<Address, HashMap<StoragePtr, u64>>,
}

/// The staged state of a consumed child, ready to be absorbed by its
/// parent.
pub struct OverlayMods {
    mods: StateDelta,
    sdeltas: HashMap<Address, HashMap<StoragePtr, StorageDelta>>,
    base_cache: HashMap<Address, AccountData>,
}

impl<'p> Overlay<'p> {
    /// Creates a root node over a parent, typically the base adapter.
    ///
    /// Consensus parameters and the delta-generation mode are fixed here
    /// from the header and inherited by every descendant.
    pub fn new(parent: &'p dyn OverlayParent, hdr: BlockHeader, prev_timestamp: i64) -> Self {
        let proto = ConsensusParams::for_version(hdr.current_protocol);
        let legacy_idx_mode = legacy_local_idx_deltas(&hdr);
        Self {
            parent,
            proto,
            mods: StateDelta::new(hdr, prev_timestamp, Round::ZERO),
            sdeltas: HashMap::new(),
            base_cache: RefCell::new(HashMap::new()),
            legacy_idx_mode,
            legacy_idx_cache: HashMap::new(),
        }
    }

    /// Spawns a child staging layer on top of this node.
    pub fn child(&self) -> Overlay<'_> {
        Overlay {
            parent: self,
            proto: self.proto.clone(),
            mods: StateDelta::new(self.mods.hdr.clone(), self.mods.prev_timestamp, self.mods.cert_next),
            sdeltas: HashMap::new(),
            base_cache: RefCell::new(HashMap::new()),
            legacy_idx_mode: self.legacy_idx_mode,
            legacy_idx_cache: HashMap::new(),
        }
    }

    pub fn round(&self) -> Round {
        self.mods.hdr.round
    }

    pub fn prev_timestamp(&self) -> i64 {
        self.mods.prev_timestamp
    }

    pub fn proto(&self) -> &ConsensusParams {
        &self.proto
    }

    pub(crate) fn storage_delta(&self, addr: Address, ptr: StoragePtr) -> Option<&StorageDelta> {
        self.sdeltas.get(&addr).and_then(|m| m.get(&ptr))
    }

    /// The staged delta for one store, if this layer has touched it.
    /// Read-only introspection for tests and diagnostics.
    pub fn staged_storage_delta(&self, addr: Address, ptr: StoragePtr) -> Option<&StorageDelta> {
        self.storage_delta(addr, ptr)
    }

    /// Fetches an account record, preferring this node's staged version.
    pub fn lookup(&self, addr: Address) -> OverlayResult<AccountData> {
        if let Some(data) = self.mods.accts.get(&addr) {
            return Ok(data.clone());
        }

        let data = self.parent.lookup(addr)?;
        self.base_cache.borrow_mut().insert(addr, data.clone());
        Ok(data)
    }

    /// Fetches an account record together with one creatable's entries.
    ///
    /// A staged record is only trusted if it already carries the requested
    /// entries; otherwise the parent's view of those entries is grafted
    /// onto the newer record.
    pub fn lookup_creatable_data(
        &self,
        addr: Address,
        cidx: CreatableIndex,
        ctype: CreatableType,
        global: bool,
        local: bool,
    ) -> OverlayResult<AccountData> {
        if !global && !local {
            panic!("overlay: creatable lookup with no scope requested: {ctype} {cidx}");
        }

        let modified = self.mods.accts.get(&addr).cloned();

        if let Some(data) = &modified {
            let aidx = AppIndex::from(cidx);
            let (global_exist, local_exist) = match ctype {
                CreatableType::Asset => (
                    data.asset_params.contains_key(&cidx),
                    data.assets.contains_key(&cidx),
                ),
                CreatableType::App => (
                    data.app_params.contains_key(&aidx),
                    data.app_local_states.contains_key(&aidx),
                ),
            };

            let only_global = global && global_exist && !local;
            let only_local = local && local_exist && !global;
            let both = global && global_exist && local && local_exist;
            if only_global || only_local || both {
                return Ok(data.clone());
            }
        }

        let parent_data = self
            .parent
            .lookup_creatable_data(addr, cidx, ctype, global, local)?;

        let mut data = match modified {
            None => {
                self.base_cache.borrow_mut().insert(addr, parent_data.clone());
                return Ok(parent_data);
            }
            Some(data) => data,
        };

        // The staged record is newer than the parent's; graft the missing
        // creatable entries onto it.
        match ctype {
            CreatableType::Asset => {
                if global {
                    if let Some(params) = parent_data.asset_params.get(&cidx) {
                        data.asset_params.insert(cidx, params.clone());
                    }
                }
                if local {
                    if let Some(holding) = parent_data.assets.get(&cidx) {
                        data.assets.insert(cidx, holding.clone());
                    }
                }
            }
            CreatableType::App => {
                let aidx = AppIndex::from(cidx);
                if global {
                    if let Some(params) = parent_data.app_params.get(&aidx) {
                        data.app_params.insert(aidx, params.clone());
                    }
                }
                if local {
                    if let Some(state) = parent_data.app_local_states.get(&aidx) {
                        data.app_local_states.insert(aidx, state.clone());
                    }
                }
            }
        }

        self.base_cache.borrow_mut().insert(addr, data.clone());
        Ok(data)
    }

    /// Errs if the txid or lease is already staged here or taken below.
    pub fn check_dup(
        &self,
        first_valid: Round,
        last_valid: Round,
        txid: TxId,
        lease: TxLease,
    ) -> OverlayResult<()> {
        if self.mods.txids.contains_key(&txid) {
            return Err(LedgerError::TransactionInLedger(txid).into());
        }

        if self.proto.support_tx_leases && !lease.lease.is_zero() {
            if let Some(expires) = self.mods.tx_leases.get(&lease) {
                if self.mods.hdr.round <= *expires {
                    return Err(LedgerError::LeaseInLedger { txid, lease }.into());
                }
            }
        }

        self.parent.check_dup(first_valid, last_valid, txid, lease)
    }

    pub fn txn_counter(&self) -> u64 {
        self.parent.txn_counter() + self.mods.txids.len() as u64
    }

    pub fn get_creator(
        &self,
        cidx: CreatableIndex,
        ctype: CreatableType,
    ) -> OverlayResult<Option<Address>> {
        if let Some(delta) = self.mods.creatables.get(&cidx) {
            if delta.created && delta.ctype == ctype {
                return Ok(Some(delta.creator));
            }
            return Ok(None);
        }
        self.parent.get_creator(cidx, ctype)
    }

    pub fn block_hdr(&self, rnd: Round) -> OverlayResult<BlockHeader> {
        self.parent.block_hdr(rnd)
    }

    pub fn cert_next(&self) -> Round {
        if self.mods.cert_next != Round::ZERO {
            return self.mods.cert_next;
        }
        self.parent.cert_next()
    }

    pub fn set_cert_next(&mut self, rnd: Round) {
        self.mods.cert_next = rnd;
    }

    /// Stages a new version of an account record, optionally recording a
    /// creatable birth or death alongside it.
    ///
    /// # Panics
    /// If the account was never looked up through this node.  Writes
    /// without a prior read are evaluator bugs, and staging them would
    /// leave writeback without a base record to reconcile against.
    pub fn put(
        &mut self,
        addr: Address,
        new: AccountData,
        new_creatable: Option<CreatableLocator>,
        deleted_creatable: Option<CreatableLocator>,
    ) {
        if !self.base_cache.borrow().contains_key(&addr) {
            panic!("overlay: put for {addr} without a prior lookup");
        }
        self.mods.accts.upsert(addr, new);

        if let Some(c) = new_creatable {
            self.mods.creatables.insert(
                c.cidx,
                ModifiedCreatable {
                    ctype: c.ctype,
                    creator: c.creator,
                    created: true,
                },
            );
        }
        if let Some(c) = deleted_creatable {
            self.mods.creatables.insert(
                c.cidx,
                ModifiedCreatable {
                    ctype: c.ctype,
                    creator: c.creator,
                    created: false,
                },
            );
        }
    }

    /// Records a transaction in the exclusion sets.
    pub fn add_tx(&mut self, txn: &Transaction) {
        self.mods.txids.insert(txn.txid, txn.last_valid);
        self.mods.tx_leases.insert(txn.lease_pair(), txn.last_valid);
    }

    pub fn modified_accounts(&self) -> Vec<Address> {
        self.mods.accts.modified_accounts()
    }

    /// Consumes this node, releasing the borrow on its parent and handing
    /// back everything it staged.
    pub fn into_parts(self) -> OverlayMods {
        OverlayMods {
            mods: self.mods,
            sdeltas: self.sdeltas,
            base_cache: self.base_cache.into_inner(),
        }
    }

    /// Folds a consumed child's staged state into this node.
    ///
    /// After this returns, observing this node is indistinguishable from
    /// having performed the child's operations here directly, except that a
    /// child's allocate-then-write sequences may have compressed into a
    /// single allocation with staged keys.
    pub fn absorb(&mut self, child: OverlayMods) {
        trace!(
            accounts = child.mods.accts.len(),
            stores = child.sdeltas.values().map(|m| m.len()).sum::<usize>(),
            "absorbing child overlay"
        );

        self.mods.accts.merge_accounts(child.mods.accts);

        self.mods.txids.extend(child.mods.txids);
        self.mods.tx_leases.extend(child.mods.tx_leases);
        self.mods.creatables.extend(child.mods.creatables);

        for (addr, smap) in child.sdeltas {
            let pmap = self.sdeltas.entry(addr).or_default();
            for (ptr, child_sd) in smap {
                match pmap.entry(ptr) {
                    Entry::Occupied(e) => e.into_mut().apply_child(child_sd),
                    Entry::Vacant(e) => {
                        e.insert(child_sd);
                    }
                }
            }
        }

        self.mods.cert_next = child.mods.cert_next;

        self.base_cache.get_mut().extend(child.base_cache);
    }

    /// Consumes the node and produces the final state delta, with every
    /// staged storage delta folded onto its owning account record.
    ///
    /// This is a trusted root-level path: an account that cannot be
    /// fetched, or a storage delta that does not match its record, is
    /// corruption and panics.
    pub fn into_state_delta(mut self) -> StateDelta {
        if self.sdeltas.is_empty() {
            return self.mods;
        }

        let sdeltas = mem::take(&mut self.sdeltas);
        for (addr, smap) in sdeltas {
            let mut data = match self.mods.accts.get(&addr) {
                Some(data) => data.clone(),
                None => self.lookup(addr).unwrap_or_else(|e| {
                    panic!("overlay: fetching account data failed for {addr}: {e}")
                }),
            };
            for (ptr, sd) in smap {
                apply_storage_delta(&mut data, ptr, &sd);
            }
            self.mods.accts.upsert(addr, data);
        }
        self.mods
    }
}

/// Applies one staged storage delta onto a materialized account record,
/// keeping the record's running schema total in step with allocations.
fn apply_storage_delta(data: &mut AccountData, ptr: StoragePtr, sd: &StorageDelta) {
    match ptr.scope {
        StorageScope::Global => match sd.action {
            StorageAction::Alloc => {
                let params = data.app_params.entry(ptr.aidx).or_default();
                let prev_schema = params.global_schema;
                params.global_schema = sd.max_counts;
                params.global_state.clear();
                apply_kv(&mut params.global_state, &sd.kv_cow);
                data.total_app_schema = retotal(data.total_app_schema, prev_schema, sd.max_counts);
            }
            StorageAction::Dealloc => {
                if let Some(params) = data.app_params.remove(&ptr.aidx) {
                    data.total_app_schema =
                        retotal(data.total_app_schema, params.global_schema, StateSchema::EMPTY);
                }
            }
            StorageAction::RemainAlloc => {
                let Some(params) = data.app_params.get_mut(&ptr.aidx) else {
                    panic!("overlay: global storage delta for app {} not on record", ptr.aidx);
                };
                apply_kv(&mut params.global_state, &sd.kv_cow);
            }
        },
        StorageScope::Local => match sd.action {
            StorageAction::Alloc => {
                let state = data.app_local_states.entry(ptr.aidx).or_default();
                let prev_schema = state.schema;
                state.schema = sd.max_counts;
                state.key_value.clear();
                apply_kv(&mut state.key_value, &sd.kv_cow);
                data.total_app_schema = retotal(data.total_app_schema, prev_schema, sd.max_counts);
            }
            StorageAction::Dealloc => {
                if let Some(state) = data.app_local_states.remove(&ptr.aidx) {
                    data.total_app_schema =
                        retotal(data.total_app_schema, state.schema, StateSchema::EMPTY);
                }
            }
            StorageAction::RemainAlloc => {
                let Some(state) = data.app_local_states.get_mut(&ptr.aidx) else {
                    panic!("overlay: local storage delta for app {} not on record", ptr.aidx);
                };
                apply_kv(&mut state.key_value, &sd.kv_cow);
            }
        },
    }
}

/// Swaps one store's contribution inside an account's schema total.
fn retotal(total: StateSchema, removed: StateSchema, added: StateSchema) -> StateSchema {
    total
        .checked_sub(&removed)
        .and_then(|t| t.checked_add(&added))
        .expect("overlay: account schema total out of range")
}

fn apply_kv(kv: &mut KvStore, staged: &HashMap<Vec<u8>, ValueDelta>) {
    for (key, vd) in staged {
        match &vd.new {
            Some(v) => {
                kv.insert(key.clone(), v.clone());
            }
            None => {
                kv.remove(key);
            }
        }
    }
}

impl OverlayParent for Overlay<'_> {
    fn lookup(&self, addr: Address) -> OverlayResult<AccountData> {
        Overlay::lookup(self, addr)
    }

    fn lookup_creatable_data(
        &self,
        addr: Address,
        cidx: CreatableIndex,
        ctype: CreatableType,
        global: bool,
        local: bool,
    ) -> OverlayResult<AccountData> {
        Overlay::lookup_creatable_data(self, addr, cidx, ctype, global, local)
    }

    fn check_dup(
        &self,
        first_valid: Round,
        last_valid: Round,
        txid: TxId,
        lease: TxLease,
    ) -> OverlayResult<()> {
        Overlay::check_dup(self, first_valid, last_valid, txid, lease)
    }

    fn txn_counter(&self) -> u64 {
        Overlay::txn_counter(self)
    }

    fn get_creator(
        &self,
        cidx: CreatableIndex,
        ctype: CreatableType,
    ) -> OverlayResult<Option<Address>> {
        Overlay::get_creator(self, cidx, ctype)
    }

    fn get_storage_counts(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema> {
        Overlay::get_storage_counts(self, addr, aidx, scope)
    }

    fn get_storage_limits(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema> {
        Overlay::get_storage_limits(self, addr, aidx, scope)
    }

    fn allocated(&self, addr: Address, aidx: AppIndex, scope: StorageScope) -> OverlayResult<bool> {
        Overlay::allocated(self, addr, aidx, scope)
    }

    fn get_key(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        key: &[u8],
    ) -> OverlayResult<Option<StateValue>> {
        self.fetch_key(addr, aidx, scope, key)
    }

    fn block_hdr(&self, rnd: Round) -> OverlayResult<BlockHeader> {
        Overlay::block_hdr(self, rnd)
    }

    fn cert_next(&self) -> Round {
        Overlay::cert_next(self)
    }
}
