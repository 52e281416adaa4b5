//! App key/value storage operations on the overlay: allocation lifecycle,
//! reads and writes with schema accounting, and eval-delta construction.

use talus_acct_types::{
    Address, AppIndex, EvalDelta, StateSchema, StateValue, StorageScope, ValueType,
};
use talus_ledger_types::Transaction;
use tracing::debug;

use crate::{
    errors::{OverlayError, OverlayResult, StorageOp},
    node::Overlay,
    storage::{serialize_kv, StorageAction, StorageDelta, StoragePtr, ValueDelta},
};

impl Overlay<'_> {
    /// Whether one app store exists, as seen through this layer.
    pub fn allocated(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<bool> {
        // An allocation event staged in this very layer masks everything
        // below it.
        if let Some(sd) = self.storage_delta(addr, StoragePtr { aidx, scope }) {
            match sd.action {
                StorageAction::Alloc => return Ok(true),
                StorageAction::Dealloc => return Ok(false),
                StorageAction::RemainAlloc => {}
            }
        }
        self.parent.allocated(addr, aidx, scope)
    }

    /// Current schema usage of one app store.  Zero if not allocated.
    pub fn get_storage_counts(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema> {
        if !self.allocated(addr, aidx, scope)? {
            return Ok(StateSchema::EMPTY);
        }
        if let Some(sd) = self.storage_delta(addr, StoragePtr { aidx, scope }) {
            return Ok(sd.counts);
        }
        self.parent.get_storage_counts(addr, aidx, scope)
    }

    /// Capacity schema of one app store.  Zero if not allocated.
    pub fn get_storage_limits(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema> {
        if !self.allocated(addr, aidx, scope)? {
            return Ok(StateSchema::EMPTY);
        }
        if let Some(sd) = self.storage_delta(addr, StoragePtr { aidx, scope }) {
            return Ok(sd.max_counts);
        }
        self.parent.get_storage_limits(addr, aidx, scope)
    }

    /// The fall-through read underneath [`Overlay::get_key`].
    pub(crate) fn fetch_key(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        key: &[u8],
    ) -> OverlayResult<Option<StateValue>> {
        if !self.allocated(addr, aidx, scope)? {
            return Err(OverlayError::no_storage(StorageOp::FetchKey, addr, aidx, scope));
        }

        if let Some(sd) = self.storage_delta(addr, StoragePtr { aidx, scope }) {
            // A staged entry answers for the key even when it is a staged
            // delete.
            if let Some(vd) = sd.kv_cow.get(key) {
                return Ok(vd.new.clone());
            }

            // An allocation event in this layer masks parent state: the
            // store began (or ended) here, so missing keys are just
            // missing.
            if sd.action != StorageAction::RemainAlloc {
                return Ok(None);
            }
        }

        self.parent.get_key(addr, aidx, scope, key)
    }

    /// Reads one key from one app store.
    ///
    /// `account_idx` is the caller's index for `addr` within its own
    /// account array; it only matters for historical delta replay, where
    /// the first index seen per store is reused when keying local deltas.
    pub fn get_key(
        &mut self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        key: &[u8],
        account_idx: u64,
    ) -> OverlayResult<Option<StateValue>> {
        let value = self.fetch_key(addr, aidx, scope, key)?;
        self.note_account_idx(addr, StoragePtr { aidx, scope }, account_idx);
        Ok(value)
    }

    /// Writes one key into one app store, maintaining schema counts.
    pub fn set_key(
        &mut self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        key: Vec<u8>,
        value: StateValue,
        account_idx: u64,
    ) -> OverlayResult<()> {
        if key.len() > self.proto().max_app_key_len {
            return Err(OverlayError::KeyTooLong {
                len: key.len(),
                max: self.proto().max_app_key_len,
            });
        }
        if let StateValue::Bytes(b) = &value {
            if b.len() > self.proto().max_app_bytes_value_len {
                return Err(OverlayError::ValueTooLong {
                    key,
                    len: b.len(),
                    max: self.proto().max_app_bytes_value_len,
                });
            }
        }

        if !self.allocated(addr, aidx, scope)? {
            return Err(OverlayError::no_storage(StorageOp::SetKey, addr, aidx, scope));
        }
        let ptr = StoragePtr { aidx, scope };
        self.note_account_idx(addr, ptr, account_idx);

        // The before/after reads bracket the staged write so the count
        // update sees exactly the transition this call makes.
        let old = self.fetch_key(addr, aidx, scope, &key)?;

        let sd = self.ensure_storage_delta(addr, aidx, scope, StorageAction::RemainAlloc)?;
        let vd = sd.kv_cow.entry(key.clone()).or_insert_with(|| ValueDelta {
            old: old.clone(),
            new: None,
        });
        vd.new = Some(value);

        let new = self.fetch_key(addr, aidx, scope, &key)?;

        let sd = self.storage_delta_mut(addr, ptr);
        update_counts(sd, old.as_ref(), new.as_ref());
        check_counts(sd)
    }

    /// Deletes one key from one app store.
    ///
    /// A deletion cannot raise counts, so there is no schema check.
    pub fn del_key(
        &mut self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        key: &[u8],
        account_idx: u64,
    ) -> OverlayResult<()> {
        if !self.allocated(addr, aidx, scope)? {
            return Err(OverlayError::no_storage(StorageOp::DelKey, addr, aidx, scope));
        }
        let ptr = StoragePtr { aidx, scope };
        self.note_account_idx(addr, ptr, account_idx);

        let old = self.fetch_key(addr, aidx, scope, key)?;

        let legacy = self.legacy_idx_mode;
        let sd = match self.ensure_storage_delta(addr, aidx, scope, StorageAction::RemainAlloc) {
            Ok(sd) => sd,
            // Blocks sealed under the legacy rules were produced by code
            // that dropped this error; replay has to keep dropping it.
            Err(_) if legacy => return Ok(()),
            Err(e) => return Err(e),
        };
        let vd = sd.kv_cow.entry(key.to_vec()).or_insert_with(|| ValueDelta {
            old: old.clone(),
            new: None,
        });
        vd.new = None;

        let new = self.fetch_key(addr, aidx, scope, key)?;

        let sd = self.storage_delta_mut(addr, ptr);
        update_counts(sd, old.as_ref(), new.as_ref());
        Ok(())
    }

    /// Brings one app store into existence with the given capacity.
    pub fn allocate(
        &mut self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        space: StateSchema,
    ) -> OverlayResult<()> {
        if self.allocated(addr, aidx, scope)? {
            return Err(OverlayError::already_allocated(
                StorageOp::Allocate,
                addr,
                aidx,
                scope,
            ));
        }

        let sd = self.ensure_storage_delta(addr, aidx, scope, StorageAction::Alloc)?;
        sd.action = StorageAction::Alloc;
        sd.max_counts = space;
        Ok(())
    }

    /// Destroys one app store and everything staged against it.
    pub fn deallocate(&mut self, addr: Address, aidx: AppIndex, scope: StorageScope) -> OverlayResult<()> {
        if !self.allocated(addr, aidx, scope)? {
            return Err(OverlayError::no_storage(StorageOp::Deallocate, addr, aidx, scope));
        }

        let sd = self.ensure_storage_delta(addr, aidx, scope, StorageAction::Dealloc)?;
        sd.action = StorageAction::Dealloc;
        sd.counts = StateSchema::EMPTY;
        sd.max_counts = StateSchema::EMPTY;
        sd.kv_cow.clear();
        Ok(())
    }

    /// Converts this node's staged storage deltas into the wire delta for
    /// one app evaluation, keying local deltas by transaction account
    /// index.
    ///
    /// # Panics
    /// If a staged delta belongs to a different app, or more than one
    /// global delta exists.  Both are runtime invariant violations, not
    /// program errors.
    pub fn build_delta(&self, aidx: AppIndex, txn: &Transaction) -> OverlayResult<EvalDelta> {
        let mut delta = EvalDelta::default();
        let mut found_global = false;

        for (addr, smap) in &self.sdeltas {
            for (ptr, sd) in smap {
                if ptr.aidx != aidx {
                    panic!(
                        "overlay: storage delta for app {} while building delta for app {}",
                        ptr.aidx, aidx
                    );
                }
                match ptr.scope {
                    StorageScope::Global => {
                        if found_global {
                            panic!("overlay: more than one global delta for app {aidx}");
                        }
                        delta.global_delta = serialize_kv(&sd.kv_cow);
                        found_global = true;
                    }
                    StorageScope::Local => {
                        // There can only ever be one local delta per
                        // (address, app) pair, so the index cannot collide.
                        let idx = match self.legacy_account_idx(addr, ptr) {
                            Some(idx) => idx,
                            None => txn.index_by_address(*addr, txn.sender)?,
                        };
                        delta.local_deltas.insert(idx, serialize_kv(&sd.kv_cow));
                    }
                }
            }
        }

        Ok(delta)
    }

    /// Runs a stateful program in a child layer.  On pass, the child's
    /// effects fold into this node and its wire delta is returned; on
    /// reject or error the child is discarded untouched.
    pub fn stateful_eval<E: StatefulEvaluator>(
        &mut self,
        evaluator: &mut E,
        aidx: AppIndex,
        txn: &Transaction,
        program: &[u8],
    ) -> OverlayResult<(bool, EvalDelta)> {
        let mut child = self.child();
        let pass = evaluator.eval_stateful(&mut child, aidx, program)?;

        if !pass {
            debug!(%aidx, "stateful program rejected, dropping child overlay");
            return Ok((false, EvalDelta::default()));
        }

        let delta = child.build_delta(aidx, txn)?;
        let parts = child.into_parts();
        self.absorb(parts);
        Ok((true, delta))
    }

    /// Returns the staged delta for one store, creating it with
    /// `default_action` and counts seeded from the first layer that knows
    /// them.
    fn ensure_storage_delta(
        &mut self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        default_action: StorageAction,
    ) -> OverlayResult<&mut StorageDelta> {
        let ptr = StoragePtr { aidx, scope };
        if self.storage_delta(addr, ptr).is_none() {
            let counts = self.get_storage_counts(addr, aidx, scope)?;
            let max_counts = self.get_storage_limits(addr, aidx, scope)?;
            self.sdeltas
                .entry(addr)
                .or_default()
                .insert(ptr, StorageDelta::new(default_action, counts, max_counts));
        }
        Ok(self.storage_delta_mut(addr, ptr))
    }

    fn storage_delta_mut(&mut self, addr: Address, ptr: StoragePtr) -> &mut StorageDelta {
        self.sdeltas
            .get_mut(&addr)
            .and_then(|m| m.get_mut(&ptr))
            .expect("overlay: storage delta must exist")
    }

    /// Captures the account index a program used for a store, first seen
    /// wins.  Only meaningful in historical replay mode.
    fn note_account_idx(&mut self, addr: Address, ptr: StoragePtr, account_idx: u64) {
        if !self.legacy_idx_mode {
            return;
        }
        self.legacy_idx_cache
            .entry(addr)
            .or_default()
            .entry(ptr)
            .or_insert(account_idx);
    }

    fn legacy_account_idx(&self, addr: &Address, ptr: &StoragePtr) -> Option<u64> {
        if !self.legacy_idx_mode {
            return None;
        }
        self.legacy_idx_cache
            .get(addr)
            .and_then(|m| m.get(ptr))
            .copied()
    }
}

/// Executes stateful programs against app storage exposed through an
/// overlay child.  The real interpreter lives elsewhere; this is its seam.
pub trait StatefulEvaluator {
    fn eval_stateful(
        &mut self,
        ledger: &mut Overlay<'_>,
        aidx: AppIndex,
        program: &[u8],
    ) -> OverlayResult<bool>;
}

/// Adjusts current counts for a value transition.  Counts track the
/// effective state, so a vanished value decrements its type and a present
/// one increments its type.
///
/// # Panics
/// On count underflow, which means the staged counts disagree with the
/// observable store.
fn update_counts(
    sd: &mut StorageDelta,
    before: Option<&StateValue>,
    after: Option<&StateValue>,
) {
    if let Some(v) = before {
        match v.value_type() {
            ValueType::Uint => {
                sd.counts.num_uint = sd
                    .counts
                    .num_uint
                    .checked_sub(1)
                    .expect("overlay: uint count underflow");
            }
            ValueType::Bytes => {
                sd.counts.num_byte_slice = sd
                    .counts
                    .num_byte_slice
                    .checked_sub(1)
                    .expect("overlay: byte-slice count underflow");
            }
        }
    }

    if let Some(v) = after {
        match v.value_type() {
            ValueType::Uint => sd.counts.num_uint += 1,
            ValueType::Bytes => sd.counts.num_byte_slice += 1,
        }
    }
}

fn check_counts(sd: &StorageDelta) -> OverlayResult<()> {
    if sd.counts.num_uint > sd.max_counts.num_uint {
        return Err(OverlayError::UintCountExceeded {
            count: sd.counts.num_uint,
            max: sd.max_counts.num_uint,
        });
    }
    if sd.counts.num_byte_slice > sd.max_counts.num_byte_slice {
        return Err(OverlayError::ByteCountExceeded {
            count: sd.counts.num_byte_slice,
            max: sd.max_counts.num_byte_slice,
        });
    }
    Ok(())
}
