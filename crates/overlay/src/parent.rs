use talus_acct_types::{
    Address, AppIndex, CreatableIndex, CreatableType, Round, StateSchema, StateValue, StorageScope,
    TxId,
};
use talus_ledger_types::{AccountData, BlockHeader, TxLease};

use crate::errors::OverlayResult;

/// Read capability an overlay node consumes from the layer below it.
///
/// There are two implementations: another overlay node, and the adapter
/// over the persistent base.  Everything here is a read; a node never
/// mutates what is beneath it.
pub trait OverlayParent {
    /// Fetches a full account record.
    fn lookup(&self, addr: Address) -> OverlayResult<AccountData>;

    /// Fetches an account record guaranteed to carry the given creatable's
    /// entries (params and/or holding) if they exist at all.
    ///
    /// # Panics
    /// If neither `global` nor `local` is requested.
    fn lookup_creatable_data(
        &self,
        addr: Address,
        cidx: CreatableIndex,
        ctype: CreatableType,
        global: bool,
        local: bool,
    ) -> OverlayResult<AccountData>;

    /// Errs if the txid or the lease is already taken in the validity
    /// window.
    fn check_dup(
        &self,
        first_valid: Round,
        last_valid: Round,
        txid: TxId,
        lease: TxLease,
    ) -> OverlayResult<()>;

    /// Transactions committed up through this layer.
    fn txn_counter(&self) -> u64;

    /// The creator of a creatable, if it exists at this layer or below.
    fn get_creator(
        &self,
        cidx: CreatableIndex,
        ctype: CreatableType,
    ) -> OverlayResult<Option<Address>>;

    /// Current schema usage of one app store.
    fn get_storage_counts(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema>;

    /// Capacity schema of one app store.
    ///
    /// Redundant with [`Self::lookup`], but kept separate so schema checks
    /// don't drag whole account records through the chain.
    fn get_storage_limits(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema>;

    /// Whether one app store exists.
    fn allocated(&self, addr: Address, aidx: AppIndex, scope: StorageScope) -> OverlayResult<bool>;

    /// Reads one key from one app store.  `None` means allocated but
    /// unset.
    fn get_key(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        key: &[u8],
    ) -> OverlayResult<Option<StateValue>>;

    /// A previously sealed block header.
    fn block_hdr(&self, rnd: Round) -> OverlayResult<BlockHeader>;

    /// The next round for which a cert is due.
    fn cert_next(&self) -> Round;
}
