//! Read-only base adapter: bridges the overlay chain onto a persistent
//! ledger view, and the dry-run construction helper built on it.

use talus_acct_types::{
    Address, AppIndex, CreatableIndex, CreatableType, Round, StateSchema, StateValue, StorageScope,
    TxId,
};
use talus_ledger_types::{AccountData, BlockHeader, ProtocolVersion, TxLease};

use crate::{
    errors::{OverlayError, OverlayResult, StorageOp},
    node::Overlay,
    parent::OverlayParent,
};

/// The read-only ledger surface the base adapter consumes.  Implementations
/// may block on I/O; the overlay core never will on its own.
pub trait LedgerReader {
    /// Fetches an account record as of a round.
    fn lookup(&self, rnd: Round, addr: Address) -> OverlayResult<AccountData>;

    /// The creator of a creatable, if it exists.
    fn get_creator(
        &self,
        cidx: CreatableIndex,
        ctype: CreatableType,
    ) -> OverlayResult<Option<Address>>;

    /// A sealed block header.
    fn block_hdr(&self, rnd: Round) -> OverlayResult<BlockHeader>;

    /// Errs if the txid or lease is taken within the validity window.
    fn check_dup(
        &self,
        first_valid: Round,
        last_valid: Round,
        txid: TxId,
        lease: TxLease,
    ) -> OverlayResult<()>;
}

/// Adapts a [`LedgerReader`] to the parent interface of an overlay chain,
/// answering app-storage questions by digging into account records.
pub struct OverlayBase<'l> {
    l: &'l dyn LedgerReader,

    // Base round all lookups are pinned to, one before the round being
    // staged above.
    rnd: Round,

    txn_count: u64,
    cert_next: Round,
}

impl<'l> OverlayBase<'l> {
    pub fn new(l: &'l dyn LedgerReader, rnd: Round, txn_count: u64, cert_next: Round) -> Self {
        Self {
            l,
            rnd,
            txn_count,
            cert_next,
        }
    }
}

impl OverlayParent for OverlayBase<'_> {
    fn lookup(&self, addr: Address) -> OverlayResult<AccountData> {
        self.l.lookup(self.rnd, addr)
    }

    fn lookup_creatable_data(
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
        // Base records are fetched whole, so the plain lookup already
        // carries every creatable entry.
        self.l.lookup(self.rnd, addr)
    }

    fn check_dup(
        &self,
        first_valid: Round,
        last_valid: Round,
        txid: TxId,
        lease: TxLease,
    ) -> OverlayResult<()> {
        self.l.check_dup(first_valid, last_valid, txid, lease)
    }

    fn txn_counter(&self) -> u64 {
        self.txn_count
    }

    fn get_creator(
        &self,
        cidx: CreatableIndex,
        ctype: CreatableType,
    ) -> OverlayResult<Option<Address>> {
        self.l.get_creator(cidx, ctype)
    }

    fn get_storage_counts(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema> {
        let data = self.l.lookup(self.rnd, addr)?;
        Ok(data.storage_counts(aidx, scope))
    }

    fn get_storage_limits(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
    ) -> OverlayResult<StateSchema> {
        let data = self.l.lookup(self.rnd, addr)?;
        Ok(data.storage_limits(aidx, scope))
    }

    fn allocated(&self, addr: Address, aidx: AppIndex, scope: StorageScope) -> OverlayResult<bool> {
        let data = self.l.lookup(self.rnd, addr)?;
        Ok(data.allocated(aidx, scope))
    }

    fn get_key(
        &self,
        addr: Address,
        aidx: AppIndex,
        scope: StorageScope,
        key: &[u8],
    ) -> OverlayResult<Option<StateValue>> {
        let data = self.l.lookup(self.rnd, addr)?;
        if !data.allocated(aidx, scope) {
            return Err(OverlayError::no_storage(StorageOp::FetchKey, addr, aidx, scope));
        }
        Ok(data.get_key(aidx, scope, key))
    }

    fn block_hdr(&self, rnd: Round) -> OverlayResult<BlockHeader> {
        self.l.block_hdr(rnd)
    }

    fn cert_next(&self) -> Round {
        self.cert_next
    }
}

/// Builds a root overlay over a base adapter for off-chain evaluation:
/// dry-runs, debuggers, anything that wants to play out a program against
/// a sealed round without staging a block.
pub fn debug_overlay<'a>(
    base: &'a OverlayBase<'a>,
    round: Round,
    version: ProtocolVersion,
    prev_timestamp: i64,
) -> Overlay<'a> {
    let hdr = BlockHeader {
        round,
        current_protocol: version,
        ..Default::default()
    };
    Overlay::new(base, hdr, prev_timestamp)
}
