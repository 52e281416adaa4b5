use std::collections::{BTreeMap, HashMap};

use talus_acct_types::{Address, CreatableIndex, CreatableType, Round, TxId};

use crate::{account::AccountData, header::BlockHeader, txn::TxLease};

/// An action recorded against one creatable on one account: a holding or a
/// params entry came into existence, or went away.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntityAction {
    HoldingCreate,
    HoldingDelete,
    ParamsCreate,
    ParamsDelete,
}

impl EntityAction {
    /// The action that undoes this one.  Applying an action and then its
    /// inverse across rounds nets out to the base state.
    pub fn inverse(&self) -> EntityAction {
        match self {
            EntityAction::HoldingCreate => EntityAction::HoldingDelete,
            EntityAction::HoldingDelete => EntityAction::HoldingCreate,
            EntityAction::ParamsCreate => EntityAction::ParamsDelete,
            EntityAction::ParamsDelete => EntityAction::ParamsCreate,
        }
    }

    /// Whether this action concerns a holding (as opposed to params).
    pub fn is_holding(&self) -> bool {
        matches!(self, EntityAction::HoldingCreate | EntityAction::HoldingDelete)
    }
}

/// Creatable actions for one account, keyed by creatable index.
pub type EntityDelta = BTreeMap<CreatableIndex, EntityAction>;

/// A creatable that came into existence or was destroyed during evaluation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModifiedCreatable {
    pub ctype: CreatableType,
    pub creator: Address,
    pub created: bool,
}

/// Identifies a creatable together with its creator, for recording
/// existence changes through the account-update path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CreatableLocator {
    pub cidx: CreatableIndex,
    pub ctype: CreatableType,
    pub creator: Address,
}

/// Per-round account updates: an order-preserving upsert list plus the
/// creatable actions recorded against each address.
///
/// Iteration order is first-touch order, which the writeback layer relies
/// on to keep batches deterministic.
#[derive(Clone, Debug, Default)]
pub struct AccountDeltas {
    accts: Vec<(Address, AccountData)>,
    idx: HashMap<Address, usize>,
    entity_deltas: HashMap<Address, EntityDelta>,
}

impl AccountDeltas {
    pub fn len(&self) -> usize {
        self.accts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accts.is_empty()
    }

    pub fn get(&self, addr: &Address) -> Option<&AccountData> {
        self.idx.get(addr).map(|i| &self.accts[*i].1)
    }

    /// The record at a position in first-touch order.
    ///
    /// # Panics
    /// If `i` is out of range.
    pub fn get_by_idx(&self, i: usize) -> (&Address, &AccountData) {
        let (addr, data) = &self.accts[i];
        (addr, data)
    }

    pub fn upsert(&mut self, addr: Address, data: AccountData) {
        match self.idx.get(&addr) {
            Some(i) => self.accts[*i].1 = data,
            None => {
                self.idx.insert(addr, self.accts.len());
                self.accts.push((addr, data));
            }
        }
    }

    /// Records a creatable action against an address, overwriting any
    /// earlier action for the same creatable within this round.
    pub fn set_entity_delta(&mut self, addr: Address, cidx: CreatableIndex, action: EntityAction) {
        self.entity_deltas.entry(addr).or_default().insert(cidx, action);
    }

    pub fn entity_delta(&self, addr: &Address) -> Option<&EntityDelta> {
        self.entity_deltas.get(addr)
    }

    /// Folds `other` into this set: last writer wins per address, and
    /// `other`'s creatable actions land on top of ours.
    pub fn merge_accounts(&mut self, other: AccountDeltas) {
        for (addr, data) in other.accts {
            self.upsert(addr, data);
        }
        for (addr, ed) in other.entity_deltas {
            self.entity_deltas.entry(addr).or_default().extend(ed);
        }
    }

    pub fn modified_accounts(&self) -> Vec<Address> {
        self.accts.iter().map(|(a, _)| *a).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AccountData)> {
        self.accts.iter().map(|(a, d)| (a, d))
    }
}

/// Top-level state delta staged by one overlay node: account mutations, the
/// txid and lease exclusion sets, creatable mutations, and the cert-round
/// pointer, all against a fixed block header.
#[derive(Clone, Debug)]
pub struct StateDelta {
    pub accts: AccountDeltas,
    pub txids: HashMap<TxId, Round>,
    pub tx_leases: HashMap<TxLease, Round>,
    pub creatables: HashMap<CreatableIndex, ModifiedCreatable>,
    pub cert_next: Round,
    pub hdr: BlockHeader,
    pub prev_timestamp: i64,
}

impl StateDelta {
    pub fn new(hdr: BlockHeader, prev_timestamp: i64, cert_next: Round) -> Self {
        Self {
            accts: AccountDeltas::default(),
            txids: HashMap::new(),
            tx_leases: HashMap::new(),
            creatables: HashMap::new(),
            cert_next,
            hdr,
            prev_timestamp,
        }
    }
}
