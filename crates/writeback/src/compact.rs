use std::{collections::HashMap, error::Error, mem};

use talus_acct_types::{Address, CreatableIndex};
use talus_ledger_types::{AccountData, AccountDeltas, EntityAction, EntityDelta};
use tracing::debug;

use crate::lru::LruAccounts;

/// An old account record as fetched from the store or the warm cache.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadedAccount {
    pub addr: Address,
    pub data: AccountData,
}

/// One address's coalesced change across a batch of rounds: the record
/// being replaced, the final record, and the netted-out creatable actions
/// split by kind.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AccountDelta {
    pub old: Option<LoadedAccount>,
    pub new: AccountData,
    pub created_deleted_holdings: EntityDelta,
    pub created_deleted_params: EntityDelta,
}

impl AccountDelta {
    /// Nets a later-round action against what is already recorded for the
    /// creatable.  An action met by its inverse reverts to the base state
    /// and drops the entry; anything else keeps the final action.
    fn merge_entity(&mut self, cidx: CreatableIndex, action: EntityAction) {
        let target = if action.is_holding() {
            &mut self.created_deleted_holdings
        } else {
            &mut self.created_deleted_params
        };
        match target.get(&cidx) {
            Some(existing) if *existing == action.inverse() => {
                target.remove(&cidx);
            }
            _ => {
                target.insert(cidx, action);
            }
        }
    }

    fn merge_entity_delta(&mut self, ed: &EntityDelta) {
        for (cidx, action) in ed {
            self.merge_entity(*cidx, *action);
        }
    }
}

/// Loads old account records for writeback, resolving cache misses in one
/// batch.  An account the store has never seen reads back as `None`.
pub trait OldAccountLoader {
    type Error: Error;

    fn load_old_account(&mut self, addr: Address) -> Result<Option<AccountData>, Self::Error>;
}

/// N rounds of per-address updates coalesced into one write batch, keyed
/// by address in first-touch order.
#[derive(Clone, Debug, Default)]
pub struct CompactAccountDeltas {
    deltas: Vec<AccountDelta>,
    addresses: Vec<Address>,
    idx_by_addr: HashMap<Address, usize>,

    // positions whose `old` still needs a store read
    misses: Vec<usize>,
}

impl CompactAccountDeltas {
    /// Coalesces an ordered sequence of round deltas, attaching old
    /// records from the warm cache and recording misses for
    /// [`Self::load_old`].
    pub fn from_rounds(rounds: &[AccountDeltas], base: &mut LruAccounts) -> Self {
        let hint = rounds.first().map(|r| r.len()).unwrap_or(0);
        let mut out = CompactAccountDeltas {
            deltas: Vec::with_capacity(hint),
            addresses: Vec::with_capacity(hint),
            idx_by_addr: HashMap::with_capacity(hint),
            misses: Vec::new(),
        };

        for round in rounds {
            for (addr, data) in round.iter() {
                let entity = round.entity_delta(addr);
                match out.idx_by_addr.get(addr) {
                    Some(&i) => {
                        let delta = &mut out.deltas[i];
                        delta.new = data.clone();
                        if let Some(ed) = entity {
                            delta.merge_entity_delta(ed);
                        }
                    }
                    None => {
                        let mut delta = AccountDelta {
                            new: data.clone(),
                            ..Default::default()
                        };
                        if let Some(ed) = entity {
                            delta.merge_entity_delta(ed);
                        }
                        let miss = match base.read(addr) {
                            Some(old) => {
                                delta.old = Some(old.clone());
                                false
                            }
                            None => true,
                        };
                        let i = out.insert(*addr, delta);
                        if miss {
                            out.misses.push(i);
                        }
                    }
                }
            }
        }

        debug!(
            rounds = rounds.len(),
            accounts = out.len(),
            misses = out.misses.len(),
            "coalesced account deltas"
        );
        out
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Whether any old records still need loading.
    pub fn has_misses(&self) -> bool {
        !self.misses.is_empty()
    }

    pub fn get(&self, addr: &Address) -> Option<(usize, &AccountDelta)> {
        self.idx_by_addr.get(addr).map(|&i| (i, &self.deltas[i]))
    }

    /// The entry at a position in first-touch order.
    ///
    /// # Panics
    /// If `i` is out of range.
    pub fn get_by_idx(&self, i: usize) -> (&Address, &AccountDelta) {
        (&self.addresses[i], &self.deltas[i])
    }

    /// Appends a new address.  The caller must know it is absent.
    pub fn insert(&mut self, addr: Address, delta: AccountDelta) -> usize {
        let i = self.deltas.len();
        self.deltas.push(delta);
        self.addresses.push(addr);
        self.idx_by_addr.insert(addr, i);
        i
    }

    pub fn upsert(&mut self, addr: Address, delta: AccountDelta) {
        match self.idx_by_addr.get(&addr) {
            Some(&i) => self.deltas[i] = delta,
            None => {
                self.insert(addr, delta);
            }
        }
    }

    pub fn update(&mut self, i: usize, delta: AccountDelta) {
        self.deltas[i] = delta;
    }

    /// Attaches an old record to its address's entry, inserting a
    /// plain-replacement entry if the address is new.
    pub fn upsert_old(&mut self, old: LoadedAccount) {
        match self.idx_by_addr.get(&old.addr) {
            Some(&i) => self.deltas[i].old = Some(old),
            None => {
                let addr = old.addr;
                self.insert(
                    addr,
                    AccountDelta {
                        old: Some(old),
                        ..Default::default()
                    },
                );
            }
        }
    }

    pub fn update_old(&mut self, i: usize, old: LoadedAccount) {
        self.deltas[i].old = Some(old);
    }

    /// Resolves every recorded miss through the loader.  Accounts missing
    /// from the store get an empty old record, matching a fresh address's
    /// base state.  Loader errors surface verbatim, leaving the remaining
    /// misses intact.
    pub fn load_old<L: OldAccountLoader>(&mut self, loader: &mut L) -> Result<(), L::Error> {
        let misses = mem::take(&mut self.misses);
        for (pos, &i) in misses.iter().enumerate() {
            let addr = self.addresses[i];
            let data = match loader.load_old_account(addr) {
                Ok(data) => data.unwrap_or_default(),
                Err(e) => {
                    // keep the unresolved tail so a retry can finish
                    self.misses = misses[pos..].to_vec();
                    return Err(e);
                }
            };
            self.update_old(i, LoadedAccount { addr, data });
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AccountDelta)> {
        self.addresses.iter().zip(self.deltas.iter())
    }
}
