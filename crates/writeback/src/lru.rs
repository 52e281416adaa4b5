use std::num::NonZeroUsize;

use talus_acct_types::Address;
use tracing::warn;

use crate::compact::LoadedAccount;

/// Wrapper around an LRU cache of recently written account records.
///
/// The writeback path stages cache fills into a pending buffer while a
/// flush is being assembled, then folds them in at a quiet point, so cache
/// population never interleaves with batch construction.
pub struct LruAccounts {
    accounts: lru::LruCache<Address, LoadedAccount>,
    pending: Vec<LoadedAccount>,
    pending_warn_threshold: usize,
}

impl LruAccounts {
    /// Creates a cache with some maximum capacity, measured in entries.
    pub fn new(capacity: NonZeroUsize, pending_warn_threshold: usize) -> Self {
        Self {
            accounts: lru::LruCache::new(capacity),
            pending: Vec::new(),
            pending_warn_threshold,
        }
    }

    /// Fetches an entry, refreshing its recency.
    pub fn read(&mut self, addr: &Address) -> Option<&LoadedAccount> {
        self.accounts.get(addr)
    }

    /// Installs an entry immediately.
    pub fn write(&mut self, acct: LoadedAccount) {
        self.accounts.put(acct.addr, acct);
    }

    /// Stages an entry for the next flush.
    pub fn write_pending(&mut self, acct: LoadedAccount) {
        self.pending.push(acct);
        if self.pending.len() == self.pending_warn_threshold {
            warn!(
                pending = self.pending.len(),
                "account cache pending queue reached its threshold"
            );
        }
    }

    /// Folds staged entries into the cache.  Returns how many landed.
    pub fn flush_pending(&mut self) -> usize {
        let n = self.pending.len();
        for acct in self.pending.drain(..) {
            self.accounts.put(acct.addr, acct);
        }
        n
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
