use std::collections::HashMap;

use talus_acct_types::{AppIndex, KvDelta, StateSchema, StateValue, StorageScope, ValueOp};

/// Points at one app store: a `Local` pointer is meaningful per address,
/// a `Global` pointer is singular per app.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StoragePtr {
    pub aidx: AppIndex,
    pub scope: StorageScope,
}

impl StoragePtr {
    pub fn global(aidx: AppIndex) -> Self {
        Self {
            aidx,
            scope: StorageScope::Global,
        }
    }

    pub fn local(aidx: AppIndex) -> Self {
        Self {
            aidx,
            scope: StorageScope::Local,
        }
    }
}

/// Allocation lifecycle state of one staged store.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageAction {
    /// Storage existed below this layer and remains allocated.
    RemainAlloc,
    /// This layer brought the storage into existence.
    Alloc,
    /// This layer destroyed the storage.
    Dealloc,
}

/// One pending key/value change: the value as first observed by this layer,
/// and the value as staged now.  `None` means the key does not exist on
/// that side.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValueDelta {
    pub old: Option<StateValue>,
    pub new: Option<StateValue>,
}

impl ValueDelta {
    /// Produces the wire form of this delta, or `None` if it is redundant
    /// and must be dropped: transitions that do not change the observable
    /// mapping never appear on the wire.
    pub fn serialize(&self) -> Option<ValueOp> {
        let new = match &self.new {
            None => {
                return self.old.as_ref().map(|_| ValueOp::Delete);
            }
            Some(new) => new,
        };
        if self.old.as_ref() == Some(new) {
            return None;
        }
        Some(match new {
            StateValue::Bytes(b) => ValueOp::SetBytes(b.clone()),
            StateValue::Uint(u) => ValueOp::SetUint(*u),
        })
    }
}

/// Serializes a staged kv map into a wire delta, dropping redundant
/// entries.
pub(crate) fn serialize_kv(kv: &HashMap<Vec<u8>, ValueDelta>) -> KvDelta {
    kv.iter()
        .filter_map(|(key, vd)| vd.serialize().map(|op| (key.clone(), op)))
        .collect()
}

/// Pending state for one (account, app, scope) store: the allocation
/// action, staged key changes, and the current and maximum schema counts.
///
/// `counts` always reflects the *current* effective state (base plus staged
/// changes applied), not an increment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageDelta {
    pub action: StorageAction,
    pub kv_cow: HashMap<Vec<u8>, ValueDelta>,
    pub counts: StateSchema,
    pub max_counts: StateSchema,
}

impl StorageDelta {
    pub fn new(action: StorageAction, counts: StateSchema, max_counts: StateSchema) -> Self {
        Self {
            action,
            kv_cow: HashMap::new(),
            counts,
            max_counts,
        }
    }

    /// Folds a committing child's delta for the same store into this one.
    ///
    /// A child that allocated or deallocated observed an inconsistent prior
    /// view, so its delta replaces this one wholesale.  Otherwise the
    /// child's staged values land on top, preserving the `old` side each
    /// key had when this layer first saw it, and the child's counts
    /// overwrite ours since they are absolute.
    ///
    /// # Panics
    /// If the merge produces a deallocated store with staged keys.
    pub fn apply_child(&mut self, child: StorageDelta) {
        if child.action != StorageAction::RemainAlloc {
            self.action = child.action;
            self.kv_cow = child.kv_cow;
            self.counts = child.counts;
            self.max_counts = child.max_counts;
        } else {
            for (key, cvd) in child.kv_cow {
                match self.kv_cow.get_mut(&key) {
                    None => {
                        self.kv_cow.insert(key, cvd);
                    }
                    Some(vd) => {
                        vd.new = cvd.new;
                    }
                }
            }
            self.counts = child.counts;
        }

        if self.action == StorageAction::Dealloc && !self.kv_cow.is_empty() {
            panic!("overlay: deallocated storage delta with staged key changes");
        }
    }
}
