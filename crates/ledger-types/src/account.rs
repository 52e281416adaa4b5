use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use talus_acct_types::{
    AppIndex, CreatableIndex, MicroUnits, StateSchema, StateValue, StorageScope,
};

/// Materialized key/value store, as held inside an account record.
pub type KvStore = BTreeMap<Vec<u8>, StateValue>;

/// Computes the schema usage of a materialized store.
pub fn kv_schema_counts(kv: &KvStore) -> StateSchema {
    let mut counts = StateSchema::EMPTY;
    for v in kv.values() {
        match v {
            StateValue::Uint(_) => counts.num_uint += 1,
            StateValue::Bytes(_) => counts.num_byte_slice += 1,
        }
    }
    counts
}

/// An account's holding of a single asset.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct AssetHolding {
    pub amount: u64,
    pub frozen: bool,
}

/// The parameters of an asset created by this account.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct AssetParams {
    pub total: u64,
    pub decimals: u32,
    pub default_frozen: bool,
}

/// The parameters of an app created by this account, including its global
/// store and the schemas constraining both scopes.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct AppParams {
    pub global_state: KvStore,
    pub global_schema: StateSchema,
    pub local_schema: StateSchema,
}

/// An account's local store for one app it has opted in to.
///
/// The schema is a copy of the app's local schema at opt-in time, so limits
/// can be answered without chasing the creator's record.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct AppLocalState {
    pub schema: StateSchema,
    pub key_value: KvStore,
}

/// Full account record, as stored and as staged through the overlay.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
    Arbitrary,
)]
pub struct AccountData {
    pub balance: MicroUnits,
    pub assets: BTreeMap<CreatableIndex, AssetHolding>,
    pub asset_params: BTreeMap<CreatableIndex, AssetParams>,
    pub app_params: BTreeMap<AppIndex, AppParams>,
    pub app_local_states: BTreeMap<AppIndex, AppLocalState>,

    /// Running sum of the schemas this account is on the hook for: the
    /// global schema of every app it created plus the local schema of
    /// every app it opted in to.  Maintained when storage is allocated or
    /// deallocated on the record.
    pub total_app_schema: StateSchema,
}

impl AccountData {
    /// Whether app storage exists on this record for the given pointer.
    pub fn allocated(&self, aidx: AppIndex, scope: StorageScope) -> bool {
        match scope {
            StorageScope::Global => self.app_params.contains_key(&aidx),
            StorageScope::Local => self.app_local_states.contains_key(&aidx),
        }
    }

    /// Current schema usage of the given store.  Zero if not allocated.
    pub fn storage_counts(&self, aidx: AppIndex, scope: StorageScope) -> StateSchema {
        match scope {
            StorageScope::Global => self
                .app_params
                .get(&aidx)
                .map(|p| kv_schema_counts(&p.global_state))
                .unwrap_or_default(),
            StorageScope::Local => self
                .app_local_states
                .get(&aidx)
                .map(|ls| kv_schema_counts(&ls.key_value))
                .unwrap_or_default(),
        }
    }

    /// Capacity schema of the given store.  Zero if not allocated.
    pub fn storage_limits(&self, aidx: AppIndex, scope: StorageScope) -> StateSchema {
        match scope {
            StorageScope::Global => self
                .app_params
                .get(&aidx)
                .map(|p| p.global_schema)
                .unwrap_or_default(),
            StorageScope::Local => self
                .app_local_states
                .get(&aidx)
                .map(|ls| ls.schema)
                .unwrap_or_default(),
        }
    }

    /// Reads one key out of the given store.
    pub fn get_key(&self, aidx: AppIndex, scope: StorageScope, key: &[u8]) -> Option<StateValue> {
        let kv = match scope {
            StorageScope::Global => &self.app_params.get(&aidx)?.global_state,
            StorageScope::Local => &self.app_local_states.get(&aidx)?.key_value,
        };
        kv.get(key).cloned()
    }
}
