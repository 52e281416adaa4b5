//! Shared helpers for overlay integration tests.

use talus_acct_types::{AppIndex, StateValue, StorageScope};
use talus_overlay::{Overlay, OverlayResult, StatefulEvaluator};

/// A scripted stand-in for the program interpreter: plays a fixed list of
/// key writes and deletes against the ledger it is handed, then passes or
/// rejects.
pub struct ScriptedProgram {
    pub writes: Vec<ProgramWrite>,
    pub pass: bool,
}

pub struct ProgramWrite {
    pub addr: talus_acct_types::Address,
    pub scope: StorageScope,
    pub account_idx: u64,
    pub key: Vec<u8>,
    /// `None` deletes the key.
    pub value: Option<StateValue>,
}

impl StatefulEvaluator for ScriptedProgram {
    fn eval_stateful(
        &mut self,
        ledger: &mut Overlay<'_>,
        aidx: AppIndex,
        _program: &[u8],
    ) -> OverlayResult<bool> {
        for w in &self.writes {
            match &w.value {
                Some(v) => ledger.set_key(
                    w.addr,
                    aidx,
                    w.scope,
                    w.key.clone(),
                    v.clone(),
                    w.account_idx,
                )?,
                None => ledger.del_key(w.addr, aidx, w.scope, &w.key, w.account_idx)?,
            }
        }
        Ok(self.pass)
    }
}

/// A read-modify-write program: increments a uint under `key` in the app's
/// global store.
pub struct CounterProgram {
    pub owner: talus_acct_types::Address,
    pub key: Vec<u8>,
}

impl StatefulEvaluator for CounterProgram {
    fn eval_stateful(
        &mut self,
        ledger: &mut Overlay<'_>,
        aidx: AppIndex,
        _program: &[u8],
    ) -> OverlayResult<bool> {
        let current = match ledger.get_key(self.owner, aidx, StorageScope::Global, &self.key, 0)? {
            Some(StateValue::Uint(n)) => n,
            _ => 0,
        };
        ledger.set_key(
            self.owner,
            aidx,
            StorageScope::Global,
            self.key.clone(),
            StateValue::Uint(current + 1),
            0,
        )?;
        Ok(true)
    }
}
