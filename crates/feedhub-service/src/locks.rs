use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use feedhub_core::SourceId;

/// One async mutex per source id, created on first use.
#[derive(Debug, Default)]
pub(crate) struct SourceLocks {
    locks: Mutex<HashMap<SourceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SourceLocks {
    pub(crate) fn for_source(&self, id: SourceId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }

    pub(crate) fn forget(&self, id: SourceId) {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
    }
}
