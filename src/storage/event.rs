use crate::context::ContextId;

/// A change to the shared local storage, as delivered to other browsing contexts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    /// Changed key; `None` when the whole area was cleared.
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Context whose write caused the event.
    pub source: ContextId,
}

impl StorageEvent {
    /// True if the event may have changed `key` (a clear touches every key).
    pub fn concerns(&self, key: &str) -> bool {
        self.key.as_deref().map_or(true, |k| k == key)
    }
}
