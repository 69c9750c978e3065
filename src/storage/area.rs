use anyhow::Result;

/// Sentinel key written and removed by [`probe`].
pub const PROBE_KEY: &str = "__session_store_probe__";

/// Object-safe key/value storage area (DOM's Storage).
pub trait StorageArea: Send + Sync {
    /// Retrieves the value associated with the given key, or `None` if not found.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Sets the value for the given key, overwriting any existing value.
    ///
    /// A write that does not fit fails with a [`QuotaExceeded`](crate::errors::QuotaExceeded)
    /// error and leaves the previous value in place.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the item with the given key.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Clears all items in the storage area.
    fn clear(&self) -> Result<()>;
}

/// Checks whether an area is usable by writing, reading back and removing a sentinel key.
///
/// Any failure (quota, I/O, a read that does not match) means "not available".
pub fn probe(area: &dyn StorageArea) -> bool {
    if let Err(e) = area.set_item(PROBE_KEY, PROBE_KEY) {
        log::debug!("local storage probe write failed: {e}");
        return false;
    }
    let readable = area.get_item(PROBE_KEY).as_deref() == Some(PROBE_KEY);
    let removed = area.remove_item(PROBE_KEY).is_ok();
    readable && removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryArea;

    #[test]
    fn storagearea_basic_contract() {
        let area = InMemoryArea::new();

        // starts empty
        assert!(area.get_item("missing").is_none());

        area.set_item("a", "1").unwrap();
        area.set_item("b", "2").unwrap();
        assert_eq!(area.get_item("a").as_deref(), Some("1"));
        assert_eq!(area.get_item("b").as_deref(), Some("2"));

        // overwrite
        area.set_item("a", "ONE").unwrap();
        assert_eq!(area.get_item("a").as_deref(), Some("ONE"));

        area.remove_item("b").unwrap();
        assert!(area.get_item("b").is_none());

        area.clear().unwrap();
        assert!(area.get_item("a").is_none());
    }

    #[test]
    fn probe_succeeds_and_leaves_no_trace() {
        let area = InMemoryArea::new();
        assert!(probe(&area));
        assert!(area.get_item(PROBE_KEY).is_none());
        assert_eq!(area.len(), 0);
    }

    #[test]
    fn probe_fails_when_writes_are_refused() {
        let area = InMemoryArea::with_quota(0);
        assert!(!probe(&area));
    }
}
