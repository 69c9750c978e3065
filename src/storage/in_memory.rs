use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use anyhow::Result;
use crate::errors::QuotaExceeded;
use crate::storage::area::StorageArea;

/// In-memory storage area (no persistence).
///
/// An optional quota caps the summed byte length of all keys and values. The
/// quota can be changed at runtime, which is how tests make a previously
/// usable localStorage start refusing writes.
#[derive(Default)]
pub struct InMemoryArea {
    map: Mutex<HashMap<String, String>>,
    quota: Mutex<Option<usize>>,
}

impl InMemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// An area that refuses writes which would grow it past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            map: Mutex::default(),
            quota: Mutex::new(Some(bytes)),
        }
    }

    pub fn set_quota(&self, bytes: Option<usize>) {
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner) = bytes;
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageArea for InMemoryArea {
    fn get_item(&self, key: &str) -> Option<String> {
        self.map().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.map();
        if let Some(limit) = *self.quota.lock().unwrap_or_else(PoisonError::into_inner) {
            let others: usize = map
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let bytes = others + key.len() + value.len();
            if bytes > limit {
                return Err(QuotaExceeded { bytes, limit }.into());
            }
        }
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.map().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_contract() {
        let area = InMemoryArea::new();
        assert!(area.is_empty());

        area.set_item("a", "1").unwrap();
        area.set_item("b", "2").unwrap();
        assert_eq!(area.len(), 2);

        // overwrite keeps len
        area.set_item("a", "ONE").unwrap();
        assert_eq!(area.len(), 2);
        assert_eq!(area.get_item("a").as_deref(), Some("ONE"));

        area.remove_item("b").unwrap();
        assert_eq!(area.len(), 1);

        area.clear().unwrap();
        assert!(area.is_empty());
    }

    #[test]
    fn quota_rejects_oversized_writes_and_keeps_old_value() {
        let area = InMemoryArea::with_quota(10);
        area.set_item("k", "short").unwrap();

        let err = area.set_item("k", "this is far too long").unwrap_err();
        let quota = err.downcast_ref::<QuotaExceeded>().expect("quota error");
        assert_eq!(quota.limit, 10);
        assert_eq!(quota.bytes, 1 + "this is far too long".len());

        assert_eq!(area.get_item("k").as_deref(), Some("short"));
    }

    #[test]
    fn overwrites_do_not_count_the_replaced_value() {
        let area = InMemoryArea::with_quota(6);
        area.set_item("k", "12345").unwrap();
        area.set_item("k", "54321").unwrap();
        assert_eq!(area.get_item("k").as_deref(), Some("54321"));
    }

    #[test]
    fn quota_can_change_at_runtime() {
        let area = InMemoryArea::new();
        area.set_item("k", "v").unwrap();

        area.set_quota(Some(0));
        assert!(area.set_item("k2", "v").is_err());

        area.set_quota(None);
        area.set_item("k2", "v").unwrap();
        assert_eq!(area.len(), 2);
    }
}
