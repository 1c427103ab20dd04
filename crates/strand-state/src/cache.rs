//! Property cache - local writes not yet flushed

use std::collections::BTreeMap;

use strand_core::PropertyId;
use strand_wire::PropertyValue;

/// Property values keyed by id, iterated in ascending id order
pub type DirtySet = BTreeMap<PropertyId, PropertyValue>;

/// Pending local writes for one record.
/// A property present in the cache is dirty.
#[derive(Clone, Debug, Default)]
pub struct PropertyCache {
    pending: DirtySet,
}

impl PropertyCache {
    pub fn new() -> Self {
        PropertyCache::default()
    }

    /// Pending value, if the property is dirty
    pub fn get(&self, id: PropertyId) -> Option<&PropertyValue> {
        self.pending.get(&id)
    }

    pub fn is_dirty(&self, id: PropertyId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Stage a write against the currently visible value.
    /// Returns false (and changes nothing) when `value == visible`.
    pub fn stage(&mut self, id: PropertyId, value: PropertyValue, visible: &PropertyValue) -> bool {
        if value == *visible {
            return false;
        }
        self.pending.insert(id, value);
        true
    }

    /// Remove and return every dirty entry accepted by `select`
    pub fn take<F>(&mut self, select: F) -> DirtySet
    where
        F: Fn(PropertyId) -> bool,
    {
        let (taken, kept) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(id, _)| select(*id));
        self.pending = kept;
        taken
    }

    /// Drain the whole cache
    pub fn clear(&mut self) -> DirtySet {
        std::mem::take(&mut self.pending)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyId, &PropertyValue)> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: u32) -> PropertyId {
        PropertyId::new(id)
    }

    #[test]
    fn test_stage_equal_value_is_noop() {
        let mut cache = PropertyCache::new();
        let visible = PropertyValue::Float(1.0);

        assert!(!cache.stage(p(1), PropertyValue::Float(1.0), &visible));
        assert!(!cache.is_dirty(p(1)));

        assert!(cache.stage(p(1), PropertyValue::Float(2.0), &visible));
        assert_eq!(cache.get(p(1)), Some(&PropertyValue::Float(2.0)));
    }

    #[test]
    fn test_take_selected_only() {
        let mut cache = PropertyCache::new();
        let visible = PropertyValue::UInt(0);
        cache.stage(p(1), PropertyValue::UInt(1), &visible);
        cache.stage(p(2), PropertyValue::UInt(2), &visible);
        cache.stage(p(3), PropertyValue::UInt(3), &visible);

        let taken = cache.take(|id| id != p(2));

        assert_eq!(taken.keys().copied().collect::<Vec<_>>(), vec![p(1), p(3)]);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_dirty(p(2)));
    }

    #[test]
    fn test_clear_drains() {
        let mut cache = PropertyCache::new();
        cache.stage(p(1), PropertyValue::Bool(true), &PropertyValue::Bool(false));

        let drained = cache.clear();
        assert_eq!(drained.len(), 1);
        assert!(cache.is_empty());
    }
}
