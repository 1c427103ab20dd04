//! In-flight ledger - reliable deltas sent but not yet retired
//!
//! The ledger does not retransmit. It remembers what was sent under each
//! update id so the transport can resend those exact bytes after a loss.

use std::collections::BTreeMap;

use strand_core::{PropertyId, StrandError, StrandResult, UpdateId};
use strand_wire::PropertyValue;
use tracing::{trace, warn};

use crate::DirtySet;

/// Reliable deltas awaiting retirement, keyed by update id
#[derive(Clone, Debug)]
pub struct InFlightLedger {
    entries: BTreeMap<UpdateId, DirtySet>,
    /// Highest id ever pushed (survives retire and clear)
    last_pushed: Option<UpdateId>,
    /// Ids at or below this were dropped unretired (evicted or cleared)
    superseded_through: Option<UpdateId>,
    max_entries: usize,
}

impl InFlightLedger {
    pub fn new(max_entries: usize) -> Self {
        InFlightLedger {
            entries: BTreeMap::new(),
            last_pushed: None,
            superseded_through: None,
            max_entries: max_entries.max(1),
        }
    }

    /// Fail unless `update_id` is newer than every id pushed so far
    pub fn ensure_next(&self, update_id: UpdateId) -> StrandResult<()> {
        match self.last_pushed {
            Some(last) if update_id <= last => Err(StrandError::UpdateIdRegression {
                last,
                got: update_id,
            }),
            _ => Ok(()),
        }
    }

    /// Record a reliable delta.
    /// Returns the oldest entry if the push evicted it.
    pub fn push(
        &mut self,
        update_id: UpdateId,
        dirty: DirtySet,
    ) -> StrandResult<Option<(UpdateId, DirtySet)>> {
        self.ensure_next(update_id)?;

        trace!(update = %update_id, properties = dirty.len(), "in-flight push");
        self.entries.insert(update_id, dirty);
        self.last_pushed = Some(update_id);

        if self.entries.len() > self.max_entries {
            let evicted = self.entries.pop_first();
            if let Some((id, _)) = &evicted {
                self.superseded_through = Some(*id);
                warn!(
                    update = %id,
                    limit = self.max_entries,
                    "in-flight ledger full, evicting oldest unretired delta"
                );
            }
            return Ok(evicted);
        }

        Ok(None)
    }

    /// Remove the entry for `update_id`.
    /// Unknown ids are a no-op: late and duplicate confirmations are expected.
    pub fn retire(&mut self, update_id: UpdateId) -> Option<DirtySet> {
        let retired = self.entries.remove(&update_id);
        if retired.is_none() {
            trace!(update = %update_id, "stale retire ignored");
        }
        retired
    }

    /// Snapshot last sent under `update_id`
    pub fn get(&self, update_id: UpdateId) -> Option<&DirtySet> {
        self.entries.get(&update_id)
    }

    /// Newest in-flight value for a property
    pub fn latest(&self, property: PropertyId) -> Option<&PropertyValue> {
        self.entries
            .values()
            .rev()
            .find_map(|entry| entry.get(&property))
    }

    /// Newest update id carrying a property
    pub fn latest_update(&self, property: PropertyId) -> Option<UpdateId> {
        self.entries
            .iter()
            .rev()
            .find(|(_, entry)| entry.contains_key(&property))
            .map(|(id, _)| *id)
    }

    pub fn contains(&self, update_id: UpdateId) -> bool {
        self.entries.contains_key(&update_id)
    }

    /// Drop every entry (full resync makes delta history moot)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.superseded_through = self.last_pushed;
    }

    /// `update_id` was dropped without retirement; its confirmation carries
    /// nothing newer than local state
    pub fn is_superseded(&self, update_id: UpdateId) -> bool {
        !self.entries.contains_key(&update_id) && self.superseded_through.is_some_and(|s| update_id <= s)
    }

    pub fn update_ids(&self) -> impl Iterator<Item = UpdateId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

impl Default for InFlightLedger {
    fn default() -> Self {
        InFlightLedger::new(strand_core::ReplicationConfig::default().max_in_flight)
    }
}
