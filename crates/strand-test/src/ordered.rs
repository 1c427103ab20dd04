//! In-order, exactly-once delivery keyed by update id
//!
//! Sits on the receiving end of a lossy channel carrying reliable deltas.
//! Duplicates and ids already released are dropped; early ids wait until the
//! gap before them is filled.

use std::collections::BTreeMap;

use strand_core::UpdateId;
use tracing::trace;

/// Reorder buffer for one reliable stream
#[derive(Clone, Debug)]
pub struct OrderedReceiver<T> {
    next: UpdateId,
    held: BTreeMap<UpdateId, T>,
    /// The last possible id has been released
    closed: bool,
}

impl<T> OrderedReceiver<T> {
    /// Expect `first` as the next id to release
    pub fn new(first: UpdateId) -> Self {
        OrderedReceiver {
            next: first,
            held: BTreeMap::new(),
            closed: false,
        }
    }

    /// Accept one arrival and return everything now releasable, in order
    pub fn accept(&mut self, update_id: UpdateId, item: T) -> Vec<(UpdateId, T)> {
        if self.has_released(update_id) {
            trace!(update = %update_id, "duplicate reliable delivery dropped");
            return Vec::new();
        }
        self.held.entry(update_id).or_insert(item);

        let mut released = Vec::new();
        while let Some(item) = self.held.remove(&self.next) {
            released.push((self.next, item));
            match self.next.next() {
                Some(next) => self.next = next,
                None => {
                    // Nothing follows u32::MAX; later arrivals count as duplicates
                    self.held.clear();
                    self.closed = true;
                    break;
                }
            }
        }
        released
    }

    /// Id the receiver is waiting for
    pub fn next_expected(&self) -> UpdateId {
        self.next
    }

    /// Already released: a redelivery of this id is a duplicate
    pub fn has_released(&self, update_id: UpdateId) -> bool {
        update_id < self.next || self.closed
    }

    pub fn held(&self) -> usize {
        self.held.len()
    }
}
