use std::collections::VecDeque;
use thiserror::Error;

use crate::event::EventRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Popping an empty queue means a send was confirmed without a pending
    /// head. That is scheduler-state corruption, not a transient condition;
    /// callers must surface it, never swallow it.
    #[error("pop on an empty delivery queue")]
    PoppedEmpty,
}

/// Ordered FIFO set of events still awaiting a confirmed delivery.
///
/// Insertion order is send order. The head is the only record eligible for
/// an in-flight attempt, and a record leaves the queue only after the
/// transport confirmed success for it while it was head.
#[derive(Debug, Clone, Default)]
pub struct DeliveryQueue {
    records: VecDeque<EventRecord>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail. Always succeeds; the queue is unbounded.
    pub fn enqueue(&mut self, record: EventRecord) {
        self.records.push_back(record);
    }

    /// The oldest pending record, left in place.
    pub fn peek_head(&self) -> Option<&EventRecord> {
        self.records.front()
    }

    /// Removes the head. Only valid after a confirmed success for that exact
    /// record; an empty queue here is a contract violation.
    pub fn pop_head(&mut self) -> Result<EventRecord, QueueError> {
        self.records.pop_front().ok_or(QueueError::PoppedEmpty)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full contents in send order, for persistence and diagnostics.
    pub fn to_ordered_list(&self) -> Vec<EventRecord> {
        self.records.iter().cloned().collect()
    }

    /// Replaces the entire contents, preserving the given order.
    pub fn load_from_ordered_list(&mut self, records: Vec<EventRecord>) {
        self.records = records.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventCategory;

    fn record(payload: &str) -> EventRecord {
        EventRecord::new(EventCategory::SpendCoins, payload)
    }

    #[test]
    fn enqueue_preserves_fifo_order() {
        let mut queue = DeliveryQueue::new();
        queue.enqueue(record("a"));
        queue.enqueue(record("b"));
        queue.enqueue(record("c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_head().unwrap().payload(), "a");
        assert_eq!(queue.pop_head().unwrap().payload(), "b");
        assert_eq!(queue.pop_head().unwrap().payload(), "c");
        assert!(queue.is_empty());
    }

    #[test]
    fn peek_does_not_remove() {
        let mut queue = DeliveryQueue::new();
        queue.enqueue(record("a"));

        assert_eq!(queue.peek_head().unwrap().payload(), "a");
        assert_eq!(queue.peek_head().unwrap().payload(), "a");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pop_on_empty_is_a_contract_violation() {
        let mut queue = DeliveryQueue::new();
        assert_eq!(queue.pop_head(), Err(QueueError::PoppedEmpty));
    }

    #[test]
    fn load_replaces_contents_entirely() {
        let mut queue = DeliveryQueue::new();
        queue.enqueue(record("old"));

        queue.load_from_ordered_list(vec![record("x"), record("y")]);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek_head().unwrap().payload(), "x");
    }

    #[test]
    fn export_import_round_trip_preserves_order() {
        let mut queue = DeliveryQueue::new();
        for i in 0..20 {
            queue.enqueue(record(&format!("p{i}")));
        }

        let exported = queue.to_ordered_list();
        let mut restored = DeliveryQueue::new();
        restored.load_from_ordered_list(exported.clone());

        assert_eq!(restored.to_ordered_list(), exported);
    }
}
