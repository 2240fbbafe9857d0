use std::collections::VecDeque;

use log::debug;
use vrml_field::FieldValue;
use vrml_ids::NodeId;

/// Default pending-event capacity, the reference runtime's MAXEVENTS.
pub const DEFAULT_EVENT_CAPACITY: usize = 400;

/// A timestamped event waiting for delivery to a node's eventIn.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedEvent {
    pub timestamp: f64,
    pub to_node: NodeId,
    pub to_event_in: String,
    pub value: FieldValue,
}

/// Fixed-capacity FIFO event ring. When the queue is full the oldest entry
/// is discarded: if the simulation is that far behind, it is running too
/// slowly to handle the backlog anyway. Overflow is data loss by design,
/// not an error.
#[derive(Debug)]
pub struct EventQueue {
    ring: VecDeque<QueuedEvent>,
    capacity: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event; evicts the oldest entry when full.
    pub fn push(&mut self, event: QueuedEvent) {
        if self.ring.len() == self.capacity {
            if let Some(dropped) = self.ring.pop_front() {
                debug!(
                    "event queue full ({}), dropping oldest event to {}.{}",
                    self.capacity, dropped.to_node, dropped.to_event_in
                );
            }
        }
        self.ring.push_back(event);
    }

    /// Oldest pending event, FIFO.
    pub fn pop(&mut self) -> Option<QueuedEvent> {
        self.ring.pop_front()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard all pending events.
    pub fn flush(&mut self) {
        self.ring.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrml_ids::NodeId;

    fn ev(n: u32) -> QueuedEvent {
        QueuedEvent {
            timestamp: n as f64,
            to_node: NodeId::from_parts(n, 0),
            to_event_in: "set_x".into(),
            value: FieldValue::SfInt32(n as i32),
        }
    }

    #[test]
    fn fifo_order() {
        let mut q = EventQueue::with_capacity(8);
        q.push(ev(1));
        q.push(ev(2));
        q.push(ev(3));
        assert_eq!(q.pop().map(|e| e.timestamp), Some(1.0));
        assert_eq!(q.pop().map(|e| e.timestamp), Some(2.0));
        assert_eq!(q.pop().map(|e| e.timestamp), Some(3.0));
        assert!(q.pop().is_none());
    }

    #[test]
    fn overflow_drops_oldest_silently() {
        let mut q = EventQueue::with_capacity(3);
        for n in 1..=4 {
            q.push(ev(n));
        }
        assert_eq!(q.len(), 3);
        // Event 1 was evicted; 2 is now the oldest.
        assert_eq!(q.pop().map(|e| e.timestamp), Some(2.0));
    }

    #[test]
    fn flush_discards_everything() {
        let mut q = EventQueue::new();
        q.push(ev(1));
        q.push(ev(2));
        q.flush();
        assert!(q.is_empty());
    }
}
