// Bounded history containers used by every time-series field
use serde::ser::{Serialize, Serializer};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 600;
pub const DEFAULT_ALERT_CAPACITY: usize = 50;

/// Fixed-capacity FIFO. Once full, every append evicts the oldest element.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(value);
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

/// Most-recent-first list of alert strings, trimmed at the tail.
///
/// `total_pushed` keeps counting past the capacity, so two logs holding the
/// same text still compare unequal once another alert has arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertLog {
    alerts: VecDeque<String>,
    capacity: usize,
    total_pushed: u64,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        }
    }

    pub fn push(&mut self, alert: String) {
        self.alerts.push_front(alert);
        self.alerts.truncate(self.capacity);
        self.total_pushed += 1;
    }

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.alerts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Serialize for AlertLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.alerts.iter())
    }
}
