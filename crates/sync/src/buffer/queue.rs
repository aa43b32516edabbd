use std::collections::VecDeque;

use super::Timestamped;
use crate::tick::Tick;

/// Bounded FIFO of recent records, queryable by tick. The server keeps one
/// per entity as the delta basis history.
#[derive(Debug)]
pub struct QueueBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Timestamped> QueueBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `item`, evicting the oldest record when full.
    pub fn store(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// The most recent record with tick at or before `tick`.
    pub fn latest_at(&self, tick: Tick) -> Option<&T> {
        self.items.iter().rev().find(|item| item.tick() <= tick)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(u32);

    impl Timestamped for Item {
        fn tick(&self) -> Tick {
            Tick::new(self.0)
        }
    }

    #[test]
    fn eviction_keeps_newest() {
        let mut buf = QueueBuffer::new(3);
        for t in 1..=5 {
            buf.store(Item(t));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.latest(), Some(&Item(5)));
        assert_eq!(buf.latest_at(Tick::new(2)), None);
    }

    #[test]
    fn latest_at_picks_most_recent_not_after() {
        let mut buf = QueueBuffer::new(8);
        for t in [100, 110, 120] {
            buf.store(Item(t));
        }
        assert_eq!(buf.latest_at(Tick::new(115)), Some(&Item(110)));
        assert_eq!(buf.latest_at(Tick::new(110)), Some(&Item(110)));
        assert_eq!(buf.latest_at(Tick::new(80)), None);
    }
}
