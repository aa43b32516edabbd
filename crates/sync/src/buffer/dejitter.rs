use super::Timestamped;
use crate::tick::Tick;

/// Tick-indexed ring that absorbs out-of-order and gapped arrivals.
///
/// Items land in slot `(tick / divisor) % capacity`, where `divisor` is the
/// network send rate, so consecutive sends occupy consecutive slots and the
/// oldest items are implicitly evicted by slot collision. A slot holding a
/// newer tick wins over an incoming older one.
#[derive(Debug)]
pub struct DejitterBuffer<T> {
    slots: Vec<Option<T>>,
    divisor: u32,
}

impl<T: Timestamped> DejitterBuffer<T> {
    pub fn new(capacity: usize, divisor: u32) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| None).collect(),
            divisor: divisor.max(1),
        }
    }

    fn slot(&self, tick: Tick) -> usize {
        ((tick.raw() / self.divisor) as usize) % self.slots.len()
    }

    /// Stores `item`, replacing an older occupant. Returns `false` when the
    /// slot already holds this tick or a newer one (the stale incoming item
    /// is dropped).
    pub fn store(&mut self, item: T) -> bool {
        let index = self.slot(item.tick());
        match &self.slots[index] {
            Some(existing) if existing.tick() >= item.tick() => false,
            _ => {
                self.slots[index] = Some(item);
                true
            }
        }
    }

    /// The item with the largest tick at or before `tick`.
    pub fn latest_at(&self, tick: Tick) -> Option<&T> {
        self.slots
            .iter()
            .flatten()
            .filter(|item| item.tick() <= tick)
            .max_by_key(|item| item.tick())
    }

    /// `latest_at(tick)` plus its immediate successor, if one is buffered.
    pub fn range_at(&self, tick: Tick) -> (Option<&T>, Option<&T>) {
        let cur = self.latest_at(tick);
        let next = cur.and_then(|cur| {
            self.slots
                .iter()
                .flatten()
                .filter(|item| item.tick() > cur.tick())
                .min_by_key(|item| item.tick())
        });
        (cur, next)
    }

    /// All buffered items strictly after `tick`, in ascending tick order.
    pub fn latest_from(&self, tick: Tick) -> impl Iterator<Item = &T> {
        let mut items: Vec<&T> = self
            .slots
            .iter()
            .flatten()
            .filter(|item| item.tick() > tick)
            .collect();
        items.sort_by_key(|item| item.tick());
        items.into_iter()
    }

    /// The item with the greatest tick currently stored.
    pub fn latest(&self) -> Option<&T> {
        self.slots.iter().flatten().max_by_key(|item| item.tick())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}
