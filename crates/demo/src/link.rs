use parallax::BitBuffer;

/// Loss and delay knobs for the in-memory link, in ticks rather than wall
/// time so runs are reproducible.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub loss_percent: f32,
    pub latency_ticks: u32,
    pub jitter_ticks: u32,
}

#[derive(Debug, Default, Clone)]
pub struct LinkStats {
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub packets_delivered: u64,
    pub bits_sent: u64,
}

#[derive(Debug)]
struct DelayedPacket {
    deliver_at: u32,
    payload: BitBuffer,
}

/// One-directional lossy datagram link: packets are dropped by percentage,
/// delayed by latency plus jitter, and released in whatever order the jitter
/// produces. Duplicates and reordering come out of that for free.
#[derive(Debug)]
pub struct LossyLink {
    config: LinkConfig,
    queue: Vec<DelayedPacket>,
    stats: LinkStats,
    seed: u64,
    rolls: u64,
    blocked: bool,
}

impl LossyLink {
    pub fn new(config: LinkConfig, seed: u64) -> Self {
        Self {
            config,
            queue: Vec::new(),
            stats: LinkStats::default(),
            seed,
            rolls: 0,
            blocked: false,
        }
    }

    /// A fully blocked link drops everything, simulating a stall.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    fn roll(&mut self) -> f32 {
        self.rolls += 1;
        hash_percent(self.seed, self.rolls)
    }

    pub fn send(&mut self, payload: BitBuffer, now: u32) {
        self.stats.packets_sent += 1;
        self.stats.bits_sent += payload.bits_used() as u64;

        if self.blocked || (self.config.loss_percent > 0.0 && self.roll() * 100.0 < self.config.loss_percent)
        {
            self.stats.packets_dropped += 1;
            return;
        }

        let jitter = if self.config.jitter_ticks > 0 {
            (self.roll() * self.config.jitter_ticks as f32) as u32
        } else {
            0
        };
        self.queue.push(DelayedPacket {
            deliver_at: now + self.config.latency_ticks + jitter,
            payload,
        });
    }

    /// Releases every packet whose delivery tick has arrived.
    pub fn deliver(&mut self, now: u32) -> Vec<BitBuffer> {
        let mut delivered = Vec::new();
        let mut index = 0;
        while index < self.queue.len() {
            if self.queue[index].deliver_at <= now {
                delivered.push(self.queue.swap_remove(index).payload);
            } else {
                index += 1;
            }
        }
        self.stats.packets_delivered += delivered.len() as u64;
        delivered
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

/// Cheap deterministic percent roll in `[0, 1)`, keyed by seed and roll
/// index.
pub fn hash_percent(seed: u64, n: u64) -> f32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    (seed, n).hash(&mut hasher);
    (hasher.finish() % 10_000) as f32 / 10_000.0
}
