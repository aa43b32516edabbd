use crate::buffer::{DejitterBuffer, Timestamped};
use crate::state::{StateDelta, StateRecord, SyncState};
use crate::tick::Tick;

/// Reconstructs a remote entity's motion from buffered confirmed updates.
///
/// Three rolling records: `prev` and `cur` bracket the confirmed timeline,
/// `next` is this frame's lookahead. Rendering interpolates `cur → next` when
/// the lookahead exists and extrapolates along `prev → cur` when it does not.
/// The interpolation parameter is deliberately unclamped; the state's own
/// blend defines behavior outside `[0, 1]`.
#[derive(Debug)]
pub struct SmoothingBuffer<S: SyncState> {
    prev: Option<StateRecord<S>>,
    cur: Option<StateRecord<S>>,
    next: Option<StateRecord<S>>,
    output: S,
}

impl<S: SyncState> Default for SmoothingBuffer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SyncState> SmoothingBuffer<S> {
    pub fn new() -> Self {
        Self {
            prev: None,
            cur: None,
            next: None,
            output: S::default(),
        }
    }

    /// Advances the confirmed timeline to `now` and returns the confirmed
    /// state, or `None` while no usable update has arrived yet.
    ///
    /// The first accepted update must carry immutable data; anything else is
    /// dropped so the entity bootstraps from a complete snapshot.
    pub fn update<'a>(
        &'a mut self,
        now: Tick,
        incoming: &DejitterBuffer<StateDelta<S>>,
    ) -> Option<&'a S> {
        // The lookahead only ever reflects the current frame.
        self.next = None;

        let (cur_delta, next_delta) = incoming.range_at(now);
        let cur_delta = cur_delta?;

        match self.cur.take() {
            None => {
                if !cur_delta.has_immutable_data {
                    log::warn!(
                        "dropping first update for entity {} at tick {}: not a full snapshot",
                        cur_delta.entity_id,
                        cur_delta.tick
                    );
                    return None;
                }
                self.output = cur_delta.state.clone();
                self.cur = Some(StateRecord::new(cur_delta.tick, cur_delta.state.clone()));
            }
            Some(cur) => {
                if cur.tick() < cur_delta.tick {
                    let mut advanced = cur.state().clone();
                    advanced.merge_from(cur_delta.flags, &cur_delta.state);
                    self.prev = Some(cur);
                    self.cur = Some(StateRecord::new(cur_delta.tick, advanced));
                } else {
                    self.cur = Some(cur);
                }
            }
        }

        if let (Some(cur), Some(next_delta)) = (&self.cur, next_delta) {
            if next_delta.tick > cur.tick() {
                let mut ahead = cur.state().clone();
                ahead.merge_from(next_delta.flags, &next_delta.state);
                self.next = Some(StateRecord::new(next_delta.tick, ahead));
            }
        }

        self.cur.as_ref().map(|record| record.state())
    }

    /// The render-facing state at `now` plus `frame_alpha` of a tick.
    pub fn get_smoothed(&mut self, frame_alpha: f32, now: Tick) -> &S {
        let Some(cur) = &self.cur else {
            debug_assert!(false, "smoothing sampled before any confirmed state");
            return &self.output;
        };

        if let Some(next) = &self.next {
            let span = (next.tick() - cur.tick()) as f32;
            let t = ((now - cur.tick()) as f32 + frame_alpha) / span;
            self.output = S::interpolate(cur.state(), next.state(), t);
        } else if let Some(prev) = &self.prev {
            let span = (cur.tick() - prev.tick()) as f32;
            let t = ((now - prev.tick()) as f32 + frame_alpha) / span;
            self.output = S::interpolate(prev.state(), cur.state(), t);
        } else {
            self.output = cur.state().clone();
        }
        &self.output
    }

    pub fn confirmed_tick(&self) -> Tick {
        self.cur.as_ref().map(Timestamped::tick).unwrap_or(Tick::INVALID)
    }
}
