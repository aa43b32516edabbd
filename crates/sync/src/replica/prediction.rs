use crate::buffer::{DejitterBuffer, Timestamped};
use crate::state::{StateDelta, StateRecord, SyncState};
use crate::tick::Tick;

/// Forward-simulates a locally controlled entity from the latest confirmed
/// state, one record per replayed command. `prev` and `cur` bracket the last
/// simulated step for render blending.
#[derive(Debug)]
pub struct PredictionBuffer<S: SyncState> {
    prev: Option<StateRecord<S>>,
    cur: Option<StateRecord<S>>,
    output: S,
}

impl<S: SyncState> Default for PredictionBuffer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SyncState> PredictionBuffer<S> {
    pub fn new() -> Self {
        Self {
            prev: None,
            cur: None,
            output: S::default(),
        }
    }

    /// Rebases onto `confirmed` with every buffered update past `now` applied
    /// in tick order, and returns the rebased state for command replay to
    /// start from.
    pub fn start<'a>(
        &'a mut self,
        now: Tick,
        confirmed: &S,
        incoming: &DejitterBuffer<StateDelta<S>>,
    ) -> &'a S {
        let mut latest = confirmed.clone();
        for delta in incoming.latest_from(now) {
            latest.merge_from(delta.flags, &delta.state);
        }

        let base = incoming
            .latest()
            .map(Timestamped::tick)
            .filter(|tick| tick.is_valid())
            .unwrap_or(now);

        self.prev = None;
        self.output = latest.clone();
        self.cur = Some(StateRecord::new(base, latest));
        &self.output
    }

    /// Records the outcome of one replayed command, advancing a tick.
    pub fn update(&mut self, simulated: &S) {
        let Some(cur) = self.cur.take() else {
            debug_assert!(false, "prediction update before start");
            return;
        };
        let next_tick = cur.tick() + 1;
        self.prev = Some(cur);
        self.cur = Some(StateRecord::new(next_tick, simulated.clone()));
    }

    /// Blends the last two simulated steps for rendering.
    pub fn get_smoothed(&mut self, frame_alpha: f32) -> &S {
        match (&self.prev, &self.cur) {
            (Some(prev), Some(cur)) => {
                self.output = S::interpolate(prev.state(), cur.state(), frame_alpha);
            }
            (None, Some(cur)) => {
                self.output = cur.state().clone();
            }
            _ => {
                debug_assert!(false, "prediction sampled before start");
            }
        }
        &self.output
    }

    pub fn cur_tick(&self) -> Tick {
        self.cur.as_ref().map(Timestamped::tick).unwrap_or(Tick::INVALID)
    }
}
