mod controller;

pub use controller::Controller;

use crate::buffer::{DejitterBuffer, QueueBuffer, Timestamped};
use crate::config::SyncConfig;
use crate::replica::{PredictionBuffer, SmoothingBuffer};
use crate::state::{StateDelta, StateRecord, SyncState};
use crate::tick::{EntityId, Tick};

/// Game-specific behavior attached to an entity. All callbacks default to
/// no-ops; implementations override what they need.
pub trait Actor: 'static {
    type State: SyncState;
    type Command: Clone;

    /// Fired once, the first tick the entity is simulated.
    fn on_start(&mut self, _state: &mut Self::State) {}
    /// Fired when the world removes the entity.
    fn on_shutdown(&mut self, _state: &mut Self::State) {}
    /// Fired on the first tick and after every controller re-assignment.
    fn on_controller_changed(&mut self, _state: &mut Self::State, _owned: bool) {}
    fn on_frozen(&mut self, _state: &Self::State) {}
    fn on_unfrozen(&mut self, _state: &Self::State) {}
    fn simulate(&mut self, _state: &mut Self::State) {}
    fn simulate_command(&mut self, _state: &mut Self::State, _command: &Self::Command) {}
}

/// Produces actors for entities arriving over the wire, keyed by factory
/// type. The registration table itself lives with the game.
pub trait Factory {
    type Actor: Actor;

    fn create(&mut self, kind: u32) -> Self::Actor;
}

type BoxedController<C> = Box<dyn Controller<Command = C>>;

/// Role-specific replication machinery. The entity data model is the same on
/// both hosts; only the buffers and the callbacks that fire differ.
enum Role<S: SyncState> {
    Server {
        outgoing: QueueBuffer<StateRecord<S>>,
    },
    Client {
        incoming: DejitterBuffer<StateDelta<S>>,
        smoothing: SmoothingBuffer<S>,
        prediction: PredictionBuffer<S>,
        last_delta: Tick,
        frozen: bool,
    },
}

/// A networked entity: state, actor behavior, optional controller, and the
/// per-role replication buffers.
pub struct Entity<A: Actor> {
    id: EntityId,
    kind: u32,
    pub state: A::State,
    actor: A,
    controller: Option<BoxedController<A::Command>>,
    controller_dirty: bool,
    removed_tick: Tick,
    has_started: bool,
    force_updates: bool,
    ticks_before_freeze: u32,
    role: Role<A::State>,
}

impl<A: Actor> Entity<A> {
    pub fn server(id: EntityId, kind: u32, actor: A, config: &SyncConfig) -> Self {
        Self::with_role(
            id,
            kind,
            actor,
            config,
            Role::Server {
                outgoing: QueueBuffer::new(config.dejitter_buffer_length),
            },
        )
    }

    pub fn client(id: EntityId, kind: u32, actor: A, config: &SyncConfig) -> Self {
        Self::with_role(
            id,
            kind,
            actor,
            config,
            Role::Client {
                incoming: DejitterBuffer::new(
                    config.dejitter_buffer_length,
                    config.network_send_rate,
                ),
                smoothing: SmoothingBuffer::new(),
                prediction: PredictionBuffer::new(),
                last_delta: Tick::INVALID,
                frozen: false,
            },
        )
    }

    fn with_role(
        id: EntityId,
        kind: u32,
        actor: A,
        config: &SyncConfig,
        role: Role<A::State>,
    ) -> Self {
        Self {
            id,
            kind,
            state: A::State::default(),
            actor,
            controller: None,
            controller_dirty: false,
            removed_tick: Tick::INVALID,
            has_started: false,
            force_updates: config.force_updates,
            ticks_before_freeze: config.ticks_before_freeze,
            role,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> u32 {
        self.kind
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    pub fn is_owned(&self) -> bool {
        self.controller.is_some()
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn removed_tick(&self) -> Tick {
        self.removed_tick
    }

    /// True once the scheduled removal tick has passed.
    pub fn is_removed_at(&self, tick: Tick) -> bool {
        self.removed_tick.is_valid() && self.removed_tick <= tick
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.role, Role::Client { frozen: true, .. })
    }

    /// Tick of the most recent update received for this entity.
    pub fn last_delta(&self) -> Tick {
        match &self.role {
            Role::Client { last_delta, .. } => *last_delta,
            Role::Server { .. } => Tick::INVALID,
        }
    }

    /// Assigns or clears the command source. The change callback fires on the
    /// next tick; a frozen entity gaining a controller thaws immediately.
    pub fn set_controller(&mut self, controller: Option<BoxedController<A::Command>>) {
        self.controller = controller;
        self.controller_dirty = true;
        if self.controller.is_some() {
            if let Role::Client { frozen, .. } = &mut self.role {
                if *frozen {
                    *frozen = false;
                    self.actor.on_unfrozen(&self.state);
                }
            }
        }
    }

    fn do_start(&mut self) {
        if !self.has_started {
            self.has_started = true;
            self.controller_dirty = false;
            self.actor
                .on_controller_changed(&mut self.state, self.controller.is_some());
            self.actor.on_start(&mut self.state);
        } else if self.controller_dirty {
            self.controller_dirty = false;
            self.actor
                .on_controller_changed(&mut self.state, self.controller.is_some());
        }
    }

    /// One authoritative simulation step.
    pub fn update_server(&mut self) {
        self.do_start();
        if let Some(controller) = &self.controller {
            if let Some(command) = controller.latest_command() {
                self.actor.simulate_command(&mut self.state, &command);
            }
        }
        self.actor.simulate(&mut self.state);
    }

    /// Snapshots the post-simulation state into the outgoing history. Records
    /// equal to the previous one under encoder equivalence are suppressed.
    pub fn store_record(&mut self, tick: Tick) {
        let Role::Server { outgoing } = &mut self.role else {
            return;
        };
        if let Some(record) = StateRecord::next(tick, &self.state, outgoing.latest()) {
            outgoing.store(record);
        }
    }

    /// Builds the update frame for one destination, delta-compressed against
    /// the newest history record at or before `basis_tick`. An invalid or
    /// evicted basis promotes the frame to a full snapshot. Returns `None`
    /// when there is nothing worth sending.
    pub fn produce_delta(
        &self,
        tick: Tick,
        basis_tick: Tick,
        to_controller: bool,
    ) -> Option<StateDelta<A::State>> {
        let Role::Server { outgoing } = &self.role else {
            return None;
        };

        let basis = if basis_tick.is_valid() {
            outgoing.latest_at(basis_tick)
        } else {
            None
        };
        if basis_tick.is_valid() && basis.is_none() {
            log::debug!(
                "entity {}: basis tick {} evicted from history, sending full snapshot",
                self.id,
                basis_tick
            );
        }

        let has_immutable_data = basis.is_none();
        let mut flags = match basis {
            Some(record) => self.state.dirty_flags(record.state()),
            None => A::State::all_fields(),
        };
        if !to_controller {
            flags &= !A::State::PRIVATE_FIELDS;
        }

        let is_destroyed = self.removed_tick.is_valid();
        if is_destroyed {
            return Some(StateDelta::destroy(self.id, tick, self.removed_tick));
        }
        if flags == 0 && !self.force_updates && !has_immutable_data {
            return None;
        }

        Some(StateDelta::update(
            self.id,
            tick,
            flags,
            self.state.clone(),
            has_immutable_data,
        ))
    }

    /// Schedules destruction for the next tick so the current one finishes
    /// consistently on every observer.
    pub fn mark_for_remove(&mut self, world_tick: Tick) {
        self.removed_tick = world_tick + 1;
    }

    /// Feeds one received frame into the dejitter buffer, or takes the
    /// destruction notice. Stale frames are dropped silently.
    pub fn receive_delta(&mut self, delta: StateDelta<A::State>) {
        let Role::Client {
            incoming,
            last_delta,
            ..
        } = &mut self.role
        else {
            return;
        };

        let tick = delta.tick;
        if delta.is_destroyed {
            self.removed_tick = delta.removed_tick;
        } else if !incoming.store(delta) {
            log::trace!("entity {}: stale update for tick {} dropped", self.id, tick);
        }
        if tick > *last_delta {
            *last_delta = tick;
        }
    }

    /// One presentation step: adopt the confirmed state, then re-predict on
    /// top of it when this host owns the entity. An entity with no usable
    /// update yet stays unstarted.
    pub fn update_client(&mut self, tick: Tick) {
        let confirmed = match &mut self.role {
            Role::Client {
                incoming,
                smoothing,
                ..
            } => smoothing.update(tick, incoming).cloned(),
            Role::Server { .. } => return,
        };

        match confirmed {
            Some(state) => self.state.copy_from(&state),
            None if !self.has_started => return,
            None => {}
        }

        self.do_start();
        if self.controller.is_some() {
            self.replay_commands(tick);
        }
    }

    fn replay_commands(&mut self, tick: Tick) {
        let Role::Client {
            incoming,
            prediction,
            ..
        } = &mut self.role
        else {
            return;
        };
        let Some(controller) = &self.controller else {
            return;
        };

        let rebased = prediction.start(tick, &self.state, incoming).clone();
        self.state.copy_from(&rebased);

        for command in controller.pending_commands() {
            self.actor.simulate_command(&mut self.state, &command);
            self.actor.simulate(&mut self.state);
            prediction.update(&self.state);
        }
    }

    /// Applies the tick-gap freeze heuristic against the server tick the
    /// transport last reported. Owned entities never freeze; each transition
    /// fires its callback exactly once.
    pub fn update_freeze(&mut self, actual_server_tick: Tick) {
        let owned = self.controller.is_some();
        let Role::Client {
            last_delta, frozen, ..
        } = &mut self.role
        else {
            return;
        };

        if owned {
            if *frozen {
                *frozen = false;
                self.actor.on_unfrozen(&self.state);
            }
            return;
        }
        if self.ticks_before_freeze == 0 || !last_delta.is_valid() {
            return;
        }

        let gap = actual_server_tick - *last_delta;
        if gap > self.ticks_before_freeze as i64 {
            if !*frozen {
                *frozen = true;
                log::debug!(
                    "entity {}: no update for {} ticks, freezing",
                    self.id,
                    gap
                );
                self.actor.on_frozen(&self.state);
            }
        } else if *frozen {
            *frozen = false;
            log::debug!("entity {}: updates resumed, unfreezing", self.id);
            self.actor.on_unfrozen(&self.state);
        }
    }

    /// The render-facing state between ticks: predicted for owned entities,
    /// smoothed for remote ones, and held stale while frozen.
    pub fn smoothed_state(&mut self, frame_alpha: f32, now: Tick) -> &A::State {
        if !self.has_started {
            return &self.state;
        }
        match &mut self.role {
            Role::Client {
                smoothing,
                prediction,
                frozen,
                ..
            } => {
                if *frozen {
                    &self.state
                } else if self.controller.is_some() {
                    prediction.get_smoothed(frame_alpha)
                } else {
                    smoothing.get_smoothed(frame_alpha, now)
                }
            }
            Role::Server { .. } => &self.state,
        }
    }

    /// Fires the shutdown callback; the world calls this when it drops the
    /// entity after its removal tick has passed on every observer.
    pub fn shutdown(&mut self) {
        self.actor.on_shutdown(&mut self.state);
    }

    /// Newest tick in the outgoing history, if any.
    pub fn latest_record_tick(&self) -> Tick {
        match &self.role {
            Role::Server { outgoing } => outgoing
                .latest()
                .map(Timestamped::tick)
                .unwrap_or(Tick::INVALID),
            Role::Client { .. } => Tick::INVALID,
        }
    }
}
