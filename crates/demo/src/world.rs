use std::collections::HashMap;

use glam::Vec2;

use parallax::{
    BitBuffer, Controller, Entity, EntityId, Factory, IntEncoder, StateDelta, SyncConfig,
    SyncError, Tick, TickEncoder,
};

use crate::actors::{DemoActor, DemoFactory, KIND_PAWN, PawnCommand, PawnState};

/// Ticks a destroyed entity lingers server-side so its destruction notice
/// keeps going out; a real session would wait for every observer's ack.
const REMOVAL_GRACE_TICKS: i64 = 30;

fn count_encoder() -> IntEncoder {
    IntEncoder::new(0, 255)
}

/// Authoritative host: simulates entities, keeps their outgoing history, and
/// packs one update packet per send window.
pub struct ServerWorld {
    tick: Tick,
    config: SyncConfig,
    factory: DemoFactory,
    entities: HashMap<EntityId, Entity<DemoActor>>,
    next_id: u32,
    pub frames_sent: u64,
    pub frames_suppressed: u64,
}

impl ServerWorld {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            tick: Tick::INVALID,
            config,
            factory: DemoFactory,
            entities: HashMap::new(),
            next_id: 1,
            frames_sent: 0,
            frames_suppressed: 0,
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn spawn(&mut self, kind: u32, spawn_pos: Vec2) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;

        let actor = self.factory.create(kind);
        let mut entity = Entity::server(id, kind, actor, &self.config);
        entity.state.archetype = kind;
        entity.state.pos = spawn_pos;
        if kind == KIND_PAWN {
            entity.state.energy = 1000;
        }
        self.entities.insert(id, entity);
        id
    }

    pub fn set_controller(
        &mut self,
        id: EntityId,
        controller: Option<Box<dyn Controller<Command = PawnCommand>>>,
    ) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.set_controller(controller);
        }
    }

    pub fn mark_for_remove(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.mark_for_remove(self.tick);
        }
    }

    pub fn run_tick(&mut self) {
        self.tick = self.tick.next();
        for entity in self.entities.values_mut() {
            entity.update_server();
            entity.store_record(self.tick);
        }
    }

    /// Drops entities whose removal tick is long past.
    pub fn sweep_removed(&mut self) {
        let tick = self.tick;
        let gone: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| {
                e.removed_tick().is_valid() && tick - e.removed_tick() > REMOVAL_GRACE_TICKS
            })
            .map(|(&id, _)| id)
            .collect();
        for id in gone {
            if let Some(mut entity) = self.entities.remove(&id) {
                entity.shutdown();
            }
        }
    }

    /// Packs one frame per entity, delta-compressed against `basis` (the tick
    /// the destination last acknowledged). Read order on the receiver:
    /// server tick, frame count, then the frames.
    pub fn encode_packet(&mut self, basis: Tick, destination_owns: EntityId) -> BitBuffer {
        let mut buf = BitBuffer::new();
        let mut count = 0i32;
        for entity in self.entities.values() {
            let to_controller = entity.id() == destination_owns;
            match entity.produce_delta(self.tick, basis, to_controller) {
                Some(delta) => {
                    delta.encode(&mut buf);
                    count += 1;
                    self.frames_sent += 1;
                }
                None => self.frames_suppressed += 1,
            }
        }
        buf.push_with(&count_encoder(), &count);
        buf.push_with(&TickEncoder, &self.tick);
        buf
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity<DemoActor>> {
        self.entities.get(&id)
    }
}

/// Mirroring host: decodes packets into per-entity dejitter buffers, spawns
/// entities on first contact, and reconstructs motion every tick.
pub struct ClientWorld {
    tick: Tick,
    config: SyncConfig,
    factory: DemoFactory,
    entities: HashMap<EntityId, Entity<DemoActor>>,
    last_server_tick: Tick,
    pub frames_received: u64,
    pub orphan_frames: u64,
    pub decode_errors: u64,
}

impl ClientWorld {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            tick: Tick::INVALID,
            config,
            factory: DemoFactory,
            entities: HashMap::new(),
            last_server_tick: Tick::INVALID,
            frames_received: 0,
            orphan_frames: 0,
            decode_errors: 0,
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// The newest server tick seen; doubles as the delta basis the server may
    /// compress against.
    pub fn ack(&self) -> Tick {
        self.last_server_tick
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity<DemoActor>> {
        self.entities.get(&id)
    }

    pub fn set_controller(
        &mut self,
        id: EntityId,
        controller: Option<Box<dyn Controller<Command = PawnCommand>>>,
    ) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.set_controller(controller);
        }
    }

    /// Unpacks one received packet. A malformed packet is discarded whole;
    /// the session continues.
    pub fn receive_packet(&mut self, mut buf: BitBuffer) {
        if let Err(err) = self.decode_packet(&mut buf) {
            self.decode_errors += 1;
            log::warn!("discarding malformed packet: {err}");
        }
    }

    fn decode_packet(&mut self, buf: &mut BitBuffer) -> Result<(), SyncError> {
        let server_tick = buf.pop_with(&TickEncoder)?;
        let count = buf.pop_with(&count_encoder())?;

        for _ in 0..count {
            let delta = StateDelta::<PawnState>::decode(buf, None)?;
            self.frames_received += 1;
            let id = delta.entity_id;

            if !self.entities.contains_key(&id) {
                if delta.is_destroyed {
                    // Already gone locally; the server is still repeating the
                    // notice for observers that missed it.
                    continue;
                }
                if !delta.has_immutable_data {
                    // First contact must be a full snapshot; wait for one.
                    self.orphan_frames += 1;
                    log::warn!("dropping partial frame for unknown entity {id}");
                    continue;
                }
                let kind = delta.state.archetype;
                let actor = self.factory.create(kind);
                self.entities
                    .insert(id, Entity::client(id, kind, actor, &self.config));
                log::info!("entity {id} entered replication (kind {kind})");
            }
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.receive_delta(delta);
            }
        }

        if server_tick > self.last_server_tick {
            self.last_server_tick = server_tick;
        }
        Ok(())
    }

    pub fn run_tick(&mut self) {
        self.tick = self.tick.next();
        // Loopback clocks run in lockstep, so the local tick doubles as the
        // actual server tick for the freeze gap.
        let server_tick = self.tick;
        for entity in self.entities.values_mut() {
            entity.update_freeze(server_tick);
            entity.update_client(self.tick);
        }

        let tick = self.tick;
        let gone: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.is_removed_at(tick))
            .map(|(&id, _)| id)
            .collect();
        for id in gone {
            if let Some(mut entity) = self.entities.remove(&id) {
                entity.shutdown();
                log::info!("entity {id} left replication");
            }
        }
    }

    /// Render-facing sample between ticks.
    pub fn smoothed(&mut self, id: EntityId, frame_alpha: f32) -> Option<PawnState> {
        let now = self.tick;
        self.entities
            .get_mut(&id)
            .map(|entity| entity.smoothed_state(frame_alpha, now).clone())
    }
}
