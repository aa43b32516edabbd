//! Shared test fixtures: a small pawn-like state with one field of every
//! encoder family, plus actor and controller stubs that count callbacks.

use std::collections::VecDeque;

use glam::Vec2;

use crate::bits::{BitBuffer, Encoder, FloatEncoder, IntEncoder, TagEncoder};
use crate::entity::{Actor, Controller};
use crate::error::SyncError;
use crate::state::{StateDelta, SyncState};
use crate::tick::{EntityId, Tick};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestState {
    pub archetype: u32,
    pub team: i32,
    pub pos: Vec2,
    pub angle: f32,
    pub energy: i32,
}

impl TestState {
    pub const FLAG_ARCHETYPE: u32 = 1 << 0;
    pub const FLAG_TEAM: u32 = 1 << 1;
    pub const FLAG_X: u32 = 1 << 2;
    pub const FLAG_Y: u32 = 1 << 3;
    pub const FLAG_ANGLE: u32 = 1 << 4;
    pub const FLAG_ENERGY: u32 = 1 << 5;

    fn archetype_encoder() -> TagEncoder {
        TagEncoder::new(8)
    }

    fn team_encoder() -> IntEncoder {
        IntEncoder::new(0, 15)
    }

    fn coord_encoder() -> FloatEncoder {
        FloatEncoder::new(-512.0, 512.0, 0.01)
    }

    fn angle_encoder() -> FloatEncoder {
        FloatEncoder::new(0.0, 360.0, 0.1)
    }

    fn energy_encoder() -> IntEncoder {
        IntEncoder::new(0, 1023)
    }
}

impl SyncState for TestState {
    const FIELD_COUNT: u32 = 6;
    const PRIVATE_FIELDS: u32 = Self::FLAG_ENERGY;

    fn dirty_flags(&self, basis: &Self) -> u32 {
        let mut flags = 0;
        if !Self::archetype_encoder().equal(&self.archetype, &basis.archetype) {
            flags |= Self::FLAG_ARCHETYPE;
        }
        if !Self::team_encoder().equal(&self.team, &basis.team) {
            flags |= Self::FLAG_TEAM;
        }
        if !Self::coord_encoder().equal(&self.pos.x, &basis.pos.x) {
            flags |= Self::FLAG_X;
        }
        if !Self::coord_encoder().equal(&self.pos.y, &basis.pos.y) {
            flags |= Self::FLAG_Y;
        }
        if !Self::angle_encoder().equal(&self.angle, &basis.angle) {
            flags |= Self::FLAG_ANGLE;
        }
        if !Self::energy_encoder().equal(&self.energy, &basis.energy) {
            flags |= Self::FLAG_ENERGY;
        }
        flags
    }

    fn encode_fields(&self, buf: &mut BitBuffer, flags: u32) {
        buf.push_if(flags, Self::FLAG_ENERGY, &Self::energy_encoder(), &self.energy);
        buf.push_if(flags, Self::FLAG_ANGLE, &Self::angle_encoder(), &self.angle);
        buf.push_if(flags, Self::FLAG_Y, &Self::coord_encoder(), &self.pos.y);
        buf.push_if(flags, Self::FLAG_X, &Self::coord_encoder(), &self.pos.x);
        buf.push_if(flags, Self::FLAG_TEAM, &Self::team_encoder(), &self.team);
        buf.push_if(
            flags,
            Self::FLAG_ARCHETYPE,
            &Self::archetype_encoder(),
            &self.archetype,
        );
    }

    fn decode_fields(buf: &mut BitBuffer, flags: u32, basis: &Self) -> Result<Self, SyncError> {
        let archetype = buf.pop_if(
            flags,
            Self::FLAG_ARCHETYPE,
            &Self::archetype_encoder(),
            &basis.archetype,
        )?;
        let team = buf.pop_if(flags, Self::FLAG_TEAM, &Self::team_encoder(), &basis.team)?;
        let x = buf.pop_if(flags, Self::FLAG_X, &Self::coord_encoder(), &basis.pos.x)?;
        let y = buf.pop_if(flags, Self::FLAG_Y, &Self::coord_encoder(), &basis.pos.y)?;
        let angle = buf.pop_if(flags, Self::FLAG_ANGLE, &Self::angle_encoder(), &basis.angle)?;
        let energy = buf.pop_if(
            flags,
            Self::FLAG_ENERGY,
            &Self::energy_encoder(),
            &basis.energy,
        )?;
        Ok(Self {
            archetype,
            team,
            pos: Vec2::new(x, y),
            angle,
            energy,
        })
    }

    fn merge_from(&mut self, flags: u32, source: &Self) {
        if flags & Self::FLAG_ARCHETYPE != 0 {
            self.archetype = source.archetype;
        }
        if flags & Self::FLAG_TEAM != 0 {
            self.team = source.team;
        }
        if flags & Self::FLAG_X != 0 {
            self.pos.x = source.pos.x;
        }
        if flags & Self::FLAG_Y != 0 {
            self.pos.y = source.pos.y;
        }
        if flags & Self::FLAG_ANGLE != 0 {
            self.angle = source.angle;
        }
        if flags & Self::FLAG_ENERGY != 0 {
            self.energy = source.energy;
        }
    }

    fn interpolate(a: &Self, b: &Self, t: f32) -> Self {
        Self {
            archetype: if t < 0.5 { a.archetype } else { b.archetype },
            team: if t < 0.5 { a.team } else { b.team },
            pos: a.pos.lerp(b.pos, t),
            angle: a.angle + (b.angle - a.angle) * t,
            energy: (a.energy as f32 + (b.energy - a.energy) as f32 * t).round() as i32,
        }
    }
}

/// Field-wise equality under the encoders, the relation the codec preserves.
pub fn state_eq(a: &TestState, b: &TestState) -> bool {
    a.dirty_flags(b) == 0
}

#[derive(Debug, Clone, Copy)]
pub struct TestCommand {
    pub dx: f32,
}

#[derive(Debug, Default)]
pub struct TestActor {
    pub starts: u32,
    pub shutdowns: u32,
    pub controller_changes: u32,
    pub frozen_events: u32,
    pub unfrozen_events: u32,
}

impl Actor for TestActor {
    type State = TestState;
    type Command = TestCommand;

    fn on_start(&mut self, _state: &mut TestState) {
        self.starts += 1;
    }

    fn on_shutdown(&mut self, _state: &mut TestState) {
        self.shutdowns += 1;
    }

    fn on_controller_changed(&mut self, _state: &mut TestState, _owned: bool) {
        self.controller_changes += 1;
    }

    fn on_frozen(&mut self, _state: &TestState) {
        self.frozen_events += 1;
    }

    fn on_unfrozen(&mut self, _state: &TestState) {
        self.unfrozen_events += 1;
    }

    fn simulate_command(&mut self, state: &mut TestState, command: &TestCommand) {
        state.pos.x += command.dx;
    }
}

#[derive(Debug, Default)]
pub struct TestController {
    commands: VecDeque<TestCommand>,
}

impl TestController {
    pub fn push(&mut self, command: TestCommand) {
        self.commands.push_back(command);
    }
}

impl Controller for TestController {
    type Command = TestCommand;

    fn latest_command(&self) -> Option<TestCommand> {
        self.commands.back().copied()
    }

    fn pending_commands(&self) -> Box<dyn Iterator<Item = TestCommand> + '_> {
        Box::new(self.commands.iter().copied())
    }
}

/// A full snapshot frame positioned at `(x, 0)`.
pub fn full_snapshot_at(entity_id: EntityId, tick: u32, x: f32) -> StateDelta<TestState> {
    let state = TestState {
        archetype: 1,
        pos: Vec2::new(x, 0.0),
        ..TestState::default()
    };
    StateDelta::update(entity_id, Tick::new(tick), TestState::all_fields(), state, true)
}

/// A partial frame carrying only an x coordinate.
pub fn delta_at(entity_id: EntityId, tick: u32, x: f32) -> StateDelta<TestState> {
    let state = TestState {
        pos: Vec2::new(x, 0.0),
        ..TestState::default()
    };
    StateDelta::update(entity_id, Tick::new(tick), TestState::FLAG_X, state, false)
}
