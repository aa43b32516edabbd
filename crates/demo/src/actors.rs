use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bitflags::bitflags;
use glam::Vec2;

use parallax::{
    Actor, BitBuffer, Controller, Encoder, Factory, FloatEncoder, IntEncoder, SyncError, SyncState,
    TagEncoder, Tick,
};

pub const KIND_PAWN: u32 = 0;
pub const KIND_DRONE: u32 = 1;

const MOVE_SPEED: f32 = 2.0;
const TURN_RATE: f32 = 5.0;
const DRONE_SPEED: f32 = 0.8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PawnState {
    pub archetype: u32,
    pub pos: Vec2,
    pub heading: f32,
    pub energy: i32,
}

impl PawnState {
    pub const FLAG_ARCHETYPE: u32 = 1 << 0;
    pub const FLAG_X: u32 = 1 << 1;
    pub const FLAG_Y: u32 = 1 << 2;
    pub const FLAG_HEADING: u32 = 1 << 3;
    pub const FLAG_ENERGY: u32 = 1 << 4;

    fn archetype_encoder() -> TagEncoder {
        TagEncoder::new(4)
    }

    fn coord_encoder() -> FloatEncoder {
        FloatEncoder::new(-1024.0, 1024.0, 0.01)
    }

    fn heading_encoder() -> FloatEncoder {
        FloatEncoder::new(0.0, 360.0, 0.1)
    }

    fn energy_encoder() -> IntEncoder {
        IntEncoder::new(0, 1000)
    }
}

impl SyncState for PawnState {
    const FIELD_COUNT: u32 = 5;
    // The energy reserve is gameplay-private: only the owning peer sees it.
    const PRIVATE_FIELDS: u32 = Self::FLAG_ENERGY;

    fn dirty_flags(&self, basis: &Self) -> u32 {
        let mut flags = 0;
        if !Self::archetype_encoder().equal(&self.archetype, &basis.archetype) {
            flags |= Self::FLAG_ARCHETYPE;
        }
        if !Self::coord_encoder().equal(&self.pos.x, &basis.pos.x) {
            flags |= Self::FLAG_X;
        }
        if !Self::coord_encoder().equal(&self.pos.y, &basis.pos.y) {
            flags |= Self::FLAG_Y;
        }
        if !Self::heading_encoder().equal(&self.heading, &basis.heading) {
            flags |= Self::FLAG_HEADING;
        }
        if !Self::energy_encoder().equal(&self.energy, &basis.energy) {
            flags |= Self::FLAG_ENERGY;
        }
        flags
    }

    fn encode_fields(&self, buf: &mut BitBuffer, flags: u32) {
        buf.push_if(flags, Self::FLAG_ENERGY, &Self::energy_encoder(), &self.energy);
        buf.push_if(flags, Self::FLAG_HEADING, &Self::heading_encoder(), &self.heading);
        buf.push_if(flags, Self::FLAG_Y, &Self::coord_encoder(), &self.pos.y);
        buf.push_if(flags, Self::FLAG_X, &Self::coord_encoder(), &self.pos.x);
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
        let x = buf.pop_if(flags, Self::FLAG_X, &Self::coord_encoder(), &basis.pos.x)?;
        let y = buf.pop_if(flags, Self::FLAG_Y, &Self::coord_encoder(), &basis.pos.y)?;
        let heading = buf.pop_if(
            flags,
            Self::FLAG_HEADING,
            &Self::heading_encoder(),
            &basis.heading,
        )?;
        let energy = buf.pop_if(
            flags,
            Self::FLAG_ENERGY,
            &Self::energy_encoder(),
            &basis.energy,
        )?;
        Ok(Self {
            archetype,
            pos: Vec2::new(x, y),
            heading,
            energy,
        })
    }

    fn merge_from(&mut self, flags: u32, source: &Self) {
        if flags & Self::FLAG_ARCHETYPE != 0 {
            self.archetype = source.archetype;
        }
        if flags & Self::FLAG_X != 0 {
            self.pos.x = source.pos.x;
        }
        if flags & Self::FLAG_Y != 0 {
            self.pos.y = source.pos.y;
        }
        if flags & Self::FLAG_HEADING != 0 {
            self.heading = source.heading;
        }
        if flags & Self::FLAG_ENERGY != 0 {
            self.energy = source.energy;
        }
    }

    fn interpolate(a: &Self, b: &Self, t: f32) -> Self {
        Self {
            archetype: if t < 0.5 { a.archetype } else { b.archetype },
            pos: a.pos.lerp(b.pos, t),
            heading: a.heading + (b.heading - a.heading) * t,
            energy: (a.energy as f32 + (b.energy - a.energy) as f32 * t).round() as i32,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u8 {
        const THRUST = 1 << 0;
        const TURN_LEFT = 1 << 1;
        const TURN_RIGHT = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PawnCommand {
    pub tick: Tick,
    pub buttons: Buttons,
}

fn heading_vector(degrees: f32) -> Vec2 {
    let radians = degrees.to_radians();
    Vec2::new(radians.cos(), radians.sin())
}

/// The demo's two entity behaviors behind one actor type, dispatched by kind.
#[derive(Debug)]
pub enum DemoActor {
    /// Input-driven; only moves on commands.
    Pawn,
    /// Autonomous patroller: turns steadily and drifts along its heading.
    Drone,
}

impl Actor for DemoActor {
    type State = PawnState;
    type Command = PawnCommand;

    fn on_start(&mut self, state: &mut PawnState) {
        log::info!(
            "actor kind {} starting at ({:.1}, {:.1})",
            state.archetype,
            state.pos.x,
            state.pos.y
        );
    }

    fn on_shutdown(&mut self, state: &mut PawnState) {
        log::info!("actor kind {} shutting down", state.archetype);
    }

    fn on_frozen(&mut self, state: &PawnState) {
        log::info!("actor kind {} frozen", state.archetype);
    }

    fn on_unfrozen(&mut self, state: &PawnState) {
        log::info!("actor kind {} unfrozen", state.archetype);
    }

    fn simulate(&mut self, state: &mut PawnState) {
        if let DemoActor::Drone = self {
            state.heading = (state.heading + TURN_RATE * 0.5).rem_euclid(360.0);
            state.pos += heading_vector(state.heading) * DRONE_SPEED;
        }
    }

    fn simulate_command(&mut self, state: &mut PawnState, command: &PawnCommand) {
        if let DemoActor::Drone = self {
            return;
        }
        if command.buttons.contains(Buttons::TURN_LEFT) {
            state.heading = (state.heading + TURN_RATE).rem_euclid(360.0);
        }
        if command.buttons.contains(Buttons::TURN_RIGHT) {
            state.heading = (state.heading - TURN_RATE).rem_euclid(360.0);
        }
        if command.buttons.contains(Buttons::THRUST) {
            state.pos += heading_vector(state.heading) * MOVE_SPEED;
            state.energy = (state.energy - 1).max(0);
        }
    }
}

#[derive(Debug, Default)]
pub struct DemoFactory;

impl Factory for DemoFactory {
    type Actor = DemoActor;

    fn create(&mut self, kind: u32) -> DemoActor {
        match kind {
            KIND_DRONE => DemoActor::Drone,
            _ => DemoActor::Pawn,
        }
    }
}

/// Deterministic input script shared by the server and the predicting client:
/// thrust continuously, weaving left and right. The handle is cheaply
/// cloneable so the drive loop keeps feeding the same queue the entity reads;
/// pending commands are the ones the server has not confirmed yet.
#[derive(Debug, Default, Clone)]
pub struct ScriptedController {
    commands: Rc<RefCell<VecDeque<PawnCommand>>>,
}

impl ScriptedController {
    pub fn sample(&self, tick: Tick) {
        let mut buttons = Buttons::THRUST;
        if (tick.raw() / 40) % 2 == 0 {
            buttons |= Buttons::TURN_LEFT;
        } else {
            buttons |= Buttons::TURN_RIGHT;
        }
        self.commands.borrow_mut().push_back(PawnCommand { tick, buttons });
    }

    /// Drops commands the server has already folded into `confirmed`.
    pub fn confirm(&self, confirmed: Tick) {
        let mut commands = self.commands.borrow_mut();
        while commands.front().is_some_and(|c| c.tick <= confirmed) {
            commands.pop_front();
        }
    }

    pub fn pending_len(&self) -> usize {
        self.commands.borrow().len()
    }
}

impl Controller for ScriptedController {
    type Command = PawnCommand;

    fn latest_command(&self) -> Option<PawnCommand> {
        self.commands.borrow().back().copied()
    }

    fn pending_commands(&self) -> Box<dyn Iterator<Item = PawnCommand> + '_> {
        let pending: Vec<PawnCommand> = self.commands.borrow().iter().copied().collect();
        Box::new(pending.into_iter())
    }
}
