pub mod bits;
pub mod buffer;
pub mod config;
pub mod entity;
pub mod error;
pub mod replica;
pub mod state;
pub mod tick;

pub use bits::{BitBuffer, Encoder, FlagEncoder, FloatEncoder, IntEncoder, TagEncoder};
pub use buffer::{DejitterBuffer, QueueBuffer, Timestamped};
pub use config::SyncConfig;
pub use entity::{Actor, Controller, Entity, Factory};
pub use error::SyncError;
pub use replica::{PredictionBuffer, SmoothingBuffer};
pub use state::{DIRTY_WORD_BITS, StateDelta, StateRecord, SyncState};
pub use tick::{EntityId, IdEncoder, Tick, TickEncoder};

#[cfg(test)]
pub(crate) mod testutil;
