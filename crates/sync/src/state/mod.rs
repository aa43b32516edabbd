mod delta;
mod record;

pub use delta::StateDelta;
pub use record::StateRecord;

use crate::bits::{BitBuffer, FlagEncoder, mask};
use crate::error::SyncError;

/// Wire width of the per-entity dirty word. The flag encoder is sized to the
/// largest state variant the protocol registers, so every peer reads the same
/// number of flag bits regardless of its own layout and a sender with unknown
/// fields is detected instead of misparsed.
pub const DIRTY_WORD_BITS: u32 = 16;

/// Per-entity replicated state.
///
/// A state is a fixed ordered set of fields, each packed by an encoder. Bit
/// `i` of a flag word refers to field `i` in declaration order. Because the
/// bit buffer is a LIFO stack, `encode_fields` must push the flagged fields in
/// *reverse* declaration order so that `decode_fields` pops them back in
/// declaration order.
pub trait SyncState: Clone + Default + 'static {
    /// Number of delta-tracked fields; at most [`DIRTY_WORD_BITS`].
    const FIELD_COUNT: u32;

    /// Fields replicated only to the controlling peer.
    const PRIVATE_FIELDS: u32 = 0;

    /// Bit `i` set iff field `i` differs from the basis under its encoder's
    /// equality relation.
    fn dirty_flags(&self, basis: &Self) -> u32;

    /// Pushes every field whose flag is set, in reverse declaration order.
    fn encode_fields(&self, buf: &mut BitBuffer, flags: u32);

    /// Pops the flagged fields in declaration order; unset fields take the
    /// basis value.
    fn decode_fields(buf: &mut BitBuffer, flags: u32, basis: &Self) -> Result<Self, SyncError>;

    /// Overwrites the flagged fields from `source`, leaving the rest alone.
    fn merge_from(&mut self, flags: u32, source: &Self);

    /// Blend of `a` and `b` at parameter `t`: numeric fields linearly
    /// (extrapolating when `t` is outside `[0, 1]`), discrete fields snapping
    /// to `a` below `t = 0.5` and to `b` from there on.
    fn interpolate(a: &Self, b: &Self, t: f32) -> Self;

    fn all_fields() -> u32 {
        mask(Self::FIELD_COUNT)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn copy_from(&mut self, other: &Self) {
        self.clone_from(other);
    }

    fn encode_full(&self, buf: &mut BitBuffer) {
        self.encode_fields(buf, Self::all_fields());
        buf.push_with(&FlagEncoder::new(DIRTY_WORD_BITS), &Self::all_fields());
    }

    fn decode_full(buf: &mut BitBuffer) -> Result<Self, SyncError> {
        let basis = Self::default();
        Self::decode_flagged(buf, &basis)
    }

    fn encode_delta(&self, buf: &mut BitBuffer, basis: &Self) {
        let flags = self.dirty_flags(basis);
        self.encode_fields(buf, flags);
        buf.push_with(&FlagEncoder::new(DIRTY_WORD_BITS), &flags);
    }

    fn decode_delta(buf: &mut BitBuffer, basis: &Self) -> Result<Self, SyncError> {
        Self::decode_flagged(buf, basis)
    }

    /// Pops a dirty word and the fields it names.
    fn decode_flagged(buf: &mut BitBuffer, basis: &Self) -> Result<Self, SyncError> {
        let flags = buf.pop_with(&FlagEncoder::new(DIRTY_WORD_BITS))?;
        if flags & !Self::all_fields() != 0 {
            return Err(SyncError::ProtocolMismatch {
                flags,
                known: Self::FIELD_COUNT,
            });
        }
        Self::decode_fields(buf, flags, basis)
    }
}
