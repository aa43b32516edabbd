mod buffer;
mod encoder;

pub use buffer::BitBuffer;
pub use encoder::{Encoder, FlagEncoder, FloatEncoder, IntEncoder, TagEncoder};

/// Low `bits` set, saturating at the full word.
pub(crate) const fn mask(bits: u32) -> u32 {
    if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 }
}
