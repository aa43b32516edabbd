use super::mask;

/// Maps a typed value onto a fixed number of bits and back.
///
/// `equal` declares the semantic equality used for dirty-flag comparison. The
/// default is "packs to the same bits", which is the right relation for
/// quantized values; integral encoders override it with exact equality.
pub trait Encoder {
    type Value: Clone;

    fn required_bits(&self) -> u32;

    /// Deterministic; only the low `required_bits` may be non-zero.
    fn pack(&self, value: &Self::Value) -> u32;

    fn unpack(&self, bits: u32) -> Self::Value;

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        self.pack(a) == self.pack(b)
    }
}

/// Smallest width that can represent every index up to `max_index`.
fn bits_for(max_index: u64) -> u32 {
    64 - max_index.leading_zeros()
}

/// Bounded integer in `[min, max]`, packed as an offset from `min`. Values
/// outside the range clamp on pack.
#[derive(Debug, Clone, Copy)]
pub struct IntEncoder {
    min: i32,
    max: i32,
    bits: u32,
}

impl IntEncoder {
    pub fn new(min: i32, max: i32) -> Self {
        debug_assert!(min <= max);
        let span = max.wrapping_sub(min) as u32;
        Self {
            min,
            max,
            bits: bits_for(span as u64),
        }
    }
}

impl Encoder for IntEncoder {
    type Value = i32;

    fn required_bits(&self) -> u32 {
        self.bits
    }

    fn pack(&self, value: &i32) -> u32 {
        let clamped = (*value).clamp(self.min, self.max);
        clamped.wrapping_sub(self.min) as u32
    }

    fn unpack(&self, bits: u32) -> i32 {
        self.min.wrapping_add(bits as i32)
    }

    fn equal(&self, a: &i32, b: &i32) -> bool {
        a == b
    }
}

/// Quantized float: range `[min, max]` at `step` resolution. Two values are
/// equal when they quantize to the same level.
#[derive(Debug, Clone, Copy)]
pub struct FloatEncoder {
    min: f32,
    max: f32,
    step: f32,
    bits: u32,
}

impl FloatEncoder {
    pub fn new(min: f32, max: f32, step: f32) -> Self {
        debug_assert!(max > min && step > 0.0);
        let levels = ((max - min) / step).round() as u64;
        Self {
            min,
            max,
            step,
            bits: bits_for(levels),
        }
    }
}

impl Encoder for FloatEncoder {
    type Value = f32;

    fn required_bits(&self) -> u32 {
        self.bits
    }

    fn pack(&self, value: &f32) -> u32 {
        let clamped = value.clamp(self.min, self.max);
        ((clamped - self.min) / self.step).round() as u32
    }

    fn unpack(&self, bits: u32) -> f32 {
        self.min + bits as f32 * self.step
    }
}

/// Enumerated tag with `count` variants, packed as its index.
#[derive(Debug, Clone, Copy)]
pub struct TagEncoder {
    max: u32,
    bits: u32,
}

impl TagEncoder {
    pub fn new(count: u32) -> Self {
        debug_assert!(count > 0);
        Self {
            max: count - 1,
            bits: bits_for((count - 1) as u64),
        }
    }
}

impl Encoder for TagEncoder {
    type Value = u32;

    fn required_bits(&self) -> u32 {
        self.bits
    }

    fn pack(&self, value: &u32) -> u32 {
        (*value).min(self.max)
    }

    fn unpack(&self, bits: u32) -> u32 {
        bits
    }

    fn equal(&self, a: &u32, b: &u32) -> bool {
        a == b
    }
}

/// Raw bitmask of a fixed width, e.g. the per-entity dirty word.
#[derive(Debug, Clone, Copy)]
pub struct FlagEncoder {
    bits: u32,
}

impl FlagEncoder {
    pub fn new(bits: u32) -> Self {
        Self { bits: bits.min(32) }
    }
}

impl Encoder for FlagEncoder {
    type Value = u32;

    fn required_bits(&self) -> u32 {
        self.bits
    }

    fn pack(&self, value: &u32) -> u32 {
        value & mask(self.bits)
    }

    fn unpack(&self, bits: u32) -> u32 {
        bits
    }

    fn equal(&self, a: &u32, b: &u32) -> bool {
        a == b
    }
}
