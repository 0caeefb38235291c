/*!
 * Compact Size Codec
 * 13-bit floating representation of block sizes
 *
 * The upper 5 bits hold a base-2 exponent and the lower 8 bits a byte offset,
 * so an encoded value stands for `(1 << high) + low` bytes. Encoding rounds
 * up: the decoded size is never smaller than the size that was encoded, as
 * long as the size is representable at all.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

const LOW_BITS: u32 = 8;
const HIGH_BITS: u32 = 5;
const LOW_MASK: u16 = (1 << LOW_BITS) - 1;
const HIGH_MAX: u16 = (1 << HIGH_BITS) - 1;

/// Sizes up to this value encode exactly with a zero exponent
const EXACT_LIMIT: usize = 1 << LOW_BITS;

/// Compressed block size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactSize(u16);

impl CompactSize {
    /// Width of the encoding in bits
    pub const BITS: u32 = LOW_BITS + HIGH_BITS;

    /// Largest encodable value
    pub const MAX: CompactSize = CompactSize((HIGH_MAX << LOW_BITS) | LOW_MASK);

    /// Encode a size, rounding up
    ///
    /// Sizes larger than [`CompactSize::max_size`] saturate to
    /// [`CompactSize::MAX`]; callers detect that by decoding and comparing.
    pub fn compress(size: usize) -> Self {
        if size <= EXACT_LIMIT {
            // A zero exponent already implies one byte
            return Self(size.saturating_sub(1) as u16);
        }

        // Smallest exponent whose band reaches `size`
        let excess = size - LOW_MASK as usize;
        let high = usize::BITS - (excess - 1).leading_zeros();
        if high > HIGH_MAX as u32 {
            return Self::MAX;
        }

        let low = size.saturating_sub(1usize << high);
        debug_assert!(low <= LOW_MASK as usize);
        Self(((high as u16) << LOW_BITS) | low as u16)
    }

    /// Decode to a byte count
    #[inline]
    pub fn decompress(self) -> usize {
        (1usize << self.high()) + self.low() as usize
    }

    /// Exponent part
    #[inline]
    pub fn high(self) -> u32 {
        (self.0 >> LOW_BITS) as u32
    }

    /// Offset part
    #[inline]
    pub fn low(self) -> u8 {
        (self.0 & LOW_MASK) as u8
    }

    /// Raw 13-bit encoding
    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Rebuild from a raw encoding, rejecting values wider than 13 bits
    pub fn from_bits(bits: u16) -> Option<Self> {
        if bits > Self::MAX.0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    /// Largest size any encoding can stand for
    pub fn max_size() -> usize {
        Self::MAX.decompress()
    }
}

impl fmt::Display for CompactSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "2^{}+{}", self.high(), self.low())
    }
}
