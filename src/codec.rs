//! Binary offset codec
//!
//! Fixed-width little-endian `u64` encoding shared by the heap (length
//! prefixes) and the segment logs (key lengths and heap offsets).

/// Width of every encoded integer
pub const OFFSET_WIDTH: usize = 8;

/// Encode a `u64` as 8 little-endian bytes
#[inline]
pub fn encode(n: u64) -> [u8; OFFSET_WIDTH] {
    n.to_le_bytes()
}

/// Decode 8 little-endian bytes into a `u64`
#[inline]
pub fn decode(bytes: [u8; OFFSET_WIDTH]) -> u64 {
    u64::from_le_bytes(bytes)
}

/// Decode the first 8 bytes of `bytes`, or `None` if fewer are available
#[inline]
pub fn decode_slice(bytes: &[u8]) -> Option<u64> {
    let head: [u8; OFFSET_WIDTH] = bytes.get(..OFFSET_WIDTH)?.try_into().ok()?;
    Some(decode(head))
}
