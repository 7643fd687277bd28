//! vlong: unsigned LEB128 variable-length integers.
//!
//! Low 7-bit group first; the high bit of each byte marks a continuation.
//! Values below 128 take a single byte, which is what delta coding of sorted
//! neighbor ids produces in the common case.

/// Maximum encoded width of a `u64`.
pub const MAX_VLONG_BYTES: usize = 10;

/// Number of bytes `value` occupies once encoded.
#[inline]
pub const fn vlong_size(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Encode `value` into `out` starting at `pos`. Returns the position after
/// the last written byte. `out` must have room for [`vlong_size`] bytes.
#[inline]
pub fn encode_vlong(mut value: u64, out: &mut [u8], mut pos: usize) -> usize {
    while value >= 0x80 {
        out[pos] = (value as u8) | 0x80;
        value >>= 7;
        pos += 1;
    }
    out[pos] = value as u8;
    pos + 1
}

/// Encode `value` by appending to `out`.
pub fn push_vlong(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decode one vlong from `src` at `*pos`, advancing `*pos`.
///
/// The caller guarantees a complete vlong starts at `*pos`; adjacency runs
/// are sized at build time so this never reads past the run.
#[inline]
pub fn decode_vlong(src: &[u8], pos: &mut usize) -> u64 {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = src[*pos];
        *pos += 1;
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return value;
        }
        shift += 7;
        debug_assert!(shift < 64 + 7, "vlong longer than {MAX_VLONG_BYTES} bytes");
    }
}

/// Encoded size of a sorted target list: sum of the vlong widths of its deltas.
pub fn delta_encoded_size(sorted_targets: &[u64]) -> usize {
    let mut last = 0u64;
    let mut size = 0usize;
    for &target in sorted_targets {
        size += vlong_size(target - last);
        last = target;
    }
    size
}
