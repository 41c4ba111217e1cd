//! Byte and bit shuffle filters applied to each block before compression.
//!
//! Both transforms regroup data by significance so that a block of similar
//! values (detector counts, mostly-small integers) presents the backend with
//! long runs. Only whole elements are transformed; trailing bytes that do not
//! form a complete element (or, for bit shuffle, a complete group of eight
//! elements) are copied through unchanged.

use fpx_core::ShuffleMode;

/// Apply `mode` to `src`, writing `src.len()` bytes into `dest`.
pub fn shuffle(mode: ShuffleMode, type_size: usize, src: &[u8], dest: &mut [u8]) {
    debug_assert_eq!(src.len(), dest.len());
    match mode {
        ShuffleMode::NoShuffle => dest.copy_from_slice(src),
        ShuffleMode::Byte => byte_shuffle(type_size, src, dest),
        ShuffleMode::Bit => bit_shuffle(type_size, src, dest),
    }
}

/// Reverse [`shuffle`].
pub fn unshuffle(mode: ShuffleMode, type_size: usize, src: &[u8], dest: &mut [u8]) {
    debug_assert_eq!(src.len(), dest.len());
    match mode {
        ShuffleMode::NoShuffle => dest.copy_from_slice(src),
        ShuffleMode::Byte => byte_unshuffle(type_size, src, dest),
        ShuffleMode::Bit => bit_unshuffle(type_size, src, dest),
    }
}

fn byte_shuffle(type_size: usize, src: &[u8], dest: &mut [u8]) {
    if type_size <= 1 {
        dest.copy_from_slice(src);
        return;
    }
    let elements = src.len() / type_size;
    let body = elements * type_size;
    for (e, element) in src[..body].chunks_exact(type_size).enumerate() {
        for (b, &byte) in element.iter().enumerate() {
            dest[b * elements + e] = byte;
        }
    }
    dest[body..].copy_from_slice(&src[body..]);
}

fn byte_unshuffle(type_size: usize, src: &[u8], dest: &mut [u8]) {
    if type_size <= 1 {
        dest.copy_from_slice(src);
        return;
    }
    let elements = src.len() / type_size;
    let body = elements * type_size;
    for (e, element) in dest[..body].chunks_exact_mut(type_size).enumerate() {
        for (b, byte) in element.iter_mut().enumerate() {
            *byte = src[b * elements + e];
        }
    }
    dest[body..].copy_from_slice(&src[body..]);
}

/// Transpose the bit matrix of `elements x (8 * type_size)` bits.
///
/// Output row `r = byte * 8 + bit` holds bit `bit` of byte `byte` of every
/// element, packed eight elements per output byte.
fn bit_shuffle(type_size: usize, src: &[u8], dest: &mut [u8]) {
    let type_size = type_size.max(1);
    let elements = (src.len() / type_size) & !7;
    let body = elements * type_size;
    let row_len = elements / 8;

    dest[..body].fill(0);
    for byte in 0..type_size {
        for bit in 0..8 {
            let row = &mut dest[(byte * 8 + bit) * row_len..(byte * 8 + bit + 1) * row_len];
            for (k, out) in row.iter_mut().enumerate() {
                let mut packed = 0u8;
                for j in 0..8 {
                    let value = src[(k * 8 + j) * type_size + byte];
                    packed |= ((value >> bit) & 1) << j;
                }
                *out = packed;
            }
        }
    }
    dest[body..].copy_from_slice(&src[body..]);
}

fn bit_unshuffle(type_size: usize, src: &[u8], dest: &mut [u8]) {
    let type_size = type_size.max(1);
    let elements = (src.len() / type_size) & !7;
    let body = elements * type_size;
    let row_len = elements / 8;

    dest[..body].fill(0);
    for byte in 0..type_size {
        for bit in 0..8 {
            let row = &src[(byte * 8 + bit) * row_len..(byte * 8 + bit + 1) * row_len];
            for (k, &packed) in row.iter().enumerate() {
                for j in 0..8 {
                    let b = (packed >> j) & 1;
                    dest[(k * 8 + j) * type_size + byte] |= b << bit;
                }
            }
        }
    }
    dest[body..].copy_from_slice(&src[body..]);
}
