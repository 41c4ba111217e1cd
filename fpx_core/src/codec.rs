use std::fmt;

use crate::error::CodecStatus;
use crate::format::{
    BLOSC_LZ4, BLOSC_LZ4_COMPNAME, BLOSC_MAX_OVERHEAD, BLOSC_MAX_THREADS, BLOSC_ZLIB,
    BLOSC_ZLIB_COMPNAME, BLOSC_ZSTD, BLOSC_ZSTD_COMPNAME,
};

/// Compression backend selector. Discriminants are the blosc compressor codes
/// used on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Compressor {
    #[default]
    Lz4 = BLOSC_LZ4,
    Zlib = BLOSC_ZLIB,
    Zstd = BLOSC_ZSTD,
}

impl Compressor {
    pub const ALL: [Compressor; 3] = [Compressor::Lz4, Compressor::Zlib, Compressor::Zstd];

    /// Resolve a control-channel compressor code. Codes for backends that are
    /// not bundled (blosclz, lz4hc, snappy) resolve to `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match u8::try_from(code).ok()? {
            BLOSC_LZ4 => Some(Compressor::Lz4),
            BLOSC_ZLIB => Some(Compressor::Zlib),
            BLOSC_ZSTD => Some(Compressor::Zstd),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            BLOSC_LZ4_COMPNAME => Some(Compressor::Lz4),
            BLOSC_ZLIB_COMPNAME => Some(Compressor::Zlib),
            BLOSC_ZSTD_COMPNAME => Some(Compressor::Zstd),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Compressor::Lz4 => BLOSC_LZ4_COMPNAME,
            Compressor::Zlib => BLOSC_ZLIB_COMPNAME,
            Compressor::Zstd => BLOSC_ZSTD_COMPNAME,
        }
    }
}

impl fmt::Display for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pre-compression filter applied to each block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ShuffleMode {
    #[default]
    NoShuffle = 0,
    /// Group bytes of equal significance across elements.
    Byte = 1,
    /// Group bits of equal significance across elements.
    Bit = 2,
}

impl ShuffleMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ShuffleMode::NoShuffle),
            1 => Some(ShuffleMode::Byte),
            2 => Some(ShuffleMode::Bit),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Per-call parameters of a compression. Source length and destination
/// capacity travel with the slices themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressParams {
    /// Compression level, 0 (store only) to 9.
    pub level: i32,
    pub shuffle: ShuffleMode,
    /// Element width in bytes, used by the shuffle filters.
    pub type_size: usize,
}

/// Compression backend invoked by the frame stage.
///
/// A codec owns the state that the C blosc library keeps process-wide: the
/// selected compressor and the worker thread count. The stage only mutates
/// that state while holding its own lock, once per acquisition.
pub trait FrameCodec: Send {
    /// Human-readable codec name for logs.
    fn name(&self) -> &'static str;

    /// Worst-case growth of `compress` output over its input.
    fn max_overhead(&self) -> usize {
        BLOSC_MAX_OVERHEAD
    }

    /// Largest thread count `set_threads` accepts.
    fn max_threads(&self) -> u32 {
        BLOSC_MAX_THREADS
    }

    /// Compressor used by subsequent `compress` calls.
    fn compressor(&self) -> Compressor;

    /// Select the compressor for subsequent calls. Fails if the backend is
    /// not available in this build.
    fn select_compressor(&mut self, compressor: Compressor) -> Result<(), CodecStatus>;

    fn threads(&self) -> u32;

    fn set_threads(&mut self, threads: u32) -> Result<(), CodecStatus>;

    /// Compress `src` into `dest`, returning the number of bytes written.
    ///
    /// `Ok(0)` means the result did not fit in `dest`; nothing useful was
    /// written. Failures carry a negative status code.
    fn compress(
        &mut self,
        params: &CompressParams,
        src: &[u8],
        dest: &mut [u8],
    ) -> Result<usize, CodecStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressor_codes_follow_blosc_numbering() {
        assert_eq!(Compressor::from_code(1), Some(Compressor::Lz4));
        assert_eq!(Compressor::from_code(4), Some(Compressor::Zlib));
        assert_eq!(Compressor::from_code(5), Some(Compressor::Zstd));
        for unsupported in [-1, 0, 2, 3, 6, 300] {
            assert_eq!(Compressor::from_code(unsupported), None, "code {unsupported}");
        }
        for c in Compressor::ALL {
            assert_eq!(Compressor::from_code(c.code() as i64), Some(c));
            assert_eq!(Compressor::from_name(c.name()), Some(c));
        }
    }

    #[test]
    fn shuffle_codes() {
        assert_eq!(ShuffleMode::from_code(2), Some(ShuffleMode::Bit));
        assert_eq!(ShuffleMode::from_code(3), None);
        assert_eq!(ShuffleMode::from_code(-1), None);
        assert_eq!(ShuffleMode::default(), ShuffleMode::NoShuffle);
    }
}
