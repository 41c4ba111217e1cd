/// Chunk format version written into byte 0 of every chunk header.
/// Matches the blosc 1.x stable format number.
pub const BLOSC_VERSION_FORMAT: u8 = 2;

/// Fixed size of the chunk header in bytes.
///   version:u8 + versionlz:u8 + flags:u8 + typesize:u8
///   + nbytes:i32 + blocksize:i32 + cbytes:i32
///   = 1 + 1 + 1 + 1 + 4 + 4 + 4 = 16
pub const BLOSC_MIN_HEADER_LENGTH: usize = 16;

/// Worst-case bytes a compressed chunk can exceed its input by.
///
/// Allocate at least `src.len() + BLOSC_MAX_OVERHEAD` for the destination buffer.
pub const BLOSC_MAX_OVERHEAD: usize = BLOSC_MIN_HEADER_LENGTH;

/// Largest source buffer that fits the i32 size fields of the header.
pub const BLOSC_MAX_BUFFERSIZE: usize = i32::MAX as usize - BLOSC_MAX_OVERHEAD;

/// Typesizes above this are treated as a plain byte stream (typesize 1).
pub const BLOSC_MAX_TYPESIZE: usize = 255;

/// Sources smaller than this are always stored without compression.
pub const BLOSC_MIN_BUFFERSIZE: usize = 32;

/// Upper bound on the codec's worker thread count.
pub const BLOSC_MAX_THREADS: u32 = 256;

// ── Header flags ───────────────────────────────────────────────────────────

/// Byte-wise shuffle was applied to every block.
pub const BLOSC_DOSHUFFLE: u8 = 0x1;
/// Data was copied verbatim after the header (not compressed).
pub const BLOSC_MEMCPYED: u8 = 0x2;
/// Bit-wise shuffle was applied to every block.
pub const BLOSC_DOBITSHUFFLE: u8 = 0x4;

/// Bits 5..7 of the flags byte hold the compressor format code.
pub const COMPFORMAT_SHIFT: u8 = 5;

// ── Compressor codes ───────────────────────────────────────────────────────

pub const BLOSC_BLOSCLZ: u8 = 0;
pub const BLOSC_LZ4: u8 = 1;
pub const BLOSC_LZ4HC: u8 = 2;
pub const BLOSC_SNAPPY: u8 = 3;
pub const BLOSC_ZLIB: u8 = 4;
pub const BLOSC_ZSTD: u8 = 5;

pub const BLOSC_LZ4_COMPNAME: &str = "lz4";
pub const BLOSC_ZLIB_COMPNAME: &str = "zlib";
pub const BLOSC_ZSTD_COMPNAME: &str = "zstd";

/// Compressor format codes stored in the header flags. They identify which
/// library produced a chunk and differ from the compressor codes above.
pub const BLOSC_LZ4_FORMAT: u8 = 1;
pub const BLOSC_ZLIB_FORMAT: u8 = 3;
pub const BLOSC_ZSTD_FORMAT: u8 = 4;

/// Internal format version of every bundled compressor.
pub const BLOSC_COMPRESSOR_VERSION_FORMAT: u8 = 1;

// ── Status codes ───────────────────────────────────────────────────────────

pub const BLOSC_ERROR_FAILURE: i32 = -1;
pub const BLOSC_ERROR_WRITE_BUFFER: i32 = -6;
pub const BLOSC_ERROR_CODEC_SUPPORT: i32 = -7;
pub const BLOSC_ERROR_CODEC_PARAM: i32 = -8;
pub const BLOSC_ERROR_INVALID_PARAM: i32 = -12;
pub const BLOSC_ERROR_THREAD_CREATE: i32 = -26;
pub const BLOSC_ERROR_MAX_BUFSIZE_EXCEEDED: i32 = -35;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 16-byte chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub version: u8,
    pub versionlz: u8,
    pub flags: u8,
    pub typesize: u8,
    /// Uncompressed size of the chunk payload.
    pub nbytes: u32,
    /// Nominal raw bytes per block (the last block may be smaller).
    pub blocksize: u32,
    /// Total chunk size including this header.
    pub cbytes: u32,
}

impl ChunkHeader {
    /// Serialize to exactly `BLOSC_MIN_HEADER_LENGTH` bytes.
    pub fn to_bytes(&self) -> [u8; BLOSC_MIN_HEADER_LENGTH] {
        let mut buf = [0u8; BLOSC_MIN_HEADER_LENGTH];
        buf[0] = self.version;
        buf[1] = self.versionlz;
        buf[2] = self.flags;
        buf[3] = self.typesize;
        buf[4..8].copy_from_slice(&self.nbytes.to_le_bytes());
        buf[8..12].copy_from_slice(&self.blocksize.to_le_bytes());
        buf[12..16].copy_from_slice(&self.cbytes.to_le_bytes());
        buf
    }

    /// Parse the header at the start of `chunk`, checking the format version.
    pub fn from_bytes(chunk: &[u8]) -> anyhow::Result<Self> {
        if chunk.len() < BLOSC_MIN_HEADER_LENGTH {
            anyhow::bail!(
                "chunk of {} bytes is shorter than the {}-byte header",
                chunk.len(),
                BLOSC_MIN_HEADER_LENGTH
            );
        }
        let header = Self {
            version: chunk[0],
            versionlz: chunk[1],
            flags: chunk[2],
            typesize: chunk[3],
            nbytes: u32::from_le_bytes(chunk[4..8].try_into()?),
            blocksize: u32::from_le_bytes(chunk[8..12].try_into()?),
            cbytes: u32::from_le_bytes(chunk[12..16].try_into()?),
        };
        if header.version != BLOSC_VERSION_FORMAT {
            anyhow::bail!(
                "unsupported chunk format version {} (expected {})",
                header.version,
                BLOSC_VERSION_FORMAT
            );
        }
        Ok(header)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Compressor format code packed into the top three flag bits.
    pub fn compressor_format(&self) -> u8 {
        self.flags >> COMPFORMAT_SHIFT
    }
}
