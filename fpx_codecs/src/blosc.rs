use rayon::prelude::*;
use tracing::{debug, error};

use fpx_core::format::{
    ChunkHeader, BLOSC_COMPRESSOR_VERSION_FORMAT, BLOSC_DOBITSHUFFLE, BLOSC_DOSHUFFLE,
    BLOSC_MAX_BUFFERSIZE, BLOSC_MAX_OVERHEAD, BLOSC_MAX_THREADS, BLOSC_MAX_TYPESIZE,
    BLOSC_MEMCPYED, BLOSC_MIN_BUFFERSIZE, BLOSC_MIN_HEADER_LENGTH, BLOSC_VERSION_FORMAT,
    COMPFORMAT_SHIFT,
};
use fpx_core::{CodecStatus, CompressParams, Compressor, FrameCodec, ShuffleMode};

use crate::backend;
use crate::shuffle::{shuffle, unshuffle};

/// Blosc-style chunk codec.
///
/// The source is cut into independent blocks; each block is shuffled and
/// then compressed with the selected backend. Blocks are compressed on a
/// private rayon pool when more than one thread is configured.
///
/// # Chunk layout
/// ```text
/// [HEADER: 16 bytes]
/// [BLOCK STARTS: u32 LE x nblocks]           absolute offsets into the chunk
/// [BLOCK 0: u32 LE csize][csize bytes] ...   csize == raw size means stored
/// ```
/// If that layout would not be smaller than the source, the chunk is instead
/// the header followed by the source bytes verbatim (`BLOSC_MEMCPYED`). The
/// output therefore never exceeds `src.len() + BLOSC_MAX_OVERHEAD`.
pub struct BloscCodec {
    compressor: Compressor,
    threads: u32,
    pool: Option<rayon::ThreadPool>,
}

impl Default for BloscCodec {
    fn default() -> Self {
        Self {
            compressor: Compressor::default(),
            threads: 1,
            pool: None,
        }
    }
}

impl BloscCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn compress_blocks(
        &self,
        params: &CompressParams,
        typesize: usize,
        src: &[u8],
        dest: &mut [u8],
        header: &mut ChunkHeader,
    ) -> anyhow::Result<Option<usize>> {
        let nbytes = src.len();
        let blocksize = compute_blocksize(params.level, typesize, nbytes);
        let nblocks = nbytes.div_ceil(blocksize);

        let compressor = self.compressor;
        let (level, mode) = (params.level, params.shuffle);
        let encode = move |raw: &[u8]| encode_block(compressor, level, mode, typesize, raw);
        let blocks: Vec<Vec<u8>> = match &self.pool {
            Some(pool) => pool.install(|| {
                src.par_chunks(blocksize)
                    .map(encode)
                    .collect::<anyhow::Result<_>>()
            })?,
            None => src.chunks(blocksize).map(encode).collect::<anyhow::Result<_>>()?,
        };

        let table_end = BLOSC_MIN_HEADER_LENGTH + 4 * nblocks;
        let total = table_end + blocks.iter().map(|b| 4 + b.len()).sum::<usize>();
        if total >= nbytes + BLOSC_MIN_HEADER_LENGTH || total > dest.len() {
            return Ok(None);
        }

        header.flags |= match mode {
            ShuffleMode::NoShuffle => 0,
            ShuffleMode::Byte => BLOSC_DOSHUFFLE,
            ShuffleMode::Bit => BLOSC_DOBITSHUFFLE,
        };
        header.blocksize = blocksize as u32;
        header.cbytes = total as u32;
        dest[..BLOSC_MIN_HEADER_LENGTH].copy_from_slice(&header.to_bytes());

        let mut offset = table_end;
        for (i, block) in blocks.iter().enumerate() {
            let slot = BLOSC_MIN_HEADER_LENGTH + 4 * i;
            dest[slot..slot + 4].copy_from_slice(&(offset as u32).to_le_bytes());
            dest[offset..offset + 4].copy_from_slice(&(block.len() as u32).to_le_bytes());
            dest[offset + 4..offset + 4 + block.len()].copy_from_slice(block);
            offset += 4 + block.len();
        }
        debug_assert_eq!(offset, total);
        Ok(Some(total))
    }
}

impl FrameCodec for BloscCodec {
    fn name(&self) -> &'static str {
        "blosc"
    }

    fn compressor(&self) -> Compressor {
        self.compressor
    }

    fn select_compressor(&mut self, compressor: Compressor) -> Result<(), CodecStatus> {
        if !backend::is_available(compressor) {
            error!(compressor = %compressor, "compressor is not available in this build");
            return Err(CodecStatus::CODEC_SUPPORT);
        }
        if compressor != self.compressor {
            debug!(from = %self.compressor, to = %compressor, "selected compressor");
        }
        self.compressor = compressor;
        Ok(())
    }

    fn threads(&self) -> u32 {
        self.threads
    }

    fn set_threads(&mut self, threads: u32) -> Result<(), CodecStatus> {
        if threads == 0 || threads > BLOSC_MAX_THREADS {
            return Err(CodecStatus::INVALID_PARAM);
        }
        if threads == self.threads {
            return Ok(());
        }
        self.pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads as usize)
                .thread_name(|i| format!("fpx-blosc-{i}"))
                .build()
                .map_err(|e| {
                    error!(threads, error = %e, "failed to build codec thread pool");
                    CodecStatus::THREAD_CREATE
                })?;
            Some(pool)
        } else {
            None
        };
        debug!(from = self.threads, to = threads, "codec thread count changed");
        self.threads = threads;
        Ok(())
    }

    fn compress(
        &mut self,
        params: &CompressParams,
        src: &[u8],
        dest: &mut [u8],
    ) -> Result<usize, CodecStatus> {
        let nbytes = src.len();
        if nbytes > BLOSC_MAX_BUFFERSIZE {
            return Err(CodecStatus::MAX_BUFSIZE_EXCEEDED);
        }
        if !(0..=9).contains(&params.level) {
            return Err(CodecStatus::CODEC_PARAM);
        }
        if params.type_size == 0 {
            return Err(CodecStatus::INVALID_PARAM);
        }
        if dest.len() < BLOSC_MAX_OVERHEAD {
            return Err(CodecStatus::WRITE_BUFFER);
        }
        let typesize = if params.type_size > BLOSC_MAX_TYPESIZE {
            1
        } else {
            params.type_size
        };

        let mut header = ChunkHeader {
            version: BLOSC_VERSION_FORMAT,
            versionlz: BLOSC_COMPRESSOR_VERSION_FORMAT,
            flags: backend::format_code(self.compressor) << COMPFORMAT_SHIFT,
            typesize: typesize as u8,
            nbytes: nbytes as u32,
            blocksize: 0,
            cbytes: 0,
        };

        if params.level > 0 && nbytes >= BLOSC_MIN_BUFFERSIZE {
            match self.compress_blocks(params, typesize, src, dest, &mut header) {
                Ok(Some(cbytes)) => return Ok(cbytes),
                Ok(None) => {}
                Err(e) => {
                    error!(compressor = %self.compressor, error = %e, "block compression failed");
                    return Err(CodecStatus::FAILURE);
                }
            }
        }
        Ok(write_memcpyed(&mut header, src, dest))
    }
}

/// Store `src` verbatim after the header; 0 if `dest` cannot hold it.
fn write_memcpyed(header: &mut ChunkHeader, src: &[u8], dest: &mut [u8]) -> usize {
    let total = BLOSC_MIN_HEADER_LENGTH + src.len();
    if total > dest.len() {
        return 0;
    }
    header.flags |= BLOSC_MEMCPYED;
    header.blocksize = src.len() as u32;
    header.cbytes = total as u32;
    dest[..BLOSC_MIN_HEADER_LENGTH].copy_from_slice(&header.to_bytes());
    dest[BLOSC_MIN_HEADER_LENGTH..total].copy_from_slice(src);
    total
}

/// Higher levels get larger blocks: more context for the backend, less
/// parallelism. Blocks hold whole elements where possible.
fn compute_blocksize(level: i32, typesize: usize, nbytes: usize) -> usize {
    let base = match level {
        0..=3 => 64 * 1024,
        4..=6 => 128 * 1024,
        _ => 256 * 1024,
    };
    let mut blocksize = base.min(nbytes);
    if blocksize > typesize {
        blocksize -= blocksize % typesize;
    }
    blocksize.max(1)
}

fn encode_block(
    compressor: Compressor,
    level: i32,
    mode: ShuffleMode,
    typesize: usize,
    raw: &[u8],
) -> anyhow::Result<Vec<u8>> {
    let mut shuffled = vec![0u8; raw.len()];
    shuffle(mode, typesize, raw, &mut shuffled);
    let packed = backend::compress_block(compressor, level, &shuffled)?;
    if packed.len() >= raw.len() {
        Ok(shuffled)
    } else {
        Ok(packed)
    }
}

/// Restore the original bytes of a chunk written by [`BloscCodec`].
pub fn decompress(chunk: &[u8]) -> anyhow::Result<Vec<u8>> {
    let header = ChunkHeader::from_bytes(chunk)?;
    let nbytes = header.nbytes as usize;
    let cbytes = header.cbytes as usize;
    if cbytes > chunk.len() {
        anyhow::bail!("chunk header claims {} bytes but only {} are present", cbytes, chunk.len());
    }
    let chunk = &chunk[..cbytes];

    if header.has_flag(BLOSC_MEMCPYED) {
        let body = chunk
            .get(BLOSC_MIN_HEADER_LENGTH..BLOSC_MIN_HEADER_LENGTH + nbytes)
            .ok_or_else(|| anyhow::anyhow!("memcpyed chunk is truncated"))?;
        return Ok(body.to_vec());
    }

    let compressor = backend::from_format_code(header.compressor_format()).ok_or_else(|| {
        anyhow::anyhow!("unknown compressor format code {}", header.compressor_format())
    })?;
    let mode = if header.has_flag(BLOSC_DOBITSHUFFLE) {
        ShuffleMode::Bit
    } else if header.has_flag(BLOSC_DOSHUFFLE) {
        ShuffleMode::Byte
    } else {
        ShuffleMode::NoShuffle
    };
    let typesize = header.typesize as usize;
    let blocksize = header.blocksize as usize;
    if blocksize == 0 {
        anyhow::bail!("compressed chunk has a zero block size");
    }

    let nblocks = nbytes.div_ceil(blocksize);
    let mut out = Vec::with_capacity(nbytes);
    for i in 0..nblocks {
        let start = read_u32(chunk, BLOSC_MIN_HEADER_LENGTH + 4 * i)? as usize;
        let csize = read_u32(chunk, start)? as usize;
        let data = chunk
            .get(start + 4..start + 4 + csize)
            .ok_or_else(|| anyhow::anyhow!("block {} runs past the end of the chunk", i))?;
        let bsize = blocksize.min(nbytes - i * blocksize);

        let shuffled = if csize == bsize {
            data.to_vec()
        } else {
            backend::decompress_block(compressor, data, bsize)?
        };
        let mut raw = vec![0u8; bsize];
        unshuffle(mode, typesize, &shuffled, &mut raw);
        out.extend_from_slice(&raw);
    }
    Ok(out)
}

fn read_u32(buf: &[u8], at: usize) -> anyhow::Result<u32> {
    let bytes = buf
        .get(at..at + 4)
        .ok_or_else(|| anyhow::anyhow!("offset {} is outside the {}-byte chunk", at, buf.len()))?;
    Ok(u32::from_le_bytes(bytes.try_into()?))
}
