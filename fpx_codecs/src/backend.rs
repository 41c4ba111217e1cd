use fpx_core::format::{BLOSC_LZ4_FORMAT, BLOSC_ZLIB_FORMAT, BLOSC_ZSTD_FORMAT};
use fpx_core::Compressor;

/// Whether `compressor` was compiled into this build.
pub fn is_available(compressor: Compressor) -> bool {
    match compressor {
        Compressor::Lz4 => true,
        Compressor::Zlib => cfg!(feature = "zlib"),
        Compressor::Zstd => cfg!(feature = "zstd"),
    }
}

/// Library format code written into the chunk header flags.
pub fn format_code(compressor: Compressor) -> u8 {
    match compressor {
        Compressor::Lz4 => BLOSC_LZ4_FORMAT,
        Compressor::Zlib => BLOSC_ZLIB_FORMAT,
        Compressor::Zstd => BLOSC_ZSTD_FORMAT,
    }
}

pub fn from_format_code(code: u8) -> Option<Compressor> {
    match code {
        BLOSC_LZ4_FORMAT => Some(Compressor::Lz4),
        BLOSC_ZLIB_FORMAT => Some(Compressor::Zlib),
        BLOSC_ZSTD_FORMAT => Some(Compressor::Zstd),
        _ => None,
    }
}

/// Compress one (already shuffled) block with the chosen backend.
///
/// `level` is the blosc level 1..=9, mapped onto each backend's own scale.
pub fn compress_block(compressor: Compressor, level: i32, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
    match compressor {
        // lz4_flex has a single speed/ratio point; the level is not used.
        Compressor::Lz4 => Ok(lz4_flex::block::compress(raw)),
        Compressor::Zlib => zlib_compress(level, raw),
        Compressor::Zstd => zstd_compress(level, raw),
    }
}

/// Decompress one block that is known to expand to `raw_len` bytes.
pub fn decompress_block(
    compressor: Compressor,
    compressed: &[u8],
    raw_len: usize,
) -> anyhow::Result<Vec<u8>> {
    let raw = match compressor {
        Compressor::Lz4 => lz4_flex::block::decompress(compressed, raw_len)
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))?,
        Compressor::Zlib => zlib_decompress(compressed, raw_len)?,
        Compressor::Zstd => zstd_decompress(compressed, raw_len)?,
    };
    if raw.len() != raw_len {
        anyhow::bail!(
            "{} block decompressed to {} bytes, expected {}",
            compressor,
            raw.len(),
            raw_len
        );
    }
    Ok(raw)
}

#[cfg(feature = "zlib")]
fn zlib_compress(level: i32, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
    use std::io::Write;

    let level = level.clamp(0, 9) as u32;
    let mut encoder = flate2::write::ZlibEncoder::new(
        Vec::with_capacity(raw.len() / 2),
        flate2::Compression::new(level),
    );
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

#[cfg(feature = "zlib")]
fn zlib_decompress(compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
    use std::io::Read;

    let mut raw = Vec::with_capacity(raw_len);
    flate2::read::ZlibDecoder::new(compressed)
        .take(raw_len as u64 + 1)
        .read_to_end(&mut raw)?;
    Ok(raw)
}

#[cfg(not(feature = "zlib"))]
fn zlib_compress(_level: i32, _raw: &[u8]) -> anyhow::Result<Vec<u8>> {
    anyhow::bail!("zlib support was not compiled in (enable the `zlib` feature)")
}

#[cfg(not(feature = "zlib"))]
fn zlib_decompress(_compressed: &[u8], _raw_len: usize) -> anyhow::Result<Vec<u8>> {
    anyhow::bail!("zlib support was not compiled in (enable the `zlib` feature)")
}

/// blosc spreads its 1..9 levels over zstd's wider range.
#[cfg(feature = "zstd")]
fn zstd_level(level: i32) -> i32 {
    if level < 9 {
        level * 2 - 1
    } else {
        *zstd::compression_level_range().end()
    }
}

#[cfg(feature = "zstd")]
fn zstd_compress(level: i32, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
    Ok(zstd::bulk::compress(raw, zstd_level(level))?)
}

#[cfg(feature = "zstd")]
fn zstd_decompress(compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
    Ok(zstd::bulk::decompress(compressed, raw_len)?)
}

#[cfg(not(feature = "zstd"))]
fn zstd_compress(_level: i32, _raw: &[u8]) -> anyhow::Result<Vec<u8>> {
    anyhow::bail!("zstd support was not compiled in (enable the `zstd` feature)")
}

#[cfg(not(feature = "zstd"))]
fn zstd_decompress(_compressed: &[u8], _raw_len: usize) -> anyhow::Result<Vec<u8>> {
    anyhow::bail!("zstd support was not compiled in (enable the `zstd` feature)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_codes_roundtrip() {
        for c in Compressor::ALL {
            assert_eq!(from_format_code(format_code(c)), Some(c));
        }
        assert_eq!(from_format_code(0), None);
    }

    #[test]
    fn every_available_backend_restores_its_block() {
        let raw: Vec<u8> = b"frame payload ".iter().cycle().take(10_000).copied().collect();
        for c in Compressor::ALL.into_iter().filter(|c| is_available(*c)) {
            let packed = compress_block(c, 5, &raw).unwrap();
            assert!(packed.len() < raw.len(), "{c} did not shrink repetitive data");
            assert_eq!(decompress_block(c, &packed, raw.len()).unwrap(), raw);
        }
    }

    #[test]
    fn wrong_raw_length_is_an_error() {
        let raw = vec![3u8; 4096];
        let packed = compress_block(Compressor::Lz4, 1, &raw).unwrap();
        assert!(decompress_block(Compressor::Lz4, &packed, 100).is_err());
    }
}
