/// Integration tests for the bundled blosc codec: every compressor and
/// shuffle mode must restore the source exactly, and the output must respect
/// the `nbytes + BLOSC_MAX_OVERHEAD` bound the frame stage sizes its scratch
/// buffer by.
use fpx_codecs::{codec_for, decompress, is_available, BloscCodec};
use fpx_core::format::{ChunkHeader, BLOSC_DOBITSHUFFLE, BLOSC_DOSHUFFLE, BLOSC_MEMCPYED};
use fpx_core::{CompressParams, Compressor, FrameCodec, ShuffleMode, BLOSC_MAX_OVERHEAD};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// A synthetic 16-bit detector image: a smooth gradient with low-bit noise.
fn detector_image(width: usize, height: usize) -> Vec<u8> {
    let noise = pseudo_random_bytes(width * height, 0xC0FFEE);
    let mut out = Vec::with_capacity(width * height * 2);
    for y in 0..height {
        for x in 0..width {
            let value = (x + y) as u16 * 4 + (noise[y * width + x] & 0x3) as u16;
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

fn compress_with(codec: &mut dyn FrameCodec, params: CompressParams, src: &[u8]) -> Vec<u8> {
    let mut dest = vec![0u8; src.len() + BLOSC_MAX_OVERHEAD];
    let n = codec.compress(&params, src, &mut dest).unwrap();
    assert!(n > 0, "compression into a worst-case buffer must not return 0");
    assert!(n <= src.len() + BLOSC_MAX_OVERHEAD);
    dest.truncate(n);
    dest
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_every_compressor_and_shuffle() {
    let src = detector_image(256, 192);
    for compressor in Compressor::ALL.into_iter().filter(|c| is_available(*c)) {
        let mut codec = codec_for(compressor).unwrap();
        for shuffle in [ShuffleMode::NoShuffle, ShuffleMode::Byte, ShuffleMode::Bit] {
            let params = CompressParams { level: 5, shuffle, type_size: 2 };
            let chunk = compress_with(codec.as_mut(), params, &src);
            // Unshuffled 16-bit noise gives LZ4 little to match, so only the
            // shuffled layouts are required to shrink.
            assert!(
                shuffle == ShuffleMode::NoShuffle || chunk.len() < src.len(),
                "{compressor}/{shuffle:?} should shrink a smooth image: {} >= {}",
                chunk.len(),
                src.len()
            );
            assert_eq!(decompress(&chunk).unwrap(), src, "{compressor}/{shuffle:?}");
        }
    }
}

#[test]
fn test_header_records_parameters() {
    let src = detector_image(128, 128);
    let mut codec = BloscCodec::new();

    let chunk = compress_with(
        &mut codec,
        CompressParams { level: 3, shuffle: ShuffleMode::Bit, type_size: 2 },
        &src,
    );
    let header = ChunkHeader::from_bytes(&chunk).unwrap();
    assert_eq!(header.nbytes as usize, src.len());
    assert_eq!(header.cbytes as usize, chunk.len());
    assert_eq!(header.typesize, 2);
    assert!(header.has_flag(BLOSC_DOBITSHUFFLE));
    assert!(!header.has_flag(BLOSC_DOSHUFFLE));
    assert!(!header.has_flag(BLOSC_MEMCPYED));
}

#[test]
fn test_incompressible_data_is_memcpyed_within_overhead() {
    let src = pseudo_random_bytes(200_000, 0x1234_5678);
    let mut codec = BloscCodec::new();
    let chunk = compress_with(
        &mut codec,
        CompressParams { level: 9, shuffle: ShuffleMode::NoShuffle, type_size: 1 },
        &src,
    );
    assert_eq!(chunk.len(), src.len() + BLOSC_MAX_OVERHEAD);
    let header = ChunkHeader::from_bytes(&chunk).unwrap();
    assert!(header.has_flag(BLOSC_MEMCPYED));
    assert_eq!(decompress(&chunk).unwrap(), src);
}

#[test]
fn test_tiny_and_empty_sources_are_stored() {
    let mut codec = BloscCodec::new();
    let params = CompressParams { level: 5, shuffle: ShuffleMode::Byte, type_size: 4 };
    for src in [Vec::new(), vec![7u8; 5], vec![1u8; 31]] {
        let chunk = compress_with(&mut codec, params, &src);
        assert_eq!(chunk.len(), src.len() + BLOSC_MAX_OVERHEAD);
        assert_eq!(decompress(&chunk).unwrap(), src);
    }
}

#[test]
fn test_destination_too_small_returns_zero() {
    let src = pseudo_random_bytes(4096, 42);
    let mut codec = BloscCodec::new();
    let mut dest = vec![0u8; 1024];
    let params = CompressParams { level: 5, shuffle: ShuffleMode::NoShuffle, type_size: 1 };
    assert_eq!(codec.compress(&params, &src, &mut dest), Ok(0));
}

#[test]
fn test_multithreaded_output_matches_single_threaded() {
    let src = detector_image(1024, 512); // 1 MiB, several blocks
    let params = CompressParams { level: 7, shuffle: ShuffleMode::Byte, type_size: 2 };

    let mut single = BloscCodec::new();
    let expected = compress_with(&mut single, params, &src);

    let mut multi = BloscCodec::new();
    multi.set_threads(4).unwrap();
    let actual = compress_with(&mut multi, params, &src);

    assert_eq!(actual, expected, "block layout must not depend on thread count");
    assert_eq!(decompress(&actual).unwrap(), src);
}

#[test]
fn test_level_zero_stores_verbatim() {
    let src = detector_image(64, 64);
    let mut codec = BloscCodec::new();
    let chunk = compress_with(
        &mut codec,
        CompressParams { level: 0, shuffle: ShuffleMode::Bit, type_size: 2 },
        &src,
    );
    assert!(ChunkHeader::from_bytes(&chunk).unwrap().has_flag(BLOSC_MEMCPYED));
    assert_eq!(&chunk[16..], src.as_slice());
}

#[test]
fn test_selected_compressor_is_recorded() {
    let mut codec = BloscCodec::new();
    assert_eq!(codec.compressor(), Compressor::Lz4);
    if is_available(Compressor::Zstd) {
        codec.select_compressor(Compressor::Zstd).unwrap();
        assert_eq!(codec.compressor(), Compressor::Zstd);
    }
}
