mod backend;
mod blosc;
pub mod shuffle;

pub use backend::is_available;
pub use blosc::{decompress, BloscCodec};

use fpx_core::{CodecStatus, Compressor, FrameCodec};

/// Build the bundled codec with `compressor` already selected.
pub fn codec_for(compressor: Compressor) -> Result<Box<dyn FrameCodec>, CodecStatus> {
    let mut codec = BloscCodec::new();
    codec.select_compressor(compressor)?;
    Ok(Box::new(codec))
}
