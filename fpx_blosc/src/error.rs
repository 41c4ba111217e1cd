use fpx_core::{AllocationError, CodecStatus, Compressor};
use thiserror::Error;

use crate::settings::CompressionSettings;

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("compression failed for frame {frame_number} ({settings}): {status}")]
    Codec {
        status: CodecStatus,
        frame_number: u64,
        settings: CompressionSettings,
    },

    #[error("codec refused compressor {compressor}: {status}")]
    CompressorSelection {
        compressor: Compressor,
        status: CodecStatus,
    },

    #[error("codec refused {threads} threads: {status}")]
    Threads { threads: u32, status: CodecStatus },

    #[error("downstream rejected frame {frame_number}: {source}")]
    Downstream {
        frame_number: u64,
        #[source]
        source: SinkError,
    },
}

/// The downstream consumer is gone.
#[derive(Debug, Error)]
#[error("frame sink disconnected")]
pub struct SinkError;
