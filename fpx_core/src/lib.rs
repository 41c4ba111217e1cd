pub mod block;
pub mod codec;
pub mod error;
pub mod format;
pub mod frame;
pub mod pool;

pub use block::{scratch_buffer, DataBlock};
pub use codec::{CompressParams, Compressor, FrameCodec, ShuffleMode};
pub use error::{AllocationError, CodecStatus};
pub use format::{ChunkHeader, BLOSC_MAX_OVERHEAD, BLOSC_MAX_THREADS};
pub use frame::{DataType, Frame};
pub use pool::{DataBlockPool, PoolStats};
