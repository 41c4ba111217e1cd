use std::sync::Arc;

use crate::block::DataBlock;
use crate::error::AllocationError;
use crate::pool::DataBlockPool;

/// Pixel / sample type carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Raw8Bit,
    Raw16Bit,
    Raw32Bit,
    Raw64Bit,
    Float32,
    Float64,
}

impl DataType {
    /// Element width in bytes.
    pub fn size(self) -> usize {
        match self {
            DataType::Raw8Bit => 1,
            DataType::Raw16Bit => 2,
            DataType::Raw32Bit | DataType::Float32 => 4,
            DataType::Raw64Bit | DataType::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Raw8Bit => "raw_8bit",
            DataType::Raw16Bit => "raw_16bit",
            DataType::Raw32Bit => "raw_32bit",
            DataType::Raw64Bit => "raw_64bit",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

/// One unit of detector payload flowing through the pipeline.
///
/// The payload lives in a [`DataBlock`] taken from the frame's pool on first
/// copy and handed back to that pool when the frame is dropped. The block may
/// be larger than the payload; [`Frame::data`] only exposes `data_size` bytes.
pub struct Frame {
    dataset_name: String,
    acquisition_id: String,
    frame_number: u64,
    data_type: Option<DataType>,
    dimensions: Vec<usize>,
    block: Option<DataBlock>,
    data_size: usize,
    pool: Arc<DataBlockPool>,
}

impl Frame {
    /// Create an empty frame for `dataset_name` whose storage comes from `pool`.
    pub fn new(pool: Arc<DataBlockPool>, dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            acquisition_id: String::new(),
            frame_number: 0,
            data_type: None,
            dimensions: Vec::new(),
            block: None,
            data_size: 0,
            pool,
        }
    }

    /// Replace the payload with a copy of `data`.
    pub fn copy_data(&mut self, data: &[u8]) -> Result<(), AllocationError> {
        match self.block.as_mut() {
            Some(block) => block.copy_data(data)?,
            None => {
                let mut block = self.pool.acquire(data.len())?;
                block.copy_data(data)?;
                self.block = Some(block);
            }
        }
        self.data_size = data.len();
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        match &self.block {
            Some(block) => &block.data()[..self.data_size],
            None => &[],
        }
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Identifier of the backing block, if a payload has been copied in.
    pub fn block_index(&self) -> Option<usize> {
        self.block.as_ref().map(DataBlock::index)
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn acquisition_id(&self) -> &str {
        &self.acquisition_id
    }

    pub fn set_acquisition_id(&mut self, acquisition_id: impl Into<String>) {
        self.acquisition_id = acquisition_id.into();
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn set_frame_number(&mut self, frame_number: u64) {
        self.frame_number = frame_number;
    }

    /// `None` when upstream never declared a type.
    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    pub fn set_data_type(&mut self, data_type: Option<DataType>) {
        self.data_type = data_type;
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn set_dimensions(&mut self, dimensions: Vec<usize>) {
        self.dimensions = dimensions;
    }

    // ── builder-style setters ──────────────────────────────────────────────

    pub fn with_acquisition_id(mut self, acquisition_id: impl Into<String>) -> Self {
        self.set_acquisition_id(acquisition_id);
        self
    }

    pub fn with_frame_number(mut self, frame_number: u64) -> Self {
        self.frame_number = frame_number;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_dimensions(mut self, dimensions: Vec<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn pool(&self) -> &Arc<DataBlockPool> {
        &self.pool
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("dataset_name", &self.dataset_name)
            .field("acquisition_id", &self.acquisition_id)
            .field("frame_number", &self.frame_number)
            .field("data_type", &self.data_type)
            .field("dimensions", &self.dimensions)
            .field("data_size", &self.data_size)
            .field("block_index", &self.block_index())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.pool.release(block);
        }
    }
}
