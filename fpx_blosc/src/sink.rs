use std::sync::mpsc;

use crossbeam::channel;
use fpx_core::Frame;

use crate::error::SinkError;

/// Destination for compressed frames.
pub trait FrameSink: Send + Sync {
    fn push(&self, frame: Frame) -> Result<(), SinkError>;
}

impl FrameSink for mpsc::Sender<Frame> {
    fn push(&self, frame: Frame) -> Result<(), SinkError> {
        self.send(frame).map_err(|_| SinkError)
    }
}

impl FrameSink for mpsc::SyncSender<Frame> {
    fn push(&self, frame: Frame) -> Result<(), SinkError> {
        self.send(frame).map_err(|_| SinkError)
    }
}

impl FrameSink for channel::Sender<Frame> {
    fn push(&self, frame: Frame) -> Result<(), SinkError> {
        self.send(frame).map_err(|_| SinkError)
    }
}
