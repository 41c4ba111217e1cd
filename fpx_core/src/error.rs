use std::collections::TryReserveError;

use thiserror::Error;

use crate::format::{
    BLOSC_ERROR_CODEC_PARAM, BLOSC_ERROR_CODEC_SUPPORT, BLOSC_ERROR_FAILURE,
    BLOSC_ERROR_INVALID_PARAM, BLOSC_ERROR_MAX_BUFSIZE_EXCEEDED, BLOSC_ERROR_THREAD_CREATE,
    BLOSC_ERROR_WRITE_BUFFER,
};

/// The allocator could not provide a buffer of the requested size.
#[derive(Debug, Error)]
#[error("failed to allocate {requested} bytes")]
pub struct AllocationError {
    pub requested: usize,
    #[source]
    pub source: TryReserveError,
}

/// Negative status returned across the codec boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("codec status {code} ({})", describe_code(.code))]
pub struct CodecStatus {
    pub code: i32,
}

impl CodecStatus {
    pub const FAILURE: Self = Self { code: BLOSC_ERROR_FAILURE };
    pub const WRITE_BUFFER: Self = Self { code: BLOSC_ERROR_WRITE_BUFFER };
    pub const CODEC_SUPPORT: Self = Self { code: BLOSC_ERROR_CODEC_SUPPORT };
    pub const CODEC_PARAM: Self = Self { code: BLOSC_ERROR_CODEC_PARAM };
    pub const INVALID_PARAM: Self = Self { code: BLOSC_ERROR_INVALID_PARAM };
    pub const THREAD_CREATE: Self = Self { code: BLOSC_ERROR_THREAD_CREATE };
    pub const MAX_BUFSIZE_EXCEEDED: Self = Self { code: BLOSC_ERROR_MAX_BUFSIZE_EXCEEDED };
}

fn describe_code(code: &i32) -> &'static str {
    match *code {
        BLOSC_ERROR_FAILURE => "generic failure",
        BLOSC_ERROR_WRITE_BUFFER => "not enough space to write",
        BLOSC_ERROR_CODEC_SUPPORT => "codec not supported",
        BLOSC_ERROR_CODEC_PARAM => "invalid codec parameter",
        BLOSC_ERROR_INVALID_PARAM => "invalid parameter",
        BLOSC_ERROR_THREAD_CREATE => "thread pool creation failed",
        BLOSC_ERROR_MAX_BUFSIZE_EXCEEDED => "source exceeds maximum buffer size",
        _ => "unknown status",
    }
}
