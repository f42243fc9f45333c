// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame pipeline
//!
//! The pipeline distinguishes producer-side errors (capture, transformation),
//! which are absorbed where they happen, from consumer-side errors (graphics
//! context), which are scoped to a single surface lifetime. None of them is
//! fatal to the host.

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised by the capture, processing and render stages
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// No capture source is available; the pipeline stays idle
    DeviceUnavailable(String),
    /// The frame transformation failed; the frame is dropped
    TransformationFailure(TransformError),
    /// A graphics context could not be created for the current surface
    ContextCreationFailure(String),
    /// A graphics resource could not be released during teardown
    ResourceReleaseError(String),
    /// A raw frame does not match the configured geometry or layout
    InvalidFrame(String),
    /// Drawing or presenting a frame failed
    RenderFailure(String),
}

/// Errors signaled by a [`FrameTransform`](crate::processing::FrameTransform)
#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    /// `transform` was called before `configure`
    NotConfigured,
    /// Input or output buffer length does not match the configured size
    DimensionMismatch {
        expected_input: usize,
        expected_output: usize,
        input: usize,
        output: usize,
    },
    /// The transformation itself failed
    Failed(String),
}

/// Errors raised by capture drivers
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The requested device does not exist or cannot be opened
    DeviceNotFound(String),
    /// The device does not support the requested format
    FormatNotSupported(String),
    /// The driver is already delivering frames
    AlreadyStarted,
    /// I/O error while talking to the device
    Io(String),
}

/// Errors surfaced to the user by the binary (configuration, terminal, files)
#[derive(Debug)]
pub enum AppError {
    /// Pipeline error
    Pipeline(PipelineError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Terminal setup or input errors
    Terminal(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DeviceUnavailable(msg) => write!(f, "Capture device unavailable: {}", msg),
            PipelineError::TransformationFailure(e) => write!(f, "Transformation failed: {}", e),
            PipelineError::ContextCreationFailure(msg) => {
                write!(f, "Graphics context creation failed: {}", msg)
            }
            PipelineError::ResourceReleaseError(msg) => {
                write!(f, "Failed to release graphics resource: {}", msg)
            }
            PipelineError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            PipelineError::RenderFailure(msg) => write!(f, "Render failed: {}", msg),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::NotConfigured => write!(f, "transform used before configure"),
            TransformError::DimensionMismatch {
                expected_input,
                expected_output,
                input,
                output,
            } => write!(
                f,
                "buffer size mismatch: input {} (expected {}), output {} (expected {})",
                input, expected_input, output, expected_output
            ),
            TransformError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CaptureError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            CaptureError::AlreadyStarted => write!(f, "Capture already started"),
            CaptureError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Pipeline(e) => write!(f, "{}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Terminal(msg) => write!(f, "Terminal error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for TransformError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for AppError {}

impl From<TransformError> for PipelineError {
    fn from(err: TransformError) -> Self {
        PipelineError::TransformationFailure(err)
    }
}

// Every capture failure leaves the pipeline without a source
impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        PipelineError::DeviceUnavailable(err.to_string())
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}
