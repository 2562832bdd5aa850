//! Error types for overlay operations.
//!
//! Every failing driver call is reported with the operation name and the
//! driver's result code. Recoverable surface loss never shows up here unless
//! the retry budget ran out.

use thiserror::Error;

use crate::driver::HResult;
use crate::format::FourCc;
use crate::geometry::Rect;

/// Main error type for overlay operations.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Driver ran out of system or video memory
    #[error("Out of memory in {operation}: {code}")]
    AllocationFailure { operation: &'static str, code: HResult },

    /// A driver call failed after any recovery attempts
    #[error("{operation} failed: {code}")]
    Driver { operation: &'static str, code: HResult },

    /// Driver silently substituted another pixel format
    #[error("Driver didn't use requested FourCC format {requested} (got {})", describe_fourcc(.negotiated))]
    FormatMismatch {
        requested: FourCc,
        negotiated: Option<FourCc>,
    },

    /// Back buffer or capability query unavailable
    #[error("{operation} unavailable: {code}")]
    AttachmentFailure { operation: &'static str, code: HResult },

    /// Overlay has no hardware surface to operate on
    #[error("Overlay has no {0} surface")]
    NoSurface(&'static str),

    /// Zero-sized overlay requested
    #[error("Invalid overlay dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Rectangle edges fall outside screen coordinates
    #[error("Rectangle {0:?} does not fit screen coordinates")]
    InvalidRect(Rect),

    /// Configuration document could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

fn describe_fourcc(code: &Option<FourCc>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
}

impl OverlayError {
    /// Driver result code carried by the error, if any.
    pub fn code(&self) -> Option<HResult> {
        match self {
            OverlayError::AllocationFailure { code, .. }
            | OverlayError::Driver { code, .. }
            | OverlayError::AttachmentFailure { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Name of the failing driver operation, if any.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            OverlayError::AllocationFailure { operation, .. }
            | OverlayError::Driver { operation, .. }
            | OverlayError::AttachmentFailure { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

/// Type alias for Results using OverlayError.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Extension trait for tagging raw driver results with the operation name.
pub trait DriverResultExt<T> {
    /// Convert a failing code to [`OverlayError::Driver`].
    fn driver_op(self, operation: &'static str) -> OverlayResult<T>;

    /// Convert a failing code to [`OverlayError::AttachmentFailure`].
    fn attachment_op(self, operation: &'static str) -> OverlayResult<T>;

    /// Like [`driver_op`](Self::driver_op), but out-of-memory codes become
    /// [`OverlayError::AllocationFailure`].
    fn allocation_op(self, operation: &'static str) -> OverlayResult<T>;
}

impl<T> DriverResultExt<T> for Result<T, HResult> {
    fn driver_op(self, operation: &'static str) -> OverlayResult<T> {
        self.map_err(|code| OverlayError::Driver { operation, code })
    }

    fn attachment_op(self, operation: &'static str) -> OverlayResult<T> {
        self.map_err(|code| OverlayError::AttachmentFailure { operation, code })
    }

    fn allocation_op(self, operation: &'static str) -> OverlayResult<T> {
        self.map_err(|code| {
            if code.is_out_of_memory() {
                OverlayError::AllocationFailure { operation, code }
            } else {
                OverlayError::Driver { operation, code }
            }
        })
    }
}
