//! Hardware YUV overlay backend for a DirectDraw-class display driver.
//!
//! Allocates a double-buffered overlay surface in video memory, hands the
//! caller three planar (or one packed) writable planes per frame, and puts
//! frames on screen with a geometry update plus page flip. Color keying keeps
//! the overlay behind other windows when the driver supports it.
//!
//! ```ignore
//! let mut backend = OverlayBackend::new(driver, display, OverlayConfig::default());
//! let mut overlay = backend.create(720, 480, FourCc::YV12)?;
//! {
//!     let mut frame = backend.frame(&mut overlay)?;
//!     for plane in frame.planes_mut() {
//!         plane.fill(0x80);
//!     }
//! }
//! backend.display(&overlay, &Rect::new(0, 0, 720, 480), &Rect::new(0, 0, 720, 480))?;
//! backend.free(overlay);
//! ```

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod format;
pub mod geometry;
pub mod overlay;
pub mod retry;

#[cfg(windows)]
pub mod ddraw;
#[cfg(any(test, feature = "fake-driver"))]
pub mod fake;

pub use backend::{OverlayBackend, OverlayFuncs};
pub use config::{OverlayConfig, PresentMode, DEFAULT_COLOR_KEY};
pub use driver::{DisplayDriver, DisplayTarget, DriverCaps, HResult};
pub use error::{DriverResultExt, OverlayError, OverlayResult};
pub use format::FourCc;
pub use geometry::{Rect, ScreenRect};
pub use overlay::{DirtySignal, LockedFrame, Overlay, PresentationSession};
pub use retry::{Recovery, RetryPolicy};
