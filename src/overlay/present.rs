//! Presentation controller: geometry updates and flips.
//!
//! The overlay update is expensive and resets hardware scaling state on some
//! drivers, so it is only reissued when the destination moves or when someone
//! marks the session dirty (window moved, exposed, mode changed). Every other
//! display call is a bare flip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use super::{HardwareState, Overlay};
use crate::config::PresentMode;
use crate::driver::DisplayDriver;
use crate::error::{DriverResultExt, OverlayError, OverlayResult};
use crate::geometry::{Rect, ScreenRect};

/// Driver operation reported when the page flip fails.
pub(crate) const FLIP_OPERATION: &str = "DirectDrawSurface3::Flip";

/// Cloneable handle that forces the next display call to redo the geometry
/// update.
///
/// `mark` publishes with `Release`; the controller consumes the flag with an
/// `AcqRel` swap, so a mark from any thread is observed by the next display.
#[derive(Debug, Clone, Default)]
pub struct DirtySignal(Arc<AtomicBool>);

impl DirtySignal {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Presentation state of the active overlay.
#[derive(Debug)]
pub struct PresentationSession {
    last_dest: Option<Rect>,
    dirty: DirtySignal,
    mode: PresentMode,
}

impl PresentationSession {
    pub fn new(mode: PresentMode) -> Self {
        Self {
            last_dest: None,
            dirty: DirtySignal::default(),
            mode,
        }
    }

    pub fn signal(&self) -> DirtySignal {
        self.dirty.clone()
    }

    pub fn mark_dirty(&self) {
        self.dirty.mark();
    }

    pub fn is_update_pending(&self) -> bool {
        self.dirty.is_set()
    }

    /// Destination rectangle of the last display call.
    pub fn last_destination(&self) -> Option<Rect> {
        self.last_dest
    }

    pub fn mode(&self) -> PresentMode {
        self.mode
    }

    /// Put the overlay's current frame on screen.
    ///
    /// `origin` is the screen position of the display surface; `dst` is
    /// relative to it.
    pub fn present<D>(
        &mut self,
        driver: &mut D,
        origin: (i32, i32),
        overlay: &Overlay<D::Surface>,
        src: Rect,
        dst: Rect,
    ) -> OverlayResult<()>
    where
        D: DisplayDriver,
    {
        let src_rect = src.to_screen().ok_or(OverlayError::InvalidRect(src))?;
        let dst_rect = dst
            .to_screen()
            .and_then(|rect| rect.checked_offset(origin.0, origin.1))
            .ok_or(OverlayError::InvalidRect(dst))?;
        let hw = overlay.hardware().ok_or(OverlayError::NoSurface("front"))?;

        match self.mode {
            PresentMode::Overlay => self.update_and_flip(driver, hw, src_rect, dst_rect, dst),
            PresentMode::Blit => {
                let surface = hw.write_surface().ok_or(OverlayError::NoSurface("front"))?;
                driver
                    .blit_to_primary(surface, src_rect, dst_rect, true)
                    .driver_op("DirectDrawSurface3::Blt")
            },
        }
    }

    fn update_and_flip<D>(
        &mut self,
        driver: &mut D,
        hw: &HardwareState<D::Surface>,
        src: ScreenRect,
        dst: ScreenRect,
        requested: Rect,
    ) -> OverlayResult<()>
    where
        D: DisplayDriver,
    {
        let front = hw.front().ok_or(OverlayError::NoSurface("front"))?;

        if self.last_dest != Some(requested) {
            self.last_dest = Some(requested);
            self.dirty.mark();
        }

        if self.dirty.take() {
            debug!(?src, ?dst, "Updating overlay geometry");
            if let Err(code) = driver.update_overlay(front, src, dst, &hw.params()) {
                // Keep the update pending so the next display retries it.
                self.dirty.mark();
                return Err(OverlayError::Driver {
                    operation: "DirectDrawSurface3::UpdateOverlay",
                    code,
                });
            }
        }

        trace!("Flipping overlay");
        driver.flip(front, true).driver_op(FLIP_OPERATION)
    }
}
