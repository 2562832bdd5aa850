//! The overlay backend and its function table.
//!
//! [`OverlayBackend`] owns the driver, the display target, the configuration
//! and the presentation session of the single active overlay. Its methods
//! return [`OverlayResult`]; the [`OverlayFuncs`] table on top of it follows
//! the status-code convention of the generic video front-end and records the
//! failure for [`OverlayBackend::last_error`].

use tracing::error;

use crate::config::OverlayConfig;
use crate::driver::{DisplayDriver, DisplayTarget};
use crate::error::{OverlayError, OverlayResult};
use crate::format::FourCc;
use crate::geometry::Rect;
use crate::overlay::{DirtySignal, LockedFrame, Overlay, PresentationSession, FLIP_OPERATION};

/// Operations the generic front-end dispatches to a YUV overlay backend.
///
/// Status-returning calls use `0` for success and `-1` for failure. A failed
/// page flip leaves the committed geometry in place: `display_overlay` records
/// it for `last_error` and still returns `0`.
pub trait OverlayFuncs {
    type Overlay;

    fn create_overlay(&mut self, width: u32, height: u32, format: FourCc) -> Option<Self::Overlay>;

    /// Map the overlay's planes. Plane pointers are valid until the matching
    /// unlock.
    fn lock_overlay(&mut self, overlay: &mut Self::Overlay) -> i32;

    fn unlock_overlay(&mut self, overlay: &mut Self::Overlay);

    fn display_overlay(&mut self, overlay: &mut Self::Overlay, src: &Rect, dst: &Rect) -> i32;

    fn free_overlay(&mut self, overlay: Self::Overlay);
}

/// Hardware YUV overlay backend.
pub struct OverlayBackend<D: DisplayDriver, T: DisplayTarget> {
    driver: D,
    display: T,
    config: OverlayConfig,
    session: PresentationSession,
    last_error: Option<OverlayError>,
}

impl<D: DisplayDriver, T: DisplayTarget> OverlayBackend<D, T> {
    pub fn new(driver: D, display: T, config: OverlayConfig) -> Self {
        let session = PresentationSession::new(config.present_mode);
        Self {
            driver,
            display,
            config,
            session,
            last_error: None,
        }
    }

    /// Create a `width` × `height` overlay in `format`.
    ///
    /// The next display call after a successful creation always reissues the
    /// geometry update.
    pub fn create(
        &mut self,
        width: u32,
        height: u32,
        format: FourCc,
    ) -> OverlayResult<Overlay<D::Surface>> {
        let overlay = Overlay::create(
            &mut self.driver,
            &mut self.display,
            &self.config,
            width,
            height,
            format,
        )?;
        self.session.mark_dirty();
        Ok(overlay)
    }

    pub fn lock(&mut self, overlay: &mut Overlay<D::Surface>) -> OverlayResult<()> {
        overlay.lock(&mut self.driver)
    }

    /// Lock `overlay` for the lifetime of the returned guard.
    pub fn frame<'a>(
        &'a mut self,
        overlay: &'a mut Overlay<D::Surface>,
    ) -> OverlayResult<LockedFrame<'a, D>> {
        LockedFrame::new(&mut self.driver, overlay)
    }

    pub fn unlock(&mut self, overlay: &mut Overlay<D::Surface>) {
        overlay.unlock(&mut self.driver);
    }

    /// Show `src` of the overlay at `dst`, relative to the display surface.
    pub fn display(&mut self, overlay: &Overlay<D::Surface>, src: &Rect, dst: &Rect) -> OverlayResult<()> {
        let origin = self.display.screen_origin();
        self.session
            .present(&mut self.driver, origin, overlay, *src, *dst)
    }

    /// Release the overlay's surfaces, unlocking it first if needed.
    pub fn free(&mut self, mut overlay: Overlay<D::Surface>) {
        overlay.unlock(&mut self.driver);
        overlay.free();
    }

    /// Force the next display call to reissue the geometry update.
    pub fn mark_overlay_dirty(&self) {
        self.session.mark_dirty();
    }

    /// Handle for marking the session dirty from event handlers.
    pub fn dirty_signal(&self) -> DirtySignal {
        self.session.signal()
    }

    /// Diagnostic of the last failed table call.
    pub fn last_error(&self) -> Option<&OverlayError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<OverlayError> {
        self.last_error.take()
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn session(&self) -> &PresentationSession {
        &self.session
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn display_target(&self) -> &T {
        &self.display
    }

    fn record(&mut self, operation: &str, err: OverlayError) {
        error!(operation, error = %err, "Overlay operation failed");
        self.last_error = Some(err);
    }

    fn status(&mut self, operation: &str, result: OverlayResult<()>) -> i32 {
        match result {
            Ok(()) => 0,
            Err(err) => {
                self.record(operation, err);
                -1
            },
        }
    }
}

impl<D: DisplayDriver, T: DisplayTarget> OverlayFuncs for OverlayBackend<D, T> {
    type Overlay = Overlay<D::Surface>;

    fn create_overlay(&mut self, width: u32, height: u32, format: FourCc) -> Option<Self::Overlay> {
        match self.create(width, height, format) {
            Ok(overlay) => Some(overlay),
            Err(err) => {
                self.record("create", err);
                None
            },
        }
    }

    fn lock_overlay(&mut self, overlay: &mut Self::Overlay) -> i32 {
        let result = self.lock(overlay);
        self.status("lock", result)
    }

    fn unlock_overlay(&mut self, overlay: &mut Self::Overlay) {
        self.unlock(overlay);
    }

    fn display_overlay(&mut self, overlay: &mut Self::Overlay, src: &Rect, dst: &Rect) -> i32 {
        match self.display(overlay, src, dst) {
            Err(err) if err.operation() == Some(FLIP_OPERATION) => {
                self.record("display", err);
                0
            },
            result => self.status("display", result),
        }
    }

    fn free_overlay(&mut self, overlay: Self::Overlay) {
        self.free(overlay);
    }
}
