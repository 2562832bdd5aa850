//! Overlay descriptor and its hardware state.
//!
//! An [`Overlay`] owns the front surface of a flipping overlay chain and the
//! cached back buffer the caller writes into. Surfaces are owned handles, so
//! every exit path (failed creation, explicit free, plain drop) releases them.
//!
//! The operations live in submodules:
//! - `allocator`: surface creation and FourCC validation
//! - `gate`: lock/unlock of the back buffer
//! - `present`: geometry update + flip, or blit

mod allocator;
mod gate;
mod present;
#[cfg(test)]
mod tests;

use std::ptr::NonNull;

use tracing::{debug, info, warn};

use crate::config::{OverlayConfig, PresentMode};
use crate::driver::{
    ColorKey, DisplayDriver, DisplayTarget, OverlayFlags, OverlayParams, SurfacePlacement,
    SurfaceRequest,
};
use crate::error::{DriverResultExt, OverlayError, OverlayResult};
use crate::format::FourCc;

pub use gate::LockedFrame;
pub use present::{DirtySignal, PresentationSession};
pub(crate) use present::FLIP_OPERATION;

/// Backend-private state of an overlay.
#[derive(Debug)]
pub struct HardwareState<S> {
    // Declared before `front` so a plain drop releases the attachment first.
    back: Option<S>,
    front: Option<S>,
    color_key: Option<ColorKey>,
    flags: OverlayFlags,
}

impl<S> Default for HardwareState<S> {
    fn default() -> Self {
        Self {
            back: None,
            front: None,
            color_key: None,
            flags: OverlayFlags::SHOW,
        }
    }
}

impl<S> HardwareState<S> {
    pub fn front(&self) -> Option<&S> {
        self.front.as_ref()
    }

    pub fn back(&self) -> Option<&S> {
        self.back.as_ref()
    }

    /// Surface the caller writes into: the back buffer when flipping, the
    /// surface itself when presenting by blit.
    pub fn write_surface(&self) -> Option<&S> {
        self.back.as_ref().or(self.front.as_ref())
    }

    pub fn color_key(&self) -> Option<ColorKey> {
        self.color_key
    }

    pub fn flags(&self) -> OverlayFlags {
        self.flags
    }

    pub fn params(&self) -> OverlayParams {
        OverlayParams {
            flags: self.flags,
            dest_color_key: self.color_key,
        }
    }
}

/// A YUV overlay handed out to the front-end.
#[derive(Debug)]
pub struct Overlay<S> {
    format: FourCc,
    width: u32,
    height: u32,
    plane_count: usize,
    pitches: [usize; 3],
    planes: [Option<NonNull<u8>>; 3],
    locked: bool,
    hw: Option<HardwareState<S>>,
}

impl<S> Overlay<S> {
    fn new(format: FourCc, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            plane_count: format.plane_count(),
            pitches: [0; 3],
            planes: [None; 3],
            locked: false,
            hw: None,
        }
    }

    /// Create an overlay surface chain of `width` × `height` in `format`.
    ///
    /// On any failure everything acquired so far is released before the error
    /// is returned.
    pub(crate) fn create<D, T>(
        driver: &mut D,
        display: &mut T,
        config: &OverlayConfig,
        width: u32,
        height: u32,
        format: FourCc,
    ) -> OverlayResult<Self>
    where
        D: DisplayDriver<Surface = S>,
        T: DisplayTarget,
    {
        if width == 0 || height == 0 {
            return Err(OverlayError::InvalidDimensions { width, height });
        }

        debug!(%format, width, height, "Creating YUV overlay");
        if config.log_fourcc_codes {
            log_fourcc_codes(driver);
        }

        let mut overlay = Overlay::new(format, width, height);
        overlay.hw = Some(HardwareState::default());

        match overlay.attach_hardware(driver, display, config) {
            Ok(()) => Ok(overlay),
            Err(err) => {
                overlay.free();
                Err(err)
            },
        }
    }

    fn attach_hardware<D, T>(
        &mut self,
        driver: &mut D,
        display: &mut T,
        config: &OverlayConfig,
    ) -> OverlayResult<()>
    where
        D: DisplayDriver<Surface = S>,
        T: DisplayTarget,
    {
        let placement = match config.present_mode {
            PresentMode::Overlay => SurfacePlacement::FlippingOverlay { back_buffers: 1 },
            PresentMode::Blit => SurfacePlacement::OffscreenPlain,
        };
        let request = SurfaceRequest {
            width: self.width,
            height: self.height,
            fourcc: self.format,
            placement,
        };

        let hw = self.hw.get_or_insert_with(HardwareState::default);
        let front = allocator::create_yuv_surface(driver, &request, &config.create_retry)?;
        let front = hw.front.insert(front);

        if config.present_mode == PresentMode::Blit {
            debug!("Blit presentation, no back buffer or color key");
            return Ok(());
        }

        let back = driver
            .attached_back_buffer(front)
            .attachment_op("DirectDrawSurface3::GetAttachedSurface")?;
        hw.back = Some(back);

        let caps = driver.caps().attachment_op("DirectDraw2::GetCaps")?;

        hw.flags = OverlayFlags::SHOW;
        if caps.supports_dest_color_key() {
            let key = config.color_key;
            if config.fill_display_with_key {
                // The overlay only shows where the display surface holds the key.
                if let Err(code) = display.fill_rect(None, key) {
                    warn!(%code, "Failed to paint the display with the color key");
                }
                display.commit();
            }
            hw.color_key = Some(ColorKey::single(key));
            hw.flags |= OverlayFlags::DDFX | OverlayFlags::KEY_DEST_OVERRIDE;
            debug!("Destination color keying enabled (key 0x{:06X})", key);
        } else {
            warn!("Driver has no destination color keying; overlay will draw over other windows");
        }

        info!(
            format = %self.format,
            width = self.width,
            height = self.height,
            planes = self.plane_count,
            "YUV overlay created"
        );
        Ok(())
    }

    /// Release the hardware surfaces. Safe on partially constructed overlays.
    pub(crate) fn free(mut self) {
        let Some(mut hw) = self.hw.take() else {
            return;
        };
        // The back buffer belongs to the front surface's chain.
        drop(hw.back.take());
        if let Some(front) = hw.front.take() {
            debug!(format = %self.format, "Releasing overlay surface");
            drop(front);
        }
    }

    pub fn format(&self) -> FourCc {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    /// Always true: this backend only hands out hardware overlays.
    pub fn is_hardware(&self) -> bool {
        true
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Row pitches of the populated planes. Empty unless locked.
    pub fn pitches(&self) -> &[usize] {
        if self.locked {
            &self.pitches[..self.plane_count]
        } else {
            &[]
        }
    }

    /// Start of plane `index` in the locked back buffer.
    ///
    /// The pointer is only valid until the matching unlock.
    pub fn plane_ptr(&self, index: usize) -> Option<NonNull<u8>> {
        if self.locked && index < self.plane_count {
            self.planes[index]
        } else {
            None
        }
    }

    pub fn hardware(&self) -> Option<&HardwareState<S>> {
        self.hw.as_ref()
    }

    /// Bytes of plane `index` in the locked surface.
    fn plane_len(&self, index: usize) -> usize {
        if index == 0 {
            self.pitches[0] * self.height as usize
        } else {
            self.format.chroma_plane_len(self.pitches[0], self.height)
        }
    }
}

fn log_fourcc_codes<D: DisplayDriver>(driver: &mut D) {
    let codes = driver.fourcc_codes();
    if codes.is_empty() {
        debug!("No FOURCC codes supported");
        return;
    }
    for (i, code) in codes.iter().enumerate() {
        debug!("Code {}: {} (0x{:08x})", i, code, code.0);
    }
}
