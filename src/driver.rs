//! Driver and display seams.
//!
//! The overlay core never talks to hardware directly. Everything it needs from
//! the display driver goes through [`DisplayDriver`], and everything it needs
//! from the windowing layer goes through [`DisplayTarget`]. The DirectDraw
//! backend implements both on Windows; tests use the scripted fake.

use std::fmt;
use std::ptr::NonNull;

use bitflags::bitflags;

use crate::format::FourCc;
use crate::geometry::ScreenRect;

// ============================================================================
// Result codes
// ============================================================================

/// Numeric driver result code. Zero is success, negative values are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

const fn dd_error(code: u32) -> HResult {
    HResult((0x8876_0000 | code) as i32)
}

impl HResult {
    pub const OK: HResult = HResult(0);
    pub const GENERIC: HResult = HResult(0x8000_4005_u32 as i32);
    pub const OUT_OF_MEMORY: HResult = HResult(0x8007_000E_u32 as i32);
    pub const INVALID_PARAMS: HResult = HResult(0x8007_0057_u32 as i32);
    pub const UNSUPPORTED: HResult = HResult(0x8000_4001_u32 as i32);
    pub const INVALID_PIXEL_FORMAT: HResult = dd_error(145);
    pub const NOT_FOUND: HResult = dd_error(255);
    pub const NO_OVERLAY_HW: HResult = dd_error(330);
    pub const OUT_OF_VIDEO_MEMORY: HResult = dd_error(380);
    pub const SURFACE_BUSY: HResult = dd_error(430);
    pub const SURFACE_LOST: HResult = dd_error(450);
    pub const WAS_STILL_DRAWING: HResult = dd_error(540);

    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// Memory was reclaimed by the driver; the surface must be restored.
    pub fn is_surface_lost(self) -> bool {
        self == HResult::SURFACE_LOST
    }

    /// The driver is still finishing a previous operation on the surface.
    pub fn is_still_drawing(self) -> bool {
        self == HResult::WAS_STILL_DRAWING
    }

    pub fn is_out_of_memory(self) -> bool {
        self == HResult::OUT_OF_MEMORY || self == HResult::OUT_OF_VIDEO_MEMORY
    }

    pub fn name(self) -> &'static str {
        match self {
            HResult::OK => "DD_OK",
            HResult::GENERIC => "DDERR_GENERIC",
            HResult::OUT_OF_MEMORY => "DDERR_OUTOFMEMORY",
            HResult::INVALID_PARAMS => "DDERR_INVALIDPARAMS",
            HResult::UNSUPPORTED => "DDERR_UNSUPPORTED",
            HResult::INVALID_PIXEL_FORMAT => "DDERR_INVALIDPIXELFORMAT",
            HResult::NOT_FOUND => "DDERR_NOTFOUND",
            HResult::NO_OVERLAY_HW => "DDERR_NOOVERLAYHW",
            HResult::OUT_OF_VIDEO_MEMORY => "DDERR_OUTOFVIDEOMEMORY",
            HResult::SURFACE_BUSY => "DDERR_SURFACEBUSY",
            HResult::SURFACE_LOST => "DDERR_SURFACELOST",
            HResult::WAS_STILL_DRAWING => "DDERR_WASSTILLDRAWING",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0 as u32)
    }
}

// ============================================================================
// Requests and capabilities
// ============================================================================

/// Where and how the driver should place a new surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePlacement {
    /// Overlay-capable video memory surface with a flipping chain of back buffers.
    FlippingOverlay { back_buffers: u32 },
    /// Plain off-screen video memory surface, presented by blitting.
    OffscreenPlain,
}

/// Description of the surface the allocator asks the driver for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRequest {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCc,
    pub placement: SurfacePlacement,
}

bitflags! {
    /// Color-key capabilities reported by the driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ColorKeyCaps: u32 {
        /// Destination color keying for overlays.
        const DEST_OVERLAY = 0x0000_0010;
        /// Source color keying for overlays.
        const SRC_OVERLAY = 0x0000_2000;
    }
}

/// Structured answer to the driver capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverCaps {
    pub color_key: ColorKeyCaps,
}

impl DriverCaps {
    pub fn supports_dest_color_key(&self) -> bool {
        self.color_key.contains(ColorKeyCaps::DEST_OVERLAY)
    }
}

bitflags! {
    /// Flags passed to surface lock calls.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LockFlags: u32 {
        /// Block until the surface can be locked instead of failing with "still drawing".
        const WAIT = 0x0000_0001;
        /// Do not take the system-wide lock / system memory fallback.
        const NO_SYSLOCK = 0x0000_0800;
    }
}

bitflags! {
    /// Composition flags handed to the overlay update call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OverlayFlags: u32 {
        /// Use the effects block passed alongside the call.
        const DDFX = 0x0008_0000;
        /// Use the destination color key from the effects block.
        const KEY_DEST_OVERRIDE = 0x0000_0800;
        /// Make the overlay visible.
        const SHOW = 0x0000_4000;
    }
}

/// Inclusive destination color-key range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorKey {
    pub low: u32,
    pub high: u32,
}

impl ColorKey {
    pub fn single(color: u32) -> Self {
        Self {
            low: color,
            high: color,
        }
    }
}

/// Everything the overlay update call needs besides the two rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayParams {
    pub flags: OverlayFlags,
    pub dest_color_key: Option<ColorKey>,
}

/// Memory mapped by a successful lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedRegion {
    pub base: NonNull<u8>,
    /// Bytes per row of the first plane.
    pub pitch: usize,
    /// FourCC the surface actually carries, if the driver reports one.
    pub fourcc: Option<FourCc>,
}

// ============================================================================
// Seams
// ============================================================================

/// Display driver primitives used by the overlay backend.
///
/// Surfaces are owned handles: dropping one releases the driver reference.
/// Back buffers returned by [`attached_back_buffer`](Self::attached_back_buffer)
/// belong to the front surface's chain and are freed with it.
///
/// # Safety
///
/// A region returned by [`lock`](Self::lock) must stay valid and writable for
/// [`FourCc::image_len`]`(pitch, height)` bytes until the matching
/// [`unlock`](Self::unlock), and must not be aliased by anything the caller
/// can observe.
pub unsafe trait DisplayDriver {
    type Surface;

    fn create_surface(&mut self, request: &SurfaceRequest) -> Result<Self::Surface, HResult>;

    fn caps(&mut self) -> Result<DriverCaps, HResult>;

    /// FourCC codes the hardware can overlay. Purely informational.
    fn fourcc_codes(&mut self) -> Vec<FourCc> {
        Vec::new()
    }

    fn lock(&mut self, surface: &Self::Surface, flags: LockFlags) -> Result<LockedRegion, HResult>;

    fn unlock(&mut self, surface: &Self::Surface) -> Result<(), HResult>;

    fn restore(&mut self, surface: &Self::Surface) -> Result<(), HResult>;

    fn attached_back_buffer(&mut self, surface: &Self::Surface) -> Result<Self::Surface, HResult>;

    /// Reposition the overlay `surface` on the primary surface.
    fn update_overlay(
        &mut self,
        surface: &Self::Surface,
        src: ScreenRect,
        dst: ScreenRect,
        params: &OverlayParams,
    ) -> Result<(), HResult>;

    fn flip(&mut self, surface: &Self::Surface, wait: bool) -> Result<(), HResult>;

    /// Copy `src` of `surface` into `dst` of the primary surface.
    fn blit_to_primary(
        &mut self,
        surface: &Self::Surface,
        src: ScreenRect,
        dst: ScreenRect,
        wait: bool,
    ) -> Result<(), HResult>;
}

/// The window / primary surface the overlay is composited onto.
pub trait DisplayTarget {
    /// Fill `rect`, or the whole surface when `None`, with a packed RGB color.
    fn fill_rect(&mut self, rect: Option<ScreenRect>, color: u32) -> Result<(), HResult>;

    /// Push pending draws to the screen.
    fn commit(&mut self);

    /// Top-left corner of the display surface in screen coordinates.
    fn screen_origin(&self) -> (i32, i32);
}
