//! DirectDraw implementation of the driver and display seams.
//!
//! [`DirectDrawDriver`] wraps an `IDirectDraw7` object in normal cooperative
//! mode together with its primary surface. Overlay surfaces are plain
//! `IDirectDrawSurface7` interface pointers, so dropping one releases it.

#![allow(non_snake_case)]

use std::mem::size_of;
use std::ptr::{null_mut, NonNull};

use tracing::{debug, trace};
use windows::core::{Interface, IUnknown};
use windows::Win32::Foundation::{E_POINTER, HANDLE, HWND, POINT, RECT};
use windows::Win32::Graphics::DirectDraw::{
    DirectDrawCreateEx, IDirectDraw7, IDirectDrawSurface7, DDBLTFX, DDBLT_COLORFILL, DDBLT_WAIT,
    DDCAPS_DX7, DDCOLORKEY, DDFLIP_WAIT, DDLOCK_NOSYSLOCK, DDLOCK_WAIT, DDOVERLAYFX,
    DDOVER_DDFX, DDOVER_KEYDESTOVERRIDE, DDOVER_SHOW, DDPF_FOURCC, DDPIXELFORMAT,
    DDSCAPS2, DDSCAPS_BACKBUFFER, DDSCAPS_COMPLEX, DDSCAPS_FLIP, DDSCAPS_OFFSCREENPLAIN,
    DDSCAPS_OVERLAY, DDSCAPS_PRIMARYSURFACE, DDSCAPS_VIDEOMEMORY, DDSCL_NORMAL,
    DDSD_BACKBUFFERCOUNT, DDSD_CAPS, DDSD_HEIGHT, DDSD_PIXELFORMAT, DDSD_WIDTH, DDSURFACEDESC2,
};
use windows::Win32::Graphics::Gdi::{ClientToScreen, GdiFlush};
use windows::Win32::UI::WindowsAndMessaging::GetClientRect;

use crate::driver::{
    ColorKeyCaps, DisplayDriver, DisplayTarget, DriverCaps, HResult, LockFlags, LockedRegion,
    OverlayFlags, OverlayParams, SurfacePlacement, SurfaceRequest,
};
use crate::format::FourCc;
use crate::geometry::ScreenRect;

fn code(err: windows::core::Error) -> HResult {
    HResult(err.code().0)
}

fn to_rect(r: ScreenRect) -> RECT {
    RECT {
        left: r.left,
        top: r.top,
        right: r.right,
        bottom: r.bottom,
    }
}

fn overlay_flags(flags: OverlayFlags) -> u32 {
    let mut out = 0;
    if flags.contains(OverlayFlags::SHOW) {
        out |= DDOVER_SHOW as u32;
    }
    if flags.contains(OverlayFlags::DDFX) {
        out |= DDOVER_DDFX as u32;
    }
    if flags.contains(OverlayFlags::KEY_DEST_OVERRIDE) {
        out |= DDOVER_KEYDESTOVERRIDE as u32;
    }
    out
}

fn lock_flags(flags: LockFlags) -> u32 {
    let mut out = 0;
    if flags.contains(LockFlags::WAIT) {
        out |= DDLOCK_WAIT as u32;
    }
    if flags.contains(LockFlags::NO_SYSLOCK) {
        out |= DDLOCK_NOSYSLOCK as u32;
    }
    out
}

/// DirectDraw object plus the primary surface overlays are shown on.
pub struct DirectDrawDriver {
    ddraw: IDirectDraw7,
    primary: IDirectDrawSurface7,
    hwnd: HWND,
}

impl DirectDrawDriver {
    /// Open the default display driver in windowed mode for `hwnd`.
    pub fn new(hwnd: HWND) -> windows::core::Result<Self> {
        unsafe {
            let mut raw = null_mut();
            DirectDrawCreateEx(null_mut(), &mut raw, &IDirectDraw7::IID, None::<&IUnknown>)?;
            let ddraw = IDirectDraw7::from_raw(raw);
            ddraw.SetCooperativeLevel(hwnd, DDSCL_NORMAL as u32)?;

            let mut desc = DDSURFACEDESC2 {
                dwSize: size_of::<DDSURFACEDESC2>() as u32,
                dwFlags: DDSD_CAPS as u32,
                ddsCaps: DDSCAPS2 {
                    dwCaps: DDSCAPS_PRIMARYSURFACE as u32,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut primary = None;
            ddraw.CreateSurface(&mut desc, &mut primary, None::<&IUnknown>)?;
            let primary = primary.ok_or_else(|| windows::core::Error::from(E_POINTER))?;

            debug!("DirectDraw initialized");
            Ok(Self {
                ddraw,
                primary,
                hwnd,
            })
        }
    }

    /// Display target over this driver's primary surface and window.
    pub fn primary_display(&self) -> PrimaryDisplay {
        PrimaryDisplay {
            primary: self.primary.clone(),
            hwnd: self.hwnd,
        }
    }
}

fn surface_desc(request: &SurfaceRequest) -> DDSURFACEDESC2 {
    let mut desc = DDSURFACEDESC2 {
        dwSize: size_of::<DDSURFACEDESC2>() as u32,
        dwFlags: (DDSD_CAPS | DDSD_WIDTH | DDSD_HEIGHT | DDSD_PIXELFORMAT) as u32,
        dwWidth: request.width,
        dwHeight: request.height,
        ..Default::default()
    };
    desc.Anonymous5.ddpfPixelFormat = DDPIXELFORMAT {
        dwSize: size_of::<DDPIXELFORMAT>() as u32,
        dwFlags: DDPF_FOURCC as u32,
        dwFourCC: request.fourcc.0,
        ..Default::default()
    };

    match request.placement {
        SurfacePlacement::FlippingOverlay { back_buffers } => {
            desc.dwFlags |= DDSD_BACKBUFFERCOUNT as u32;
            desc.Anonymous2.dwBackBufferCount = back_buffers;
            desc.ddsCaps.dwCaps = (DDSCAPS_OVERLAY
                | DDSCAPS_VIDEOMEMORY
                | DDSCAPS_FLIP
                | DDSCAPS_COMPLEX) as u32;
        },
        SurfacePlacement::OffscreenPlain => {
            desc.ddsCaps.dwCaps = (DDSCAPS_OFFSCREENPLAIN | DDSCAPS_VIDEOMEMORY) as u32;
        },
    }
    desc
}

// SAFETY: a successful Lock maps the whole surface at `lpSurface` with row
// pitch `lPitch` until Unlock; planar surfaces carry their chroma planes
// directly after the luma plane in the same mapping.
unsafe impl DisplayDriver for DirectDrawDriver {
    type Surface = IDirectDrawSurface7;

    fn create_surface(&mut self, request: &SurfaceRequest) -> Result<IDirectDrawSurface7, HResult> {
        let mut desc = surface_desc(request);
        let mut surface = None;
        unsafe {
            self.ddraw
                .CreateSurface(&mut desc, &mut surface, None::<&IUnknown>)
                .map_err(code)?;
        }
        surface.ok_or(HResult::GENERIC)
    }

    fn caps(&mut self) -> Result<DriverCaps, HResult> {
        let mut caps = DDCAPS_DX7 {
            dwSize: size_of::<DDCAPS_DX7>() as u32,
            ..Default::default()
        };
        unsafe {
            self.ddraw.GetCaps(&mut caps, null_mut()).map_err(code)?;
        }
        Ok(DriverCaps {
            color_key: ColorKeyCaps::from_bits_truncate(caps.dwCKeyCaps),
        })
    }

    fn fourcc_codes(&mut self) -> Vec<FourCc> {
        let mut count = 0u32;
        unsafe {
            if self.ddraw.GetFourCCCodes(&mut count, null_mut()).is_err() || count == 0 {
                return Vec::new();
            }
            let mut codes = vec![0u32; count as usize];
            if self
                .ddraw
                .GetFourCCCodes(&mut count, codes.as_mut_ptr())
                .is_err()
            {
                return Vec::new();
            }
            codes.truncate(count as usize);
            codes.into_iter().map(FourCc).collect()
        }
    }

    fn lock(&mut self, surface: &IDirectDrawSurface7, flags: LockFlags) -> Result<LockedRegion, HResult> {
        let mut desc = DDSURFACEDESC2 {
            dwSize: size_of::<DDSURFACEDESC2>() as u32,
            ..Default::default()
        };
        unsafe {
            surface
                .Lock(null_mut(), &mut desc, lock_flags(flags), HANDLE::default())
                .map_err(code)?;

            let base = match NonNull::new(desc.lpSurface as *mut u8) {
                Some(base) => base,
                None => {
                    let _ = surface.Unlock(null_mut());
                    return Err(HResult::GENERIC);
                },
            };
            let format = desc.Anonymous5.ddpfPixelFormat;
            let fourcc = if format.dwFlags & DDPF_FOURCC as u32 != 0 {
                Some(FourCc(format.dwFourCC))
            } else {
                None
            };
            trace!(pitch = desc.Anonymous1.lPitch, ?fourcc, "Surface locked");

            Ok(LockedRegion {
                base,
                pitch: desc.Anonymous1.lPitch.max(0) as usize,
                fourcc,
            })
        }
    }

    fn unlock(&mut self, surface: &IDirectDrawSurface7) -> Result<(), HResult> {
        unsafe { surface.Unlock(null_mut()).map_err(code) }
    }

    fn restore(&mut self, surface: &IDirectDrawSurface7) -> Result<(), HResult> {
        unsafe { surface.Restore().map_err(code) }
    }

    fn attached_back_buffer(&mut self, surface: &IDirectDrawSurface7) -> Result<IDirectDrawSurface7, HResult> {
        let mut caps = DDSCAPS2 {
            dwCaps: DDSCAPS_BACKBUFFER as u32,
            ..Default::default()
        };
        unsafe { surface.GetAttachedSurface(&mut caps).map_err(code) }
    }

    fn update_overlay(
        &mut self,
        surface: &IDirectDrawSurface7,
        src: ScreenRect,
        dst: ScreenRect,
        params: &OverlayParams,
    ) -> Result<(), HResult> {
        let mut src = to_rect(src);
        let mut dst = to_rect(dst);
        let mut fx = DDOVERLAYFX {
            dwSize: size_of::<DDOVERLAYFX>() as u32,
            ..Default::default()
        };
        if let Some(key) = params.dest_color_key {
            fx.dckDestColorkey = DDCOLORKEY {
                dwColorSpaceLowValue: key.low,
                dwColorSpaceHighValue: key.high,
            };
        }
        unsafe {
            surface
                .UpdateOverlay(
                    &mut src,
                    &self.primary,
                    &mut dst,
                    overlay_flags(params.flags),
                    &mut fx,
                )
                .map_err(code)
        }
    }

    fn flip(&mut self, surface: &IDirectDrawSurface7, wait: bool) -> Result<(), HResult> {
        let flags = if wait { DDFLIP_WAIT as u32 } else { 0 };
        unsafe {
            surface
                .Flip(None::<&IDirectDrawSurface7>, flags)
                .map_err(code)
        }
    }

    fn blit_to_primary(
        &mut self,
        surface: &IDirectDrawSurface7,
        src: ScreenRect,
        dst: ScreenRect,
        wait: bool,
    ) -> Result<(), HResult> {
        let mut src = to_rect(src);
        let mut dst = to_rect(dst);
        let flags = if wait { DDBLT_WAIT as u32 } else { 0 };
        unsafe {
            self.primary
                .Blt(&mut dst, surface, &mut src, flags, null_mut())
                .map_err(code)
        }
    }
}

/// The client area of a window on the primary surface.
pub struct PrimaryDisplay {
    primary: IDirectDrawSurface7,
    hwnd: HWND,
}

impl PrimaryDisplay {
    fn client_rect(&self) -> Result<ScreenRect, HResult> {
        let mut rect = RECT::default();
        unsafe {
            GetClientRect(self.hwnd, &mut rect).map_err(code)?;
        }
        let (x, y) = self.screen_origin();
        Ok(ScreenRect::new(rect.left, rect.top, rect.right, rect.bottom).offset(x, y))
    }
}

impl DisplayTarget for PrimaryDisplay {
    fn fill_rect(&mut self, rect: Option<ScreenRect>, color: u32) -> Result<(), HResult> {
        let mut target = to_rect(match rect {
            Some(rect) => rect,
            None => self.client_rect()?,
        });
        let mut fx = DDBLTFX {
            dwSize: size_of::<DDBLTFX>() as u32,
            ..Default::default()
        };
        fx.Anonymous5.dwFillColor = color;
        unsafe {
            self.primary
                .Blt(
                    &mut target,
                    None::<&IDirectDrawSurface7>,
                    null_mut(),
                    (DDBLT_COLORFILL | DDBLT_WAIT) as u32,
                    &mut fx,
                )
                .map_err(code)
        }
    }

    fn commit(&mut self) {
        unsafe {
            let _ = GdiFlush();
        }
    }

    fn screen_origin(&self) -> (i32, i32) {
        let mut point = POINT::default();
        unsafe {
            let _ = ClientToScreen(self.hwnd, &mut point);
        }
        (point.x, point.y)
    }
}
