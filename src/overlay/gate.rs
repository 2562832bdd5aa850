//! Lock/unlock of the overlay's write surface.

use std::ptr::NonNull;
use std::slice;

use tracing::{trace, warn};

use super::{HardwareState, Overlay};
use crate::driver::{DisplayDriver, LockFlags};
use crate::error::{DriverResultExt, OverlayError, OverlayResult};
use crate::retry::{Recovery, RetryPolicy};

impl<S> Overlay<S> {
    /// Map the back buffer for CPU writes and publish the plane layout.
    ///
    /// A lost surface is restored and the lock retried exactly once. Locking
    /// an already locked overlay does nothing.
    pub(crate) fn lock<D>(&mut self, driver: &mut D) -> OverlayResult<()>
    where
        D: DisplayDriver<Surface = S>,
    {
        if self.locked {
            trace!("Overlay already locked");
            return Ok(());
        }

        let surface = self
            .hw
            .as_ref()
            .and_then(HardwareState::write_surface)
            .ok_or(OverlayError::NoSurface("back"))?;

        let region = RetryPolicy::single_retry()
            .run(
                driver,
                |driver| driver.lock(surface, LockFlags::NO_SYSLOCK | LockFlags::WAIT),
                |driver, code| {
                    if !code.is_surface_lost() {
                        return Recovery::Fail;
                    }
                    warn!("Overlay surface lost, restoring");
                    if let Err(code) = driver.restore(surface) {
                        warn!(%code, "Restore failed");
                    }
                    Recovery::Retry
                },
            )
            .driver_op("DirectDrawSurface3::Lock")?;

        self.pitches = [region.pitch, 0, 0];
        self.planes = [Some(region.base), None, None];
        if self.plane_count == 3 {
            let chroma_pitch = region.pitch / 2;
            let u_offset = region.pitch * self.height as usize;
            let v_offset = u_offset + self.format.chroma_plane_len(region.pitch, self.height);
            self.pitches[1] = chroma_pitch;
            self.pitches[2] = chroma_pitch;
            // SAFETY: both offsets fall inside the locked region, which the
            // driver guarantees covers every plane of a planar 4:2:0 surface.
            unsafe {
                self.planes[1] = Some(offset(region.base, u_offset));
                self.planes[2] = Some(offset(region.base, v_offset));
            }
        }
        self.locked = true;

        trace!(pitch = region.pitch, planes = self.plane_count, "Overlay locked");
        Ok(())
    }

    /// Unmap the back buffer. Does nothing when the overlay is not locked.
    pub(crate) fn unlock<D>(&mut self, driver: &mut D)
    where
        D: DisplayDriver<Surface = S>,
    {
        if !self.locked {
            return;
        }
        self.locked = false;
        self.planes = [None; 3];
        self.pitches = [0; 3];

        if let Some(surface) = self.hw.as_ref().and_then(HardwareState::write_surface) {
            if let Err(code) = driver.unlock(surface) {
                warn!(%code, "Failed to unlock overlay surface");
            }
        }
        trace!("Overlay unlocked");
    }
}

unsafe fn offset(base: NonNull<u8>, bytes: usize) -> NonNull<u8> {
    NonNull::new_unchecked(base.as_ptr().add(bytes))
}

/// Scoped lock on an overlay. The planes are writable while the guard lives
/// and the surface is unlocked when it drops.
pub struct LockedFrame<'a, D: DisplayDriver> {
    driver: &'a mut D,
    overlay: &'a mut Overlay<D::Surface>,
}

impl<'a, D: DisplayDriver> LockedFrame<'a, D> {
    pub(crate) fn new(driver: &'a mut D, overlay: &'a mut Overlay<D::Surface>) -> OverlayResult<Self> {
        overlay.lock(driver)?;
        Ok(Self { driver, overlay })
    }

    pub fn plane_count(&self) -> usize {
        self.overlay.plane_count()
    }

    pub fn width(&self) -> u32 {
        self.overlay.width()
    }

    pub fn height(&self) -> u32 {
        self.overlay.height()
    }

    /// Row pitch of plane `index` in bytes.
    pub fn pitch(&self, index: usize) -> Option<usize> {
        self.overlay.pitches().get(index).copied()
    }

    /// Plane `index` as a byte slice of `pitch * rows`.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let ptr = self.overlay.plane_ptr(index)?;
        let len = self.overlay.plane_len(index);
        // SAFETY: the plane lies inside the region mapped by the lock, which
        // stays valid until this guard unlocks it; `&mut self` rules out a
        // second live borrow.
        Some(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), len) })
    }

    /// All planes at once, in Y, V, U order for YV12 and Y, U, V for IYUV.
    pub fn planes_mut(&mut self) -> Vec<&mut [u8]> {
        let overlay = &*self.overlay;
        (0..overlay.plane_count())
            .filter_map(|index| {
                let ptr = overlay.plane_ptr(index)?;
                let len = overlay.plane_len(index);
                // SAFETY: planes are laid out back to back without overlap
                // inside the locked region.
                Some(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), len) })
            })
            .collect()
    }
}

impl<D: DisplayDriver> Drop for LockedFrame<'_, D> {
    fn drop(&mut self) {
        self.overlay.unlock(self.driver);
    }
}
