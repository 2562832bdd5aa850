//! Overlay surface allocation.
//!
//! Asks the driver for the surface, then proves it usable with a verification lock
//! and checks that the driver kept the requested FourCC. Some cards (ATI
//! Radeon 9200 class) report "still drawing" or a lost surface right after
//! creation, so that lock runs under a retry budget.

use tracing::{debug, trace, warn};

use crate::driver::{DisplayDriver, LockFlags, LockedRegion, SurfaceRequest};
use crate::error::{DriverResultExt, OverlayError, OverlayResult};
use crate::retry::{Recovery, RetryPolicy};

/// Create a driver surface for `request` and validate its pixel format.
///
/// The surface is released on every failure path.
pub(crate) fn create_yuv_surface<D: DisplayDriver>(
    driver: &mut D,
    request: &SurfaceRequest,
    policy: &RetryPolicy,
) -> OverlayResult<D::Surface> {
    trace!(?request, "Requesting overlay surface");
    let surface = driver
        .create_surface(request)
        .allocation_op("DirectDraw2::CreateSurface")?;

    let region = verify_lock(driver, &surface, policy)?;
    if let Err(code) = driver.unlock(&surface) {
        trace!(%code, "Verification unlock failed");
    }

    if region.fourcc != Some(request.fourcc) {
        warn!(
            requested = %request.fourcc,
            negotiated = ?region.fourcc,
            "Driver substituted the overlay pixel format"
        );
        return Err(OverlayError::FormatMismatch {
            requested: request.fourcc,
            negotiated: region.fourcc,
        });
    }

    debug!(fourcc = %request.fourcc, pitch = region.pitch, "Overlay surface ready");
    Ok(surface)
}

fn verify_lock<D: DisplayDriver>(
    driver: &mut D,
    surface: &D::Surface,
    policy: &RetryPolicy,
) -> OverlayResult<LockedRegion> {
    policy
        .run(
            driver,
            |driver| driver.lock(surface, LockFlags::NO_SYSLOCK | LockFlags::WAIT),
            |driver, code| {
                if code.is_surface_lost() {
                    if let Err(code) = driver.restore(surface) {
                        trace!(%code, "Restore during verification lock failed");
                    }
                    Recovery::Retry
                } else if code.is_still_drawing() {
                    Recovery::Retry
                } else {
                    Recovery::Fail
                }
            },
        )
        .driver_op("DirectDrawSurface3::Lock")
}
