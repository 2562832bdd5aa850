//! Scenario tests for the overlay module.
//!
//! Tests are organized by component:
//! - Full create / lock / display / free lifecycle
//! - Surface loss and recovery
//! - Color-key negotiation
//! - Creation failures and teardown

#[cfg(test)]
mod lifecycle_tests {
    use crate::backend::{OverlayBackend, OverlayFuncs};
    use crate::config::OverlayConfig;
    use crate::fake::{FakeDisplay, FakeDriver};
    use crate::format::FourCc;
    use crate::geometry::Rect;

    #[test]
    fn planar_overlay_full_cycle() {
        let driver = FakeDriver::new();
        let mut backend =
            OverlayBackend::new(driver.clone(), FakeDisplay::new(), OverlayConfig::default());

        let mut overlay = backend.create_overlay(720, 480, FourCc::YV12).unwrap();
        assert_eq!(overlay.plane_count(), 3);
        assert!(overlay.is_hardware());
        let front = overlay.hardware().unwrap().front().unwrap().id();

        assert_eq!(backend.lock_overlay(&mut overlay), 0);
        let pitches = overlay.pitches().to_vec();
        assert_eq!(pitches.len(), 3);
        assert_eq!(pitches[1], pitches[0] / 2);
        assert_eq!(pitches[2], pitches[0] / 2);

        let p0 = overlay.plane_ptr(0).unwrap().as_ptr() as usize;
        let p1 = overlay.plane_ptr(1).unwrap().as_ptr() as usize;
        let p2 = overlay.plane_ptr(2).unwrap().as_ptr() as usize;
        assert_eq!(p1, p0 + pitches[0] * 480);
        assert_eq!(p2, p1 + pitches[1] * 240);

        backend.unlock_overlay(&mut overlay);
        assert!(overlay.plane_ptr(0).is_none());

        let rect = Rect::new(0, 0, 720, 480);
        assert_eq!(backend.display_overlay(&mut overlay, &rect, &rect), 0);
        assert_eq!(backend.display_overlay(&mut overlay, &rect, &rect), 0);
        {
            let state = driver.state();
            assert_eq!(state.updates.len(), 1);
            assert_eq!(state.flips.len(), 2);
            assert_eq!(state.updates[0].surface, front);
        }

        backend.free_overlay(overlay);
        let state = driver.state();
        assert_eq!(state.released, vec![front]);
        assert_eq!(state.back_handles_dropped, 1);
        assert!(backend.last_error().is_none());
    }

    #[test]
    fn packed_overlay_has_single_plane() {
        let driver = FakeDriver::new();
        let mut backend =
            OverlayBackend::new(driver.clone(), FakeDisplay::new(), OverlayConfig::default());

        let mut overlay = backend.create_overlay(640, 480, FourCc::YUY2).unwrap();
        assert_eq!(overlay.plane_count(), 1);
        assert_eq!(backend.lock_overlay(&mut overlay), 0);
        assert_eq!(overlay.pitches().len(), 1);
        assert!(overlay.pitches()[0] >= 640 * 2);
        backend.unlock_overlay(&mut overlay);
        backend.free_overlay(overlay);
    }

    #[test]
    fn flipped_frame_reaches_the_front_surface() {
        let driver = FakeDriver::new();
        let mut backend =
            OverlayBackend::new(driver.clone(), FakeDisplay::new(), OverlayConfig::default());
        let mut overlay = backend.create(32, 16, FourCc::IYUV).unwrap();
        let front = overlay.hardware().unwrap().front().unwrap().id();

        {
            let mut frame = backend.frame(&mut overlay).unwrap();
            frame.plane_mut(0).unwrap().fill(0xAB);
        }
        let rect = Rect::new(0, 0, 32, 16);
        backend.display(&overlay, &rect, &rect).unwrap();

        assert_eq!(driver.state().surface_bytes(front).unwrap()[0], 0xAB);
        backend.free(overlay);
    }
}

#[cfg(test)]
mod recovery_tests {
    use crate::backend::{OverlayBackend, OverlayFuncs};
    use crate::config::OverlayConfig;
    use crate::driver::HResult;
    use crate::error::OverlayError;
    use crate::fake::{FakeDisplay, FakeDriver};
    use crate::format::FourCc;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    fn backend(driver: &FakeDriver) -> OverlayBackend<FakeDriver, FakeDisplay> {
        let config = OverlayConfig::default().with_create_retry(RetryPolicy::new(50, Duration::ZERO));
        OverlayBackend::new(driver.clone(), FakeDisplay::new(), config)
    }

    #[test]
    fn lost_surface_on_first_lock_recovers() {
        let driver = FakeDriver::new();
        let mut backend = backend(&driver);
        let mut overlay = backend.create_overlay(720, 480, FourCc::YV12).unwrap();
        let back = overlay.hardware().unwrap().back().unwrap().id();
        driver.script_locks([HResult::SURFACE_LOST]);

        assert_eq!(backend.lock_overlay(&mut overlay), 0);
        assert!(overlay.is_locked());
        assert_eq!(driver.state().restores, vec![back]);
        assert!(backend.last_error().is_none());

        backend.unlock_overlay(&mut overlay);
        backend.free_overlay(overlay);
    }

    #[test]
    fn lost_surface_twice_is_reported() {
        let driver = FakeDriver::new();
        let mut backend = backend(&driver);
        let mut overlay = backend.create_overlay(720, 480, FourCc::YV12).unwrap();
        driver.script_locks([HResult::SURFACE_LOST, HResult::SURFACE_LOST]);

        assert_eq!(backend.lock_overlay(&mut overlay), -1);
        assert!(!overlay.is_locked());
        assert!(matches!(
            backend.last_error(),
            Some(OverlayError::Driver {
                code: HResult::SURFACE_LOST,
                ..
            })
        ));
        backend.free_overlay(overlay);
    }

    #[test]
    fn busy_card_settles_after_creation() {
        let driver = FakeDriver::new();
        let mut backend = backend(&driver);
        driver.script_locks([HResult::WAS_STILL_DRAWING; 10]);

        let overlay = backend.create_overlay(176, 144, FourCc::YV12);
        assert!(overlay.is_some());
        assert_eq!(driver.state().locks.len(), 11);
        backend.free_overlay(overlay.unwrap());
    }

    #[test]
    fn settle_gives_up_after_budget() {
        let driver = FakeDriver::new();
        let mut backend = backend(&driver);
        driver.script_locks([HResult::WAS_STILL_DRAWING; 60]);

        assert!(backend.create_overlay(176, 144, FourCc::YV12).is_none());
        let state = driver.state();
        assert_eq!(state.locks.len(), 50);
        assert_eq!(state.released.len(), 1);
    }
}

#[cfg(test)]
mod color_key_tests {
    use crate::backend::OverlayBackend;
    use crate::config::{OverlayConfig, DEFAULT_COLOR_KEY};
    use crate::driver::{ColorKey, HResult, OverlayFlags};
    use crate::fake::{FakeDisplay, FakeDriver};
    use crate::format::FourCc;
    use crate::geometry::Rect;

    #[test]
    fn keyed_overlay_paints_sentinel_and_sets_effects() {
        let driver = FakeDriver::new();
        let display = FakeDisplay::new();
        let mut backend = OverlayBackend::new(driver.clone(), display.clone(), OverlayConfig::default());

        let overlay = backend.create(320, 240, FourCc::YV12).unwrap();
        {
            let log = display.state();
            assert_eq!(log.fills, vec![(None, DEFAULT_COLOR_KEY)]);
            assert_eq!(log.commits, 1);
        }

        let hw = overlay.hardware().unwrap();
        assert_eq!(hw.color_key(), Some(ColorKey::single(0x010101)));
        assert_eq!(
            hw.flags(),
            OverlayFlags::SHOW | OverlayFlags::DDFX | OverlayFlags::KEY_DEST_OVERRIDE
        );

        let rect = Rect::new(0, 0, 320, 240);
        backend.display(&overlay, &rect, &rect).unwrap();
        let params = driver.state().updates[0].params;
        assert_eq!(params.dest_color_key, Some(ColorKey::single(0x010101)));
        backend.free(overlay);
    }

    #[test]
    fn unkeyed_overlay_shows_without_effects() {
        let driver = FakeDriver::without_color_key();
        let display = FakeDisplay::new();
        let mut backend = OverlayBackend::new(driver.clone(), display.clone(), OverlayConfig::default());

        let overlay = backend.create(320, 240, FourCc::YV12).unwrap();
        assert!(display.state().fills.is_empty());

        let hw = overlay.hardware().unwrap();
        assert_eq!(hw.color_key(), None);
        assert_eq!(hw.flags(), OverlayFlags::SHOW);
        backend.free(overlay);
    }

    #[test]
    fn fill_can_be_disabled() {
        let display = FakeDisplay::new();
        let config = OverlayConfig {
            fill_display_with_key: false,
            color_key: 0x000102,
            ..OverlayConfig::default()
        };
        let mut backend = OverlayBackend::new(FakeDriver::new(), display.clone(), config);

        let overlay = backend.create(320, 240, FourCc::YV12).unwrap();
        assert!(display.state().fills.is_empty());
        assert_eq!(display.state().commits, 0);
        assert_eq!(
            overlay.hardware().unwrap().color_key(),
            Some(ColorKey::single(0x000102))
        );
        backend.free(overlay);
    }

    #[test]
    fn failed_fill_does_not_fail_creation() {
        let display = FakeDisplay::new();
        display.state().fill_error = Some(HResult::SURFACE_BUSY);
        let mut backend = OverlayBackend::new(FakeDriver::new(), display.clone(), OverlayConfig::default());

        let overlay = backend.create(320, 240, FourCc::YV12).unwrap();
        assert!(overlay.hardware().unwrap().color_key().is_some());
        assert_eq!(display.state().commits, 1);
        backend.free(overlay);
    }
}

#[cfg(test)]
mod teardown_tests {
    use crate::backend::{OverlayBackend, OverlayFuncs};
    use crate::config::{OverlayConfig, PresentMode};
    use crate::driver::HResult;
    use crate::error::OverlayError;
    use crate::fake::{FakeDisplay, FakeDriver, FakeSurface};
    use crate::format::FourCc;
    use crate::overlay::{HardwareState, Overlay};

    fn backend(driver: &FakeDriver) -> OverlayBackend<FakeDriver, FakeDisplay> {
        OverlayBackend::new(driver.clone(), FakeDisplay::new(), OverlayConfig::default())
    }

    #[test]
    fn attach_failure_releases_front() {
        let driver = FakeDriver::new();
        driver.state().attach_error = Some(HResult::NOT_FOUND);
        let mut backend = backend(&driver);

        assert!(backend.create_overlay(320, 240, FourCc::YV12).is_none());
        assert!(matches!(
            backend.last_error(),
            Some(OverlayError::AttachmentFailure {
                operation: "DirectDrawSurface3::GetAttachedSurface",
                ..
            })
        ));
        let state = driver.state();
        assert_eq!(state.released.len(), 1);
        assert_eq!(state.caps_calls, 0);
    }

    #[test]
    fn caps_failure_releases_back_then_front() {
        let driver = FakeDriver::new();
        driver.state().caps_error = Some(HResult::GENERIC);
        let mut backend = backend(&driver);

        assert!(backend.create_overlay(320, 240, FourCc::YV12).is_none());
        assert_eq!(
            backend.last_error().and_then(OverlayError::operation),
            Some("DirectDraw2::GetCaps")
        );
        let state = driver.state();
        assert_eq!(state.back_handles_dropped, 1);
        assert_eq!(state.released.len(), 1);
    }

    #[test]
    fn format_mismatch_releases_surface() {
        let driver = FakeDriver::new();
        driver.state().fourcc_override = Some(FourCc::UYVY);
        let mut backend = backend(&driver);

        assert!(backend.create_overlay(320, 240, FourCc::YV12).is_none());
        assert!(matches!(
            backend.last_error(),
            Some(OverlayError::FormatMismatch { .. })
        ));
        assert_eq!(driver.state().released.len(), 1);
        assert_eq!(driver.state().attach_calls, 0);
    }

    #[test]
    fn free_partial_overlay_releases_nothing() {
        let driver = FakeDriver::new();
        let mut overlay: Overlay<FakeSurface> = Overlay::new(FourCc::YV12, 320, 240);
        overlay.hw = Some(HardwareState::default());

        overlay.free();
        let state = driver.state();
        assert!(state.released.is_empty());
        assert_eq!(state.back_handles_dropped, 0);
    }

    #[test]
    fn blit_mode_has_no_back_buffer() {
        let driver = FakeDriver::new();
        let config = OverlayConfig::default().with_present_mode(PresentMode::Blit);
        let mut backend = OverlayBackend::new(driver.clone(), FakeDisplay::new(), config);

        let mut overlay = backend.create_overlay(320, 240, FourCc::YV12).unwrap();
        let hw = overlay.hardware().unwrap();
        assert!(hw.back().is_none());
        assert_eq!(hw.color_key(), None);
        let front = hw.front().unwrap().id();

        assert_eq!(backend.lock_overlay(&mut overlay), 0);
        assert_eq!(driver.state().locks.last().map(|l| l.0), Some(front));
        backend.unlock_overlay(&mut overlay);
        backend.free_overlay(overlay);

        let state = driver.state();
        assert_eq!(state.attach_calls, 0);
        assert_eq!(state.released, vec![front]);
    }

    #[test]
    fn fourcc_listing_does_not_affect_creation() {
        let driver = FakeDriver::new();
        let config = OverlayConfig {
            log_fourcc_codes: true,
            ..OverlayConfig::default()
        };
        let mut backend = OverlayBackend::new(driver.clone(), FakeDisplay::new(), config);

        let overlay = backend.create_overlay(320, 240, FourCc::YV12).unwrap();
        backend.free_overlay(overlay);
    }
}
