//! Overlay backend configuration.
//!
//! A backend takes its [`OverlayConfig`] at construction and keeps it for its
//! whole lifetime. The defaults reproduce the classic DirectDraw overlay
//! behavior: update + flip presentation, a near-black destination color key
//! painted over the whole display surface, and a 2000 × 1 ms settle budget.

use serde::{Deserialize, Serialize};

use crate::error::OverlayResult;
use crate::retry::RetryPolicy;

/// Near-black sentinel the display surface is filled with when keying.
pub const DEFAULT_COLOR_KEY: u32 = 0x01_01_01;

/// How a finished frame reaches the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresentMode {
    /// Hardware overlay: geometry update when needed, then flip.
    Overlay,
    /// Copy the frame into the primary surface on every display call.
    Blit,
}

impl Default for PresentMode {
    fn default() -> Self {
        if cfg!(feature = "blit-present") {
            PresentMode::Blit
        } else {
            PresentMode::Overlay
        }
    }
}

/// Backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayConfig {
    pub present_mode: PresentMode,
    /// Budget for the verification lock right after surface creation.
    pub create_retry: RetryPolicy,
    /// Destination color key, packed RGB.
    pub color_key: u32,
    /// Paint the whole display surface with the color key on creation.
    pub fill_display_with_key: bool,
    /// Log the FourCC codes the driver can overlay when creating an overlay.
    pub log_fourcc_codes: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            present_mode: PresentMode::default(),
            create_retry: RetryPolicy::surface_settle(),
            color_key: DEFAULT_COLOR_KEY,
            fill_display_with_key: true,
            log_fourcc_codes: false,
        }
    }
}

impl OverlayConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> OverlayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_present_mode(mut self, mode: PresentMode) -> Self {
        self.present_mode = mode;
        self
    }

    pub fn with_create_retry(mut self, policy: RetryPolicy) -> Self {
        self.create_retry = policy;
        self
    }
}
