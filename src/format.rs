//! FourCC pixel layouts accepted by the overlay.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Four-character code identifying a packed or planar YUV layout.
///
/// Any code can be requested; the driver decides whether it can overlay it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FourCc(pub u32);

impl FourCc {
    /// Planar 4:2:0, Y then V then U.
    pub const YV12: FourCc = FourCc::from_bytes(*b"YV12");
    /// Planar 4:2:0, Y then U then V.
    pub const IYUV: FourCc = FourCc::from_bytes(*b"IYUV");
    /// Packed 4:2:2, Y0 U0 Y1 V0.
    pub const YUY2: FourCc = FourCc::from_bytes(*b"YUY2");
    /// Packed 4:2:2, U0 Y0 V0 Y1.
    pub const UYVY: FourCc = FourCc::from_bytes(*b"UYVY");
    /// Packed 4:2:2, Y0 V0 Y1 U0.
    pub const YVYU: FourCc = FourCc::from_bytes(*b"YVYU");

    /// Build a code from its four characters, first character in the low byte.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        FourCc(u32::from_le_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// True for the three-plane 4:2:0 layouts.
    pub fn is_planar_420(self) -> bool {
        self == FourCc::YV12 || self == FourCc::IYUV
    }

    pub fn plane_count(self) -> usize {
        if self.is_planar_420() {
            3
        } else {
            1
        }
    }

    /// Rows in each chroma plane of a `height`-row image. Zero for packed formats.
    pub fn chroma_rows(self, height: u32) -> usize {
        if self.is_planar_420() {
            height as usize / 2
        } else {
            0
        }
    }

    /// Bytes of one chroma plane when luma rows are `pitch` bytes apart.
    ///
    /// Chroma rows are `pitch / 2` wide and the plane spans
    /// `(pitch / 2) * height / 2` bytes, rounding the product down, so an odd
    /// height keeps the half row. Zero for packed formats.
    pub fn chroma_plane_len(self, pitch: usize, height: u32) -> usize {
        if self.is_planar_420() {
            (pitch / 2) * height as usize / 2
        } else {
            0
        }
    }

    /// Bytes spanned by a whole image when luma rows are `pitch` bytes apart.
    pub fn image_len(self, pitch: usize, height: u32) -> usize {
        pitch * height as usize + 2 * self.chroma_plane_len(pitch, height)
    }
}

impl From<u32> for FourCc {
    fn from(code: u32) -> Self {
        FourCc(code)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
