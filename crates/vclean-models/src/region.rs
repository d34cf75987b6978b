//! Pixel regions slated for reconstruction.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a region string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionParseError {
    #[error("Region must be 'x,y,width,height' (got {found} fields)")]
    FieldCount { found: usize },

    #[error("Region field '{field}' is not an integer: '{value}'")]
    NotAnInteger { field: &'static str, value: String },
}

/// An axis-aligned rectangle in integer pixel coordinates.
///
/// The rectangle may extend past the frame or lie entirely outside it, and
/// width/height may be zero or negative. Consumers clamp with [`Region::clip`]
/// and treat an empty result as "nothing to mask".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    /// Left edge (may be negative)
    pub x: i32,
    /// Top edge (may be negative)
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

/// A region clamped to frame bounds, as half-open pixel ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

impl Region {
    /// Create a new region.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Clamp the region to `[0, frame_width) x [0, frame_height)`.
    ///
    /// Returns `None` for degenerate or fully off-frame regions.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let clamp = |v: i64, max: u32| v.clamp(0, max as i64) as u32;

        let x0 = clamp(self.x as i64, frame_width);
        let y0 = clamp(self.y as i64, frame_height);
        let x1 = clamp(self.x as i64 + self.width as i64, frame_width);
        let y1 = clamp(self.y as i64 + self.height as i64, frame_height);

        (x1 > x0 && y1 > y0).then_some(PixelRect { x0, y0, x1, y1 })
    }
}

impl FromStr for Region {
    type Err = RegionParseError;

    /// Parse `"x,y,width,height"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const FIELDS: [&str; 4] = ["x", "y", "width", "height"];

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != FIELDS.len() {
            return Err(RegionParseError::FieldCount { found: parts.len() });
        }

        let mut values = [0i32; 4];
        for ((slot, part), field) in values.iter_mut().zip(&parts).zip(FIELDS) {
            *slot = part.parse().map_err(|_| RegionParseError::NotAnInteger {
                field,
                value: part.to_string(),
            })?;
        }

        let [x, y, width, height] = values;
        Ok(Self::new(x, y, width, height))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}
