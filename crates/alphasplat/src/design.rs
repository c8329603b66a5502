use serde::{Deserialize, Serialize};

use crate::error::{Result, SplatError};

/// Visual parameters of a scatterplot render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Design {
    /// Canvas width in physical pixels.
    pub width: u32,
    /// Canvas height in physical pixels.
    pub height: u32,
    /// Point sprite diameter in pixels.
    pub point_size: f32,
    /// Linear RGB, each channel in `[0, 1]`.
    pub color: [f32; 3],
    /// Per-sample alpha in `[0, 1]`.
    pub alpha: f32,
}

impl Default for Design {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            point_size: 3.0,
            color: [0.0, 0.0, 0.0],
            alpha: 0.5,
        }
    }
}

/// Partial design change; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignUpdate {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub point_size: Option<f32>,
    pub color: Option<[f32; 3]>,
    pub alpha: Option<f32>,
}

#[inline]
fn unit_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

impl Design {
    /// Copy with every field forced into its valid range. Non-finite values
    /// fall back to the defaults.
    pub fn clamped(&self) -> Self {
        let d = Self::default();

        Self {
            width: self.width.max(1),
            height: self.height.max(1),
            point_size: if self.point_size.is_finite() {
                self.point_size.max(1.0)
            } else {
                d.point_size
            },
            color: [
                unit_or(self.color[0], d.color[0]),
                unit_or(self.color[1], d.color[1]),
                unit_or(self.color[2], d.color[2]),
            ],
            alpha: unit_or(self.alpha, d.alpha),
        }
    }

    /// Merge `update` into `self` (clamped) and report whether anything changed,
    /// so callers only re-render on an actual change.
    pub fn update(&mut self, update: DesignUpdate) -> bool {
        let next = Self {
            width: update.width.unwrap_or(self.width),
            height: update.height.unwrap_or(self.height),
            point_size: update.point_size.unwrap_or(self.point_size),
            color: update.color.unwrap_or(self.color),
            alpha: update.alpha.unwrap_or(self.alpha),
        }
        .clamped();

        let changed = next != *self;
        *self = next;
        changed
    }

    /// `[width, height]` as the shader's resolution uniform.
    #[inline]
    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// Parse `#rrggbb` (leading `#` optional) into `[0, 1]` channels.
pub fn parse_hex_color(hex: &str) -> Result<[f32; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    let bad = || SplatError::InvalidConfig(format!("expected a #rrggbb colour, got {hex:?}"));

    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(bad());
    }

    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|_| bad())
    };

    Ok([channel(0)?, channel(2)?, channel(4)?])
}
