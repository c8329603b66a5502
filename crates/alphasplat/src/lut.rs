use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplatError};

/// Widest table ever requested: overlap counts are carried in a `u16`.
pub const MAX_LOOKUP_WIDTH: u32 = u16::MAX as u32;

/// Number of alpha rows used when the caller has no preference.
pub const DEFAULT_ALPHA_RESOLUTION: u32 = 1000;

/// Shape request for an [`AlphaLookupTable`]; also its cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Rows; row `r` holds alpha `r / (alpha_resolution - 1)`.
    pub alpha_resolution: u32,
    /// Upper bound on columns (overlap counts `0..max_width`).
    pub max_width: u32,
}

impl LookupConfig {
    pub fn new(alpha_resolution: u32, max_width: u32) -> Result<Self> {
        let config = Self {
            alpha_resolution,
            max_width,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fit the table into a device texture limit, the way the renderer sizes it:
    /// `min(max_texture_size, alpha_resolution)` rows and
    /// `min(max_texture_size, 65535)` columns at most.
    pub fn for_device(max_texture_size: u32, alpha_resolution: u32) -> Result<Self> {
        Self::new(
            max_texture_size.min(alpha_resolution),
            max_texture_size.min(MAX_LOOKUP_WIDTH),
        )
    }

    fn validate(&self) -> Result<()> {
        if self.alpha_resolution < 2 {
            return Err(SplatError::InvalidConfig(format!(
                "alpha resolution must be >= 2 to hold alpha 0 and 1, got {}",
                self.alpha_resolution
            )));
        }
        if self.max_width < 2 {
            return Err(SplatError::InvalidConfig(format!(
                "lookup width must be >= 2 to hold count 0 and 1, got {}",
                self.max_width
            )));
        }
        Ok(())
    }

    #[inline]
    fn row_alpha(&self, row: u32) -> f64 {
        row as f64 / (self.alpha_resolution - 1) as f64
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            alpha_resolution: DEFAULT_ALPHA_RESOLUTION,
            max_width: MAX_LOOKUP_WIDTH,
        }
    }
}

#[inline(always)]
fn opacity_byte(accumulated_transparency: f64) -> u8 {
    (255.0 * (1.0 - accumulated_transparency))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Opacities for counts `0, 1, ...` up to and including the first 255, or
/// `max_width` entries if the row never saturates.
fn provisional_row(alpha: f64, max_width: u32) -> Vec<u8> {
    let mut row = vec![0u8];
    let transparency = 1.0 - alpha;
    let mut accumulated = 1.0;

    for _ in 1..max_width {
        accumulated *= transparency;
        let opacity = opacity_byte(accumulated);
        row.push(opacity);
        if opacity == u8::MAX {
            break;
        }
    }

    row
}

/// One fixed-width row for a single alpha: `width` opacities for counts
/// `0..width`, padded with 255 past saturation. Alpha is clamped to `[0, 1]`.
pub fn alpha_ramp(alpha: f32, width: u32) -> Vec<u8> {
    let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 0.0 };
    if width == 0 {
        return Vec::new();
    }
    if alpha == 0.0 {
        return vec![0; width as usize];
    }

    let mut row = provisional_row(alpha as f64, width);
    row.resize(width as usize, u8::MAX);
    row
}

/// Composited opacity of `count` layers for each discretized alpha.
///
/// `data[row * width + col]` is the opacity byte of `col` overlapping layers
/// at alpha `row / (height - 1)`. Rows are non-decreasing and stay at 255 once
/// they reach it; row 0 is all zero. Only [`AlphaLookupTable::build`] makes
/// one, so `data.len() == width * height` with `width, height >= 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaLookupTable {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl AlphaLookupTable {
    /// Build the table in two passes: provisional rows (in parallel, rows are
    /// independent), then one dense buffer as wide as the longest row.
    ///
    /// Row 0 (alpha 0) never saturates and always spans `max_width`, so the
    /// table comes out `max_width` wide. It would only be narrower if every
    /// row saturated early.
    pub fn build(config: LookupConfig) -> Result<Self> {
        config.validate()?;

        let rows: Vec<Vec<u8>> = (0..config.alpha_resolution)
            .into_par_iter()
            .map(|r| provisional_row(config.row_alpha(r), config.max_width))
            .collect();

        // Rows that never saturate span all of `max_width`; alpha 0 is one of them.
        let width = rows.iter().map(Vec::len).max().unwrap_or(1);
        let height = rows.len();

        let mut data = vec![u8::MAX; width * height];
        for (dst, row) in data.chunks_exact_mut(width).zip(rows.iter()) {
            dst[..row.len()].copy_from_slice(row);
        }

        debug!(
            "Built alpha lookup table {}x{} (requested max width {})",
            width, height, config.max_width
        );

        Ok(Self {
            width: width as u32,
            height: height as u32,
            data,
        })
    }

    /// Columns, i.e. overlap counts `0..width`.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Rows, i.e. discretized alphas.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major opacity bytes for an 8-bit `width x height` texture.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn row(&self, row: u32) -> &[u8] {
        let w = self.width as usize;
        let start = row as usize * w;
        &self.data[start..start + w]
    }

    #[inline]
    pub fn get(&self, row: u32, col: u32) -> u8 {
        self.data[row as usize * self.width as usize + col as usize]
    }

    /// Alpha value represented by `row`.
    #[inline]
    pub fn alpha_of_row(&self, row: u32) -> f64 {
        row as f64 / (self.height - 1) as f64
    }

    /// Nearest row for `alpha`, clamped into the table.
    #[inline]
    pub fn row_for_alpha(&self, alpha: f32) -> u32 {
        let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 0.0 };
        (alpha as f64 * (self.height - 1) as f64).round() as u32
    }

    /// Opacity of `count` overlapping layers at `alpha`. Counts past the last
    /// column read the last column, like a clamp-to-edge texture.
    #[inline]
    pub fn opacity(&self, alpha: f32, count: u32) -> u8 {
        let col = count.min(self.width - 1);
        self.get(self.row_for_alpha(alpha), col)
    }

    /// Texture coordinate the point shader samples for `(count, alpha)`.
    #[inline]
    pub fn texcoord(&self, count: u32, alpha: f32) -> [f32; 2] {
        [(count as f32 + 0.5) / (self.width - 1) as f32, alpha]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_rows_four_columns() {
        let table = AlphaLookupTable::build(LookupConfig::new(2, 4).unwrap()).unwrap();

        assert_eq!((table.width(), table.height()), (4, 2));
        assert_eq!(table.row(0), &[0, 0, 0, 0]);
        assert_eq!(table.row(1), &[0, 255, 255, 255]);
    }

    #[test]
    fn half_alpha_row_matches_closed_form() {
        let table = AlphaLookupTable::build(LookupConfig::new(3, 64).unwrap()).unwrap();

        // alpha 0.5: 255 * (1 - 0.5^n) = 128, 191, 223, 239, 247, 251, 253, 254, 255 ...
        assert_eq!(&table.row(1)[..10], &[0, 128, 191, 223, 239, 247, 251, 253, 254, 255]);
        assert!(table.row(1)[10..].iter().all(|&v| v == 255));
    }

    #[test]
    fn rejects_single_column() {
        assert!(matches!(LookupConfig::new(4, 1), Err(SplatError::InvalidConfig(_))));
        assert!(matches!(LookupConfig::new(4, 0), Err(SplatError::InvalidConfig(_))));
        assert!(matches!(
            LookupConfig::for_device(1, 1000),
            Err(SplatError::InvalidConfig(_))
        ));
    }

    #[test]
    fn built_table_is_dense() {
        let table = AlphaLookupTable::build(LookupConfig::new(7, 300).unwrap()).unwrap();

        assert_eq!(table.width(), 300);
        assert_eq!(table.data().len(), (table.width() * table.height()) as usize);
        assert_eq!(table.row(6).len(), 300);
    }

    #[test]
    fn rejects_single_row() {
        assert!(matches!(LookupConfig::new(1, 16), Err(SplatError::InvalidConfig(_))));

        let bypass = LookupConfig {
            alpha_resolution: 1,
            max_width: 16,
        };
        assert!(AlphaLookupTable::build(bypass).is_err());
    }

    #[test]
    fn device_limit_caps_both_axes() {
        let config = LookupConfig::for_device(512, 1000).unwrap();
        assert_eq!(config, LookupConfig { alpha_resolution: 512, max_width: 512 });

        let config = LookupConfig::for_device(16384, 1000).unwrap();
        assert_eq!(config, LookupConfig { alpha_resolution: 1000, max_width: 16384 });
    }

    #[test]
    fn opacity_clamps_count_and_alpha() {
        let table = AlphaLookupTable::build(LookupConfig::new(5, 8).unwrap()).unwrap();

        assert_eq!(table.opacity(0.0, 7), 0);
        assert_eq!(table.opacity(1.0, 0), 0);
        assert_eq!(table.opacity(2.0, 1000), table.get(4, 7));
        assert_eq!(table.opacity(0.5, 1), table.get(2, 1));
        assert_eq!(table.row_for_alpha(f32::NAN), 0);
    }

    #[test]
    fn ramp_matches_table_row() {
        let table = AlphaLookupTable::build(LookupConfig::new(3, 32).unwrap()).unwrap();

        assert_eq!(alpha_ramp(0.5, 32), table.row(1));
        assert_eq!(alpha_ramp(0.0, 5), vec![0; 5]);
        assert_eq!(alpha_ramp(1.0, 3), vec![0, 255, 255]);
    }

    #[test]
    fn texcoord_centres_on_count() {
        let table = AlphaLookupTable::build(LookupConfig::new(2, 5).unwrap()).unwrap();
        let [u, v] = table.texcoord(1, 0.25);

        assert!((u - 0.375).abs() < 1e-6);
        assert_eq!(v, 0.25);
    }
}
