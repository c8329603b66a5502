use log::debug;

use crate::bounds::{Bounds, RawPoint};
use crate::error::{Result, SplatError};

/// Largest count an RGBA texel can encode (`b * 256 + a`).
const MAX_TEXEL_COUNT: u32 = 255 * 256 + 255;

#[derive(Debug, Default, Clone, Copy)]
struct Cell {
    x_offset_sum: f64,
    y_offset_sum: f64,
    count: u32,
}

impl Cell {
    /// `[mean x offset, mean y offset, count / 256, count % 256]`, offsets in 1/255 steps.
    fn encode(&self) -> [u8; 4] {
        if self.count == 0 {
            return [0; 4];
        }

        let n = self.count as f64;
        let offset = |sum: f64| ((sum / n) * 255.0).floor().clamp(0.0, 255.0) as u8;
        let count = self.count.min(MAX_TEXEL_COUNT);

        [
            offset(self.x_offset_sum),
            offset(self.y_offset_sum),
            (count / 256) as u8,
            (count % 256) as u8,
        ]
    }
}

/// Square RGBA8 density texture of a point cloud.
///
/// Each texel stores the mean sub-cell position of the samples that fell into
/// it (r, g) and their count as a 16-bit value split over b (high) and a
/// (low). Row index follows y, column index follows x.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityMap {
    pub size: u32,
    pub bounds: Bounds,
    texels: Vec<[u8; 4]>,
}

impl DensityMap {
    /// Bin `points` into a `size x size` grid. Non-finite samples are skipped;
    /// empty or degenerate input fails like [`crate::aggregate`].
    pub fn build(points: &[RawPoint], size: u32) -> Result<Self> {
        if size < 2 {
            return Err(SplatError::InvalidConfig(format!(
                "density map size must be >= 2, got {size}"
            )));
        }

        let bounds = Bounds::from_points(points)?;
        let side = size as usize;
        let last = (size - 1) as f64;
        let mut cells = vec![Cell::default(); side * side];

        for &p in points.iter().filter(|p| p.is_finite()) {
            let (x_norm, y_norm) = bounds.normalize(p);
            let x_scaled = x_norm * last;
            let y_scaled = y_norm * last;
            let col = x_scaled.floor();
            let row = y_scaled.floor();

            let cell = &mut cells[row as usize * side + col as usize];
            cell.x_offset_sum += x_scaled - col;
            cell.y_offset_sum += y_scaled - row;
            cell.count = cell.count.saturating_add(1);
        }

        let texels: Vec<[u8; 4]> = cells.iter().map(Cell::encode).collect();

        debug!(
            "Density map {}x{}: {} occupied texels",
            size,
            size,
            texels.iter().filter(|t| t[2] != 0 || t[3] != 0).count()
        );

        Ok(Self {
            size,
            bounds,
            texels,
        })
    }

    #[inline]
    pub fn texel(&self, row: u32, col: u32) -> [u8; 4] {
        self.texels[row as usize * self.size as usize + col as usize]
    }

    /// Decoded sample count of a texel (exact up to 65535, saturated above).
    #[inline]
    pub fn count(&self, row: u32, col: u32) -> u32 {
        let [_, _, hi, lo] = self.texel(row, col);
        hi as u32 * 256 + lo as u32
    }

    /// Row-major RGBA8 bytes, ready for a `size x size` texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}
