use std::io::{self, Write};

use log::debug;

use crate::aggregate::AggregatedPoint;
use crate::design::Design;
use crate::error::{Result, SplatError};
use crate::lut::AlphaLookupTable;
use crate::MAX_POSITION;

/// Premultiplied RGBA float framebuffer, row 0 at the top.
///
/// Draws aggregated points the way the point-sprite program does: one disc of
/// `point_size` pixels per vertex, opacity read from the lookup table by
/// `(count, alpha)`, composited with `ONE, ONE_MINUS_SRC_ALPHA`.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SplatError::InvalidConfig(format!(
                "canvas must be at least 1x1, got {width}x{height}"
            )));
        }

        Ok(Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
        })
    }

    /// Canvas sized to the (clamped) design resolution.
    pub fn for_design(design: &Design) -> Result<Self> {
        let design = design.clamped();
        Self::new(design.width, design.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.pixels.fill([0.0; 4]);
    }

    #[inline]
    pub fn pixel(&self, col: u32, row: u32) -> [f32; 4] {
        self.pixels[row as usize * self.width as usize + col as usize]
    }

    /// Pixel-space centre of a vertex. The sprite is inset by its own size so
    /// points on the axis extremes stay fully on screen; y points up.
    fn project(&self, p: &AggregatedPoint, point_size: f32) -> (f32, f32) {
        let max = MAX_POSITION as f32;
        let inset_x = 1.0 - point_size / self.width as f32;
        let inset_y = 1.0 - point_size / self.height as f32;

        let ndc_x = (p.x as f32 / max * 2.0 - 1.0) * inset_x;
        let ndc_y = (p.y as f32 / max * 2.0 - 1.0) * inset_y;

        let px = (ndc_x + 1.0) * 0.5 * self.width as f32;
        let py = (1.0 - (ndc_y + 1.0) * 0.5) * self.height as f32;
        (px, py)
    }

    /// Draw `points` in order on top of the current contents.
    pub fn splat(&mut self, points: &[AggregatedPoint], table: &AlphaLookupTable, design: &Design) {
        let design = design.clamped();
        let radius = design.point_size * 0.5;
        let mut drawn = 0usize;

        for p in points.iter().filter(|p| p.count > 0) {
            let opacity = table.opacity(design.alpha, p.count as u32) as f32 / 255.0;
            if opacity == 0.0 {
                continue;
            }

            let src = [
                design.color[0] * opacity,
                design.color[1] * opacity,
                design.color[2] * opacity,
                opacity,
            ];

            let (cx, cy) = self.project(p, design.point_size);
            let col0 = (cx - radius).floor().max(0.0) as u32;
            let col1 = ((cx + radius).ceil().max(0.0) as u32).min(self.width);
            let row0 = (cy - radius).floor().max(0.0) as u32;
            let row1 = ((cy + radius).ceil().max(0.0) as u32).min(self.height);

            for row in row0..row1 {
                let dy = row as f32 + 0.5 - cy;
                for col in col0..col1 {
                    let dx = col as f32 + 0.5 - cx;
                    // outside the round sprite
                    if dx * dx + dy * dy > radius * radius {
                        continue;
                    }

                    let dst = &mut self.pixels[row as usize * self.width as usize + col as usize];
                    let keep = 1.0 - src[3];
                    for c in 0..4 {
                        dst[c] = src[c] + dst[c] * keep;
                    }
                }
            }

            drawn += 1;
        }

        debug!(
            "Splatted {} of {} points onto {}x{}",
            drawn,
            points.len(),
            self.width,
            self.height
        );
    }

    /// Straight-alpha RGBA8 bytes, row-major from the top row.
    pub fn to_rgba8(&self) -> Vec<u8> {
        #[inline(always)]
        fn byte(v: f32) -> u8 {
            (v * 255.0).round().clamp(0.0, 255.0) as u8
        }

        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for &[r, g, b, a] in &self.pixels {
            let unpremultiply = if a > 0.0 { 1.0 / a } else { 0.0 };
            out.extend_from_slice(&[
                byte(r * unpremultiply),
                byte(g * unpremultiply),
                byte(b * unpremultiply),
                byte(a),
            ]);
        }
        out
    }

    /// Write the canvas as a binary PAM (`P7`, `RGB_ALPHA`) image.
    pub fn write_pam<W: Write>(&self, mut w: W) -> io::Result<()> {
        write!(
            w,
            "P7\nWIDTH {}\nHEIGHT {}\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n",
            self.width, self.height
        )?;
        w.write_all(&self.to_rgba8())?;
        w.flush()
    }
}
