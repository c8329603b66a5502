use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::bounds::{Bounds, RawPoint};
use crate::error::{Result, SplatError};
use crate::MAX_POSITION;

/// Largest count a finalized point can carry; larger buckets saturate here.
pub const MAX_COUNT: u16 = u16::MAX;

/// Number of buckets along each axis, usually bounded by the target resolution.
///
/// Deserializing goes through [`GridSize::new`], so a zero axis is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "GridDims")]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let grid = Self { width, height };
        grid.validate()?;
        Ok(grid)
    }

    /// Same number of buckets on both axes.
    pub fn square(cells: u32) -> Result<Self> {
        Self::new(cells, cells)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SplatError::InvalidConfig(format!(
                "grid must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct GridDims {
    width: u32,
    height: u32,
}

impl TryFrom<GridDims> for GridSize {
    type Error = SplatError;

    fn try_from(dims: GridDims) -> Result<Self> {
        Self::new(dims.width, dims.height)
    }
}

/// Bucket index of a sample: `row` from y, `col` from x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub row: u32,
    pub col: u32,
}

impl GroupKey {
    /// Truncate normalized `[0, 1]` coordinates into the grid.
    ///
    /// The axis maximum (exactly `1.0`) lands in the last bucket, not one past it.
    /// `grid` must already be validated.
    #[inline]
    pub(crate) fn from_normalized(x_norm: f64, y_norm: f64, grid: GridSize) -> Self {
        Self {
            row: bucket(y_norm, grid.height),
            col: bucket(x_norm, grid.width),
        }
    }
}

#[inline(always)]
fn bucket(norm: f64, cells: u32) -> u32 {
    ((norm * cells as f64) as u32).min(cells - 1)
}

#[inline(always)]
fn scale(norm: f64) -> f64 {
    norm * MAX_POSITION as f64
}

/// A finalized bucket: mean position in `[0, 65535]` and its sample count.
///
/// Laid out as three tightly packed `u16`, ready for a vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub x: u16,
    pub y: u16,
    pub count: u16,
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    x_sum: f64,
    y_sum: f64,
    count: u32,
}

impl Accumulator {
    #[inline]
    fn add(&mut self, x: f64, y: f64) {
        self.x_sum += x;
        self.y_sum += y;
        self.count = self.count.saturating_add(1);
    }

    fn finalize(self) -> AggregatedPoint {
        let n = self.count as f64;
        let mean = |sum: f64| (sum / n).round().clamp(0.0, MAX_POSITION as f64) as u16;

        AggregatedPoint {
            x: mean(self.x_sum),
            y: mean(self.y_sum),
            count: self.count.min(MAX_COUNT as u32) as u16,
        }
    }
}

/// Output of [`aggregate`]: one centroid per touched bucket, in first-touched order.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub bounds: Bounds,
    pub grid: GridSize,
    pub points: Vec<AggregatedPoint>,
    /// Input samples dropped for a non-finite coordinate.
    pub skipped: usize,
    keys: Vec<GroupKey>,
}

impl Aggregation {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bucket of each point, parallel to `points`.
    pub fn keys(&self) -> &[GroupKey] {
        &self.keys
    }

    pub fn iter_keyed(&self) -> impl Iterator<Item = (GroupKey, &AggregatedPoint)> + '_ {
        self.keys.iter().copied().zip(self.points.iter())
    }

    /// Sum of (saturated) counts.
    pub fn total_count(&self) -> u64 {
        self.points.iter().map(|p| p.count as u64).sum()
    }

    pub fn max_count(&self) -> u16 {
        self.points.iter().map(|p| p.count).max().unwrap_or(0)
    }

    /// Native-endian view of the vertex data for direct buffer upload.
    pub fn as_vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }
}

/// Fold `points` into at most `grid.width * grid.height` weighted centroids.
///
/// Non-finite samples are skipped silently. Output order is the order in
/// which buckets were first touched, so identical input yields identical
/// output.
pub fn aggregate(points: &[RawPoint], grid: GridSize) -> Result<Aggregation> {
    grid.validate()?;
    let bounds = Bounds::from_points(points)?;

    // Bucket -> slot in `accumulators`; slots are allocated in first-touched order.
    let mut slots: HashMap<GroupKey, usize> = HashMap::new();
    let mut keys: Vec<GroupKey> = Vec::new();
    let mut accumulators: Vec<Accumulator> = Vec::new();
    let mut skipped = 0usize;

    for &p in points {
        if !p.is_finite() {
            skipped += 1;
            continue;
        }

        let (x_norm, y_norm) = bounds.normalize(p);
        let key = GroupKey::from_normalized(x_norm, y_norm, grid);

        let slot = *slots.entry(key).or_insert_with(|| {
            keys.push(key);
            accumulators.push(Accumulator::default());
            accumulators.len() - 1
        });

        accumulators[slot].add(scale(x_norm), scale(y_norm));
    }

    let valid = points.len() - skipped;
    let points: Vec<AggregatedPoint> = accumulators.into_iter().map(Accumulator::finalize).collect();

    debug!(
        "Aggregated {} samples ({} skipped) into {} buckets on a {}x{} grid",
        valid,
        skipped,
        points.len(),
        grid.width,
        grid.height
    );

    Ok(Aggregation {
        bounds,
        grid,
        points,
        skipped,
        keys,
    })
}
