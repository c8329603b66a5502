use serde::{Deserialize, Serialize};

use crate::error::{Axis, Result, SplatError};

/// One unscaled input sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

impl RawPoint {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Samples with a NaN or infinite coordinate are dropped before binning.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for RawPoint {
    #[inline]
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for RawPoint {
    #[inline]
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box of the finite samples of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    /// Scan `points` once, skipping non-finite samples.
    ///
    /// Fails with [`SplatError::InvalidInput`] when nothing finite remains and
    /// with [`SplatError::DegenerateRange`] when an axis has zero (or
    /// unrepresentable) width, since normalization would divide by it.
    pub fn from_points(points: &[RawPoint]) -> Result<Self> {
        let (mut x_min, mut y_min) = (f64::INFINITY, f64::INFINITY);
        let (mut x_max, mut y_max) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut valid = 0usize;

        for p in points.iter().filter(|p| p.is_finite()) {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
            valid += 1;
        }

        if valid == 0 {
            return Err(SplatError::InvalidInput);
        }

        let bounds = Self {
            x_min,
            x_max,
            y_min,
            y_max,
        };

        bounds.check_axis(Axis::X)?;
        bounds.check_axis(Axis::Y)?;

        Ok(bounds)
    }

    fn check_axis(&self, axis: Axis) -> Result<()> {
        let (min, max) = match axis {
            Axis::X => (self.x_min, self.x_max),
            Axis::Y => (self.y_min, self.y_max),
        };

        let range = max - min;
        if range > 0.0 && range.is_finite() {
            Ok(())
        } else {
            Err(SplatError::DegenerateRange { axis, min, max })
        }
    }

    #[inline]
    pub fn x_range(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn y_range(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Map a finite sample into `[0, 1] x [0, 1]`.
    #[inline]
    pub fn normalize(&self, p: RawPoint) -> (f64, f64) {
        let x = (p.x - self.x_min) / self.x_range();
        let y = (p.y - self.y_min) / self.y_range();
        (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_non_finite_samples() {
        let points = [
            RawPoint::new(f64::NAN, 100.0),
            RawPoint::new(-2.0, 1.0),
            RawPoint::new(4.0, f64::INFINITY),
            RawPoint::new(2.0, 3.0),
        ];

        let b = Bounds::from_points(&points).unwrap();
        assert_eq!((b.x_min, b.x_max, b.y_min, b.y_max), (-2.0, 2.0, 1.0, 3.0));
    }

    #[test]
    fn empty_input_is_invalid() {
        assert_eq!(Bounds::from_points(&[]), Err(SplatError::InvalidInput));
    }

    #[test]
    fn flat_axis_is_degenerate() {
        let points = [RawPoint::new(0.0, 5.0), RawPoint::new(1.0, 5.0)];

        match Bounds::from_points(&points) {
            Err(SplatError::DegenerateRange { axis, .. }) => assert_eq!(axis, Axis::Y),
            other => panic!("expected degenerate y range, got {other:?}"),
        }
    }

    #[test]
    fn flat_x_axis_is_reported_as_x() {
        let points = [RawPoint::new(2.5, -1.0), RawPoint::new(2.5, 8.0)];

        assert_eq!(
            Bounds::from_points(&points),
            Err(SplatError::DegenerateRange {
                axis: Axis::X,
                min: 2.5,
                max: 2.5,
            })
        );
    }

    #[test]
    fn normalize_hits_both_ends() {
        let points = [RawPoint::new(-1.0, 10.0), RawPoint::new(3.0, 20.0)];
        let b = Bounds::from_points(&points).unwrap();

        assert_eq!(b.normalize(points[0]), (0.0, 0.0));
        assert_eq!(b.normalize(points[1]), (1.0, 1.0));
        assert_eq!(b.normalize(RawPoint::new(1.0, 15.0)), (0.5, 0.5));
    }
}
