//! alphasplat: count-weighted point sprites for dense scatterplots.
//!
//! Two stateless transforms make up the core:
//!
//! - [`aggregate`] folds a raw 2D point cloud into one weighted centroid per
//!   grid bucket, in a fixed `[0, 65535]` integer space, carrying the number of
//!   samples folded into it.
//! - [`AlphaLookupTable::build`] precomputes, for every discretized alpha and
//!   overlap count `n`, the opacity byte of `n` self-composited layers:
//!   `round(255 * (1 - (1 - alpha)^n))`.
//!
//! Around them sit the pieces a renderer needs to consume those results:
//!
//! - [`LookupCache`]: memoized tables keyed by [`LookupConfig`].
//! - [`DensityMap`]: RGBA8 density texture (sub-cell offset + 16-bit count).
//! - [`Design`]: point size / colour / alpha / canvas size with range clamps.
//! - [`UniformLayout`] / [`UniformBlock`]: std140 uniform data with a closed set
//!   of statically typed kinds.
//! - [`Canvas`]: a CPU rendition of the point-sprite shader and
//!   `ONE, ONE_MINUS_SRC_ALPHA` blending.
//!
//! Vertex layout handed to the GPU (little-endian, 6 bytes per point):
//!   00 : u16 x      (0 = x_min, 65535 = x_max)
//!   02 : u16 y      (0 = y_min, 65535 = y_max)
//!   04 : u16 count  (saturates at 65535)

mod aggregate;
mod bounds;
mod cache;
mod density;
mod design;
mod error;
mod lut;
mod raster;
mod uniforms;

pub use aggregate::{aggregate, AggregatedPoint, Aggregation, GridSize, GroupKey, MAX_COUNT};
pub use bounds::{Bounds, RawPoint};
pub use cache::LookupCache;
pub use density::DensityMap;
pub use design::{parse_hex_color, Design, DesignUpdate};
pub use error::{Axis, Result, SplatError};
pub use lut::{alpha_ramp, AlphaLookupTable, LookupConfig, DEFAULT_ALPHA_RESOLUTION, MAX_LOOKUP_WIDTH};
pub use raster::Canvas;
pub use uniforms::{
    SlotLocation, SplatUniforms, UniformBlock, UniformKind, UniformLayout, UniformSlot, UniformValue,
};

/// Upper end of the normalized integer coordinate space.
pub const MAX_POSITION: u16 = u16::MAX;
