use std::fmt;

use thiserror::Error;

/// Which axis of the input a range error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
        };

        f.write_str(s)
    }
}

/// Everything that can stop a dataset or configuration from being rendered.
///
/// None of these carry a partial result: callers surface them as
/// "cannot render this dataset/configuration".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplatError {
    /// The input holds no sample with a finite x and y.
    #[error("no finite samples in input")]
    InvalidInput,

    /// All finite samples share one coordinate on `axis`, or the range overflows.
    #[error("degenerate {axis} range [{min}, {max}]")]
    DegenerateRange { axis: Axis, min: f64, max: f64 },

    /// A resolution, width, grid, colour or layout parameter is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A uniform was set under an unknown name or with the wrong kind.
    #[error("uniform error: {0}")]
    Uniform(String),
}

pub type Result<T> = std::result::Result<T, SplatError>;
