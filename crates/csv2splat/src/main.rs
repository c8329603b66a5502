use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use alphasplat::{
    aggregate, parse_hex_color, AggregatedPoint, AlphaLookupTable, Bounds, Canvas, Design,
    DesignUpdate, DensityMap, GridSize, LookupConfig, RawPoint, SplatUniforms, UniformBlock,
    DEFAULT_ALPHA_RESOLUTION,
};

/// Texture unit handle recorded for the lookup table sampler in `--uniforms-out`.
const LOOKUP_TEXTURE_ID: u32 = 1;

/// Aggregate a CSV point cloud into count-weighted point sprites.
///
/// Reads `x,y` samples (extra columns and unparsable lines are ignored),
/// folds them into one centroid per grid bucket and writes the GPU-ready
/// vertex buffer, the alpha lookup table and optional extras.
#[derive(Parser, Debug, Clone)]
#[command(name = "csv2splat", version, about, long_about = None)]
struct Args {
    /// CSV file with `x,y` in the first two columns.
    #[arg(long, env = "SPLAT_INPUT")]
    input: PathBuf,

    /// Buckets along x. Defaults to the canvas width.
    #[arg(long, env = "SPLAT_GRID_WIDTH")]
    grid_width: Option<u32>,

    /// Buckets along y. Defaults to the canvas height.
    #[arg(long, env = "SPLAT_GRID_HEIGHT")]
    grid_height: Option<u32>,

    /// Discrete alpha rows in the lookup table.
    #[arg(long, env = "SPLAT_ALPHA_RESOLUTION", default_value_t = DEFAULT_ALPHA_RESOLUTION)]
    alpha_resolution: u32,

    /// Largest texture side the target device supports; caps both table axes.
    #[arg(long, env = "SPLAT_MAX_TEXTURE_SIZE", default_value_t = 16384)]
    max_texture_size: u32,

    /// JSON file with a base design (`width`, `height`, `point_size`, `color`, `alpha`).
    #[arg(long, env = "SPLAT_DESIGN")]
    design: Option<PathBuf>,

    /// Per-sample alpha in [0, 1]; overrides the design file.
    #[arg(long, env = "SPLAT_ALPHA")]
    alpha: Option<f32>,

    /// Point sprite diameter in pixels; overrides the design file.
    #[arg(long, env = "SPLAT_POINT_SIZE")]
    point_size: Option<f32>,

    /// Point colour as #rrggbb; overrides the design file.
    #[arg(long, env = "SPLAT_COLOR")]
    color: Option<String>,

    /// Canvas width in pixels; overrides the design file.
    #[arg(long, env = "SPLAT_WIDTH")]
    width: Option<u32>,

    /// Canvas height in pixels; overrides the design file.
    #[arg(long, env = "SPLAT_HEIGHT")]
    height: Option<u32>,

    /// Vertex buffer output: little-endian u16 `x, y, count` per point.
    #[arg(long, env = "SPLAT_VERTICES_OUT")]
    vertices_out: Option<PathBuf>,

    /// Lookup table output: `width * height` opacity bytes, row-major.
    #[arg(long, env = "SPLAT_LUT_OUT")]
    lut_out: Option<PathBuf>,

    /// std140 uniform block of the point program.
    #[arg(long, env = "SPLAT_UNIFORMS_OUT")]
    uniforms_out: Option<PathBuf>,

    /// Side length of the RGBA8 density map.
    #[arg(long, env = "SPLAT_DENSITY_MAP_SIZE", default_value_t = 256)]
    density_map_size: u32,

    /// Density map output (raw RGBA8); the map is only built when set.
    #[arg(long, env = "SPLAT_DENSITY_OUT")]
    density_out: Option<PathBuf>,

    /// Software-rendered preview as a PAM image.
    #[arg(long, env = "SPLAT_PREVIEW_OUT")]
    preview_out: Option<PathBuf>,

    /// JSON summary of the run.
    #[arg(long, env = "SPLAT_SUMMARY_OUT")]
    summary_out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary {
    input: PathBuf,
    samples: usize,
    skipped: usize,
    buckets: usize,
    max_count: u16,
    bounds: Bounds,
    grid: GridSize,
    design: Design,
    lookup: LookupConfig,
    lookup_width: u32,
    lookup_height: u32,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let t0 = Instant::now();

    // ---------------------------------------------------------------------
    // Design: file (or defaults), then CLI overrides
    // ---------------------------------------------------------------------
    let design = resolve_design(&args)?;
    debug!("Design: {:?}", design);

    // ---------------------------------------------------------------------
    // Load samples
    // ---------------------------------------------------------------------
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let points = parse_csv(&text);

    if points.is_empty() {
        bail!("{}: no x,y rows found", args.input.display());
    }
    info!("Loaded {} samples from {}", points.len(), args.input.display());

    // ---------------------------------------------------------------------
    // Aggregate + lookup table
    // ---------------------------------------------------------------------
    let grid = GridSize::new(
        args.grid_width.unwrap_or(design.width),
        args.grid_height.unwrap_or(design.height),
    )
    .context("grid size")?;

    let agg = aggregate(&points, grid)
        .with_context(|| format!("aggregating {}", args.input.display()))?;

    if agg.skipped > 0 {
        warn!("Skipped {} samples with a non-finite coordinate", agg.skipped);
    }

    let lookup = LookupConfig::for_device(args.max_texture_size, args.alpha_resolution)
        .context("lookup table configuration")?;
    let table = AlphaLookupTable::build(lookup).context("building lookup table")?;

    info!(
        "{} samples -> {} buckets (max count {}), lookup table {}x{}",
        points.len() - agg.skipped,
        agg.len(),
        agg.max_count(),
        table.width(),
        table.height()
    );

    // ---------------------------------------------------------------------
    // Outputs
    // ---------------------------------------------------------------------
    if let Some(path) = &args.vertices_out {
        write_with(path, |w| write_vertices(w, &agg.points))?;
        info!("OK vertices -> {}", path.display());
    }

    if let Some(path) = &args.lut_out {
        write_with(path, |w| w.write_all(table.data()))?;
        info!("OK lookup table -> {}", path.display());
    }

    if let Some(path) = &args.uniforms_out {
        let mut block = UniformBlock::new(SplatUniforms::layout()?);
        SplatUniforms::new(&design, &table).write_into(&mut block, LOOKUP_TEXTURE_ID)?;
        write_with(path, |w| w.write_all(block.as_bytes()))?;
        info!("OK uniforms ({} bytes) -> {}", block.as_bytes().len(), path.display());
    }

    if let Some(path) = &args.density_out {
        let map = DensityMap::build(&points, args.density_map_size).context("density map")?;
        write_with(path, |w| w.write_all(map.as_bytes()))?;
        info!("OK density map {}x{} -> {}", map.size, map.size, path.display());
    }

    if let Some(path) = &args.preview_out {
        let mut canvas = Canvas::for_design(&design)?;
        canvas.splat(&agg.points, &table, &design);
        write_with(path, |w| canvas.write_pam(w))?;
        info!("OK preview {}x{} -> {}", canvas.width(), canvas.height(), path.display());
    }

    let summary = Summary {
        input: args.input.clone(),
        samples: points.len(),
        skipped: agg.skipped,
        buckets: agg.len(),
        max_count: agg.max_count(),
        bounds: agg.bounds,
        grid,
        design,
        lookup,
        lookup_width: table.width(),
        lookup_height: table.height(),
    };

    if let Some(path) = &args.summary_out {
        write_with(path, |w| {
            serde_json::to_writer_pretty(&mut *w, &summary)?;
            writeln!(w)
        })?;
        info!("OK summary -> {}", path.display());
    }

    info!("Done in {:.2?}", t0.elapsed());
    Ok(())
}

/// Base design from `--design` (or defaults) with every CLI override applied.
fn resolve_design(args: &Args) -> Result<Design> {
    let mut design = match &args.design {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading design {}", path.display()))?;
            serde_json::from_str::<Design>(&text)
                .with_context(|| format!("parsing design {}", path.display()))?
        }
        None => Design::default(),
    };

    let color = args
        .color
        .as_deref()
        .map(parse_hex_color)
        .transpose()
        .context("--color")?;

    // Always run the update so a design file is clamped too.
    design.update(DesignUpdate {
        width: args.width,
        height: args.height,
        point_size: args.point_size,
        color,
        alpha: args.alpha,
    });

    Ok(design)
}

/// First two comma separated fields as `x, y`; `None` for headers and junk.
fn parse_csv_line(line: &str) -> Option<RawPoint> {
    let mut fields = line.split(',');
    let x = fields.next()?.trim().parse::<f64>().ok()?;
    let y = fields.next()?.trim().parse::<f64>().ok()?;
    Some(RawPoint::new(x, y))
}

/// Parse every line in parallel, keeping file order.
fn parse_csv(text: &str) -> Vec<RawPoint> {
    text.par_lines().filter_map(parse_csv_line).collect()
}

#[inline(always)]
fn write_u16<W: Write>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_vertices<W: Write>(w: &mut W, points: &[AggregatedPoint]) -> io::Result<()> {
    for p in points {
        write_u16(w, p.x)?;
        write_u16(w, p.y)?;
        write_u16(w, p.count)?;
    }
    Ok(())
}

/// Create `path` (and its parent directory) and hand a buffered writer to `f`.
fn write_with<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    f(&mut w).with_context(|| format!("writing {}", path.display()))?;
    w.flush().with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
