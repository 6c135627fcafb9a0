//! Grid composition: warp aligned grids into one canvas and merge cells.
//!
//! Every contributing cell is forward-mapped through its grid's transform
//! and lands in the nearest canvas cell. The first write stores the source
//! value verbatim, later writes keep the larger signed value, so occupied
//! (by confidence) beats free, and free beats unknown. The rule is
//! commutative: the merged grid does not depend on input order, and a single
//! identity-placed grid is copied unchanged.

use map_merge_core::{OccupancyGrid, Transform, UNKNOWN};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

const SIZE_EPS: f64 = 1e-6;
const MAX_SUBSAMPLES: usize = 32;

/// Largest canvas `compose_grids` allocates (256 Mi cells).
pub const MAX_CANVAS_CELLS: usize = 1 << 28;

/// Axis-aligned rectangle in the common frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasBounds {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl CanvasBounds {
    fn empty() -> Self {
        Self {
            min: Point2::new(f64::INFINITY, f64::INFINITY),
            max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    fn include(&mut self, p: Point2<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    fn is_finite(&self) -> bool {
        [self.min.x, self.min.y, self.max.x, self.max.y]
            .iter()
            .all(|v| v.is_finite())
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Bounds of the grid's four local corners after `transform`.
    pub fn of_grid(grid: &OccupancyGrid, transform: &Transform) -> Self {
        let mut b = Self::empty();
        let (w, h) = grid.extent();
        for (x, y) in [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)] {
            b.include(transform.apply(Point2::new(x, y)));
        }
        b
    }

    fn union(&mut self, other: &Self) {
        self.include(other.min);
        self.include(other.max);
    }
}

/// Merge aligned grids into one canvas.
///
/// Returns `None` when `inputs` is empty or the canvas would not fit in a
/// grid: non-finite bounds, more than `u32::MAX` cells per axis, more than
/// [`MAX_CANVAS_CELLS`] cells in total, or a failed allocation.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(inputs), fields(grids = inputs.len()))
)]
pub fn compose_grids(inputs: &[(&OccupancyGrid, Transform)]) -> Option<OccupancyGrid> {
    let (reference, _) = inputs.first()?;

    let resolution = inputs
        .iter()
        .map(|(g, _)| g.resolution())
        .fold(f64::INFINITY, f64::min);

    let mut bounds = CanvasBounds::empty();
    for (index, (grid, transform)) in inputs.iter().enumerate() {
        let b = CanvasBounds::of_grid(grid, transform);
        if !b.is_finite() {
            log::warn!("grid {index} has non-finite bounds under its transform");
            return None;
        }
        bounds.union(&b);
    }

    let width = canvas_cells(bounds.width(), resolution)?;
    let height = canvas_cells(bounds.height(), resolution)?;
    log::debug!(
        "canvas {}x{} at {:.4} m/cell, min=({:.3}, {:.3})",
        width,
        height,
        resolution,
        bounds.min.x,
        bounds.min.y
    );

    let mut canvas = Canvas {
        width: width as usize,
        height: height as usize,
        resolution,
        min: bounds.min,
        cells: allocate_cells(width, height)?,
    };
    for (grid, transform) in inputs {
        canvas.splat(grid, transform);
    }

    let data = canvas
        .cells
        .into_iter()
        .map(|c| c.unwrap_or(UNKNOWN))
        .collect();
    let origin = reference.origin().displaced(bounds.min.x, bounds.min.y);

    match OccupancyGrid::new(width, height, resolution, origin, data) {
        Ok(grid) => Some(grid),
        Err(err) => {
            log::warn!("merged grid rejected: {err}");
            None
        }
    }
}

fn canvas_cells(span: f64, resolution: f64) -> Option<u32> {
    let n = (span / resolution - SIZE_EPS).ceil();
    if !n.is_finite() || n > u32::MAX as f64 {
        log::warn!("canvas span {span} at resolution {resolution} does not fit");
        return None;
    }
    Some(n.max(0.0) as u32)
}

fn allocate_cells(width: u32, height: u32) -> Option<Vec<Option<i8>>> {
    let n = (width as usize)
        .checked_mul(height as usize)
        .filter(|&n| n <= MAX_CANVAS_CELLS);
    let Some(n) = n else {
        log::warn!("canvas {width}x{height} exceeds {MAX_CANVAS_CELLS} cells");
        return None;
    };
    let mut cells = Vec::new();
    if let Err(err) = cells.try_reserve_exact(n) {
        log::warn!("canvas {width}x{height} allocation failed: {err}");
        return None;
    }
    cells.resize(n, None);
    Some(cells)
}

/// Samples per axis for one source cell so that a coarser, scaled or
/// rotated source leaves no holes in the canvas.
fn subsamples(grid: &OccupancyGrid, transform: &Transform, canvas_resolution: f64) -> usize {
    let ratio = transform.scale() * grid.resolution() / canvas_resolution;
    let mut k = (ratio - 1e-9).ceil().max(1.0) as usize;
    if !transform.is_axis_aligned() {
        k *= 2;
    }
    k.min(MAX_SUBSAMPLES)
}

struct Canvas {
    width: usize,
    height: usize,
    resolution: f64,
    min: Point2<f64>,
    cells: Vec<Option<i8>>,
}

impl Canvas {
    fn splat(&mut self, grid: &OccupancyGrid, transform: &Transform) {
        let k = subsamples(grid, transform, self.resolution);
        let step = grid.resolution() / k as f64;
        let cols = grid.width() as usize;

        for (idx, &value) in grid.data().iter().enumerate() {
            let (col, row) = (idx % cols, idx / cols);
            let x0 = col as f64 * grid.resolution();
            let y0 = row as f64 * grid.resolution();
            for sy in 0..k {
                for sx in 0..k {
                    let local = Point2::new(
                        x0 + (sx as f64 + 0.5) * step,
                        y0 + (sy as f64 + 0.5) * step,
                    );
                    if let Some(dst) = self.index_of(transform.apply(local)) {
                        let slot = &mut self.cells[dst];
                        *slot = Some(match *slot {
                            None => value,
                            Some(current) => current.max(value),
                        });
                    }
                }
            }
        }
    }

    fn index_of(&self, p: Point2<f64>) -> Option<usize> {
        let u = ((p.x - self.min.x) / self.resolution).floor();
        let v = ((p.y - self.min.y) / self.resolution).floor();
        if !(u >= 0.0 && v >= 0.0) || u >= self.width as f64 || v >= self.height as f64 {
            return None;
        }
        Some(v as usize * self.width + u as usize)
    }
}
