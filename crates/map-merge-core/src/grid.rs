//! Occupancy grid type.

use crate::Pose;

/// Canonical value for a cell that was never observed.
pub const UNKNOWN: i8 = -1;
/// Value for an observed, traversable cell.
pub const FREE: i8 = 0;
/// Highest occupancy confidence.
pub const OCCUPIED_MAX: i8 = 100;

/// Three-way interpretation of a raw cell value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellState {
    Unknown,
    Free,
    /// Occupied with confidence in `1..=100` (larger raw values are clamped).
    Occupied(u8),
}

impl CellState {
    #[inline]
    pub fn from_raw(v: i8) -> Self {
        match v {
            v if v < 0 => CellState::Unknown,
            0 => CellState::Free,
            v => CellState::Occupied(v.min(OCCUPIED_MAX) as u8),
        }
    }

    #[inline]
    pub fn to_raw(self) -> i8 {
        match self {
            CellState::Unknown => UNKNOWN,
            CellState::Free => FREE,
            CellState::Occupied(c) => c.clamp(1, OCCUPIED_MAX as u8) as i8,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GridError {
    #[error("cell buffer has {got} cells, expected {width}x{height}")]
    BufferSize { width: u32, height: u32, got: usize },
    #[error("resolution must be finite and > 0 (got {0})")]
    InvalidResolution(f64),
    #[error("grid dimensions {width}x{height} overflow")]
    TooLarge { width: u32, height: u32 },
}

/// Row-major occupancy grid.
///
/// Cell `(col, row)` lives at `data[row * width + col]` and covers
/// `[col·res, (col+1)·res) × [row·res, (row+1)·res)` of the grid's local
/// frame. `origin` places the outer corner of cell `(0, 0)` in the map frame.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    resolution: f64,
    origin: Pose,
    data: Vec<i8>,
}

impl OccupancyGrid {
    /// Validate and build a grid from its raw buffer.
    pub fn new(
        width: u32,
        height: u32,
        resolution: f64,
        origin: Pose,
        data: Vec<i8>,
    ) -> Result<Self, GridError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution));
        }
        let expected = cell_count(width, height)?;
        if data.len() != expected {
            return Err(GridError::BufferSize {
                width,
                height,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            resolution,
            origin,
            data,
        })
    }

    /// Grid with every cell unknown.
    pub fn unknown(
        width: u32,
        height: u32,
        resolution: f64,
        origin: Pose,
    ) -> Result<Self, GridError> {
        let n = cell_count(width, height)?;
        Self::new(width, height, resolution, origin, vec![UNKNOWN; n])
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    #[inline]
    pub fn origin(&self) -> Pose {
        self.origin
    }

    #[inline]
    pub fn data(&self) -> &[i8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<i8> {
        self.data
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw value at `(col, row)`, `None` outside the grid.
    #[inline]
    pub fn get(&self, col: u32, row: u32) -> Option<i8> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }

    #[inline]
    pub fn state(&self, col: u32, row: u32) -> Option<CellState> {
        self.get(col, row).map(CellState::from_raw)
    }

    /// Physical extent `(width·res, height·res)` of the local frame.
    #[inline]
    pub fn extent(&self) -> (f64, f64) {
        (
            self.width as f64 * self.resolution,
            self.height as f64 * self.resolution,
        )
    }
}

fn cell_count(width: u32, height: u32) -> Result<usize, GridError> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or(GridError::TooLarge { width, height })
}
