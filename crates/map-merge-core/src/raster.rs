use crate::{OccupancyGrid, OCCUPIED_MAX};

/// Intensity assigned to unknown cells; disjoint from the `0..=100`
/// occupancy range.
pub const UNKNOWN_INTENSITY: u8 = 255;

/// Borrowed 8-bit raster, the input type of alignment estimators.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Owned counterpart of [`GrayImageView`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }
}

#[inline]
fn intensity(v: i8) -> u8 {
    if v < 0 {
        UNKNOWN_INTENSITY
    } else {
        v.min(OCCUPIED_MAX) as u8
    }
}

/// Render a grid as a dense 8-bit raster for alignment estimators.
///
/// Unknown cells become [`UNKNOWN_INTENSITY`]; free and occupied cells keep
/// their occupancy value as intensity. No resampling: pixel `(x, y)` is cell
/// `(col, row)`.
pub fn raster_from_grid(grid: &OccupancyGrid) -> GrayImage {
    GrayImage {
        width: grid.width() as usize,
        height: grid.height() as usize,
        data: grid.data().iter().map(|&v| intensity(v)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pose;

    #[test]
    fn maps_tri_state_values() {
        let grid = OccupancyGrid::new(4, 1, 0.05, Pose::IDENTITY, vec![-1, 0, 57, 100])
            .expect("grid");
        let raster = raster_from_grid(&grid);
        assert_eq!(raster.data, vec![UNKNOWN_INTENSITY, 0, 57, 100]);
    }

    #[test]
    fn preserves_shape_and_order() {
        let data: Vec<i8> = (0..12).map(|v| v as i8).collect();
        let grid = OccupancyGrid::new(4, 3, 0.1, Pose::IDENTITY, data).expect("grid");
        let raster = raster_from_grid(&grid);
        assert_eq!((raster.width, raster.height), (4, 3));
        let view = raster.view();
        assert_eq!(view.get(3, 0), Some(3));
        assert_eq!(view.get(1, 2), Some(9));
        assert_eq!(view.get(4, 0), None);
    }

    #[test]
    fn clamps_out_of_range_confidence() {
        let grid =
            OccupancyGrid::new(2, 1, 0.1, Pose::IDENTITY, vec![127, -128]).expect("grid");
        assert_eq!(raster_from_grid(&grid).data, vec![100, UNKNOWN_INTENSITY]);
    }
}
