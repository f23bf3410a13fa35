use ndarray::{Array3, Zip};

use crate::roi::IndexBox;
use crate::volume::VolumeGrid;

/// Binary inclusion mask congruent in shape to the grid it was derived
/// from. Always recomputed from its inputs, never edited in place.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeMask {
    data: Array3<bool>,
}

impl VolumeMask {
    pub(crate) fn from_array(data: Array3<bool>) -> Self {
        Self { data }
    }

    /// Dimensions (depth, height, width), matching the source grid.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<bool> {
        &self.data
    }

    /// Included-voxel lookup with `[z, y, x]` indices; out-of-range counts
    /// as excluded, which is what closes extracted surfaces at the borders.
    pub fn get(&self, z: isize, y: isize, x: isize) -> bool {
        let (nz, ny, nx) = self.data.dim();
        if z < 0 || y < 0 || x < 0 {
            return false;
        }
        let (z, y, x) = (z as usize, y as usize, x as usize);
        if z >= nz || y >= ny || x >= nx {
            return false;
        }
        self.data[[z, y, x]]
    }

    pub fn true_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }
}

/// Mark every voxel whose value is at or above `threshold`, optionally
/// restricted to an index box (clamped to the grid).
///
/// An all-false mask is a legitimate result: it is logged and flows through
/// the rest of the pipeline as an empty mesh rather than an error.
pub fn segment(volume: &VolumeGrid, threshold: f32, region: Option<&IndexBox>) -> VolumeMask {
    let region = region.map(|r| r.clamp_to(volume.shape_xyz()));

    let mut data = Array3::from_elem(volume.dim(), false);
    Zip::indexed(&mut data)
        .and(volume.data())
        .par_for_each(|(z, y, x), m, &v| {
            *m = v >= threshold
                && region.as_ref().is_none_or(|r| r.contains(x, y, z));
        });

    let mask = VolumeMask::from_array(data);
    if mask.is_empty() {
        log::warn!("threshold {threshold} matched no voxels");
    } else {
        log::debug!(
            "threshold {threshold} matched {} of {} voxels",
            mask.true_count(),
            volume.data().len()
        );
    }
    mask
}
