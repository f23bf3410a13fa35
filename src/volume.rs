use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;

use crate::enums::Plane;
use crate::error::{PipelineError, Result};

/// A scalar intensity volume in scanner units (Hounsfield-like), together
/// with the metadata needed to place it in physical space.
///
/// Data is stored `[z, y, x]` (depth, height, width) while spacing, origin
/// and all physical coordinates use (x, y, z) order. Loaders are expected to
/// deliver spacing and origin already resolved to millimeters; no unit
/// conversion happens here.
///
/// A grid is immutable once constructed. Every pipeline stage that changes
/// sample values (windowing, filtering) produces a new grid.
#[derive(Clone, Debug, Default)]
pub struct VolumeGrid {
    data: Array3<f32>,
    spacing: (f32, f32, f32),
    origin: [f32; 3],
    orientation: [[f32; 3]; 3],
}

impl VolumeGrid {
    /// Build a grid with its origin at (0, 0, 0) and identity orientation.
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Result<Self> {
        Self::with_placement(data, spacing, [0.0; 3], IDENTITY)
    }

    /// Build a grid with explicit origin and direction cosine matrix.
    pub fn with_placement(
        data: Array3<f32>,
        spacing: (f32, f32, f32),
        origin: [f32; 3],
        orientation: [[f32; 3]; 3],
    ) -> Result<Self> {
        if spacing.0 <= 0.0 || spacing.1 <= 0.0 || spacing.2 <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "spacing components must be positive, got {spacing:?}"
            )));
        }
        Ok(Self {
            data,
            spacing,
            origin,
            orientation,
        })
    }

    /// Build a grid from a flat buffer in `[z, y, x]` layout.
    ///
    /// This is the ingestion boundary for external DICOM/NIfTI loaders.
    pub fn from_shape_vec(
        dim: (usize, usize, usize),
        buffer: Vec<f32>,
        spacing: (f32, f32, f32),
        origin: [f32; 3],
    ) -> Result<Self> {
        let (depth, height, width) = dim;
        if buffer.len() != depth * height * width {
            return Err(PipelineError::InvalidParameter(format!(
                "buffer length {} does not match dimensions {dim:?}",
                buffer.len()
            )));
        }
        let data = Array3::from_shape_vec(dim, buffer)
            .map_err(|e| PipelineError::InvalidParameter(e.to_string()))?;
        Self::with_placement(data, spacing, origin, IDENTITY)
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Dimensions in (x, y, z) order, the convention used by [`crate::roi`].
    pub fn shape_xyz(&self) -> [usize; 3] {
        let (depth, height, width) = self.data.dim();
        [width, height, depth]
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    pub fn origin(&self) -> [f32; 3] {
        self.origin
    }

    pub fn orientation(&self) -> [[f32; 3]; 3] {
        self.orientation
    }

    /// Derive a new grid with the same placement metadata but new samples.
    /// The shapes must agree; stages use this instead of mutating in place.
    pub(crate) fn with_data(&self, data: Array3<f32>) -> Self {
        debug_assert_eq!(data.dim(), self.data.dim());
        Self {
            data,
            spacing: self.spacing,
            origin: self.origin,
            orientation: self.orientation,
        }
    }

    pub fn get_slice_from_axis(&self, index: usize, plane: Plane) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, plane) {
            return None;
        }
        let slice = match plane {
            Plane::Axial => self.data.slice(s![index, .., ..]),
            Plane::Coronal => self.data.slice(s![.., index, ..]),
            Plane::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice)
    }

    pub fn is_valid_index(&self, index: usize, plane: Plane) -> bool {
        let dim = self.shape_xyz();
        index < dim[plane.normal_axis()]
    }

    /// Physical position (mm) of a continuous index-space coordinate.
    ///
    /// `idx` is (x, y, z) ordered; voxel centers sit at integer indices.
    pub fn index_to_physical(&self, idx: [f32; 3]) -> [f32; 3] {
        let local = [
            idx[0] * self.spacing.0,
            idx[1] * self.spacing.1,
            idx[2] * self.spacing.2,
        ];
        let r = &self.orientation;
        [
            self.origin[0] + r[0][0] * local[0] + r[0][1] * local[1] + r[0][2] * local[2],
            self.origin[1] + r[1][0] * local[0] + r[1][1] * local[1] + r[1][2] * local[2],
            self.origin[2] + r[2][0] * local[0] + r[2][1] * local[1] + r[2][2] * local[2],
        ]
    }

    /// Continuous (x, y, z) index-space coordinate of a physical point.
    /// Inverse of [`Self::index_to_physical`]; the direction cosine matrix
    /// is orthonormal, so its transpose is its inverse.
    pub fn physical_to_index(&self, p: [f32; 3]) -> [f32; 3] {
        let d = [
            p[0] - self.origin[0],
            p[1] - self.origin[1],
            p[2] - self.origin[2],
        ];
        let r = &self.orientation;
        [
            (r[0][0] * d[0] + r[1][0] * d[1] + r[2][0] * d[2]) / self.spacing.0,
            (r[0][1] * d[0] + r[1][1] * d[1] + r[2][1] * d[2]) / self.spacing.1,
            (r[0][2] * d[0] + r[1][2] * d[1] + r[2][2] * d[2]) / self.spacing.2,
        ]
    }

    /// Whether a physical point falls inside the volume's extent.
    ///
    /// The extent covers whole voxels: half a spacing step beyond the first
    /// and last voxel centers on each axis, which is also where extracted
    /// surface vertices can lie.
    pub fn contains_physical(&self, p: [f32; 3]) -> bool {
        let idx = self.physical_to_index(p);
        let dim = self.shape_xyz();
        idx.iter()
            .zip(dim.iter())
            .all(|(&i, &n)| i >= -0.5 && i <= n as f32 - 0.5)
    }
}

const IDENTITY: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
