/// The three orthogonal viewing planes of a medical volume.
///
/// Axis indices below refer to physical (x, y, z) order, while the
/// underlying array is stored `[z, y, x]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plane {
    Axial,
    Coronal,
    Sagittal,
}

impl Plane {
    /// Axis index (x = 0, y = 1, z = 2) of the plane normal.
    pub fn normal_axis(self) -> usize {
        match self {
            Plane::Axial => 2,
            Plane::Coronal => 1,
            Plane::Sagittal => 0,
        }
    }

    /// In-plane (u, v) axis indices, matching the display convention:
    /// axial shows x/y, coronal x/z, sagittal y/z.
    pub fn in_plane_axes(self) -> (usize, usize) {
        match self {
            Plane::Axial => (0, 1),
            Plane::Coronal => (0, 2),
            Plane::Sagittal => (1, 2),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Gaussian,
    Median,
}

/// How vertex densities are sampled from the source volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sampling {
    /// Nearest voxel, nudged half a voxel against the outward normal.
    ///
    /// Surface vertices sit midway between an included and an excluded
    /// voxel; the nudge attributes the density of the material the surface
    /// bounds rather than an average across the boundary.
    #[default]
    NearestInterior,
    /// Trilinear interpolation at the exact vertex position.
    Trilinear,
}
