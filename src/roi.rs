//! Region-of-interest handling across the three orthogonal planes.
//!
//! A region is drawn on one plane as a rectangle or closed polygon in that
//! plane's 2D index coordinates. [`to_volume_slab`] turns it into an
//! axis-aligned 3D index box (extruded one voxel along the plane normal);
//! [`project_to_plane`] re-expresses it on another plane so all three views
//! stay consistent. Both are pure functions; no ROI state lives here.
//!
//! Projecting a polygonal region only carries its bounding box, so in-plane
//! shape detail is lost for non-axis-aligned outlines. That is an accepted
//! precision limit of cross-plane synchronization, not a defect.

use crate::enums::Plane;
use crate::error::{PipelineError, Result};

/// Half-open axis-aligned box in voxel indices, (x, y, z) ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexBox {
    pub min: [usize; 3],
    /// Exclusive upper corner.
    pub max: [usize; 3],
}

impl IndexBox {
    pub fn contains(&self, ix: usize, iy: usize, iz: usize) -> bool {
        let p = [ix, iy, iz];
        (0..3).all(|a| p[a] >= self.min[a] && p[a] < self.max[a])
    }

    /// Number of voxels covered.
    pub fn len(&self) -> usize {
        (0..3).map(|a| self.max[a].saturating_sub(self.min[a])).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intersect with a grid of the given (x, y, z) dimensions.
    pub fn clamp_to(&self, dim: [usize; 3]) -> IndexBox {
        let mut out = *self;
        for a in 0..3 {
            out.min[a] = out.min[a].min(dim[a]);
            out.max[a] = out.max[a].min(dim[a]);
        }
        out
    }

    /// Whether `other` covers no voxel outside `self`.
    pub fn contains_box(&self, other: &IndexBox) -> bool {
        other.is_empty()
            || (0..3).all(|a| other.min[a] >= self.min[a] && other.max[a] <= self.max[a])
    }
}

/// 2D outline in a plane's (u, v) index coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum RoiShape {
    /// Axis-aligned rectangle; `max` is the last contained index (inclusive).
    Rect { min: [f32; 2], max: [f32; 2] },
    /// Closed polygon, vertices in drawing order.
    Polygon(Vec<[f32; 2]>),
}

impl RoiShape {
    /// In-plane bounding box as (min, max), inclusive corners.
    fn bounding_box(&self) -> Result<([f32; 2], [f32; 2])> {
        match self {
            RoiShape::Rect { min, max } => {
                if min[0] > max[0] || min[1] > max[1] {
                    return Err(PipelineError::InvalidParameter(format!(
                        "rectangle min {min:?} exceeds max {max:?}"
                    )));
                }
                Ok((*min, *max))
            }
            RoiShape::Polygon(vertices) => {
                if vertices.len() < 3 {
                    return Err(PipelineError::InvalidParameter(format!(
                        "polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    )));
                }
                let mut min = vertices[0];
                let mut max = vertices[0];
                for v in vertices {
                    for a in 0..2 {
                        min[a] = min[a].min(v[a]);
                        max[a] = max[a].max(v[a]);
                    }
                }
                Ok((min, max))
            }
        }
    }
}

/// A region drawn on one of the three orthogonal planes.
#[derive(Clone, Debug, PartialEq)]
pub struct RoiRegion {
    pub plane: Plane,
    /// Slice index along the plane normal.
    pub slice: usize,
    pub shape: RoiShape,
}

/// Convert a 2D region into the minimal 3D index box containing its
/// bounding box, extruded one voxel along the plane normal at the region's
/// slice. `dim` is the grid shape in (x, y, z) order.
pub fn to_volume_slab(region: &RoiRegion, dim: [usize; 3]) -> Result<IndexBox> {
    let normal = region.plane.normal_axis();
    let (u_axis, v_axis) = region.plane.in_plane_axes();

    if region.slice >= dim[normal] {
        return Err(PipelineError::OutOfBounds(format!(
            "slice {} outside [0, {}) on the {:?} plane",
            region.slice, dim[normal], region.plane
        )));
    }

    let (lo, hi) = region.shape.bounding_box()?;
    for (axis, (l, h)) in [u_axis, v_axis].into_iter().zip([(lo[0], hi[0]), (lo[1], hi[1])]) {
        if l < 0.0 || h >= dim[axis] as f32 {
            return Err(PipelineError::OutOfBounds(format!(
                "in-plane extent [{l}, {h}] outside [0, {})",
                dim[axis]
            )));
        }
    }

    let mut min = [0usize; 3];
    let mut max = [0usize; 3];
    min[u_axis] = lo[0].floor() as usize;
    max[u_axis] = hi[0].floor() as usize + 1;
    min[v_axis] = lo[1].floor() as usize;
    max[v_axis] = hi[1].floor() as usize + 1;
    min[normal] = region.slice;
    max[normal] = region.slice + 1;
    Ok(IndexBox { min, max })
}

/// Re-express a region on a different plane by intersecting its index box
/// with that plane at `target_slice`.
///
/// Fails with `OutOfBounds` when the target slice lies outside the grid or
/// misses the region's box along the target normal, so a caller never
/// silently renders an ROI on a slice it does not intersect.
pub fn project_to_plane(
    region: &RoiRegion,
    target_plane: Plane,
    target_slice: usize,
    dim: [usize; 3],
) -> Result<RoiRegion> {
    let slab = to_volume_slab(region, dim)?;
    let normal = target_plane.normal_axis();

    if target_slice >= dim[normal] {
        return Err(PipelineError::OutOfBounds(format!(
            "slice {target_slice} outside [0, {}) on the {target_plane:?} plane",
            dim[normal]
        )));
    }
    if target_slice < slab.min[normal] || target_slice >= slab.max[normal] {
        return Err(PipelineError::OutOfBounds(format!(
            "slice {target_slice} does not intersect the region (spans {}..{} on the {target_plane:?} normal)",
            slab.min[normal], slab.max[normal]
        )));
    }

    let (u_axis, v_axis) = target_plane.in_plane_axes();
    Ok(RoiRegion {
        plane: target_plane,
        slice: target_slice,
        shape: RoiShape::Rect {
            min: [slab.min[u_axis] as f32, slab.min[v_axis] as f32],
            max: [(slab.max[u_axis] - 1) as f32, (slab.max[v_axis] - 1) as f32],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIM: [usize; 3] = [64, 48, 32];

    fn axial_rect() -> RoiRegion {
        RoiRegion {
            plane: Plane::Axial,
            slice: 10,
            shape: RoiShape::Rect {
                min: [4.0, 6.0],
                max: [20.0, 30.0],
            },
        }
    }

    #[test]
    fn slab_extrudes_one_voxel_along_the_normal() {
        let slab = to_volume_slab(&axial_rect(), DIM).unwrap();
        assert_eq!(slab.min, [4, 6, 10]);
        assert_eq!(slab.max, [21, 31, 11]);
        assert_eq!(slab.len(), 17 * 25);
    }

    #[test]
    fn polygon_uses_its_bounding_box() {
        let region = RoiRegion {
            plane: Plane::Coronal,
            slice: 5,
            shape: RoiShape::Polygon(vec![[10.5, 3.0], [15.0, 8.5], [12.0, 12.0]]),
        };
        let slab = to_volume_slab(&region, DIM).unwrap();
        // coronal in-plane axes are x and z, normal is y
        assert_eq!(slab.min, [10, 5, 3]);
        assert_eq!(slab.max, [16, 6, 13]);
    }

    #[test]
    fn out_of_bounds_vertices_are_rejected() {
        let mut region = axial_rect();
        region.shape = RoiShape::Rect {
            min: [-1.0, 0.0],
            max: [5.0, 5.0],
        };
        assert!(matches!(
            to_volume_slab(&region, DIM),
            Err(PipelineError::OutOfBounds(_))
        ));

        region.shape = RoiShape::Rect {
            min: [0.0, 0.0],
            max: [64.0, 5.0],
        };
        assert!(to_volume_slab(&region, DIM).is_err());

        region.shape = RoiShape::Rect {
            min: [0.0, 0.0],
            max: [5.0, 5.0],
        };
        region.slice = 32;
        assert!(to_volume_slab(&region, DIM).is_err());
    }

    #[test]
    fn degenerate_polygon_is_invalid() {
        let region = RoiRegion {
            plane: Plane::Axial,
            slice: 0,
            shape: RoiShape::Polygon(vec![[1.0, 1.0], [2.0, 2.0]]),
        };
        assert!(matches!(
            to_volume_slab(&region, DIM),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn projection_keeps_views_consistent() {
        let region = axial_rect();
        let slab = to_volume_slab(&region, DIM).unwrap();

        let coronal = project_to_plane(&region, Plane::Coronal, 8, DIM).unwrap();
        assert_eq!(coronal.plane, Plane::Coronal);
        // x extent carried over, z extent is the one-voxel extrusion
        assert_eq!(
            coronal.shape,
            RoiShape::Rect {
                min: [4.0, 10.0],
                max: [20.0, 10.0],
            }
        );

        let back = to_volume_slab(&coronal, DIM).unwrap();
        assert!(slab.contains_box(&back));
    }

    #[test]
    fn double_projection_never_gains_extent() {
        let region = axial_rect();
        let original = to_volume_slab(&region, DIM).unwrap();

        let first = project_to_plane(&region, Plane::Sagittal, 12, DIM).unwrap();
        let second = project_to_plane(&first, Plane::Coronal, 10, DIM).unwrap();
        let derived = to_volume_slab(&second, DIM).unwrap();
        assert!(original.contains_box(&derived));
    }

    #[test]
    fn projection_misses_are_reported() {
        let region = axial_rect();
        // axial region sits on slice 10; the axial projection only exists there
        assert!(project_to_plane(&region, Plane::Axial, 11, DIM).is_err());
        assert!(project_to_plane(&region, Plane::Axial, 10, DIM).is_ok());
        // coronal normal is y, region spans y 6..31
        assert!(project_to_plane(&region, Plane::Coronal, 5, DIM).is_err());
        assert!(project_to_plane(&region, Plane::Coronal, 48, DIM).is_err());
    }
}
