//! Per-vertex density attribution and region statistics.
//!
//! Densities always come from the *source* intensity volume, not from the
//! windowed or filtered copy used for segmentation, so the values reported
//! to a clinician stay in scanner units.

use rayon::prelude::*;

use crate::enums::Sampling;
use crate::error::{PipelineError, Result};
use crate::interpolator::Interpolator;
use crate::mesh::Mesh;
use crate::roi::IndexBox;
use crate::segment::VolumeMask;
use crate::volume::VolumeGrid;

/// Voxel selection for [`statistics`].
#[derive(Clone, Copy, Debug)]
pub enum StatsRegion<'a> {
    Whole,
    Box(&'a IndexBox),
    Mask(&'a VolumeMask),
}

/// Summary statistics over a region of the intensity volume.
/// A value object: recomputed on demand, never cached across region edits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensityStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub median: f32,
    pub std_dev: f32,
}

/// Attach a density to every mesh vertex by sampling the source volume at
/// the vertex's physical position. Returns a new mesh; the input mesh and
/// the volume are untouched.
pub fn annotate(mesh: &Mesh, volume: &VolumeGrid, sampling: Sampling) -> Mesh {
    if mesh.vertices.is_empty() {
        return mesh.clone();
    }
    let normals = match sampling {
        Sampling::NearestInterior => vertex_normals(mesh),
        Sampling::Trilinear => Vec::new(),
    };

    let densities = mesh
        .vertices
        .par_iter()
        .enumerate()
        .map(|(i, &p)| {
            let idx = volume.physical_to_index(p);
            match sampling {
                Sampling::Trilinear => Interpolator::trilinear(volume.data(), idx),
                Sampling::NearestInterior => {
                    let idx = offset_into_interior(volume, p, normals[i], idx);
                    Interpolator::nearest(volume.data(), idx)
                }
            }
        })
        .collect();

    Mesh {
        vertices: mesh.vertices.clone(),
        faces: mesh.faces.clone(),
        densities,
    }
}

/// Shift a surface sample half a voxel against the outward normal.
///
/// Extracted vertices sit exactly between an included and an excluded
/// voxel; the shift lands the lookup on the included one, so the vertex
/// reports the density of the material whose surface it lies on.
fn offset_into_interior(
    volume: &VolumeGrid,
    p: [f32; 3],
    normal: [f32; 3],
    mut idx: [f32; 3],
) -> [f32; 3] {
    // index-space direction of the normal, accounting for orientation
    let tip = volume.physical_to_index([p[0] + normal[0], p[1] + normal[1], p[2] + normal[2]]);
    for a in 0..3 {
        let d = tip[a] - idx[a];
        if d > 1e-5 {
            idx[a] -= 0.5;
        } else if d < -1e-5 {
            idx[a] += 0.5;
        }
    }
    idx
}

/// Area-weighted vertex normals from the face winding.
fn vertex_normals(mesh: &Mesh) -> Vec<[f32; 3]> {
    let mut normals = vec![[0.0f32; 3]; mesh.vertices.len()];
    for face in &mesh.faces {
        let [a, b, c] = [
            mesh.vertices[face[0] as usize],
            mesh.vertices[face[1] as usize],
            mesh.vertices[face[2] as usize],
        ];
        let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let n = [
            ab[1] * ac[2] - ab[2] * ac[1],
            ab[2] * ac[0] - ab[0] * ac[2],
            ab[0] * ac[1] - ab[1] * ac[0],
        ];
        for &i in face {
            for a in 0..3 {
                normals[i as usize][a] += n[a];
            }
        }
    }
    normals
}

/// Density at the annotated mesh vertex nearest to a physical point.
///
/// The UI layer resolves a click to a physical position; this answers the
/// lookup. Fails with `OutOfRange` when the point lies outside the
/// volume's physical extent, and `EmptyRegion` on a vertex-less mesh.
pub fn probe(mesh: &Mesh, volume: &VolumeGrid, point: [f32; 3]) -> Result<f32> {
    if !volume.contains_physical(point) {
        return Err(PipelineError::OutOfRange);
    }
    let nearest = mesh
        .vertices
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            dist2(a, &point)
                .partial_cmp(&dist2(b, &point))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or(PipelineError::EmptyRegion)?;
    Ok(mesh.densities[nearest.0])
}

fn dist2(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

/// Min/max/mean/median and standard deviation over the selected voxels.
/// Fails with `EmptyRegion` when the region selects nothing.
pub fn statistics(volume: &VolumeGrid, region: StatsRegion<'_>) -> Result<DensityStats> {
    let mut values: Vec<f32> = match region {
        StatsRegion::Whole => volume.data().iter().copied().collect(),
        StatsRegion::Box(b) => {
            let b = b.clamp_to(volume.shape_xyz());
            let mut out = Vec::with_capacity(b.len());
            for z in b.min[2]..b.max[2] {
                for y in b.min[1]..b.max[1] {
                    for x in b.min[0]..b.max[0] {
                        out.push(volume.data()[[z, y, x]]);
                    }
                }
            }
            out
        }
        StatsRegion::Mask(mask) => {
            if mask.dim() != volume.dim() {
                return Err(PipelineError::InvalidParameter(format!(
                    "mask shape {:?} does not match volume shape {:?}",
                    mask.dim(),
                    volume.dim()
                )));
            }
            volume
                .data()
                .iter()
                .zip(mask.data())
                .filter_map(|(&v, &m)| m.then_some(v))
                .collect()
        }
    };

    if values.is_empty() {
        return Err(PipelineError::EmptyRegion);
    }

    values.sort_unstable_by(f32::total_cmp);
    let n = values.len();
    let min = values[0];
    let max = values[n - 1];
    let mean = (values.iter().map(|&v| v as f64).sum::<f64>() / n as f64) as f32;
    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean as f64;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    let std_dev = variance.sqrt() as f32;

    Ok(DensityStats {
        min,
        max,
        mean,
        median,
        std_dev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isosurface::extract;
    use crate::segment::segment;
    use ndarray::Array3;

    /// 8x8x8 zero volume with a 4^3 block of `value` at 2..6 on each axis.
    fn block_volume(value: f32) -> VolumeGrid {
        let data = Array3::from_shape_fn((8, 8, 8), |(z, y, x)| {
            if (2..6).contains(&x) && (2..6).contains(&y) && (2..6).contains(&z) {
                value
            } else {
                0.0
            }
        });
        VolumeGrid::new(data, (1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn interior_sampling_reads_the_material_density() {
        let volume = block_volume(1000.0);
        let mask = segment(&volume, 500.0, None);
        let mesh = extract(&mask, volume.spacing(), volume.origin());
        let annotated = annotate(&mesh, &volume, Sampling::NearestInterior);
        assert_eq!(annotated.densities.len(), annotated.vertices.len());
        for (i, &d) in annotated.densities.iter().enumerate() {
            assert_eq!(d, 1000.0, "vertex {i} sampled outside the block");
        }
    }

    #[test]
    fn trilinear_sampling_straddles_the_boundary() {
        let volume = block_volume(1000.0);
        let mask = segment(&volume, 500.0, None);
        let mesh = extract(&mask, volume.spacing(), volume.origin());
        let annotated = annotate(&mesh, &volume, Sampling::Trilinear);
        // midpoint vertices blend the included and excluded voxel
        for &d in &annotated.densities {
            assert!(d > 0.0 && d < 1000.0);
        }
    }

    #[test]
    fn annotate_leaves_the_input_mesh_alone() {
        let volume = block_volume(700.0);
        let mask = segment(&volume, 500.0, None);
        let mesh = extract(&mask, volume.spacing(), volume.origin());
        let annotated = annotate(&mesh, &volume, Sampling::NearestInterior);
        assert!(mesh.densities.iter().all(|&d| d == 0.0));
        assert_eq!(annotated.vertices, mesh.vertices);
        assert_eq!(annotated.faces, mesh.faces);
    }

    #[test]
    fn probe_returns_the_nearest_vertex_density() {
        let volume = block_volume(850.0);
        let mask = segment(&volume, 500.0, None);
        let mesh = annotate(
            &extract(&mask, volume.spacing(), volume.origin()),
            &volume,
            Sampling::NearestInterior,
        );
        let d = probe(&mesh, &volume, [4.0, 4.0, 1.6]).unwrap();
        assert_eq!(d, 850.0);
    }

    #[test]
    fn probe_rejects_points_outside_the_volume() {
        let volume = block_volume(850.0);
        let mesh = Mesh::default();
        assert!(matches!(
            probe(&mesh, &volume, [100.0, 0.0, 0.0]),
            Err(PipelineError::OutOfRange)
        ));
        // inside the volume but the mesh has no vertices
        assert!(matches!(
            probe(&mesh, &volume, [4.0, 4.0, 4.0]),
            Err(PipelineError::EmptyRegion)
        ));
    }

    #[test]
    fn single_voxel_statistics_collapse() {
        let volume = block_volume(123.0);
        let one = IndexBox {
            min: [3, 3, 3],
            max: [4, 4, 4],
        };
        let stats = statistics(&volume, StatsRegion::Box(&one)).unwrap();
        assert_eq!(stats.min, 123.0);
        assert_eq!(stats.max, 123.0);
        assert_eq!(stats.mean, 123.0);
        assert_eq!(stats.median, 123.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn statistics_over_a_mask() {
        let volume = block_volume(1000.0);
        let mask = segment(&volume, 500.0, None);
        let stats = statistics(&volume, StatsRegion::Mask(&mask)).unwrap();
        assert_eq!(stats.min, 1000.0);
        assert_eq!(stats.max, 1000.0);
        assert_eq!(stats.std_dev, 0.0);

        let whole = statistics(&volume, StatsRegion::Whole).unwrap();
        assert_eq!(whole.min, 0.0);
        assert_eq!(whole.max, 1000.0);
        let included = 4.0f32 * 4.0 * 4.0;
        let expected_mean = 1000.0 * included / 512.0;
        assert!((whole.mean - expected_mean).abs() < 1e-3);
        assert_eq!(whole.median, 0.0);
    }

    #[test]
    fn empty_region_is_an_error() {
        let volume = block_volume(1.0);
        let empty = IndexBox {
            min: [5, 5, 5],
            max: [5, 5, 5],
        };
        assert!(matches!(
            statistics(&volume, StatsRegion::Box(&empty)),
            Err(PipelineError::EmptyRegion)
        ));
        let empty_mask = segment(&volume, 1e9, None);
        assert!(matches!(
            statistics(&volume, StatsRegion::Mask(&empty_mask)),
            Err(PipelineError::EmptyRegion)
        ));
    }
}
