//! Isosurface extraction from a binary mask.
//!
//! Classic marching cubes: every 2x2x2 sample cube straddling the mask
//! boundary is classified by its 8-bit corner-occupancy pattern and
//! triangulated from the standard case table (see [`crate::mc_tables`]).
//! Because the input is binary there is no scalar value to interpolate
//! along a crossing edge; the vertex is placed at the edge midpoint, which
//! is the documented convention throughout this crate.
//!
//! The sample lattice is padded by one layer of excluded samples on every
//! side, so a mask touching the grid border still produces a closed
//! surface. Vertices are emitted directly in physical millimeters
//! (`origin + index * spacing`): a structure spanning 300 voxels at 1 mm
//! spacing yields a 300 mm model.

use std::collections::HashMap;

use crate::mc_tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use crate::mesh::Mesh;
use crate::segment::VolumeMask;

/// Extract the boundary surface of `mask` as a triangle mesh in physical
/// space. An empty mask yields an empty mesh, not an error.
///
/// Shared vertices are deduplicated through an edge-keyed cache, so the
/// result indexes a common vertex buffer and neighboring cells agree
/// exactly on their shared boundary.
pub fn extract(mask: &VolumeMask, spacing: (f32, f32, f32), origin: [f32; 3]) -> Mesh {
    if mask.is_empty() {
        log::debug!("empty mask, emitting empty mesh");
        return Mesh::default();
    }

    let (nz, ny, nx) = mask.dim();
    let (nx, ny, nz) = (nx as i32, ny as i32, nz as i32);

    let mut vertices: Vec<[f32; 3]> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();
    // canonical edge id: (axis, minimum corner of the edge)
    let mut edge_cache: HashMap<(u8, i32, i32, i32), u32> = HashMap::new();

    let midpoint = |a: (i32, i32, i32), b: (i32, i32, i32)| -> [f32; 3] {
        [
            origin[0] + (a.0 + b.0) as f32 * 0.5 * spacing.0,
            origin[1] + (a.1 + b.1) as f32 * 0.5 * spacing.1,
            origin[2] + (a.2 + b.2) as f32 * 0.5 * spacing.2,
        ]
    };

    // cells are padded one step beyond the lattice on every side
    for cz in -1..nz {
        for cy in -1..ny {
            for cx in -1..nx {
                let mut case = 0usize;
                for (i, &(dx, dy, dz)) in CORNER_OFFSETS.iter().enumerate() {
                    // bit set when the corner is outside the mask; with the
                    // table's winding this orients normals outward
                    if !mask.get((cz + dz) as isize, (cy + dy) as isize, (cx + dx) as isize) {
                        case |= 1 << i;
                    }
                }
                let edge_bits = EDGE_TABLE[case];
                if edge_bits == 0 {
                    continue;
                }

                let mut edge_verts = [0u32; 12];
                for (e, &(ca, cb)) in EDGE_CORNERS.iter().enumerate() {
                    if edge_bits & (1 << e) == 0 {
                        continue;
                    }
                    let a = CORNER_OFFSETS[ca];
                    let b = CORNER_OFFSETS[cb];
                    let pa = (cx + a.0, cy + a.1, cz + a.2);
                    let pb = (cx + b.0, cy + b.1, cz + b.2);
                    let axis = if pa.0 != pb.0 {
                        0u8
                    } else if pa.1 != pb.1 {
                        1
                    } else {
                        2
                    };
                    let key = (axis, pa.0.min(pb.0), pa.1.min(pb.1), pa.2.min(pb.2));
                    let index = *edge_cache.entry(key).or_insert_with(|| {
                        vertices.push(midpoint(pa, pb));
                        (vertices.len() - 1) as u32
                    });
                    edge_verts[e] = index;
                }

                for tri in TRI_TABLE[case].chunks(3) {
                    if tri[0] < 0 {
                        break;
                    }
                    faces.push([
                        edge_verts[tri[0] as usize],
                        edge_verts[tri[1] as usize],
                        edge_verts[tri[2] as usize],
                    ]);
                }
            }
        }
    }

    log::debug!(
        "extracted {} vertices, {} triangles",
        vertices.len(),
        faces.len()
    );
    let densities = vec![0.0; vertices.len()];
    Mesh {
        vertices,
        faces,
        densities,
    }
}

/// Guaranteed bound on bounding-box drift under decimation, as a fraction
/// of the longest dimension. Clustering snaps clusters that carry an
/// extreme vertex back onto the original box, so the actual drift is zero;
/// the constant documents the contract callers may rely on.
pub const DECIMATION_TOLERANCE: f32 = 0.01;

/// Reduce vertex count by uniform vertex clustering when the mesh exceeds
/// `max_vertices`. Meshes within budget are returned unchanged.
///
/// The cluster cell is sized from the surface area and grown until the
/// budget is met. Each cluster collapses to the centroid of its vertices,
/// except that components touching the original bounding box are snapped
/// back onto it — a decimated model keeps the exact physical dimensions of
/// the full-resolution one.
pub fn decimate_to_budget(mesh: &Mesh, max_vertices: usize) -> Mesh {
    if mesh.vertices.len() <= max_vertices || max_vertices == 0 {
        return mesh.clone();
    }
    let (bb_min, bb_max) = match mesh.bounding_box() {
        Some(bb) => bb,
        None => return mesh.clone(),
    };
    let longest = (0..3)
        .map(|a| bb_max[a] - bb_min[a])
        .fold(0.0f32, f32::max);
    if longest <= 0.0 {
        return mesh.clone();
    }

    let area: f32 = (0..mesh.faces.len())
        .map(|i| {
            let [a, b, c] = mesh.triangle(i);
            let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let n = [
                ab[1] * ac[2] - ab[2] * ac[1],
                ab[2] * ac[0] - ab[0] * ac[2],
                ab[0] * ac[1] - ab[1] * ac[0],
            ];
            (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt() * 0.5
        })
        .sum();
    // roughly one surviving vertex per surface cell
    let mut cell = (area / max_vertices as f32).sqrt().max(longest * 1e-4);

    for _ in 0..8 {
        let clustered = cluster(mesh, bb_min, bb_max, cell);
        if clustered.vertices.len() <= max_vertices {
            log::debug!(
                "decimated {} -> {} vertices, {} -> {} faces",
                mesh.vertices.len(),
                clustered.vertices.len(),
                mesh.faces.len(),
                clustered.faces.len()
            );
            return clustered;
        }
        cell *= 1.5;
    }
    let clustered = cluster(mesh, bb_min, bb_max, cell);
    log::warn!(
        "decimation converged at {} vertices for a budget of {max_vertices}",
        clustered.vertices.len()
    );
    clustered
}

fn cluster(mesh: &Mesh, bb_min: [f32; 3], bb_max: [f32; 3], cell: f32) -> Mesh {
    let cluster_of = |v: &[f32; 3]| -> (u32, u32, u32) {
        let c = |a: usize| ((v[a] - bb_min[a]) / cell).floor() as u32;
        (c(0), c(1), c(2))
    };

    let mut cluster_index: HashMap<(u32, u32, u32), u32> = HashMap::new();
    let mut remap = vec![0u32; mesh.vertices.len()];
    let mut sums: Vec<[f64; 4]> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    // per-cluster flags: which bbox planes its vertices touch
    let mut touches: Vec<[bool; 6]> = Vec::new();

    for (i, v) in mesh.vertices.iter().enumerate() {
        let id = *cluster_index.entry(cluster_of(v)).or_insert_with(|| {
            sums.push([0.0; 4]);
            counts.push(0);
            touches.push([false; 6]);
            (sums.len() - 1) as u32
        });
        remap[i] = id;
        let s = &mut sums[id as usize];
        s[0] += v[0] as f64;
        s[1] += v[1] as f64;
        s[2] += v[2] as f64;
        s[3] += mesh.densities.get(i).copied().unwrap_or(0.0) as f64;
        counts[id as usize] += 1;
        for a in 0..3 {
            if v[a] == bb_min[a] {
                touches[id as usize][a] = true;
            }
            if v[a] == bb_max[a] {
                touches[id as usize][a + 3] = true;
            }
        }
    }

    let vertices: Vec<[f32; 3]> = sums
        .iter()
        .zip(&counts)
        .zip(&touches)
        .map(|((s, &n), touch)| {
            let inv = 1.0 / n as f64;
            let mut v = [
                (s[0] * inv) as f32,
                (s[1] * inv) as f32,
                (s[2] * inv) as f32,
            ];
            for a in 0..3 {
                if touch[a] {
                    v[a] = bb_min[a];
                }
                if touch[a + 3] {
                    v[a] = bb_max[a];
                }
            }
            v
        })
        .collect();
    let densities: Vec<f32> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| (s[3] / n as f64) as f32)
        .collect();

    let faces: Vec<[u32; 3]> = mesh
        .faces
        .iter()
        .map(|f| [remap[f[0] as usize], remap[f[1] as usize], remap[f[2] as usize]])
        .filter(|f| f[0] != f[1] && f[1] != f[2] && f[0] != f[2])
        .collect();

    Mesh {
        vertices,
        faces,
        densities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment;
    use crate::volume::VolumeGrid;
    use ndarray::Array3;

    /// Mask with a filled axis-aligned block, `true` on `lo..hi` (x, y, z).
    fn block_mask(dim: (usize, usize, usize), lo: [usize; 3], hi: [usize; 3]) -> VolumeMask {
        let data = Array3::from_shape_fn(dim, |(z, y, x)| {
            let p = [x, y, z];
            (0..3).all(|a| p[a] >= lo[a] && p[a] < hi[a])
        });
        VolumeMask::from_array(data)
    }

    fn face_count_for_block(n: usize) -> usize {
        // flat faces + beveled edges + corner facets of the midpoint surface
        12 * (n - 1) * (n - 1) + 24 * (n - 1) + 8
    }

    #[test]
    fn empty_mask_yields_empty_mesh() {
        let grid = VolumeGrid::new(Array3::zeros((4, 4, 4)), (1.0, 1.0, 1.0)).unwrap();
        let mask = segment(&grid, 100.0, None);
        let mesh = extract(&mask, grid.spacing(), grid.origin());
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertices.len(), 0);
        assert_eq!(mesh.faces.len(), 0);
    }

    #[test]
    fn single_voxel_becomes_an_octahedron() {
        let mask = block_mask((3, 3, 3), [1, 1, 1], [2, 2, 2]);
        let mesh = extract(&mask, (1.0, 1.0, 1.0), [0.0; 3]);
        assert_eq!(mesh.faces.len(), 8);
        assert_eq!(mesh.vertices.len(), 6);
        let (min, max) = mesh.bounding_box().unwrap();
        assert_eq!(min, [0.5, 0.5, 0.5]);
        assert_eq!(max, [1.5, 1.5, 1.5]);
    }

    #[test]
    fn filled_cube_has_exact_physical_dimensions() {
        // 10x10x10 voxels at 1 mm spacing must measure 10 mm per axis
        let mask = block_mask((10, 10, 10), [0, 0, 0], [10, 10, 10]);
        let mesh = extract(&mask, (1.0, 1.0, 1.0), [0.0; 3]);
        let (min, max) = mesh.bounding_box().unwrap();
        for a in 0..3 {
            assert_eq!(max[a] - min[a], 10.0);
        }
        assert_eq!(mesh.faces.len(), face_count_for_block(10));
        // closed genus-0 surface: V = F / 2 + 2
        assert_eq!(mesh.vertices.len(), mesh.faces.len() / 2 + 2);
        assert!(mesh.faces_in_range());
    }

    #[test]
    fn anisotropic_spacing_scales_the_mesh() {
        let mask = block_mask((8, 8, 8), [2, 2, 2], [6, 6, 6]);
        let mesh = extract(&mask, (0.5, 1.0, 2.0), [10.0, 0.0, -5.0]);
        let (min, max) = mesh.bounding_box().unwrap();
        assert_eq!(max[0] - min[0], 4.0 * 0.5);
        assert_eq!(max[1] - min[1], 4.0 * 1.0);
        assert_eq!(max[2] - min[2], 4.0 * 2.0);
        // origin shifts the box: x starts at 10 + 1.5 * 0.5
        assert_eq!(min[0], 10.0 + 1.5 * 0.5);
    }

    #[test]
    fn surface_is_watertight() {
        let mask = block_mask((6, 6, 6), [1, 1, 1], [5, 4, 5]);
        let mesh = extract(&mask, (1.0, 1.0, 1.0), [0.0; 3]);
        // every undirected edge must be shared by exactly two triangles
        let mut edge_uses: HashMap<(u32, u32), u32> = HashMap::new();
        for f in &mesh.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                *edge_uses.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        assert!(edge_uses.values().all(|&n| n == 2));
    }

    #[test]
    fn normals_point_outward() {
        let mask = block_mask((5, 5, 5), [1, 1, 1], [4, 4, 4]);
        let mesh = extract(&mask, (1.0, 1.0, 1.0), [0.0; 3]);
        let center = [2.0f32, 2.0, 2.0];
        for i in 0..mesh.faces.len() {
            let tri = mesh.triangle(i);
            let n = crate::mesh::triangle_normal(&tri);
            let centroid = [
                (tri[0][0] + tri[1][0] + tri[2][0]) / 3.0,
                (tri[0][1] + tri[1][1] + tri[2][1]) / 3.0,
                (tri[0][2] + tri[1][2] + tri[2][2]) / 3.0,
            ];
            let outward: f32 = (0..3).map(|a| n[a] * (centroid[a] - center[a])).sum();
            assert!(outward > 0.0, "face {i} winds inward");
        }
    }

    #[test]
    fn mask_on_the_border_still_closes() {
        let mask = block_mask((4, 4, 4), [0, 0, 0], [4, 4, 2]);
        let mesh = extract(&mask, (1.0, 1.0, 1.0), [0.0; 3]);
        assert!(!mesh.is_empty());
        let (min, max) = mesh.bounding_box().unwrap();
        assert_eq!(min[2], -0.5);
        assert_eq!(max[2], 1.5);
    }

    #[test]
    fn decimation_respects_budget_and_dimensions() {
        let mask = block_mask((20, 20, 20), [0, 0, 0], [20, 20, 20]);
        let mesh = extract(&mask, (1.0, 1.0, 1.0), [0.0; 3]);
        let (min0, max0) = mesh.bounding_box().unwrap();
        assert!(mesh.vertices.len() > 500);

        let small = decimate_to_budget(&mesh, 500);
        assert!(small.vertices.len() < mesh.vertices.len());
        assert!(small.faces_in_range());
        assert_eq!(small.densities.len(), small.vertices.len());

        let (min1, max1) = small.bounding_box().unwrap();
        let longest = 20.0f32;
        for a in 0..3 {
            let drift =
                (max1[a] - min1[a] - (max0[a] - min0[a])).abs();
            assert!(drift <= DECIMATION_TOLERANCE * longest);
        }
    }

    #[test]
    fn decimation_is_a_no_op_within_budget() {
        let mask = block_mask((4, 4, 4), [1, 1, 1], [3, 3, 3]);
        let mesh = extract(&mask, (1.0, 1.0, 1.0), [0.0; 3]);
        let same = decimate_to_budget(&mesh, mesh.vertices.len());
        assert_eq!(same, mesh);
    }
}
