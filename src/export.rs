//! Binary STL export, the interchange format of 3D-printing pipelines.
//!
//! Layout: an 80-byte free-form header (ignored by readers), a little-endian
//! `u32` triangle count, then 50 bytes per triangle: facet normal, three
//! vertices (all `f32` triples) and a zeroed `u16` attribute word.
//! Coordinates are written exactly as they appear in the mesh — millimeters
//! as established at extraction time, with no rescaling.

use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::mesh::{Mesh, triangle_normal};

const HEADER_LEN: usize = 80;
const TRIANGLE_LEN: usize = 50;

/// Serialize a mesh to binary STL bytes.
///
/// Face indices are validated against the vertex buffer. The mesh type
/// upholds that invariant already, so a failure here means a corrupted
/// mesh reached the export boundary; it reports `Encoding` instead of
/// writing a malformed file.
pub fn mesh_to_stl_bytes(mesh: &Mesh, header: &str) -> Result<Vec<u8>> {
    if !mesh.faces_in_range() {
        return Err(PipelineError::Encoding(format!(
            "face references a vertex beyond {}",
            mesh.vertices.len()
        )));
    }
    if mesh.faces.len() > u32::MAX as usize {
        return Err(PipelineError::Encoding(format!(
            "{} triangles exceed the format limit",
            mesh.faces.len()
        )));
    }

    let mut out = Vec::with_capacity(HEADER_LEN + 4 + mesh.faces.len() * TRIANGLE_LEN);

    let mut head = [0u8; HEADER_LEN];
    let name = header.as_bytes();
    let n = name.len().min(HEADER_LEN);
    head[..n].copy_from_slice(&name[..n]);
    out.extend_from_slice(&head);

    out.extend_from_slice(&(mesh.faces.len() as u32).to_le_bytes());

    for i in 0..mesh.faces.len() {
        let tri = mesh.triangle(i);
        let normal = triangle_normal(&tri);
        out.extend_from_slice(bytemuck::bytes_of(&normal));
        for v in &tri {
            out.extend_from_slice(bytemuck::bytes_of(v));
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }

    Ok(out)
}

pub fn write_stl(path: &Path, mesh: &Mesh, header: &str) -> Result<()> {
    let bytes = mesh_to_stl_bytes(mesh, header)?;
    fs::write(path, bytes)?;
    log::info!("wrote {} triangles to {}", mesh.faces.len(), path.display());
    Ok(())
}

/// Parse binary STL bytes back into a triangle-soup mesh (three vertices
/// per face, densities zeroed). Fails with `Encoding` on a truncated
/// stream or a count that disagrees with the payload length.
pub fn read_stl(bytes: &[u8]) -> Result<Mesh> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(PipelineError::Encoding(format!(
            "stream of {} bytes is shorter than the fixed header",
            bytes.len()
        )));
    }
    let mut quad = [0u8; 4];
    quad.copy_from_slice(&bytes[HEADER_LEN..HEADER_LEN + 4]);
    let count = u32::from_le_bytes(quad) as usize;
    let expected = HEADER_LEN + 4 + count * TRIANGLE_LEN;
    if bytes.len() != expected {
        return Err(PipelineError::Encoding(format!(
            "expected {expected} bytes for {count} triangles, got {}",
            bytes.len()
        )));
    }

    let mut vertices = Vec::with_capacity(count * 3);
    let mut faces = Vec::with_capacity(count);
    for t in 0..count {
        let base = HEADER_LEN + 4 + t * TRIANGLE_LEN;
        // skip the stored normal; it is derivable from the winding
        for corner in 0..3 {
            let at = base + 12 + corner * 12;
            let mut v = [0.0f32; 3];
            for a in 0..3 {
                quad.copy_from_slice(&bytes[at + a * 4..at + a * 4 + 4]);
                v[a] = f32::from_le_bytes(quad);
            }
            vertices.push(v);
        }
        let i = (t * 3) as u32;
        faces.push([i, i + 1, i + 2]);
    }

    let densities = vec![0.0; vertices.len()];
    Ok(Mesh {
        vertices,
        faces,
        densities,
    })
}
