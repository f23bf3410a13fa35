use std::path::Path;

use ndarray::Array3;
use volume_mesh::{
    FilterConfig, FilterKind, PipelineParameters, PipelineRunner, StatsRegion, VolumeGrid, density,
    export,
};

/// Demo: segment a synthetic bone-like ball out of a noisy-free background
/// volume and write the result as a printable STL.
#[tokio::main]
async fn main() {
    env_logger::init();

    let n = 64usize;
    let center = (n as f32 - 1.0) / 2.0;
    let radius = n as f32 / 3.0;
    let data = Array3::from_shape_fn((n, n, n), |(z, y, x)| {
        let d2 = [x, y, z]
            .iter()
            .map(|&c| (c as f32 - center).powi(2))
            .sum::<f32>();
        if d2.sqrt() <= radius { 1200.0 } else { 0.0 }
    });
    let volume = VolumeGrid::new(data, (0.5, 0.5, 0.5)).expect("spacing is valid");

    let stats = density::statistics(&volume, StatsRegion::Whole).expect("volume is not empty");
    log::info!(
        "volume range [{}, {}], mean {:.1}",
        stats.min,
        stats.max,
        stats.mean
    );

    let mut runner = PipelineRunner::new(volume);
    let mut params = PipelineParameters::new(600.0);
    params.filter = Some(FilterConfig {
        kind: FilterKind::Gaussian,
        kernel_size: 3,
    });
    params.max_vertices = Some(50_000);

    let mesh = runner
        .request_build(params)
        .mesh()
        .await
        .expect("should have built a mesh from the synthetic ball");
    let (min, max) = mesh.bounding_box().expect("mesh is not empty");
    log::info!(
        "mesh: {} vertices, {} triangles, {:.1} x {:.1} x {:.1} mm",
        mesh.vertices.len(),
        mesh.faces.len(),
        max[0] - min[0],
        max[1] - min[1],
        max[2] - min[2]
    );

    export::write_stl(Path::new("result.stl"), &mesh, "volume-mesh demo")
        .expect("should have written the STL file");
}
