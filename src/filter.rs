//! Pre-segmentation smoothing.
//!
//! Both filters use a replicate border: out-of-range neighbors take the
//! value of the nearest edge voxel, so the output keeps the input shape.
//! Both are deterministic; running the same filter on the same grid twice
//! yields bit-identical results.

use ndarray::{Array3, Zip};

use crate::enums::FilterKind;
use crate::error::{PipelineError, Result};
use crate::volume::VolumeGrid;

/// Smooth a volume with the given kernel size (odd, positive; the cubic
/// neighborhood is `kernel_size` voxels on each edge). Returns a new grid.
pub fn apply(volume: &VolumeGrid, kind: FilterKind, kernel_size: usize) -> Result<VolumeGrid> {
    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(PipelineError::InvalidParameter(format!(
            "kernel size must be an odd positive integer, got {kernel_size}"
        )));
    }
    log::debug!("applying {kind:?} filter, kernel size {kernel_size}");
    let data = match kind {
        FilterKind::Gaussian => gaussian(volume.data(), kernel_size),
        FilterKind::Median => median(volume.data(), kernel_size),
    };
    Ok(volume.with_data(data))
}

/// Normalized 1-D Gaussian kernel with the fixed formula
/// `sigma = kernel_size / 6`, so the kernel radius spans three sigma and
/// the truncated tail is negligible.
fn gaussian_kernel(kernel_size: usize) -> Vec<f32> {
    let sigma = kernel_size as f32 / 6.0;
    let radius = (kernel_size / 2) as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| {
            let t = i as f32 / sigma;
            (-0.5 * t * t).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian: one 1-D convolution per axis.
fn gaussian(data: &Array3<f32>, kernel_size: usize) -> Array3<f32> {
    let kernel = gaussian_kernel(kernel_size);
    let mut out = convolve_axis(data, &kernel, 0);
    out = convolve_axis(&out, &kernel, 1);
    convolve_axis(&out, &kernel, 2)
}

fn convolve_axis(data: &Array3<f32>, kernel: &[f32], axis: usize) -> Array3<f32> {
    let dim = data.dim();
    let extent = [dim.0, dim.1, dim.2][axis] as isize;
    let radius = (kernel.len() / 2) as isize;

    let mut out = Array3::zeros(dim);
    Zip::indexed(&mut out).par_for_each(|(z, y, x), o| {
        let mut idx = [z as isize, y as isize, x as isize];
        let center = idx[axis];
        let mut acc = 0.0f32;
        for (k, &weight) in kernel.iter().enumerate() {
            idx[axis] = (center + k as isize - radius).clamp(0, extent - 1);
            acc += weight * data[[idx[0] as usize, idx[1] as usize, idx[2] as usize]];
        }
        *o = acc;
    });
    out
}

/// Rank-selection median over the cubic neighborhood.
fn median(data: &Array3<f32>, kernel_size: usize) -> Array3<f32> {
    let (nz, ny, nx) = data.dim();
    let radius = (kernel_size / 2) as isize;
    let count = kernel_size * kernel_size * kernel_size;

    let mut out = Array3::zeros(data.dim());
    Zip::indexed(&mut out).par_for_each(|(z, y, x), o| {
        let mut neighborhood = Vec::with_capacity(count);
        for dz in -radius..=radius {
            let sz = (z as isize + dz).clamp(0, nz as isize - 1) as usize;
            for dy in -radius..=radius {
                let sy = (y as isize + dy).clamp(0, ny as isize - 1) as usize;
                for dx in -radius..=radius {
                    let sx = (x as isize + dx).clamp(0, nx as isize - 1) as usize;
                    neighborhood.push(data[[sz, sy, sx]]);
                }
            }
        }
        let mid = count / 2;
        let (_, median, _) = neighborhood.select_nth_unstable_by(mid, f32::total_cmp);
        *o = *median;
    });
    out
}
