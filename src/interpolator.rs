use ndarray::Array3;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Trilinear interpolation at a continuous (x, y, z) index coordinate.
    /// Coordinates clamp to the valid range, replicating border voxels.
    pub(crate) fn trilinear(data: &Array3<f32>, idx: [f32; 3]) -> f32 {
        let (nz, ny, nx) = data.dim();
        let x = idx[0].clamp(0.0, (nx - 1) as f32);
        let y = idx[1].clamp(0.0, (ny - 1) as f32);
        let z = idx[2].clamp(0.0, (nz - 1) as f32);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(nx - 1);
        let y1 = (y0 + 1).min(ny - 1);
        let z1 = (z0 + 1).min(nz - 1);

        let dx = x - x0 as f32;
        let dy = y - y0 as f32;
        let dz = z - z0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v000 = data[[z0, y0, x0]];
        let v001 = data[[z0, y0, x1]];
        let v010 = data[[z0, y1, x0]];
        let v011 = data[[z0, y1, x1]];
        let v100 = data[[z1, y0, x0]];
        let v101 = data[[z1, y0, x1]];
        let v110 = data[[z1, y1, x0]];
        let v111 = data[[z1, y1, x1]];

        let v00 = v000.mul_add(one_minus_dx, v001 * dx);
        let v01 = v010.mul_add(one_minus_dx, v011 * dx);
        let v10 = v100.mul_add(one_minus_dx, v101 * dx);
        let v11 = v110.mul_add(one_minus_dx, v111 * dx);

        let v0 = v00.mul_add(one_minus_dy, v01 * dy);
        let v1 = v10.mul_add(one_minus_dy, v11 * dy);

        v0.mul_add(1.0 - dz, v1 * dz)
    }

    /// Nearest-voxel lookup at a continuous (x, y, z) index coordinate.
    pub(crate) fn nearest(data: &Array3<f32>, idx: [f32; 3]) -> f32 {
        let (nz, ny, nx) = data.dim();
        let x = idx[0].round().clamp(0.0, (nx - 1) as f32) as usize;
        let y = idx[1].round().clamp(0.0, (ny - 1) as f32) as usize;
        let z = idx[2].round().clamp(0.0, (nz - 1) as f32) as usize;
        data[[z, y, x]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trilinear_matches_samples_at_voxel_centers() {
        let data = Array3::from_shape_fn((3, 3, 3), |(z, y, x)| (z * 9 + y * 3 + x) as f32);
        for z in 0..3 {
            for y in 0..3 {
                for x in 0..3 {
                    let v = Interpolator::trilinear(&data, [x as f32, y as f32, z as f32]);
                    assert_eq!(v, data[[z, y, x]]);
                }
            }
        }
    }

    #[test]
    fn trilinear_blends_linearly_between_voxels() {
        let mut data = Array3::zeros((1, 1, 2));
        data[[0, 0, 1]] = 100.0;
        let v = Interpolator::trilinear(&data, [0.25, 0.0, 0.0]);
        assert!((v - 25.0).abs() < 1e-4);
    }

    #[test]
    fn coordinates_clamp_at_the_border() {
        let mut data = Array3::zeros((2, 2, 2));
        data[[0, 0, 0]] = 40.0;
        assert_eq!(Interpolator::trilinear(&data, [-3.0, -3.0, -3.0]), 40.0);
        assert_eq!(Interpolator::nearest(&data, [-0.4, 0.0, 0.0]), 40.0);
    }
}
