//! # volume-mesh
//!
//! This crate turns a volumetric CT/MRI scan into a patient-specific,
//! physically-scaled 3D surface model suitable for inspection and printing.

//!
//! It covers the processing core of such a system: intensity windowing
//! with the usual clinical presets, region-of-interest handling kept
//! consistent across the three medical axes
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! plus Gaussian/median pre-filtering, threshold segmentation, marching
//! cubes surface extraction in millimeter units, per-vertex density
//! attribution and binary STL export. Loading DICOM/NIfTI series and any
//! kind of rendering are left to the embedding application; the ingestion
//! boundary is [`VolumeGrid::from_shape_vec`] over an already-decoded
//! buffer with resolved spacing.
//!
//! Potentially expensive runs execute on background workers through
//! [`PipelineRunner`]; only the most recently requested run may deliver a
//! mesh, and replacing the dataset waits for in-flight runs, so a viewer
//! never renders a stale or torn result.
//!
//!   Contributions are highly welcome!
//!
//! # Examples
//!
//! ## Building a mesh from a synthetic volume
//!
//! Threshold a volume at 500 HU, extract the surface and write it as STL:
//!
//! ```
//! # use volume_mesh::{PipelineParameters, CancelToken, VolumeGrid, run_pipeline, export};
//! # use ndarray::Array3;
//! let data = Array3::from_shape_fn((20, 20, 20), |(z, y, x)| {
//!     if [x, y, z].iter().all(|&c| (7..13).contains(&c)) {
//!         1000.0
//!     } else {
//!         0.0
//!     }
//! });
//! let volume = VolumeGrid::new(data, (1.0, 1.0, 1.0)).expect("valid spacing");
//! let mesh = run_pipeline(
//!     &volume,
//!     &PipelineParameters::new(500.0),
//!     &CancelToken::default(),
//! )
//! .expect("pipeline should succeed");
//! let stl = export::mesh_to_stl_bytes(&mesh, "synthetic cube").expect("valid mesh");
//! assert!(!stl.is_empty());
//! ```

pub mod density;
pub mod enums;
pub mod error;
pub mod export;
pub mod filter;
mod interpolator;
pub mod isosurface;
pub mod mc_tables;
pub mod mesh;
pub mod pipeline;
pub mod roi;
pub mod segment;
pub mod volume;
pub mod window;

pub use crate::density::{DensityStats, StatsRegion};
pub use crate::enums::{FilterKind, Plane, Sampling};
pub use crate::error::{PipelineError, Result};
pub use crate::mesh::Mesh;
pub use crate::pipeline::{
    BuildHandle, CancelToken, FilterConfig, PipelineParameters, PipelineRunner, run_pipeline,
};
pub use crate::roi::{IndexBox, RoiRegion, RoiShape};
pub use crate::segment::VolumeMask;
pub use crate::volume::VolumeGrid;
pub use crate::window::{WINDOW_PRESETS, Window};
