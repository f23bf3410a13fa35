//! Pipeline orchestration: parameters, the synchronous stage chain, and a
//! background runner that keeps interactive callers responsive.
//!
//! The chain itself is a pure function over its inputs; all session state
//! lives in the immutable [`PipelineParameters`] value and the runner's
//! owned volume reference. Runs never mutate shared data — each produces a
//! fresh, independently-owned [`Mesh`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::density;
use crate::enums::{FilterKind, Sampling};
use crate::error::{PipelineError, Result};
use crate::filter;
use crate::isosurface;
use crate::mesh::Mesh;
use crate::roi::{self, RoiRegion};
use crate::segment;
use crate::volume::VolumeGrid;
use crate::window::{self, Window};

#[derive(Clone, Copy, Debug)]
pub struct FilterConfig {
    pub kind: FilterKind,
    pub kernel_size: usize,
}

/// Everything one pipeline run depends on, fixed at request time.
#[derive(Clone, Debug)]
pub struct PipelineParameters {
    /// Optional window/level remap applied before filtering; when set, the
    /// threshold refers to the remapped `[0, 255]` range.
    pub window: Option<Window>,
    pub filter: Option<FilterConfig>,
    pub threshold: f32,
    /// Restrict segmentation to the slab derived from this region.
    pub roi: Option<RoiRegion>,
    pub sampling: Sampling,
    /// Decimation kicks in above this vertex count.
    pub max_vertices: Option<usize>,
}

impl PipelineParameters {
    pub fn new(threshold: f32) -> Self {
        Self {
            window: None,
            filter: None,
            threshold,
            roi: None,
            sampling: Sampling::default(),
            max_vertices: None,
        }
    }
}

/// Cooperative cancellation flag, checked between pipeline stages.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run the full chain window -> filter -> segment -> extract -> annotate.
///
/// Cancellation is checked at every stage boundary; a cancelled run drops
/// its partial buffers and returns `Cancelled` rather than a partial mesh.
/// An empty mask is not an error — the result is simply an empty mesh.
pub fn run_pipeline(
    volume: &VolumeGrid,
    params: &PipelineParameters,
    cancel: &CancelToken,
) -> Result<Mesh> {
    let roi_slab = params
        .roi
        .as_ref()
        .map(|r| roi::to_volume_slab(r, volume.shape_xyz()))
        .transpose()?;

    cancel.checkpoint()?;
    let mut processed: Option<VolumeGrid> = None;
    if let Some(w) = params.window {
        processed = Some(window::apply(volume, w)?);
    }

    cancel.checkpoint()?;
    if let Some(f) = params.filter {
        let source = processed.as_ref().unwrap_or(volume);
        processed = Some(filter::apply(source, f.kind, f.kernel_size)?);
    }

    cancel.checkpoint()?;
    let source = processed.as_ref().unwrap_or(volume);
    let mask = segment::segment(source, params.threshold, roi_slab.as_ref());
    drop(processed);

    cancel.checkpoint()?;
    let mut mesh = isosurface::extract(&mask, volume.spacing(), volume.origin());
    if let Some(budget) = params.max_vertices {
        mesh = isosurface::decimate_to_budget(&mesh, budget);
    }

    cancel.checkpoint()?;
    // densities always come from the unprocessed source volume
    Ok(density::annotate(&mesh, volume, params.sampling))
}

/// Handle to a requested build; resolves to the mesh or a classified error.
pub struct BuildHandle {
    generation: u64,
    cancel: CancelToken,
    rx: oneshot::Receiver<Result<Mesh>>,
}

impl BuildHandle {
    /// Monotonic id of this request; later requests supersede earlier ones.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the result. A superseded or cancelled run yields
    /// `Cancelled`, never a stale mesh.
    pub async fn mesh(self) -> Result<Mesh> {
        self.rx.await.unwrap_or(Err(PipelineError::Cancelled))
    }
}

struct InFlight {
    cancel: CancelToken,
    join: JoinHandle<()>,
}

/// Schedules pipeline runs on blocking worker threads and owns the volume
/// they read.
///
/// The grid is shared read-only through an `Arc`: every run clones the
/// reference at start, so replacing the dataset can never expose a torn
/// volume to a run already in flight. Only the most recent request is
/// allowed to deliver a mesh (last-request-wins).
pub struct PipelineRunner {
    volume: Arc<VolumeGrid>,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl PipelineRunner {
    pub fn new(volume: VolumeGrid) -> Self {
        Self {
            volume: Arc::new(volume),
            generation: 0,
            in_flight: None,
        }
    }

    pub fn volume(&self) -> &VolumeGrid {
        &self.volume
    }

    /// Start a build for the given parameters, cancelling any run still in
    /// flight. Must be called from within a tokio runtime.
    pub fn request_build(&mut self, params: PipelineParameters) -> BuildHandle {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel.cancel();
        }
        self.generation += 1;
        let generation = self.generation;

        let cancel = CancelToken::default();
        let worker_cancel = cancel.clone();
        let volume = Arc::clone(&self.volume);
        let (tx, rx) = oneshot::channel();

        let join = tokio::task::spawn_blocking(move || {
            log::debug!("pipeline run {generation} started");
            let result = run_pipeline(&volume, &params, &worker_cancel);
            // re-check after the run: a supersede that raced completion
            // must still discard the result
            let result = if worker_cancel.is_cancelled() {
                Err(PipelineError::Cancelled)
            } else {
                result
            };
            match &result {
                Ok(mesh) => log::debug!(
                    "pipeline run {generation} finished with {} triangles",
                    mesh.faces.len()
                ),
                Err(e) => log::debug!("pipeline run {generation} ended: {e}"),
            }
            let _ = tx.send(result);
        });

        self.in_flight = Some(InFlight {
            cancel: cancel.clone(),
            join,
        });
        BuildHandle {
            generation,
            cancel,
            rx,
        }
    }

    /// Replace the dataset. The in-flight run (if any) is cancelled and
    /// awaited before the reference is swapped, so no run straddles two
    /// volumes.
    pub async fn set_volume(&mut self, volume: VolumeGrid) {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel.cancel();
            let _ = previous.join.await;
        }
        self.volume = Arc::new(volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// Zero volume with a centered block of the given value.
    fn block_volume(n: usize, lo: usize, hi: usize, value: f32) -> VolumeGrid {
        let data = Array3::from_shape_fn((n, n, n), |(z, y, x)| {
            let p = [x, y, z];
            if p.iter().all(|&c| c >= lo && c < hi) {
                value
            } else {
                0.0
            }
        });
        VolumeGrid::new(data, (1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn synchronous_chain_produces_an_annotated_mesh() {
        let volume = block_volume(12, 3, 9, 1000.0);
        let params = PipelineParameters::new(500.0);
        let mesh = run_pipeline(&volume, &params, &CancelToken::default()).unwrap();
        assert!(!mesh.is_empty());
        assert!(mesh.densities.iter().all(|&d| d == 1000.0));
    }

    #[test]
    fn cancelled_token_stops_the_chain() {
        let volume = block_volume(8, 2, 6, 900.0);
        let cancel = CancelToken::default();
        cancel.cancel();
        assert!(matches!(
            run_pipeline(&volume, &PipelineParameters::new(500.0), &cancel),
            Err(PipelineError::Cancelled)
        ));
    }

    #[test]
    fn parameter_errors_halt_the_run() {
        let volume = block_volume(8, 2, 6, 900.0);
        let mut params = PipelineParameters::new(500.0);
        params.filter = Some(FilterConfig {
            kind: FilterKind::Gaussian,
            kernel_size: 4,
        });
        assert!(matches!(
            run_pipeline(&volume, &params, &CancelToken::default()),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_mask_flows_through_as_an_empty_mesh() {
        let volume = block_volume(8, 2, 6, 100.0);
        let mesh = run_pipeline(
            &volume,
            &PipelineParameters::new(5000.0),
            &CancelToken::default(),
        )
        .unwrap();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertices.len(), 0);
    }

    #[tokio::test]
    async fn runner_delivers_the_requested_mesh() {
        let mut runner = PipelineRunner::new(block_volume(12, 3, 9, 1000.0));
        let handle = runner.request_build(PipelineParameters::new(500.0));
        assert_eq!(handle.generation(), 1);
        let mesh = handle.mesh().await.unwrap();
        let (min, max) = mesh.bounding_box().unwrap();
        for a in 0..3 {
            assert_eq!(max[a] - min[a], 6.0);
        }
    }

    #[tokio::test]
    async fn newer_requests_supersede_older_ones() {
        let mut runner = PipelineRunner::new(block_volume(32, 4, 28, 1000.0));
        let first = runner.request_build(PipelineParameters::new(500.0));
        let second = runner.request_build(PipelineParameters::new(500.0));
        assert!(second.generation() > first.generation());

        // the superseded run must never deliver a mesh
        assert!(matches!(
            first.mesh().await,
            Err(PipelineError::Cancelled)
        ));
        assert!(second.mesh().await.is_ok());
    }

    #[tokio::test]
    async fn explicit_cancel_discards_the_result() {
        let mut runner = PipelineRunner::new(block_volume(32, 4, 28, 1000.0));
        let handle = runner.request_build(PipelineParameters::new(500.0));
        handle.cancel();
        assert!(matches!(
            handle.mesh().await,
            Err(PipelineError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn set_volume_swaps_the_dataset_for_new_runs() {
        let mut runner = PipelineRunner::new(block_volume(32, 4, 28, 1000.0));
        let stale = runner.request_build(PipelineParameters::new(500.0));
        runner.set_volume(block_volume(12, 4, 8, 2000.0)).await;

        let handle = runner.request_build(PipelineParameters::new(500.0));
        let mesh = handle.mesh().await.unwrap();
        let (min, max) = mesh.bounding_box().unwrap();
        for a in 0..3 {
            assert_eq!(max[a] - min[a], 4.0);
        }
        assert!(mesh.densities.iter().all(|&d| d == 2000.0));
        // the pre-swap run was cancelled by the swap
        assert!(stale.mesh().await.is_err());
    }

    #[tokio::test]
    async fn runner_reports_parameter_errors_through_the_handle() {
        let mut runner = PipelineRunner::new(block_volume(8, 2, 6, 900.0));
        let mut params = PipelineParameters::new(500.0);
        params.window = Some(Window {
            center: 100.0,
            width: 0.0,
        });
        assert!(matches!(
            runner.request_build(params).mesh().await,
            Err(PipelineError::InvalidParameter(_))
        ));
    }
}
