use crate::error::{PipelineError, Result};
use crate::volume::VolumeGrid;

/// Intensity window: a linear remap of raw scanner values into the display
/// range, defined by its center and full width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub center: f32,
    pub width: f32,
}

/// Upper end of the display range produced by [`apply`]; the lower end is 0.
pub const DISPLAY_MAX: f32 = 255.0;

/// Standard window presets for medical imaging, as (name, center, width).
pub const WINDOW_PRESETS: [(&str, f32, f32); 4] = [
    ("Bone", 1000.0, 1800.0),
    ("Soft Tissue", 40.0, 400.0),
    ("Lung", -600.0, 1600.0),
    ("Brain", 40.0, 80.0),
];

impl Window {
    pub fn new(center: f32, width: f32) -> Result<Self> {
        if !(width > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "window width must be positive, got {width}"
            )));
        }
        Ok(Self { center, width })
    }

    /// Look up a clinical preset by name ("Bone", "Soft Tissue", ...).
    pub fn preset(name: &str) -> Option<Self> {
        WINDOW_PRESETS
            .iter()
            .find(|(preset, _, _)| *preset == name)
            .map(|&(_, center, width)| Self { center, width })
    }

    /// Lower and upper raw-intensity bounds of the window.
    pub fn bounds(self) -> (f32, f32) {
        let half = self.width / 2.0;
        (self.center - half, self.center + half)
    }
}

/// Remap every sample into `[0, DISPLAY_MAX]`: values at or below the window
/// floor map to 0, at or above the ceiling to `DISPLAY_MAX`, linearly in
/// between. Returns a new grid; the input is untouched.
pub fn apply(volume: &VolumeGrid, window: Window) -> Result<VolumeGrid> {
    if !(window.width > 0.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "window width must be positive, got {}",
            window.width
        )));
    }
    let (lo, hi) = window.bounds();
    log::debug!(
        "applying window center={} width={} -> [{lo}, {hi}]",
        window.center,
        window.width
    );

    let mut data = volume.data().clone();
    data.par_mapv_inplace(|v| (v.clamp(lo, hi) - lo) / window.width * DISPLAY_MAX);
    Ok(volume.with_data(data))
}
