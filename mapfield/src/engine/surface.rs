//! Render surface abstraction.
//!
//! The engine is headless; the host UI implements [`RenderSurface`] and
//! receives layer, view and overlay updates. Tests drive the engine with a
//! recording mock instead.

use serde::{Deserialize, Serialize};

use crate::basemap::BasemapLayer;
use crate::geometry::MapFeature;
use crate::view::ViewState;

/// Styling for the editable feature overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStyle {
    /// Stroke color as a CSS hex string.
    pub stroke_color: String,
    /// Stroke width in pixels.
    pub stroke_width: f64,
    /// Radius of the point marker in pixels.
    pub point_radius: f64,
}

impl Default for FeatureStyle {
    fn default() -> Self {
        Self {
            stroke_color: "#33ff33".to_string(),
            stroke_width: 4.0,
            point_radius: 7.0,
        }
    }
}

/// Host-provided rendering surface the engine drives.
///
/// Calls arrive in a fixed order on mount: `attach_basemap`, then
/// `apply_view`, then `render_features`; `detach` is the last call the
/// surface ever receives.
pub trait RenderSurface: Send {
    /// Surface size in pixels, used for extent fitting.
    fn size(&self) -> (u32, u32);

    /// Installs the resolved base layer.
    fn attach_basemap(&mut self, layer: &BasemapLayer);

    /// Moves the view.
    fn apply_view(&mut self, view: &ViewState);

    /// Redraws the editable overlay with the current buffer contents.
    fn render_features(&mut self, features: &[MapFeature], style: &FeatureStyle);

    /// Releases the surface; no further calls follow.
    fn detach(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_matches_editor_defaults() {
        let style = FeatureStyle::default();
        assert_eq!(style.stroke_color, "#33ff33");
        assert_eq!(style.stroke_width, 4.0);
        assert_eq!(style.point_radius, 7.0);
    }
}
