//! View state and extent-fit heuristics.
//!
//! Zoom levels follow the web map convention: zoom 0 shows the whole world
//! at ~156543 m/px, each level halves the resolution. The fit heuristic is
//! applied in the active map reference system's linear units; for the
//! geographic systems this is approximate but only used as a zoom cap
//! anyway.

use crate::geometry::{Extent, Position};

/// Resolution in map units per pixel at zoom 0 (spherical mercator world
/// width over a 256 px tile).
const BASE_RESOLUTION: f64 = 156_543.033_928_040_97;

/// Fixed padding applied on every side when fitting a view to an extent.
pub const FIT_PADDING_PX: f64 = 20.0;

/// Current map view: where the surface is looking and in which system.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Center in internal (projected) coordinates.
    pub center: Position,
    /// Fractional zoom level.
    pub zoom: f64,
    /// Reference system of `center`.
    pub srs: String,
}

impl ViewState {
    pub fn new(center: Position, zoom: f64, srs: impl Into<String>) -> Self {
        Self {
            center,
            zoom,
            srs: srs.into(),
        }
    }
}

/// Computes a centered view that shows `extent` within a surface of
/// `surface_size` pixels, padded by [`FIT_PADDING_PX`] and capped at
/// `max_zoom`.
///
/// Returns `None` for non-finite extents: fitting to an unbounded extent
/// is a defined edge case, not an error, and callers fall back to their
/// configured view.
pub fn fit_extent(
    extent: &Extent,
    surface_size: (u32, u32),
    max_zoom: f64,
) -> Option<(Position, f64)> {
    if !extent.is_finite() {
        return None;
    }

    let usable_w = (surface_size.0 as f64 - 2.0 * FIT_PADDING_PX).max(1.0);
    let usable_h = (surface_size.1 as f64 - 2.0 * FIT_PADDING_PX).max(1.0);

    let required = (extent.width() / usable_w).max(extent.height() / usable_h);
    let zoom = if required > 0.0 {
        (BASE_RESOLUTION / required).log2().clamp(0.0, max_zoom)
    } else {
        // Degenerate extent (single point): zoom in as far as allowed.
        max_zoom
    };

    Some((extent.center(), zoom))
}
