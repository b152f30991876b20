//! Geometry data model
//!
//! Provides the internal feature representation shared by the codec, the
//! draw session and the engine. Coordinates in these types are always in
//! the active map's internal reference system; the external GeoJSON
//! boundary (EPSG:4326) is handled by the [`crate::codec`] module.

mod extent;
mod types;

pub use extent::Extent;
pub use types::{GeometryKind, MapFeature, MapGeometry, Position};

/// Computes the combined bounding extent of a set of features.
///
/// Returns an empty (non-finite) extent for an empty slice; callers must
/// check [`Extent::is_finite`] before fitting a view to the result.
pub fn combined_extent(features: &[MapFeature]) -> Extent {
    let mut extent = Extent::empty();
    for feature in features {
        extent.include_extent(&feature.geometry.extent());
    }
    extent
}
