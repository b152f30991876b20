//! Field configuration.

use crate::basemap::{BasemapSpec, RasterSource};
use crate::geometry::GeometryKind;

/// Configuration for one map field instance, supplied at mount and
/// immutable for the session's lifetime.
///
/// # Example
///
/// ```
/// use mapfield::engine::FieldConfig;
/// use mapfield::geometry::GeometryKind;
///
/// let config = FieldConfig::new([151.214, -33.855], 10, GeometryKind::Point)
///     .with_projection("EPSG:3857")
///     .with_label("Site location");
/// assert_eq!(config.zoom(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// Initial center as [lon, lat].
    center: [f64; 2],
    /// Initial zoom level; also the cap applied when fitting to seeded
    /// geometry.
    zoom: u8,
    /// The one geometry kind this field edits.
    feature_kind: GeometryKind,
    /// Georeferenced raster basemap source, when configured.
    geotiff: Option<RasterSource>,
    /// Explicit reference system override.
    projection: Option<String>,
    /// Human-readable field label, used for logging only.
    label: Option<String>,
}

impl FieldConfig {
    pub fn new(center: [f64; 2], zoom: u8, feature_kind: GeometryKind) -> Self {
        Self {
            center,
            zoom,
            feature_kind,
            geotiff: None,
            projection: None,
            label: None,
        }
    }

    pub fn with_geotiff(mut self, source: RasterSource) -> Self {
        self.geotiff = Some(source);
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center[0], self.center[1])
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn feature_kind(&self) -> GeometryKind {
        self.feature_kind
    }

    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Derives the basemap spec: a georeferenced raster when a geotiff
    /// source is configured, the default tiled web map otherwise.
    pub fn basemap_spec(&self) -> BasemapSpec {
        match &self.geotiff {
            Some(source) => BasemapSpec::GeoreferencedRaster {
                source: source.clone(),
                projection: self.projection.clone(),
            },
            None => BasemapSpec::TiledWebMap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basemap_spec_defaults_to_tiled_web_map() {
        let config = FieldConfig::new([0.0, 0.0], 5, GeometryKind::Polygon);
        assert!(matches!(config.basemap_spec(), BasemapSpec::TiledWebMap));
    }

    #[test]
    fn test_basemap_spec_with_geotiff_carries_projection() {
        let config = FieldConfig::new([0.0, 0.0], 5, GeometryKind::Polygon)
            .with_geotiff(RasterSource::Url("http://example.com/a.tif".to_string()))
            .with_projection("EPSG:28354");
        match config.basemap_spec() {
            BasemapSpec::GeoreferencedRaster { projection, .. } => {
                assert_eq!(projection.as_deref(), Some("EPSG:28354"));
            }
            other => panic!("expected raster spec, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_accessors() {
        let config = FieldConfig::new([151.2, -33.8], 12, GeometryKind::LineString)
            .with_label("Transect");
        assert_eq!(config.center(), (151.2, -33.8));
        assert_eq!(config.zoom(), 12);
        assert_eq!(config.feature_kind(), GeometryKind::LineString);
        assert_eq!(config.label(), Some("Transect"));
        assert_eq!(config.projection(), None);
    }
}
