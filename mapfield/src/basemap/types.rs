//! Basemap types and errors.

use std::fmt;

use crate::geometry::{Extent, Position};
use crate::srs::ConfigError;

/// Where a georeferenced raster comes from.
///
/// Both variants are opaque fetchable sources: a URL resolved over HTTP(S),
/// or bytes already in memory (e.g. from a user file upload).
#[derive(Debug, Clone)]
pub enum RasterSource {
    Url(String),
    Bytes(Vec<u8>),
}

/// What kind of basemap the field is configured with.
#[derive(Debug, Clone)]
pub enum BasemapSpec {
    /// Standard tiled web map (OSM-style).
    TiledWebMap,
    /// Georeferenced raster image; `projection` is applied only when the
    /// raster's embedded metadata lacks a reference system.
    GeoreferencedRaster {
        source: RasterSource,
        projection: Option<String>,
    },
}

/// A renderable base layer handed to the host's render surface.
pub enum BasemapLayer {
    /// Tile layer fetching from a URL template with `{z}/{x}/{y}`
    /// placeholders.
    Tiles { url_template: String },
    /// Decoded raster pixels pinned to a georeferenced extent.
    Raster {
        image: image::RgbaImage,
        extent: Extent,
    },
    /// Degraded blank base layer shown when basemap resolution failed.
    Blank,
}

impl fmt::Debug for BasemapLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasemapLayer::Tiles { url_template } => f
                .debug_struct("Tiles")
                .field("url_template", url_template)
                .finish(),
            BasemapLayer::Raster { image, extent } => f
                .debug_struct("Raster")
                .field("width", &image.width())
                .field("height", &image.height())
                .field("extent", extent)
                .finish(),
            BasemapLayer::Blank => write!(f, "Blank"),
        }
    }
}

/// View implied by a resolved basemap.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewHint {
    /// Center in the basemap's reference system.
    pub center: Position,
    /// Starting zoom level.
    pub zoom: f64,
    /// Extent the view should be fitted to, when the basemap carries one
    /// (georeferenced rasters). `None` for tiled web maps.
    pub fit_extent: Option<Extent>,
}

/// Result of resolving a [`BasemapSpec`].
#[derive(Debug)]
pub struct ResolvedBasemap {
    pub layer: BasemapLayer,
    /// Reference system all internal map coordinates use for this session.
    pub srs: String,
    pub view: ViewHint,
}

/// Errors that can occur while resolving a basemap.
///
/// All of these are recoverable: the engine degrades to a blank base layer
/// and stays usable for drawing.
#[derive(Debug)]
pub enum BasemapError {
    /// Raster source could not be fetched.
    Fetch(String),
    /// Raster bytes could not be decoded as an image.
    Decode(String),
    /// Raster carries no geotransform, so no view can be derived from it.
    MissingGeoreference,
    /// Reference system failure while deriving the view.
    Srs(ConfigError),
}

impl fmt::Display for BasemapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasemapError::Fetch(msg) => write!(f, "basemap fetch failed: {}", msg),
            BasemapError::Decode(msg) => write!(f, "basemap decode failed: {}", msg),
            BasemapError::MissingGeoreference => {
                write!(f, "raster carries no geotransform metadata")
            }
            BasemapError::Srs(e) => write!(f, "reference system error: {}", e),
        }
    }
}

impl std::error::Error for BasemapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BasemapError::Srs(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for BasemapError {
    fn from(e: ConfigError) -> Self {
        BasemapError::Srs(e)
    }
}
