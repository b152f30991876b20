//! Basemap resolution
//!
//! Resolves a [`BasemapSpec`] into a renderable layer, the reference
//! system the map session will work in, and the initial view the basemap
//! implies. Tiled web maps resolve synchronously; georeferenced rasters
//! are fetched and parsed asynchronously, the one genuine suspension
//! point in the engine.
//!
//! Rasters carry ground-truth geolocation in their own metadata, so the
//! embedded reference system wins over the caller's requested one; the
//! explicit override applies only when the raster is silent about its own
//! system.

mod geotiff;
mod http;
mod types;

pub use geotiff::{GeoTiffReader, RasterData, RasterReader};
pub use http::{AsyncHttpClient, FetchFuture, ReqwestClient};
pub use types::{BasemapError, BasemapLayer, BasemapSpec, RasterSource, ResolvedBasemap, ViewHint};

#[cfg(test)]
pub use geotiff::tests::MockRasterReader;
#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::srs;

/// Tile URL template for the default tiled web map.
pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Resolves basemap specs into layers and views.
#[derive(Clone)]
pub struct BasemapProvider {
    http: Arc<dyn AsyncHttpClient>,
    reader: Arc<dyn RasterReader>,
}

impl BasemapProvider {
    /// Creates a provider with injected fetch/parse implementations.
    pub fn new(http: Arc<dyn AsyncHttpClient>, reader: Arc<dyn RasterReader>) -> Self {
        Self { http, reader }
    }

    /// Creates a provider backed by a real HTTP client and GeoTIFF reader.
    pub fn with_defaults() -> Result<Self, BasemapError> {
        Ok(Self::new(
            Arc::new(ReqwestClient::new()?),
            Arc::new(GeoTiffReader::new()),
        ))
    }

    /// Resolves `spec` into a layer, reference system and view hint.
    ///
    /// `projection` is the field-level override; `center` is the configured
    /// center in lon/lat and `zoom` the configured zoom level.
    ///
    /// # Errors
    ///
    /// Raster fetch/decode failures return a [`BasemapError`]; the caller
    /// is expected to degrade to [`Self::degraded`] rather than fail the
    /// mount.
    pub async fn resolve(
        &self,
        spec: &BasemapSpec,
        projection: Option<&str>,
        center: (f64, f64),
        zoom: u8,
    ) -> Result<ResolvedBasemap, BasemapError> {
        match spec {
            BasemapSpec::TiledWebMap => {
                let srs_code = projection.unwrap_or(srs::EPSG_3857).to_string();
                let center = srs::transform(center, srs::EPSG_4326, &srs_code)?;
                debug!(srs = %srs_code, "resolved tiled web map");
                Ok(ResolvedBasemap {
                    layer: BasemapLayer::Tiles {
                        url_template: OSM_TILE_URL.to_string(),
                    },
                    srs: srs_code,
                    view: ViewHint {
                        center,
                        zoom: zoom as f64,
                        fit_extent: None,
                    },
                })
            }
            BasemapSpec::GeoreferencedRaster {
                source,
                projection: spec_projection,
            } => {
                let bytes = match source {
                    RasterSource::Url(url) => self.http.get(url).await?,
                    RasterSource::Bytes(bytes) => bytes.clone(),
                };
                let raster = self.reader.read(&bytes)?;
                let srs_code = raster_srs(
                    raster.epsg,
                    spec_projection.as_deref().or(projection),
                );
                debug!(srs = %srs_code, extent = ?raster.extent, "resolved georeferenced raster");
                Ok(ResolvedBasemap {
                    srs: srs_code,
                    view: ViewHint {
                        center: raster.extent.center(),
                        zoom: zoom as f64,
                        fit_extent: Some(raster.extent),
                    },
                    layer: BasemapLayer::Raster {
                        image: raster.image,
                        extent: raster.extent,
                    },
                })
            }
        }
    }

    /// Degraded fallback when resolution fails: a blank base layer in the
    /// configured (or default) reference system, with the configured view.
    /// The engine stays usable for drawing.
    pub fn degraded(
        projection: Option<&str>,
        center: (f64, f64),
        zoom: u8,
    ) -> Result<ResolvedBasemap, srs::ConfigError> {
        let srs_code = projection.unwrap_or(srs::EPSG_3857).to_string();
        let center = srs::transform(center, srs::EPSG_4326, &srs_code)?;
        Ok(ResolvedBasemap {
            layer: BasemapLayer::Blank,
            srs: srs_code,
            view: ViewHint {
                center,
                zoom: zoom as f64,
                fit_extent: None,
            },
        })
    }
}

/// Picks the raster session's reference system.
///
/// Embedded metadata wins; the explicit override applies when the raster is
/// silent. With neither, the engine default is used, a known limitation
/// that can mis-locate the raster, so it is flagged at warning level.
fn raster_srs(embedded_epsg: Option<u16>, explicit: Option<&str>) -> String {
    if let Some(code) = embedded_epsg {
        let candidate = format!("EPSG:{}", code);
        if srs::is_registered(&candidate) {
            return candidate;
        }
        warn!(
            code = %candidate,
            "raster names an unregistered reference system; falling back"
        );
    }
    if let Some(explicit) = explicit {
        return explicit.to_string();
    }
    warn!(
        "raster has no usable reference system and no override; assuming {}, \
         the raster may be mis-located",
        srs::EPSG_3857
    );
    srs::EPSG_3857.to_string()
}
