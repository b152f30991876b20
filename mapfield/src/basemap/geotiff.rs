//! GeoTIFF metadata and pixel reading.
//!
//! Georeferenced rasters carry ground-truth geolocation in their own tags:
//! `ModelTiepoint` + `ModelPixelScale` pin the pixel grid to map space, and
//! the GeoKey directory may name the reference system as an EPSG code.
//! Reading is behind the [`RasterReader`] trait so tests can substitute a
//! canned raster instead of crafting TIFF bytes.

use std::io::Cursor;

use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tracing::debug;

use super::types::BasemapError;
use crate::geometry::Extent;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

/// GeoKey naming a geographic coordinate system.
const KEY_GEOGRAPHIC_TYPE: u64 = 2048;
/// GeoKey naming a projected coordinate system.
const KEY_PROJECTED_CS_TYPE: u64 = 3072;
/// GeoKey value meaning "user defined", i.e. no usable EPSG code.
const VALUE_USER_DEFINED: u64 = 32767;

/// A decoded raster: pixels, georeferenced extent, and the EPSG code from
/// embedded metadata when present.
pub struct RasterData {
    pub image: image::RgbaImage,
    /// Extent in the raster's own reference system.
    pub extent: Extent,
    /// EPSG code from the GeoKey directory, if the raster names one.
    pub epsg: Option<u16>,
}

/// Parses raster bytes into pixels plus georeferencing metadata.
pub trait RasterReader: Send + Sync {
    fn read(&self, bytes: &[u8]) -> Result<RasterData, BasemapError>;
}

/// Real reader backed by the `tiff` crate for tags and the `image` crate
/// for pixel decoding.
#[derive(Debug, Clone, Default)]
pub struct GeoTiffReader;

impl GeoTiffReader {
    pub fn new() -> Self {
        Self
    }
}

impl RasterReader for GeoTiffReader {
    fn read(&self, bytes: &[u8]) -> Result<RasterData, BasemapError> {
        let mut decoder = Decoder::new(Cursor::new(bytes))
            .map_err(|e| BasemapError::Decode(format!("not a readable TIFF: {}", e)))?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| BasemapError::Decode(format!("missing image dimensions: {}", e)))?;

        let pixel_scale = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
            .ok();
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
            .ok();
        let extent = geo_extent(
            width,
            height,
            pixel_scale.as_deref(),
            tiepoint.as_deref(),
        )
        .ok_or(BasemapError::MissingGeoreference)?;

        let epsg = decoder
            .get_tag_u64_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
            .ok()
            .and_then(|keys| epsg_from_geo_keys(&keys));
        debug!(width, height, ?epsg, "read GeoTIFF metadata");

        let image = image::load_from_memory(bytes)
            .map_err(|e| BasemapError::Decode(format!("raster pixel decode failed: {}", e)))?
            .to_rgba8();

        Ok(RasterData {
            image,
            extent,
            epsg,
        })
    }
}

/// Derives the georeferenced extent from `ModelTiepoint` (raster point i,j,k
/// pinned to map point x,y,z) and `ModelPixelScale` (map units per pixel).
///
/// Returns `None` when either tag is missing or degenerate; rasters without
/// a geotransform cannot produce a view.
fn geo_extent(
    width: u32,
    height: u32,
    pixel_scale: Option<&[f64]>,
    tiepoint: Option<&[f64]>,
) -> Option<Extent> {
    let scale = pixel_scale?;
    let tie = tiepoint?;
    if scale.len() < 2 || tie.len() < 6 {
        return None;
    }

    let (sx, sy) = (scale[0], scale[1]);
    if !sx.is_finite() || !sy.is_finite() || sx <= 0.0 || sy <= 0.0 {
        return None;
    }

    // Tiepoint maps raster (i, j) to map (x, y); j grows downward.
    let origin_x = tie[3] - tie[0] * sx;
    let origin_y = tie[4] + tie[1] * sy;

    let extent = Extent::new(
        origin_x,
        origin_y - height as f64 * sy,
        origin_x + width as f64 * sx,
        origin_y,
    );
    extent.is_finite().then_some(extent)
}

/// Extracts an EPSG code from a GeoKey directory.
///
/// The directory is a flat array: a 4-short header (version, revision,
/// minor, key count) followed by 4 shorts per key (id, tag location, count,
/// value). A projected CS key wins over a geographic one; user-defined and
/// zero values are ignored.
fn epsg_from_geo_keys(keys: &[u64]) -> Option<u16> {
    if keys.len() < 4 {
        return None;
    }
    let key_count = keys[3] as usize;

    let mut geographic = None;
    let mut projected = None;
    for i in 0..key_count {
        let base = 4 + i * 4;
        if base + 3 >= keys.len() {
            break;
        }
        let (key_id, location, value) = (keys[base], keys[base + 1], keys[base + 3]);
        // Location 0 means the value is stored inline in the directory.
        if location != 0 || value == 0 || value == VALUE_USER_DEFINED {
            continue;
        }
        match key_id {
            KEY_GEOGRAPHIC_TYPE => geographic = u16::try_from(value).ok(),
            KEY_PROJECTED_CS_TYPE => projected = u16::try_from(value).ok(),
            _ => {}
        }
    }
    projected.or(geographic)
}
