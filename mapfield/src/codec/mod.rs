//! Geometry codec
//!
//! Converts between the external GeoJSON representation and the map's
//! internal projected features. The external side is always EPSG:4326
//! lon/lat regardless of the active map reference; the internal side uses
//! whatever system the resolved basemap established.
//!
//! On encode, polygon ring winding is normalized right-handed (exterior
//! rings counter-clockwise, holes clockwise) so the output complies with
//! RFC 7946 no matter which direction the user drew the ring in.

use std::fmt;

use geojson::{Feature, FeatureCollection, Geometry, Value};
use tracing::debug;

use crate::geometry::{MapFeature, MapGeometry, Position};
use crate::srs::{self, ConfigError};

/// Errors that can occur while decoding an incoming feature collection.
///
/// Decode failures are recoverable at the engine level: a malformed seed
/// collection degrades to an empty edit buffer.
#[derive(Debug)]
pub enum DecodeError {
    /// Geometry type outside Point/LineString/Polygon.
    UnsupportedGeometry(String),
    /// Coordinate payload does not match its geometry type.
    MalformedCoordinates(String),
    /// Reference system failure while reprojecting.
    Srs(ConfigError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnsupportedGeometry(kind) => {
                write!(f, "unsupported geometry type '{}'", kind)
            }
            DecodeError::MalformedCoordinates(msg) => {
                write!(f, "malformed coordinates: {}", msg)
            }
            DecodeError::Srs(e) => write!(f, "reference system error: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Srs(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for DecodeError {
    fn from(e: ConfigError) -> Self {
        DecodeError::Srs(e)
    }
}

/// Decodes a GeoJSON collection into features in `target_srs`.
///
/// Features without a geometry are skipped (with a debug log); feature
/// properties are carried through untouched.
pub fn decode(
    collection: &FeatureCollection,
    target_srs: &str,
) -> Result<Vec<MapFeature>, DecodeError> {
    let mut features = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else {
            debug!("skipping feature without geometry");
            continue;
        };
        let geometry = decode_geometry(&geometry.value)?;
        let geometry =
            geometry.try_map_positions(|p| srs::transform(p, srs::EPSG_4326, target_srs))?;
        features.push(MapFeature {
            geometry,
            properties: feature.properties.clone(),
        });
    }
    Ok(features)
}

/// Encodes internal features from `source_srs` back to a GeoJSON collection.
///
/// Any transform failure aborts the encode; approximate coordinates are
/// never emitted.
pub fn encode(
    features: &[MapFeature],
    source_srs: &str,
) -> Result<FeatureCollection, ConfigError> {
    let mut out = Vec::with_capacity(features.len());
    for feature in features {
        let geographic = feature
            .geometry
            .try_map_positions(|p| srs::transform(p, source_srs, srs::EPSG_4326))?;
        out.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(encode_geometry(&geographic))),
            id: None,
            properties: feature.properties.clone(),
            foreign_members: None,
        });
    }
    Ok(FeatureCollection {
        bbox: None,
        features: out,
        foreign_members: None,
    })
}

fn decode_position(coords: &[f64]) -> Result<Position, DecodeError> {
    if coords.len() < 2 {
        return Err(DecodeError::MalformedCoordinates(format!(
            "position has {} ordinates, need at least 2",
            coords.len()
        )));
    }
    Ok((coords[0], coords[1]))
}

fn decode_geometry(value: &Value) -> Result<MapGeometry, DecodeError> {
    match value {
        Value::Point(coords) => Ok(MapGeometry::Point(decode_position(coords)?)),
        Value::LineString(line) => {
            let mut positions = Vec::with_capacity(line.len());
            for coords in line {
                positions.push(decode_position(coords)?);
            }
            Ok(MapGeometry::LineString(positions))
        }
        Value::Polygon(rings) => {
            let mut out_rings = Vec::with_capacity(rings.len());
            for ring in rings {
                if ring.len() < 4 {
                    return Err(DecodeError::MalformedCoordinates(format!(
                        "polygon ring has {} positions, need at least 4",
                        ring.len()
                    )));
                }
                let mut positions = Vec::with_capacity(ring.len());
                for coords in ring {
                    positions.push(decode_position(coords)?);
                }
                out_rings.push(positions);
            }
            Ok(MapGeometry::Polygon(out_rings))
        }
        other => Err(DecodeError::UnsupportedGeometry(other.type_name().to_string())),
    }
}

fn encode_geometry(geometry: &MapGeometry) -> Value {
    match geometry {
        MapGeometry::Point((x, y)) => Value::Point(vec![*x, *y]),
        MapGeometry::LineString(line) => {
            Value::LineString(line.iter().map(|(x, y)| vec![*x, *y]).collect())
        }
        MapGeometry::Polygon(rings) => {
            let mut out_rings = Vec::with_capacity(rings.len());
            for (index, ring) in rings.iter().enumerate() {
                let mut closed = close_ring(ring);
                // Exterior counter-clockwise, holes clockwise.
                let want_ccw = index == 0;
                if ring_is_clockwise(&closed) == want_ccw {
                    closed.reverse();
                }
                out_rings.push(closed.iter().map(|(x, y)| vec![*x, *y]).collect());
            }
            Value::Polygon(out_rings)
        }
    }
}

fn close_ring(ring: &[Position]) -> Vec<Position> {
    let mut closed = ring.to_vec();
    if let (Some(first), Some(last)) = (closed.first().copied(), closed.last().copied()) {
        if first != last {
            closed.push(first);
        }
    }
    closed
}

/// Shoelace orientation test in a y-up coordinate system. The edge sum
/// `(x2 - x1) * (y2 + y1)` is positive for clockwise rings.
fn ring_is_clockwise(ring: &[Position]) -> bool {
    let mut doubled_area = 0.0;
    for window in ring.windows(2) {
        let (x1, y1) = window[0];
        let (x2, y2) = window[1];
        doubled_area += (x2 - x1) * (y2 + y1);
    }
    doubled_area > 0.0
}
