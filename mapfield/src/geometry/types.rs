//! Feature and geometry type definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Extent;

/// A single coordinate pair in the active map reference system.
///
/// Order is (x, y): (easting, northing) for projected systems and
/// (longitude, latitude) for geographic ones.
pub type Position = (f64, f64);

/// The three geometry kinds the editor supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryKind::Point => write!(f, "Point"),
            GeometryKind::LineString => write!(f, "LineString"),
            GeometryKind::Polygon => write!(f, "Polygon"),
        }
    }
}

impl FromStr for GeometryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Point" => Ok(GeometryKind::Point),
            "LineString" => Ok(GeometryKind::LineString),
            "Polygon" => Ok(GeometryKind::Polygon),
            other => Err(format!("unsupported geometry kind '{}'", other)),
        }
    }
}

/// A geometry in the map's internal reference system.
///
/// Polygon rings are stored closed (first position repeated as the last);
/// the first ring is the exterior, any further rings are holes.
#[derive(Debug, Clone, PartialEq)]
pub enum MapGeometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
}

impl MapGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            MapGeometry::Point(_) => GeometryKind::Point,
            MapGeometry::LineString(_) => GeometryKind::LineString,
            MapGeometry::Polygon(_) => GeometryKind::Polygon,
        }
    }

    /// Returns the bounding extent of this geometry.
    pub fn extent(&self) -> Extent {
        let mut extent = Extent::empty();
        match self {
            MapGeometry::Point(p) => extent.include(*p),
            MapGeometry::LineString(line) => {
                for p in line {
                    extent.include(*p);
                }
            }
            MapGeometry::Polygon(rings) => {
                for ring in rings {
                    for p in ring {
                        extent.include(*p);
                    }
                }
            }
        }
        extent
    }

    /// Applies a fallible position transform to every coordinate, producing
    /// a new geometry of the same kind.
    ///
    /// Used by the codec to reproject geometries; any single failing
    /// coordinate aborts the whole conversion.
    pub fn try_map_positions<E>(
        &self,
        mut f: impl FnMut(Position) -> Result<Position, E>,
    ) -> Result<MapGeometry, E> {
        match self {
            MapGeometry::Point(p) => Ok(MapGeometry::Point(f(*p)?)),
            MapGeometry::LineString(line) => {
                let mut out = Vec::with_capacity(line.len());
                for p in line {
                    out.push(f(*p)?);
                }
                Ok(MapGeometry::LineString(out))
            }
            MapGeometry::Polygon(rings) => {
                let mut out_rings = Vec::with_capacity(rings.len());
                for ring in rings {
                    let mut out = Vec::with_capacity(ring.len());
                    for p in ring {
                        out.push(f(*p)?);
                    }
                    out_rings.push(out);
                }
                Ok(MapGeometry::Polygon(out_rings))
            }
        }
    }
}

/// A feature: one geometry plus optional attributes.
///
/// Attributes are carried through the engine untouched; `None` round-trips
/// as GeoJSON `"properties": null`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    pub geometry: MapGeometry,
    pub properties: Option<geojson::JsonObject>,
}

impl MapFeature {
    pub fn new(geometry: MapGeometry) -> Self {
        Self {
            geometry,
            properties: None,
        }
    }

    pub fn with_properties(geometry: MapGeometry, properties: geojson::JsonObject) -> Self {
        Self {
            geometry,
            properties: Some(properties),
        }
    }
}
