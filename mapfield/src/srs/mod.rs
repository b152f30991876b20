//! Spatial reference system handling
//!
//! Provides a process-wide registry of reference systems (proj4 definition
//! strings) and pure coordinate transforms between them via `proj4rs`.
//!
//! The registry is read-only once sessions are running: new systems may be
//! registered at startup with [`register`], but registration while any
//! engine session is active is rejected. Unknown identifiers fail fast;
//! a silently wrong projection produces geometry that looks valid but is
//! geographically wrong.

mod registry;

pub use registry::{is_registered, register, registered_codes, ConfigError};
pub(crate) use registry::{session_guard, SessionGuard};

use registry::lookup;

/// The external geographic reference every GeoJSON collection uses.
pub const EPSG_4326: &str = "EPSG:4326";

/// The engine's default projected reference (web-standard spherical
/// mercator), used when no explicit projection is configured.
pub const EPSG_3857: &str = "EPSG:3857";

/// Transforms a single coordinate pair between two registered systems.
///
/// Geographic endpoints use decimal degrees, projected endpoints use the
/// projection's linear units. Pure and deterministic given the registry
/// contents.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownSystem`] when either identifier is not
/// registered, and [`ConfigError::TransformFailed`] when the underlying
/// projection math rejects the coordinate.
pub fn transform(
    point: (f64, f64),
    from: &str,
    to: &str,
) -> Result<(f64, f64), ConfigError> {
    let from_def = lookup(from)?;
    let to_def = lookup(to)?;

    if from_def.code == to_def.code {
        return Ok(point);
    }

    let src = proj4rs::Proj::from_proj_string(&from_def.definition).map_err(|e| {
        ConfigError::InvalidDefinition {
            code: from_def.code.clone(),
            reason: e.to_string(),
        }
    })?;
    let dst = proj4rs::Proj::from_proj_string(&to_def.definition).map_err(|e| {
        ConfigError::InvalidDefinition {
            code: to_def.code.clone(),
            reason: e.to_string(),
        }
    })?;

    // proj4rs operates on radians at geographic endpoints.
    let mut coords = (point.0, point.1, 0.0);
    if from_def.geographic {
        coords.0 = coords.0.to_radians();
        coords.1 = coords.1.to_radians();
    }

    proj4rs::transform::transform(&src, &dst, &mut coords).map_err(|e| {
        ConfigError::TransformFailed {
            from: from_def.code.clone(),
            to: to_def.code.clone(),
            reason: e.to_string(),
        }
    })?;

    if to_def.geographic {
        coords.0 = coords.0.to_degrees();
        coords.1 = coords.1.to_degrees();
    }

    if !coords.0.is_finite() || !coords.1.is_finite() {
        return Err(ConfigError::TransformFailed {
            from: from_def.code,
            to: to_def.code,
            reason: format!("non-finite result for input ({}, {})", point.0, point.1),
        });
    }

    Ok((coords.0, coords.1))
}
