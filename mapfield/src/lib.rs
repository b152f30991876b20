//! Mapfield - a headless map-drawing form field engine
//!
//! This library provides the core functionality for a map-based geometry
//! field: a host embeds a map view, the user draws a point, line or
//! polygon on it, and the field produces GeoJSON in geographic
//! coordinates.
//!
//! # High-Level API
//!
//! The [`engine`] module provides the field-facing facade:
//!
//! ```ignore
//! use mapfield::engine::{FieldConfig, MapEngine};
//! use mapfield::geometry::GeometryKind;
//!
//! let engine = MapEngine::with_defaults()?;
//! let config = FieldConfig::new([144.96, -37.81], 14, GeometryKind::Polygon);
//!
//! // Mount onto a host-provided render surface.
//! let handle = engine
//!     .mount(surface, config, initial_value, Box::new(on_submit))
//!     .await?;
//! ```
//!
//! Rendering stays on the host side behind the
//! [`engine::RenderSurface`] trait; everything else (projection,
//! GeoJSON codec, basemap resolution, draw session state) lives here.

pub mod basemap;
pub mod codec;
pub mod engine;
pub mod geometry;
pub mod logging;
pub mod session;
pub mod srs;
pub mod view;

pub use engine::{EngineError, FieldConfig, MapEngine, MountHandle};
pub use geometry::GeometryKind;

/// Version of the mapfield library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
