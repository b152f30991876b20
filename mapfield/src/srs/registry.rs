//! Process-wide reference system registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{OnceLock, RwLock};

use thiserror::Error;
use tracing::debug;

/// Errors raised by the reference system registry and transform service.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reference system identifier is not in the registry.
    #[error("unknown reference system '{0}': register it before mounting")]
    UnknownSystem(String),

    /// Definition string could not be parsed as a proj4 definition.
    #[error("invalid definition for {code}: {reason}")]
    InvalidDefinition { code: String, reason: String },

    /// Registration attempted while an engine session is active.
    #[error("reference system registry is locked while a session is active")]
    RegistryLocked,

    /// The projection math rejected a coordinate.
    #[error("transform from {from} to {to} failed: {reason}")]
    TransformFailed {
        from: String,
        to: String,
        reason: String,
    },
}

/// A registered reference system.
#[derive(Debug, Clone)]
pub(crate) struct SystemDef {
    /// Canonical identifier, e.g. `EPSG:3857`.
    pub code: String,
    /// proj4 definition string.
    pub definition: String,
    /// Whether coordinates in this system are lon/lat degrees.
    pub geographic: bool,
}

struct Registry {
    systems: RwLock<HashMap<String, SystemDef>>,
    active_sessions: AtomicUsize,
}

// Built-in table: the geographic reference, the engine default, and the two
// UTM systems shipped for sample raster imagery. Projects needing more call
// `register` before mounting any field.
const BUILTIN_SYSTEMS: &[(&str, &str)] = &[
    ("EPSG:4326", "+proj=longlat +datum=WGS84 +no_defs"),
    (
        "EPSG:3857",
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
    ),
    ("EPSG:32636", "+proj=utm +zone=36 +datum=WGS84 +units=m +no_defs"),
    (
        "EPSG:28354",
        "+proj=utm +zone=54 +south +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
    ),
];

fn is_geographic(definition: &str) -> bool {
    definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
}

/// Maps user-facing identifiers to canonical registry keys.
///
/// `WGS84` is accepted as a literal alias for the geographic reference.
fn canonical(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.eq_ignore_ascii_case("WGS84") {
        return "EPSG:4326".to_string();
    }
    trimmed.to_ascii_uppercase()
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut systems = HashMap::new();
        for (code, definition) in BUILTIN_SYSTEMS {
            systems.insert(
                (*code).to_string(),
                SystemDef {
                    code: (*code).to_string(),
                    definition: (*definition).to_string(),
                    geographic: is_geographic(definition),
                },
            );
        }
        Registry {
            systems: RwLock::new(systems),
            active_sessions: AtomicUsize::new(0),
        }
    })
}

/// Registers a reference system under an `EPSG:<code>` identifier.
///
/// The definition is validated by parsing before insertion, so a later
/// lookup can never observe a malformed entry. Re-registering an existing
/// code replaces its definition.
///
/// # Errors
///
/// Fails with [`ConfigError::RegistryLocked`] while any engine session is
/// active, and [`ConfigError::InvalidDefinition`] for unparseable
/// definitions.
pub fn register(code: &str, definition: &str) -> Result<(), ConfigError> {
    let reg = registry();
    if reg.active_sessions.load(Ordering::SeqCst) > 0 {
        return Err(ConfigError::RegistryLocked);
    }

    proj4rs::Proj::from_proj_string(definition).map_err(|e| ConfigError::InvalidDefinition {
        code: code.to_string(),
        reason: e.to_string(),
    })?;

    let code = canonical(code);
    debug!(code = %code, "registering reference system");
    let mut systems = reg
        .systems
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    systems.insert(
        code.clone(),
        SystemDef {
            code,
            definition: definition.to_string(),
            geographic: is_geographic(definition),
        },
    );
    Ok(())
}

/// True if the identifier resolves to a registered system.
pub fn is_registered(code: &str) -> bool {
    let systems = registry()
        .systems
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    systems.contains_key(&canonical(code))
}

/// Returns the canonical identifiers of all registered systems.
pub fn registered_codes() -> Vec<String> {
    let systems = registry()
        .systems
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    systems.keys().cloned().collect()
}

pub(crate) fn lookup(code: &str) -> Result<SystemDef, ConfigError> {
    let systems = registry()
        .systems
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    systems
        .get(&canonical(code))
        .cloned()
        .ok_or_else(|| ConfigError::UnknownSystem(code.to_string()))
}

/// Guard held by an active engine session; registration is rejected while
/// any guard is alive.
#[derive(Debug)]
pub(crate) struct SessionGuard(());

impl Drop for SessionGuard {
    fn drop(&mut self) {
        registry().active_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn session_guard() -> SessionGuard {
    registry().active_sessions.fetch_add(1, Ordering::SeqCst);
    SessionGuard(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        assert!(is_registered("EPSG:4326"));
        assert!(is_registered("EPSG:3857"));
        assert!(is_registered("EPSG:32636"));
        assert!(is_registered("EPSG:28354"));
    }

    #[test]
    fn test_wgs84_alias_resolves() {
        assert!(is_registered("WGS84"));
        assert!(is_registered("wgs84"));
    }

    #[test]
    fn test_lowercase_epsg_resolves() {
        assert!(is_registered("epsg:3857"));
    }

    #[test]
    fn test_register_rejects_malformed_definition() {
        let err = register("EPSG:77777", "+proj=not-a-projection").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDefinition { .. }));
        assert!(!is_registered("EPSG:77777"));
    }

    // One test covers the registration lifecycle including the session
    // lock: tests share the process-wide guard counter, so splitting this
    // up would let parallel tests observe each other's guards.
    #[test]
    fn test_registration_lifecycle() {
        // UTM zone 55 south, same shape as the built-in zone 54 entry.
        register(
            "EPSG:28355",
            "+proj=utm +zone=55 +south +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
        )
        .unwrap();
        assert!(is_registered("EPSG:28355"));

        let guard = session_guard();
        let err = register(
            "EPSG:28356",
            "+proj=utm +zone=56 +south +ellps=GRS80 +units=m +no_defs",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::RegistryLocked));
        drop(guard);

        register(
            "EPSG:28356",
            "+proj=utm +zone=56 +south +ellps=GRS80 +units=m +no_defs",
        )
        .unwrap();
    }
}
