//! Engine error types.

use std::fmt;

use crate::session::SessionError;
use crate::srs::ConfigError;

/// Errors surfaced by the map engine's public contract.
#[derive(Debug)]
pub enum EngineError {
    /// Invalid field configuration (unknown reference system, bad center).
    /// Fatal: the mount is aborted before any surface work.
    Config(ConfigError),
    /// A coordinate transform failed during submit; the submit is aborted
    /// and the callback does not fire.
    Transform(ConfigError),
    /// Gesture API misuse forwarded from the session.
    Session(SessionError),
    /// Operation requires a mounted engine.
    NotMounted,
    /// Handle refers to a mount that is no longer the active one.
    StaleHandle,
    /// The mount was cancelled by an unmount/shutdown while the basemap
    /// load was outstanding.
    Cancelled,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(e) => write!(f, "configuration error: {}", e),
            EngineError::Transform(e) => write!(f, "submit aborted: {}", e),
            EngineError::Session(e) => write!(f, "session error: {}", e),
            EngineError::NotMounted => write!(f, "engine is not mounted"),
            EngineError::StaleHandle => write!(f, "stale mount handle"),
            EngineError::Cancelled => write!(f, "mount cancelled before completion"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(e) | EngineError::Transform(e) => Some(e),
            EngineError::Session(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SessionError> for EngineError {
    fn from(e: SessionError) -> Self {
        EngineError::Session(e)
    }
}
