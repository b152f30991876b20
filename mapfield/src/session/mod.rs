//! Draw/modify session
//!
//! Owns the interactive editing lifecycle: seeding existing geometry,
//! constraining input to one target geometry kind, handling draw restarts,
//! and exposing the settled feature buffer for submit.
//!
//! The session is headless: the host UI translates pointer events into the
//! gesture calls here. Gestures commit synchronously, so a submit can never
//! observe a half-finished sketch.
//!
//! State machine: `Idle` → `Seeded` → `Drawing` → `Editable`, with every
//! new draw start returning to `Drawing` and clearing the buffer first,
//! so the buffer holds at most one geometry of the target kind once the user
//! starts drawing.

use std::fmt;

use tracing::debug;

use crate::geometry::{GeometryKind, MapFeature, MapGeometry, Position};

/// Lifecycle states of a draw/modify session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Mounted, no feature yet.
    Idle,
    /// Initial geometry decoded and placed.
    Seeded,
    /// A draw gesture is in progress.
    Drawing,
    /// A completed geometry of the target kind exists and can be reshaped.
    Editable,
}

/// Errors from misuse of the gesture API.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Vertex fed outside an active draw gesture.
    NotDrawing,
    /// Draw finished with too few vertices for the target kind.
    IncompleteSketch { kind: GeometryKind, vertices: usize },
    /// Modify attempted with no editable geometry.
    NothingToModify,
    /// Modify addressed a vertex that does not exist.
    VertexOutOfRange { ring: usize, vertex: usize },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotDrawing => write!(f, "no draw gesture in progress"),
            SessionError::IncompleteSketch { kind, vertices } => {
                write!(f, "sketch has {} vertices, not enough for a {}", vertices, kind)
            }
            SessionError::NothingToModify => write!(f, "no editable geometry in the buffer"),
            SessionError::VertexOutOfRange { ring, vertex } => {
                write!(f, "vertex {}/{} out of range", ring, vertex)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// One editing session bound to one mutable feature buffer.
#[derive(Debug)]
pub struct DrawSession {
    target: GeometryKind,
    state: SessionState,
    buffer: Vec<MapFeature>,
    sketch: Vec<Position>,
}

impl DrawSession {
    pub fn new(target: GeometryKind) -> Self {
        Self {
            target,
            state: SessionState::Idle,
            buffer: Vec::new(),
            sketch: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target_kind(&self) -> GeometryKind {
        self.target
    }

    /// The settled feature buffer (never includes an in-progress sketch).
    pub fn features(&self) -> &[MapFeature] {
        &self.buffer
    }

    /// Seeds the buffer from the decoded incoming collection. All features
    /// are placed; the capacity-one rule applies to draw gestures, not to
    /// the seed.
    pub fn seed(&mut self, features: Vec<MapFeature>) {
        if !features.is_empty() {
            debug!(count = features.len(), "seeding session buffer");
            self.buffer = features;
            self.state = SessionState::Seeded;
        }
    }

    /// Starts a new draw gesture. Always clears the buffer first: starting
    /// a new draw discards the previous geometry.
    pub fn begin_draw(&mut self) {
        if !self.buffer.is_empty() {
            debug!("draw start discards existing buffer");
        }
        self.buffer.clear();
        self.sketch.clear();
        self.state = SessionState::Drawing;
    }

    /// Adds a vertex to the in-progress sketch. For the Point kind the
    /// sketch holds a single position, replaced on every call.
    pub fn add_vertex(&mut self, position: Position) -> Result<(), SessionError> {
        if self.state != SessionState::Drawing {
            return Err(SessionError::NotDrawing);
        }
        if self.target == GeometryKind::Point {
            self.sketch.clear();
        }
        self.sketch.push(position);
        Ok(())
    }

    /// Commits the sketch as one geometry of the target kind. Polygon
    /// sketches are the exterior ring and get closed here.
    pub fn finish_draw(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Drawing {
            return Err(SessionError::NotDrawing);
        }

        let minimum = match self.target {
            GeometryKind::Point => 1,
            GeometryKind::LineString => 2,
            GeometryKind::Polygon => 3,
        };
        if self.sketch.len() < minimum {
            return Err(SessionError::IncompleteSketch {
                kind: self.target,
                vertices: self.sketch.len(),
            });
        }

        let geometry = match self.target {
            GeometryKind::Point => MapGeometry::Point(self.sketch[0]),
            GeometryKind::LineString => MapGeometry::LineString(std::mem::take(&mut self.sketch)),
            GeometryKind::Polygon => {
                let mut ring = std::mem::take(&mut self.sketch);
                if ring.first() != ring.last() {
                    ring.push(ring[0]);
                }
                MapGeometry::Polygon(vec![ring])
            }
        };
        self.sketch.clear();
        self.buffer = vec![MapFeature::new(geometry)];
        self.state = SessionState::Editable;
        debug!(kind = %self.target, "draw gesture committed");
        Ok(())
    }

    /// Reshapes one vertex of the committed geometry via a modify handle.
    ///
    /// `ring` is ignored for points, must be 0 for line strings, and
    /// addresses the polygon ring otherwise. Moving the shared endpoint of
    /// a closed ring keeps the ring closed.
    pub fn move_vertex(
        &mut self,
        ring: usize,
        vertex: usize,
        position: Position,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Editable || self.buffer.is_empty() {
            return Err(SessionError::NothingToModify);
        }

        let out_of_range = SessionError::VertexOutOfRange { ring, vertex };
        match &mut self.buffer[0].geometry {
            MapGeometry::Point(p) => {
                *p = position;
            }
            MapGeometry::LineString(line) => {
                if ring != 0 {
                    return Err(out_of_range);
                }
                *line.get_mut(vertex).ok_or(out_of_range)? = position;
            }
            MapGeometry::Polygon(rings) => {
                let ring_positions = rings.get_mut(ring).ok_or(out_of_range.clone())?;
                let len = ring_positions.len();
                *ring_positions.get_mut(vertex).ok_or(out_of_range)? = position;
                // Keep closure intact when an endpoint moved.
                if vertex == 0 && len > 1 {
                    ring_positions[len - 1] = position;
                } else if vertex == len - 1 && len > 1 {
                    ring_positions[0] = position;
                }
            }
        }
        Ok(())
    }

    /// Takes the buffer out, leaving the session Idle. The session stays
    /// alive; further draws and submits are supported.
    pub fn take_features(&mut self) -> Vec<MapFeature> {
        self.sketch.clear();
        self.state = SessionState::Idle;
        std::mem::take(&mut self.buffer)
    }

    /// Clears the buffer after a successful submit. The session stays
    /// alive; further draws and submits are supported.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.sketch.clear();
        self.state = SessionState::Idle;
    }
}
