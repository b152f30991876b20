//! Map engine orchestration
//!
//! Owns the render surface, the resolved basemap and the draw session, and
//! exposes the field-facing contract: `mount`, gesture forwarding,
//! `submit` and `unmount`.
//!
//! Mounting is explicit and idempotent per engine instance: a second
//! mount while one is active is a no-op returning the existing handle.
//! Creation order on mount is fixed (surface, then resolved basemap, then
//! session), so draw gestures can never race a not-yet-projected view. A
//! cancellation token keyed to the mount generation guarantees that a
//! basemap load still in flight when the field is torn down never
//! mutates engine state afterwards.

mod config;
mod error;
mod surface;

pub use config::FieldConfig;
pub use error::EngineError;
pub use surface::{FeatureStyle, RenderSurface};

use std::sync::{Arc, Mutex, MutexGuard};

use geojson::FeatureCollection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::basemap::BasemapProvider;
use crate::codec;
use crate::geometry::{combined_extent, Position};
use crate::session::{DrawSession, SessionState};
use crate::srs::{self, SessionGuard};
use crate::view::{self, ViewState};

/// Callback receiving the encoded collection on submit.
///
/// Invoked synchronously from `submit`; it must not call back into the
/// engine. The engine retains no reference to the collection after the
/// callback returns.
pub type SubmitCallback = Box<dyn FnMut(FeatureCollection) + Send>;

/// Opaque handle identifying one mount generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountHandle {
    generation: u64,
}

struct Mounted {
    generation: u64,
    surface: Box<dyn RenderSurface>,
    /// Internal reference system all session coordinates use.
    srs: String,
    view: ViewState,
    session: DrawSession,
    style: FeatureStyle,
    callback: SubmitCallback,
    _srs_guard: SessionGuard,
}

struct Pending {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct EngineState {
    mounted: Option<Mounted>,
    pending: Option<Pending>,
    next_generation: u64,
}

/// The map engine for one logical field instance.
///
/// Cheap to clone; clones share the same state, so a host can keep one
/// clone for mounting and another for teardown.
#[derive(Clone)]
pub struct MapEngine {
    inner: Arc<Mutex<EngineState>>,
    provider: BasemapProvider,
}

impl MapEngine {
    pub fn new(provider: BasemapProvider) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineState::default())),
            provider,
        }
    }

    /// Engine backed by a real HTTP client and GeoTIFF reader.
    pub fn with_defaults() -> Result<Self, crate::basemap::BasemapError> {
        Ok(Self::new(BasemapProvider::with_defaults()?))
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_pending(&self, generation: u64) {
        let mut state = self.lock();
        if state
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation)
        {
            state.pending = None;
        }
    }

    /// Mounts the field: validates configuration, resolves the basemap
    /// (awaiting raster loads), seeds the session from `initial` and wires
    /// everything to `surface`.
    ///
    /// Basemap resolution failures degrade to a blank base layer; the
    /// engine stays usable for drawing. Configuration failures abort the
    /// mount before any surface work.
    pub async fn mount(
        &self,
        mut surface: Box<dyn RenderSurface>,
        config: FieldConfig,
        initial: FeatureCollection,
        callback: SubmitCallback,
    ) -> Result<MountHandle, EngineError> {
        // Fail fast on unregistered or broken reference systems.
        let configured_srs = config.projection().unwrap_or(srs::EPSG_3857);
        srs::transform(config.center(), srs::EPSG_4326, configured_srs)
            .map_err(EngineError::Config)?;

        let (generation, cancel) = {
            let mut state = self.lock();
            if let Some(mounted) = &state.mounted {
                debug!(generation = mounted.generation, "mount is a no-op: already mounted");
                return Ok(MountHandle {
                    generation: mounted.generation,
                });
            }
            if let Some(pending) = &state.pending {
                debug!(generation = pending.generation, "mount is a no-op: mount in progress");
                return Ok(MountHandle {
                    generation: pending.generation,
                });
            }
            state.next_generation += 1;
            let generation = state.next_generation;
            let cancel = CancellationToken::new();
            state.pending = Some(Pending {
                generation,
                cancel: cancel.clone(),
            });
            (generation, cancel)
        };

        info!(
            label = config.label().unwrap_or("map field"),
            generation,
            kind = %config.feature_kind(),
            "mounting map field"
        );

        let basemap_spec = config.basemap_spec();
        let resolution = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(EngineError::Cancelled);
            }
            result = self.provider.resolve(
                &basemap_spec,
                config.projection(),
                config.center(),
                config.zoom(),
            ) => result,
        };

        let resolved = match resolution {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "basemap resolution failed; degrading to blank base layer");
                match BasemapProvider::degraded(config.projection(), config.center(), config.zoom())
                {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        self.clear_pending(generation);
                        return Err(EngineError::Config(e));
                    }
                }
            }
        };

        let mut state = self.lock();
        // Stale-response guard: the load must not install anything if the
        // field was torn down while it was outstanding.
        let still_wanted = state
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation && !p.cancel.is_cancelled());
        if !still_wanted {
            debug!(generation, "discarding stale basemap resolution");
            return Err(EngineError::Cancelled);
        }
        state.pending = None;

        surface.attach_basemap(&resolved.layer);

        let seeded = match codec::decode(&initial, &resolved.srs) {
            Ok(features) => features,
            Err(e) => {
                warn!(error = %e, "failed to decode initial geometry; starting empty");
                Vec::new()
            }
        };

        let max_zoom = config.zoom() as f64;
        let mut view_state = ViewState::new(resolved.view.center, resolved.view.zoom, resolved.srs.clone());
        if !seeded.is_empty() {
            // Fit to the seeded geometry, but never to an unbounded extent.
            let extent = combined_extent(&seeded);
            if let Some((center, zoom)) = view::fit_extent(&extent, surface.size(), max_zoom) {
                view_state.center = center;
                view_state.zoom = zoom;
            }
        } else if let Some(extent) = resolved.view.fit_extent {
            if let Some((center, zoom)) = view::fit_extent(&extent, surface.size(), max_zoom) {
                view_state.center = center;
                view_state.zoom = zoom;
            }
        }
        surface.apply_view(&view_state);

        let mut session = DrawSession::new(config.feature_kind());
        session.seed(seeded);
        let style = FeatureStyle::default();
        surface.render_features(session.features(), &style);

        state.mounted = Some(Mounted {
            generation,
            surface,
            srs: resolved.srs,
            view: view_state,
            session,
            style,
            callback,
            _srs_guard: srs::session_guard(),
        });
        Ok(MountHandle { generation })
    }

    /// Starts a new draw gesture, discarding any existing geometry.
    pub fn begin_draw(&self, handle: MountHandle) -> Result<(), EngineError> {
        let mut state = self.lock();
        let mounted = Self::mounted_mut(&mut state, handle)?;
        mounted.session.begin_draw();
        let Mounted {
            surface,
            session,
            style,
            ..
        } = mounted;
        surface.render_features(session.features(), style);
        Ok(())
    }

    /// Feeds one vertex of the in-progress draw gesture.
    pub fn add_vertex(&self, handle: MountHandle, position: Position) -> Result<(), EngineError> {
        let mut state = self.lock();
        let mounted = Self::mounted_mut(&mut state, handle)?;
        mounted.session.add_vertex(position)?;
        Ok(())
    }

    /// Commits the in-progress draw gesture as the buffer's one geometry.
    pub fn finish_draw(&self, handle: MountHandle) -> Result<(), EngineError> {
        let mut state = self.lock();
        let mounted = Self::mounted_mut(&mut state, handle)?;
        mounted.session.finish_draw()?;
        let Mounted {
            surface,
            session,
            style,
            ..
        } = mounted;
        surface.render_features(session.features(), style);
        Ok(())
    }

    /// Reshapes one vertex of the committed geometry.
    pub fn move_vertex(
        &self,
        handle: MountHandle,
        ring: usize,
        vertex: usize,
        position: Position,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        let mounted = Self::mounted_mut(&mut state, handle)?;
        mounted.session.move_vertex(ring, vertex, position)?;
        let Mounted {
            surface,
            session,
            style,
            ..
        } = mounted;
        surface.render_features(session.features(), style);
        Ok(())
    }

    /// Encodes the buffer to lon/lat GeoJSON, invokes the submit callback
    /// and clears the buffer. Any transform failure aborts the submit; the
    /// callback never receives approximate coordinates.
    ///
    /// Multi-submit is supported: the session stays alive and further
    /// draws may follow.
    pub fn submit(&self, handle: MountHandle) -> Result<(), EngineError> {
        let mut state = self.lock();
        let mounted = Self::mounted_mut(&mut state, handle)?;
        let collection =
            codec::encode(mounted.session.features(), &mounted.srs).map_err(EngineError::Transform)?;
        debug!(features = collection.features.len(), "submitting edited geometry");
        (mounted.callback)(collection);
        mounted.session.clear();
        let Mounted {
            surface,
            session,
            style,
            ..
        } = mounted;
        surface.render_features(session.features(), style);
        Ok(())
    }

    /// Unmounts the field. Cancels an outstanding basemap load for the
    /// same generation; detaches the surface and drops the session and
    /// callback for an active mount. Unmounting an already-unmounted
    /// engine is a no-op.
    pub fn unmount(&self, handle: MountHandle) -> Result<(), EngineError> {
        let mut state = self.lock();

        if state
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == handle.generation)
        {
            if let Some(pending) = state.pending.take() {
                pending.cancel.cancel();
            }
            info!(generation = handle.generation, "cancelled pending mount");
            return Ok(());
        }

        if state
            .mounted
            .as_ref()
            .is_some_and(|m| m.generation == handle.generation)
        {
            if let Some(mut mounted) = state.mounted.take() {
                mounted.surface.detach();
            }
            info!(generation = handle.generation, "unmounted map field");
            return Ok(());
        }

        if state.mounted.is_none() && state.pending.is_none() {
            return Ok(());
        }
        Err(EngineError::StaleHandle)
    }

    /// Tears down whatever this engine instance holds: cancels any pending
    /// mount and unmounts any active one. For hosts that lose the handle
    /// during teardown.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel.cancel();
            info!(generation = pending.generation, "shutdown cancelled pending mount");
        }
        if let Some(mut mounted) = state.mounted.take() {
            mounted.surface.detach();
            info!(generation = mounted.generation, "shutdown unmounted map field");
        }
    }

    /// True while a mount is fully installed.
    pub fn is_mounted(&self) -> bool {
        self.lock().mounted.is_some()
    }

    /// Current view of an active mount.
    pub fn view(&self, handle: MountHandle) -> Result<ViewState, EngineError> {
        let mut state = self.lock();
        let mounted = Self::mounted_mut(&mut state, handle)?;
        Ok(mounted.view.clone())
    }

    /// Session lifecycle state of an active mount.
    pub fn session_state(&self, handle: MountHandle) -> Result<SessionState, EngineError> {
        let mut state = self.lock();
        let mounted = Self::mounted_mut(&mut state, handle)?;
        Ok(mounted.session.state())
    }

    fn mounted_mut<'a>(
        state: &'a mut EngineState,
        handle: MountHandle,
    ) -> Result<&'a mut Mounted, EngineError> {
        match &mut state.mounted {
            Some(mounted) if mounted.generation == handle.generation => Ok(mounted),
            Some(_) => Err(EngineError::StaleHandle),
            None => Err(EngineError::NotMounted),
        }
    }
}
