//! Integration tests for the map field engine.
//!
//! These tests exercise complete field lifecycles against mock transport,
//! raster and surface implementations:
//! - Mount → draw → submit → unmount over a tiled web basemap
//! - GeoTIFF basemaps with embedded and overridden reference systems
//! - Seeded initial values and extent fitting
//! - Degraded mounts, cancellation and stale handles
//!
//! Run with: `cargo test --test engine_integration`

use std::sync::{Arc, Mutex};

use geojson::{Feature, FeatureCollection, Geometry, Value};

use mapfield::basemap::{
    AsyncHttpClient, BasemapError, BasemapLayer, BasemapProvider, FetchFuture, RasterData,
    RasterReader, RasterSource,
};
use mapfield::engine::{EngineError, FeatureStyle, FieldConfig, MapEngine, RenderSurface};
use mapfield::geometry::{Extent, GeometryKind, MapFeature, Position};
use mapfield::session::SessionState;
use mapfield::view::ViewState;

// ============================================================================
// Test Helpers
// ============================================================================

/// Mock HTTP client returning a canned response.
struct StubHttpClient {
    response: Result<Vec<u8>, String>,
}

impl AsyncHttpClient for StubHttpClient {
    fn get<'a>(&'a self, _url: &'a str) -> FetchFuture<'a> {
        let response = self.response.clone().map_err(BasemapError::Fetch);
        Box::pin(async move { response })
    }
}

/// Mock HTTP client whose requests never complete, for cancellation tests.
struct HangingHttpClient;

impl AsyncHttpClient for HangingHttpClient {
    fn get<'a>(&'a self, _url: &'a str) -> FetchFuture<'a> {
        Box::pin(std::future::pending())
    }
}

/// Mock raster reader returning a canned georeference.
struct StubRasterReader {
    extent: Extent,
    epsg: Option<u16>,
}

impl RasterReader for StubRasterReader {
    fn read(&self, _bytes: &[u8]) -> Result<RasterData, BasemapError> {
        Ok(RasterData {
            image: image::RgbaImage::new(2, 2),
            extent: self.extent,
            epsg: self.epsg,
        })
    }
}

/// Everything a surface was asked to do, for post-hoc assertions.
#[derive(Default)]
struct SurfaceLog {
    attached: Vec<&'static str>,
    views: Vec<ViewState>,
    render_counts: Vec<usize>,
    detached: bool,
}

struct RecordingSurface {
    size: (u32, u32),
    log: Arc<Mutex<SurfaceLog>>,
}

impl RecordingSurface {
    fn new() -> (Box<dyn RenderSurface>, Arc<Mutex<SurfaceLog>>) {
        let log = Arc::new(Mutex::new(SurfaceLog::default()));
        let surface = Box::new(RecordingSurface {
            size: (512, 512),
            log: Arc::clone(&log),
        });
        (surface, log)
    }
}

impl RenderSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn attach_basemap(&mut self, layer: &BasemapLayer) {
        let name = match layer {
            BasemapLayer::Tiles { .. } => "tiles",
            BasemapLayer::Raster { .. } => "raster",
            BasemapLayer::Blank => "blank",
        };
        self.log.lock().unwrap().attached.push(name);
    }

    fn apply_view(&mut self, view: &ViewState) {
        self.log.lock().unwrap().views.push(view.clone());
    }

    fn render_features(&mut self, features: &[MapFeature], _style: &FeatureStyle) {
        self.log.lock().unwrap().render_counts.push(features.len());
    }

    fn detach(&mut self) {
        self.log.lock().unwrap().detached = true;
    }
}

/// Engine over a tiled basemap; the raster path is never taken.
fn tiled_engine() -> MapEngine {
    MapEngine::new(BasemapProvider::new(
        Arc::new(StubHttpClient {
            response: Ok(Vec::new()),
        }),
        Arc::new(StubRasterReader {
            extent: Extent::new(0.0, 0.0, 1.0, 1.0),
            epsg: None,
        }),
    ))
}

/// Engine whose raster reader reports the given georeference.
fn raster_engine(extent: Extent, epsg: Option<u16>) -> MapEngine {
    MapEngine::new(BasemapProvider::new(
        Arc::new(StubHttpClient {
            response: Ok(vec![0u8; 4]),
        }),
        Arc::new(StubRasterReader { extent, epsg }),
    ))
}

/// Shared capture slot for submit callbacks.
fn capture() -> (
    Arc<Mutex<Vec<FeatureCollection>>>,
    Box<dyn FnMut(FeatureCollection) + Send>,
) {
    let captured: Arc<Mutex<Vec<FeatureCollection>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let callback = Box::new(move |collection: FeatureCollection| {
        sink.lock().unwrap().push(collection);
    });
    (captured, callback)
}

fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

fn polygon_collection(ring: Vec<Vec<f64>>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
            id: None,
            properties: None,
            foreign_members: None,
        }],
        foreign_members: None,
    }
}

/// Spherical mercator forward projection, for expected values.
fn mercator(lon: f64, lat: f64) -> Position {
    const R: f64 = 6_378_137.0;
    let x = lon.to_radians() * R;
    let y = ((std::f64::consts::FRAC_PI_4) + lat.to_radians() / 2.0).tan().ln() * R;
    (x, y)
}

const MELBOURNE: [f64; 2] = [144.9631, -37.8136];

// ============================================================================
// Tiled basemap lifecycle
// ============================================================================

#[tokio::test]
async fn test_mount_tiled_basemap_uses_web_mercator() {
    let engine = tiled_engine();
    let (surface, log) = RecordingSurface::new();
    let (_, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon);

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    assert!(engine.is_mounted());
    let view = engine.view(handle).unwrap();
    assert_eq!(view.srs, "EPSG:3857");
    assert_eq!(view.zoom, 14.0);

    let expected = mercator(MELBOURNE[0], MELBOURNE[1]);
    assert!((view.center.0 - expected.0).abs() < 1.0, "x {}", view.center.0);
    assert!((view.center.1 - expected.1).abs() < 1.0, "y {}", view.center.1);

    let log = log.lock().unwrap();
    assert_eq!(log.attached, vec!["tiles"]);
    assert_eq!(log.views.len(), 1);
    assert_eq!(log.render_counts, vec![0]);
}

#[tokio::test]
async fn test_draw_and_submit_produces_geographic_geojson() {
    let engine = tiled_engine();
    let (surface, log) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon);

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    let (x, y) = mercator(MELBOURNE[0], MELBOURNE[1]);
    engine.begin_draw(handle).unwrap();
    engine.add_vertex(handle, (x, y)).unwrap();
    engine.add_vertex(handle, (x + 1000.0, y)).unwrap();
    engine.add_vertex(handle, (x + 1000.0, y + 1000.0)).unwrap();
    engine.finish_draw(handle).unwrap();
    assert_eq!(engine.session_state(handle).unwrap(), SessionState::Editable);

    engine.submit(handle).unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let collection = &captured[0];
    assert_eq!(collection.features.len(), 1);

    let geometry = collection.features[0].geometry.as_ref().unwrap();
    let rings = match &geometry.value {
        Value::Polygon(rings) => rings,
        other => panic!("expected polygon, got {:?}", other),
    };
    assert_eq!(rings.len(), 1);
    let exterior = &rings[0];
    assert_eq!(exterior.len(), 4, "ring should be closed");
    assert_eq!(exterior.first(), exterior.last());

    // Geographic coordinates, not map units.
    assert!((exterior[0][0] - MELBOURNE[0]).abs() < 0.1);
    assert!((exterior[0][1] - MELBOURNE[1]).abs() < 0.1);

    // Exterior ring must wind counter-clockwise.
    let signed: f64 = exterior
        .windows(2)
        .map(|pair| (pair[1][0] - pair[0][0]) * (pair[1][1] + pair[0][1]))
        .sum();
    assert!(signed < 0.0, "exterior ring should be counter-clockwise");

    // Buffer clears after submit; a fresh draw may follow.
    assert_eq!(engine.session_state(handle).unwrap(), SessionState::Idle);
    assert_eq!(log.lock().unwrap().render_counts.last(), Some(&0));
}

#[tokio::test]
async fn test_submit_with_empty_buffer_emits_empty_collection() {
    let engine = tiled_engine();
    let (surface, _) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Point);

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    engine.submit(handle).unwrap();
    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert!(captured[0].features.is_empty());
}

#[tokio::test]
async fn test_gesture_outside_draw_state_is_rejected() {
    let engine = tiled_engine();
    let (surface, _) = RecordingSurface::new();
    let (_, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::LineString);

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    let err = engine.add_vertex(handle, (0.0, 0.0)).unwrap_err();
    assert!(matches!(err, EngineError::Session(_)));
}

// ============================================================================
// GeoTIFF basemaps
// ============================================================================

#[tokio::test]
async fn test_geotiff_embedded_projection_wins_over_override() {
    let extent = Extent::new(16_130_000.0, -4_560_000.0, 16_140_000.0, -4_550_000.0);
    let engine = raster_engine(extent, Some(3857));
    let (surface, log) = RecordingSurface::new();
    let (_, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon)
        .with_geotiff(RasterSource::Url("http://example.com/site.tif".to_string()))
        .with_projection("EPSG:32636");

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    let view = engine.view(handle).unwrap();
    assert_eq!(view.srs, "EPSG:3857", "embedded georeference should win");
    assert_eq!(view.center, extent.center());
    assert!(view.zoom > 0.0 && view.zoom < 14.0, "zoom {}", view.zoom);
    assert_eq!(log.lock().unwrap().attached, vec!["raster"]);
}

#[tokio::test]
async fn test_geotiff_without_embedded_projection_uses_override() {
    let extent = Extent::new(400_000.0, 5_900_000.0, 600_000.0, 6_100_000.0);
    let engine = raster_engine(extent, None);
    let (surface, _) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new([141.0, -36.0], 12, GeometryKind::Polygon)
        .with_geotiff(RasterSource::Bytes(vec![0u8; 4]))
        .with_projection("EPSG:28354");

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    assert_eq!(engine.view(handle).unwrap().srs, "EPSG:28354");

    // A polygon drawn in projected coordinates submits inside the raster's
    // geographic bounds.
    engine.begin_draw(handle).unwrap();
    engine.add_vertex(handle, (480_000.0, 5_990_000.0)).unwrap();
    engine.add_vertex(handle, (520_000.0, 5_990_000.0)).unwrap();
    engine.add_vertex(handle, (520_000.0, 6_010_000.0)).unwrap();
    engine.finish_draw(handle).unwrap();
    engine.submit(handle).unwrap();

    let captured = captured.lock().unwrap();
    let geometry = captured[0].features[0].geometry.as_ref().unwrap();
    let rings = match &geometry.value {
        Value::Polygon(rings) => rings,
        other => panic!("expected polygon, got {:?}", other),
    };
    for position in &rings[0] {
        assert!((position[0] - 141.0).abs() < 2.0, "lon {}", position[0]);
        assert!((position[1] + 36.0).abs() < 2.0, "lat {}", position[1]);
    }
}

#[tokio::test]
async fn test_submit_from_utm_session_converts_to_lon_lat() {
    let extent = Extent::new(400_000.0, 5_900_000.0, 600_000.0, 6_100_000.0);
    let engine = raster_engine(extent, Some(28354));
    let (surface, _) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new([141.0, -36.0], 12, GeometryKind::Point)
        .with_geotiff(RasterSource::Url("http://example.com/site.tif".to_string()));

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    engine.begin_draw(handle).unwrap();
    // Central meridian easting, mid-latitude northing for UTM zone 54S.
    engine.add_vertex(handle, (500_000.0, 6_000_000.0)).unwrap();
    engine.finish_draw(handle).unwrap();
    engine.submit(handle).unwrap();

    let captured = captured.lock().unwrap();
    let geometry = captured[0].features[0].geometry.as_ref().unwrap();
    let position = match &geometry.value {
        Value::Point(position) => position,
        other => panic!("expected point, got {:?}", other),
    };
    assert!((position[0] - 141.0).abs() < 2.0, "lon {}", position[0]);
    assert!((position[1] + 36.0).abs() < 2.0, "lat {}", position[1]);
}

#[tokio::test]
async fn test_raster_fetch_failure_degrades_to_blank_layer() {
    let engine = MapEngine::new(BasemapProvider::new(
        Arc::new(StubHttpClient {
            response: Err("connection refused".to_string()),
        }),
        Arc::new(StubRasterReader {
            extent: Extent::new(0.0, 0.0, 1.0, 1.0),
            epsg: None,
        }),
    ));
    let (surface, log) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Point)
        .with_geotiff(RasterSource::Url("http://example.com/gone.tif".to_string()));

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    assert!(engine.is_mounted());
    assert_eq!(log.lock().unwrap().attached, vec!["blank"]);

    // Drawing still works without a basemap.
    engine.begin_draw(handle).unwrap();
    let (x, y) = mercator(MELBOURNE[0], MELBOURNE[1]);
    engine.add_vertex(handle, (x, y)).unwrap();
    engine.finish_draw(handle).unwrap();
    engine.submit(handle).unwrap();
    assert_eq!(captured.lock().unwrap().len(), 1);
}

// ============================================================================
// Seeded initial values
// ============================================================================

#[tokio::test]
async fn test_seeded_value_fits_view_and_round_trips() {
    let engine = tiled_engine();
    let (surface, _) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 18, GeometryKind::Polygon);

    let ring = vec![
        vec![144.95, -37.82],
        vec![144.97, -37.82],
        vec![144.97, -37.80],
        vec![144.95, -37.80],
        vec![144.95, -37.82],
    ];
    let handle = engine
        .mount(surface, config, polygon_collection(ring.clone()), callback)
        .await
        .unwrap();

    assert_eq!(engine.session_state(handle).unwrap(), SessionState::Seeded);

    // View centers on the seeded geometry, not the configured center.
    let view = engine.view(handle).unwrap();
    let expected = mercator(144.96, -37.81);
    assert!((view.center.0 - expected.0).abs() < 10.0, "x {}", view.center.0);
    assert!((view.center.1 - expected.1).abs() < 10.0, "y {}", view.center.1);
    assert!(view.zoom < 18.0, "fit should zoom out from the cap");

    // Submitting without redrawing returns the seeded geometry.
    engine.submit(handle).unwrap();
    let captured = captured.lock().unwrap();
    let geometry = captured[0].features[0].geometry.as_ref().unwrap();
    let rings = match &geometry.value {
        Value::Polygon(rings) => rings,
        other => panic!("expected polygon, got {:?}", other),
    };
    for (got, want) in rings[0].iter().zip(ring.iter()) {
        assert!((got[0] - want[0]).abs() < 1e-6);
        assert!((got[1] - want[1]).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_undecodable_seed_starts_empty() {
    let engine = tiled_engine();
    let (surface, _) = RecordingSurface::new();
    let (_, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Point);

    let initial = FeatureCollection {
        bbox: None,
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::MultiPoint(vec![vec![0.0, 0.0]]))),
            id: None,
            properties: None,
            foreign_members: None,
        }],
        foreign_members: None,
    };

    let handle = engine.mount(surface, config, initial, callback).await.unwrap();
    assert_eq!(engine.session_state(handle).unwrap(), SessionState::Idle);
}

// ============================================================================
// Mount lifecycle and cancellation
// ============================================================================

#[tokio::test]
async fn test_second_mount_is_noop_returning_existing_handle() {
    let engine = tiled_engine();
    let (first_surface, _) = RecordingSurface::new();
    let (second_surface, second_log) = RecordingSurface::new();
    let (_, first_callback) = capture();
    let (_, second_callback) = capture();

    let first = engine
        .mount(
            first_surface,
            FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon),
            empty_collection(),
            first_callback,
        )
        .await
        .unwrap();
    let second = engine
        .mount(
            second_surface,
            FieldConfig::new([0.0, 0.0], 5, GeometryKind::Point),
            empty_collection(),
            second_callback,
        )
        .await
        .unwrap();

    assert_eq!(first, second);
    assert!(second_log.lock().unwrap().attached.is_empty());
}

#[tokio::test]
async fn test_unmount_detaches_and_is_idempotent() {
    let engine = tiled_engine();
    let (surface, log) = RecordingSurface::new();
    let (_, callback) = capture();

    let handle = engine
        .mount(
            surface,
            FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon),
            empty_collection(),
            callback,
        )
        .await
        .unwrap();

    engine.unmount(handle).unwrap();
    assert!(!engine.is_mounted());
    assert!(log.lock().unwrap().detached);

    // Second unmount with nothing active is a no-op.
    engine.unmount(handle).unwrap();

    let err = engine.submit(handle).unwrap_err();
    assert!(matches!(err, EngineError::NotMounted));
}

#[tokio::test]
async fn test_stale_handle_is_rejected_after_remount() {
    let engine = tiled_engine();
    let (_, old_callback) = capture();
    let (_, new_callback) = capture();

    let (surface, _) = RecordingSurface::new();
    let old = engine
        .mount(
            surface,
            FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon),
            empty_collection(),
            old_callback,
        )
        .await
        .unwrap();
    engine.unmount(old).unwrap();

    let (surface, _) = RecordingSurface::new();
    let new = engine
        .mount(
            surface,
            FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon),
            empty_collection(),
            new_callback,
        )
        .await
        .unwrap();
    assert_ne!(old, new);

    assert!(matches!(
        engine.begin_draw(old).unwrap_err(),
        EngineError::StaleHandle
    ));
    assert!(matches!(
        engine.unmount(old).unwrap_err(),
        EngineError::StaleHandle
    ));
    engine.begin_draw(new).unwrap();
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_basemap_load() {
    let engine = MapEngine::new(BasemapProvider::new(
        Arc::new(HangingHttpClient),
        Arc::new(StubRasterReader {
            extent: Extent::new(0.0, 0.0, 1.0, 1.0),
            epsg: None,
        }),
    ));
    let (surface, log) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon)
        .with_geotiff(RasterSource::Url("http://example.com/slow.tif".to_string()));

    let mounting = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .mount(surface, config, empty_collection(), callback)
                .await
        })
    };

    // Let the mount reach the basemap fetch before tearing down.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    engine.shutdown();

    let result = mounting.await.unwrap();
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert!(!engine.is_mounted());
    assert!(log.lock().unwrap().attached.is_empty());
    assert!(captured.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_mount_with_unknown_projection_fails_fast() {
    let engine = tiled_engine();
    let (surface, log) = RecordingSurface::new();
    let (_, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::Polygon)
        .with_projection("EPSG:99999");

    let err = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert!(!engine.is_mounted());
    assert!(log.lock().unwrap().attached.is_empty());
}

// ============================================================================
// Vertex editing
// ============================================================================

#[tokio::test]
async fn test_move_vertex_reshapes_before_submit() {
    let engine = tiled_engine();
    let (surface, _) = RecordingSurface::new();
    let (captured, callback) = capture();
    let config = FieldConfig::new(MELBOURNE, 14, GeometryKind::LineString);

    let handle = engine
        .mount(surface, config, empty_collection(), callback)
        .await
        .unwrap();

    let (x, y) = mercator(MELBOURNE[0], MELBOURNE[1]);
    engine.begin_draw(handle).unwrap();
    engine.add_vertex(handle, (x, y)).unwrap();
    engine.add_vertex(handle, (x + 500.0, y)).unwrap();
    engine.finish_draw(handle).unwrap();

    engine.move_vertex(handle, 0, 1, (x + 500.0, y + 500.0)).unwrap();
    engine.submit(handle).unwrap();

    let captured = captured.lock().unwrap();
    let geometry = captured[0].features[0].geometry.as_ref().unwrap();
    let line = match &geometry.value {
        Value::LineString(line) => line,
        other => panic!("expected line string, got {:?}", other),
    };
    assert_eq!(line.len(), 2);
    assert!(line[1][1] > line[0][1], "moved vertex should sit further north");
}
