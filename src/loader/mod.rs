//! # Geometry Loading
//!
//! Fetches the geometry visible from a view region out of the backend:
//! one region query returns the identifiers, then every identifier is
//! fetched, base64-decoded and parsed as Wavefront OBJ.
//!
//! The sequence is written once, against the [`GeometrySource`] trait, and
//! reports progress as [`LoadEvent`]s. The viewer applies those events on
//! the event-loop thread, so scene mutation never leaves that thread.
//!
//! ## Key Components
//!
//! - [`ViewRegion`] / [`GeometryEntry`] - wire types of the backend API
//! - [`load_region`] - the query, fetch, decode and parse sequence
//! - [`HttpGeometrySource`] - the HTTP transport
//! - [`LoaderTask`] - runs a load on a background thread, abortable as a group

pub mod decode;
pub mod http;
pub mod task;

use std::{collections::HashSet, future::Future};

use cgmath::Vector3;
use futures::{stream, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{config::to_vector, error::LoadError, gfx::scene::SceneObject};

pub use decode::{decode_payload, encode_payload, parse_object};
pub use http::HttpGeometrySource;
pub use task::LoaderTask;

/// Axis-aligned box on the wire: `{"min": [x, y, z], "max": [x, y, z]}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// Outbound region query: a bounding box plus the viewer's eye position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewRegion {
    bounds: Bounds,
    #[serde(rename = "eyePosition")]
    eye_position: [f64; 3],
}

impl ViewRegion {
    /// Creates a region query, rejecting non-finite or inverted bounds
    pub fn new(min: [f64; 3], max: [f64; 3], eye_position: [f64; 3]) -> Result<Self, LoadError> {
        let all_finite = min
            .iter()
            .chain(max.iter())
            .chain(eye_position.iter())
            .all(|c| c.is_finite());
        if !all_finite {
            return Err(LoadError::InvalidRegion(
                "coordinates must be finite".to_string(),
            ));
        }
        if let Some(axis) = (0..3).find(|&i| min[i] > max[i]) {
            return Err(LoadError::InvalidRegion(format!(
                "min exceeds max on axis {axis} ({} > {})",
                min[axis], max[axis]
            )));
        }

        Ok(Self {
            bounds: Bounds { min, max },
            eye_position,
        })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn eye_position(&self) -> [f64; 3] {
        self.eye_position
    }
}

/// One fetched object: an identifier and its base64-encoded OBJ payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeometryEntry {
    /// Not part of the response body; filled in by the source
    #[serde(skip_deserializing, default)]
    pub id: String,
    #[serde(rename = "geometryData")]
    pub geometry_data: String,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// One element of a region query response.
///
/// Backends either answer with identifiers to fetch one by one, or inline
/// the entries themselves (nearest to the eye first). Inline entries carry
/// no identifier of their own; the source assigns one.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionItem {
    Id(String),
    Inline(GeometryEntry),
}

impl RegionItem {
    pub fn id(&self) -> &str {
        match self {
            RegionItem::Id(id) => id,
            RegionItem::Inline(entry) => &entry.id,
        }
    }
}

/// Transport for the two backend requests
pub trait GeometrySource {
    /// Returns all geometry relevant to `region`, as ids or inline entries
    fn fetch_region(
        &self,
        region: &ViewRegion,
    ) -> impl Future<Output = Result<Vec<RegionItem>, LoadError>>;

    /// Fetches a single entry by identifier
    fn fetch_entry(&self, id: &str) -> impl Future<Output = Result<GeometryEntry, LoadError>>;
}

/// Progress of a region load, delivered to the viewer in order.
#[derive(Debug)]
pub enum LoadEvent {
    /// The region query succeeded; the camera moves to `eye` and aims at `target`
    RegionResolved {
        eye: Vector3<f32>,
        target: Vector3<f32>,
        ids: Vec<String>,
    },
    /// The region query failed; nothing will be loaded
    RegionFailed(LoadError),
    ObjectLoaded(SceneObject),
    /// A single entry could not be fetched, decoded or parsed
    EntryFailed { id: String, error: LoadError },
    Finished { loaded: usize, failed: usize },
}

/// Counts reported at the end of [`load_region`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub requested: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Runs the full load sequence for one region.
///
/// At most `max_in_flight` entry fetches run at once; completions are
/// reported in whatever order they finish. A region failure ends the load
/// without moving the camera; entry failures are reported and skipped.
pub async fn load_region<S, F>(
    source: &S,
    region: &ViewRegion,
    target: Vector3<f32>,
    max_in_flight: usize,
    mut sink: F,
) -> LoadSummary
where
    S: GeometrySource,
    F: FnMut(LoadEvent),
{
    let items = match source.fetch_region(region).await {
        Ok(items) => unique_items(items),
        Err(error) => {
            error!("Region query failed: {error}");
            sink(LoadEvent::RegionFailed(error));
            return LoadSummary::default();
        }
    };

    info!("Region query returned {} geometry entries", items.len());
    sink(LoadEvent::RegionResolved {
        eye: to_vector(region.eye_position()),
        target,
        ids: items.iter().map(|item| item.id().to_string()).collect(),
    });

    let mut summary = LoadSummary {
        requested: items.len(),
        ..Default::default()
    };

    let mut completions = stream::iter(items)
        .map(|item| async move {
            match item {
                RegionItem::Id(id) => {
                    let result = fetch_object(source, &id).await;
                    (id, result)
                }
                RegionItem::Inline(entry) => {
                    let result = object_from_entry(&entry);
                    (entry.id, result)
                }
            }
        })
        .buffer_unordered(max_in_flight.max(1));

    while let Some((id, result)) = completions.next().await {
        match result {
            Ok(object) => {
                debug!("Loaded geometry '{id}'");
                summary.loaded += 1;
                sink(LoadEvent::ObjectLoaded(object));
            }
            Err(error) => {
                warn!("Skipping geometry '{id}': {error}");
                summary.failed += 1;
                sink(LoadEvent::EntryFailed { id, error });
            }
        }
    }

    sink(LoadEvent::Finished {
        loaded: summary.loaded,
        failed: summary.failed,
    });
    summary
}

async fn fetch_object<S: GeometrySource>(source: &S, id: &str) -> Result<SceneObject, LoadError> {
    let entry = source.fetch_entry(id).await?;
    object_from_entry(&entry)
}

fn object_from_entry(entry: &GeometryEntry) -> Result<SceneObject, LoadError> {
    let text = decode_payload(&entry.geometry_data)?;
    parse_object(&entry.id, &text)
}

/// Drops repeated identifiers, keeping the server's order
fn unique_items(items: Vec<RegionItem>) -> Vec<RegionItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().to_string()))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        cell::RefCell,
        collections::HashMap,
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
        task::{Context, Poll},
    };

    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                return Poll::Ready(());
            }
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    pub const TRIANGLE_OBJ: &str = "o tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    /// In-memory backend recording every request it receives
    #[derive(Default)]
    pub struct MockSource {
        pub region: Option<Vec<String>>,
        /// Appended to the region response after the ids
        pub inline: Vec<GeometryEntry>,
        pub entries: HashMap<String, String>,
        pub fetched: RefCell<Vec<String>>,
        pub in_flight: AtomicUsize,
        pub max_seen_in_flight: AtomicUsize,
    }

    impl MockSource {
        pub fn with_ids(ids: &[&str]) -> Self {
            Self {
                region: Some(ids.iter().map(|s| s.to_string()).collect()),
                entries: ids
                    .iter()
                    .map(|id| (id.to_string(), encode_payload(TRIANGLE_OBJ)))
                    .collect(),
                ..Default::default()
            }
        }

        pub fn failing_region() -> Self {
            Self::default()
        }
    }

    impl GeometrySource for MockSource {
        async fn fetch_region(&self, _region: &ViewRegion) -> Result<Vec<RegionItem>, LoadError> {
            let ids = self.region.clone().ok_or(LoadError::Status {
                status: 500,
                message: "database unavailable".to_string(),
            })?;
            Ok(ids
                .into_iter()
                .map(RegionItem::Id)
                .chain(self.inline.iter().cloned().map(RegionItem::Inline))
                .collect())
        }

        async fn fetch_entry(&self, id: &str) -> Result<GeometryEntry, LoadError> {
            self.fetched.borrow_mut().push(id.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen_in_flight.fetch_max(now, Ordering::SeqCst);
            // Let the other buffered fetches start before this one completes.
            YieldOnce(false).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let geometry_data = self.entries.get(id).cloned().ok_or(LoadError::Status {
                status: 404,
                message: format!("no geometry {id}"),
            })?;
            Ok(GeometryEntry {
                id: id.to_string(),
                geometry_data,
                bounds: None,
                metadata: None,
            })
        }
    }

    pub fn demo_region() -> ViewRegion {
        ViewRegion::new([12.0, -9.0, 29.0], [28.0, 1.8, 40.0], [10.0, -9.0, 28.0]).unwrap()
    }

    pub fn demo_target() -> Vector3<f32> {
        Vector3::new(20.0, -5.0, 35.0)
    }

    pub fn run_load(source: &MockSource, max_in_flight: usize) -> (LoadSummary, Vec<LoadEvent>) {
        let mut events = Vec::new();
        let summary = futures::executor::block_on(load_region(
            source,
            &demo_region(),
            demo_target(),
            max_in_flight,
            |event| events.push(event),
        ));
        (summary, events)
    }

    #[test]
    fn test_region_serializes_to_backend_shape() {
        let json = serde_json::to_value(demo_region()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bounds": {"min": [12.0, -9.0, 29.0], "max": [28.0, 1.8, 40.0]},
                "eyePosition": [10.0, -9.0, 28.0]
            })
        );
    }

    #[test]
    fn test_region_rejects_inverted_or_non_finite_bounds() {
        assert!(matches!(
            ViewRegion::new([1.0, 0.0, 0.0], [0.0, 1.0, 1.0], [0.0; 3]),
            Err(LoadError::InvalidRegion(_))
        ));
        assert!(matches!(
            ViewRegion::new([0.0; 3], [1.0, f64::NAN, 1.0], [0.0; 3]),
            Err(LoadError::InvalidRegion(_))
        ));
        assert!(ViewRegion::new([0.0; 3], [0.0; 3], [5.0; 3]).is_ok());
    }

    #[test]
    fn test_entry_deserializes_with_optional_fields() {
        let entry: GeometryEntry = serde_json::from_str(
            r#"{"bounds": {"min": [0,0,0], "max": [1,1,1]}, "geometryData": "dg==", "metadata": "{}"}"#,
        )
        .unwrap();
        assert_eq!(entry.geometry_data, "dg==");
        assert!(entry.bounds.is_some());
        assert!(entry.id.is_empty());

        let bare: GeometryEntry = serde_json::from_str(r#"{"geometryData": ""}"#).unwrap();
        assert!(bare.bounds.is_none() && bare.metadata.is_none());
    }

    #[test]
    fn test_two_ids_are_fetched_and_loaded() {
        let source = MockSource::with_ids(&["a", "b"]);
        let (summary, events) = run_load(&source, 8);

        let mut fetched = source.fetched.borrow().clone();
        fetched.sort();
        assert_eq!(fetched, vec!["a", "b"]);
        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.failed, 0);

        match &events[0] {
            LoadEvent::RegionResolved { eye, target, ids } => {
                assert_eq!(*eye, Vector3::new(10.0, -9.0, 28.0));
                assert_eq!(*target, demo_target());
                assert_eq!(ids, &vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected RegionResolved first, got {other:?}"),
        }
        let loaded = events
            .iter()
            .filter(|e| matches!(e, LoadEvent::ObjectLoaded(_)))
            .count();
        assert_eq!(loaded, 2);
        assert!(matches!(
            events.last(),
            Some(LoadEvent::Finished { loaded: 2, failed: 0 })
        ));
    }

    #[test]
    fn test_empty_region_fetches_nothing() {
        let source = MockSource::with_ids(&[]);
        let (summary, events) = run_load(&source, 8);

        assert!(source.fetched.borrow().is_empty());
        assert_eq!(summary, LoadSummary::default());
        assert!(matches!(events[0], LoadEvent::RegionResolved { .. }));
        assert!(matches!(
            events[1],
            LoadEvent::Finished { loaded: 0, failed: 0 }
        ));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_region_failure_loads_nothing() {
        let source = MockSource::failing_region();
        let (summary, events) = run_load(&source, 8);

        assert!(source.fetched.borrow().is_empty());
        assert_eq!(summary.requested, 0);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            LoadEvent::RegionFailed(LoadError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn test_one_fetch_per_id_and_duplicates_collapse() {
        let ids: Vec<String> = (0..20).map(|i| format!("id{i}")).collect();
        let mut source =
            MockSource::with_ids(&ids.iter().map(String::as_str).collect::<Vec<_>>());
        if let Some(region) = source.region.as_mut() {
            region.push("id3".to_string());
            region.push("id7".to_string());
        }

        let (summary, _) = run_load(&source, 4);

        let fetched = source.fetched.borrow();
        assert_eq!(fetched.len(), 20);
        let distinct: HashSet<_> = fetched.iter().collect();
        assert_eq!(distinct.len(), 20);
        assert_eq!(summary.requested, 20);
        assert_eq!(summary.loaded, 20);
    }

    #[test]
    fn test_in_flight_fetches_are_bounded() {
        let ids: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let source = MockSource::with_ids(&ids.iter().map(String::as_str).collect::<Vec<_>>());

        run_load(&source, 3);

        let peak = source.max_seen_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "saw {peak} concurrent fetches");
        assert!(peak > 1, "fetches never overlapped");
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let mut source = MockSource::with_ids(&["good", "not-base64", "not-obj", "missing"]);
        source
            .entries
            .insert("not-base64".to_string(), "@@@".to_string());
        source.entries.insert(
            "not-obj".to_string(),
            encode_payload("v 0 0 0\nv 1 0 0\n"),
        );
        source.entries.remove("missing");

        let (summary, events) = run_load(&source, 2);

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.failed, 3);
        let mut failed: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                LoadEvent::EntryFailed { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        failed.sort();
        assert_eq!(failed, vec!["missing", "not-base64", "not-obj"]);
    }

    #[test]
    fn test_inline_entries_load_without_fetching() {
        let mut source = MockSource::with_ids(&["remote"]);
        source.inline = vec![
            GeometryEntry {
                id: "view-0".to_string(),
                geometry_data: encode_payload(TRIANGLE_OBJ),
                bounds: None,
                metadata: Some(serde_json::Value::String("null".to_string())),
            },
            GeometryEntry {
                id: "view-1".to_string(),
                geometry_data: "@@@".to_string(),
                bounds: None,
                metadata: None,
            },
        ];

        let (summary, events) = run_load(&source, 8);

        assert_eq!(*source.fetched.borrow(), vec!["remote"]);
        assert_eq!(summary.requested, 3);
        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.failed, 1);
        match &events[0] {
            LoadEvent::RegionResolved { ids, .. } => {
                assert_eq!(ids, &vec!["remote", "view-0", "view-1"]);
            }
            other => panic!("expected RegionResolved first, got {other:?}"),
        }
        assert!(events.iter().any(|e| matches!(
            e,
            LoadEvent::EntryFailed { id, error: LoadError::Base64(_) } if id == "view-1"
        )));
    }
}
