//! Background execution of a region load.

use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use cgmath::Vector3;
use futures::future::{AbortHandle, Abortable};
use log::{debug, info};

use super::{load_region, GeometrySource, LoadEvent, ViewRegion};
use crate::error::LoadError;

/// A region load running on its own thread.
///
/// The thread drives a single-threaded tokio runtime so the HTTP client can
/// keep several entry fetches in flight. Events are handed to `sink` as
/// they happen. Aborting cancels every outstanding fetch at once.
pub struct LoaderTask {
    abort: AbortHandle,
    thread: Option<JoinHandle<()>>,
}

impl LoaderTask {
    pub fn spawn<S, F>(
        source: S,
        region: ViewRegion,
        target: Vector3<f32>,
        max_in_flight: usize,
        mut sink: F,
    ) -> Result<Self, LoadError>
    where
        S: GeometrySource + Send + 'static,
        F: FnMut(LoadEvent) + Send + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();

        let thread = thread::Builder::new()
            .name("geometry-loader".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        sink(LoadEvent::RegionFailed(LoadError::Runtime(err)));
                        return;
                    }
                };

                let work = Abortable::new(
                    load_region(&source, &region, target, max_in_flight, &mut sink),
                    registration,
                );
                match runtime.block_on(work) {
                    Ok(summary) => info!(
                        "Geometry load finished: {} loaded, {} failed",
                        summary.loaded, summary.failed
                    ),
                    Err(_) => debug!("Geometry load aborted"),
                }
                // DNS lookups run on the blocking pool; don't wait for them after an abort.
                runtime.shutdown_timeout(Duration::from_millis(100));
            })?;

        Ok(Self {
            abort,
            thread: Some(thread),
        })
    }

    /// Cancels all in-flight work; events already delivered stay delivered
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Aborts and waits for the loader thread to exit
    pub fn dispose(mut self) {
        self.abort();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Geometry loader thread panicked");
            }
        }
    }
}

impl Drop for LoaderTask {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::loader::{encode_payload, GeometryEntry, RegionItem};

    /// Answers immediately; sendable to the loader thread unlike the mock in `loader::tests`
    struct StaticSource {
        ids: Vec<String>,
    }

    impl GeometrySource for StaticSource {
        async fn fetch_region(&self, _region: &ViewRegion) -> Result<Vec<RegionItem>, LoadError> {
            Ok(self.ids.iter().cloned().map(RegionItem::Id).collect())
        }

        async fn fetch_entry(&self, id: &str) -> Result<GeometryEntry, LoadError> {
            Ok(GeometryEntry {
                id: id.to_string(),
                geometry_data: encode_payload("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n"),
                bounds: None,
                metadata: None,
            })
        }
    }

    /// Never answers the region query
    struct StalledSource;

    impl GeometrySource for StalledSource {
        async fn fetch_region(&self, _region: &ViewRegion) -> Result<Vec<RegionItem>, LoadError> {
            futures::future::pending().await
        }

        async fn fetch_entry(&self, _id: &str) -> Result<GeometryEntry, LoadError> {
            futures::future::pending().await
        }
    }

    fn region() -> ViewRegion {
        ViewRegion::new([0.0; 3], [1.0; 3], [2.0; 3]).unwrap()
    }

    #[test]
    fn test_task_delivers_events_in_order() {
        let (tx, rx) = mpsc::channel();
        let task = LoaderTask::spawn(
            StaticSource {
                ids: vec!["x".to_string(), "y".to_string()],
            },
            region(),
            Vector3::new(0.5, 0.5, 0.5),
            2,
            move |event| {
                let _ = tx.send(event);
            },
        )
        .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
            let done = matches!(event, LoadEvent::Finished { .. });
            events.push(event);
            if done {
                break;
            }
        }
        task.dispose();

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], LoadEvent::RegionResolved { .. }));
        assert!(matches!(events[3], LoadEvent::Finished { loaded: 2, failed: 0 }));
    }

    #[test]
    fn test_abort_cancels_stalled_load() {
        let (tx, rx) = mpsc::channel();
        let task = LoaderTask::spawn(
            StalledSource,
            region(),
            Vector3::new(0.0, 0.0, 0.0),
            1,
            move |event| {
                let _ = tx.send(event);
            },
        )
        .unwrap();

        assert!(!task.is_finished());
        task.dispose();
        assert_eq!(rx.try_iter().count(), 0);
    }
}
