//! Background chunk loading
//!
//! A small pool of worker threads services a FIFO of load requests and hands
//! finished chunks back over a channel. Workers poll the queue with a short
//! bounded sleep between empty checks and watch a session-wide cancellation
//! flag at loop granularity, so a shutdown is observed within one poll
//! interval. The simulation thread never blocks on a load; it drains
//! completed chunks once per tick and publishes them whole.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use dashmap::DashMap;
use glam::IVec2;

use super::chunk::Chunk;

/// Sleep between empty-queue polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A request to load one chunk
///
/// Priority is advisory metadata carried for queue-ordering experiments; the
/// queue itself is plain FIFO. Lower values mean more urgent.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest {
    pub coord: IVec2,
    pub priority: i32,
}

impl LoadRequest {
    pub fn new(coord: IVec2, priority: i32) -> Self {
        Self { coord, priority }
    }
}

/// Builds the chunk for a coordinate on a worker thread
pub trait ChunkSource: Send + Sync {
    fn build_chunk(&self, coord: IVec2) -> anyhow::Result<Chunk>;
}

/// Source producing bare chunks, for worlds without terrain colliders
pub struct EmptyChunkSource;

impl ChunkSource for EmptyChunkSource {
    fn build_chunk(&self, coord: IVec2) -> anyhow::Result<Chunk> {
        Ok(Chunk::new(coord))
    }
}

/// Handle to the background loading pool
pub struct ChunkLoader {
    request_tx: Sender<LoadRequest>,
    loaded_rx: Receiver<Chunk>,
    /// Coordinates queued or being built. Insertion here is the atomic
    /// check that guarantees at most one concurrent load per coordinate.
    in_flight: Arc<DashMap<IVec2, ()>>,
    cancel: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ChunkLoader {
    /// Spawn `worker_count` named worker threads polling at `poll_interval`
    pub fn new(
        source: Arc<dyn ChunkSource>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Self {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (loaded_tx, loaded_rx) = unbounded::<Chunk>();
        let in_flight: Arc<DashMap<IVec2, ()>> = Arc::new(DashMap::new());
        let cancel = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count.max(1) {
            let request_rx = request_rx.clone();
            let loaded_tx = loaded_tx.clone();
            let in_flight = Arc::clone(&in_flight);
            let cancel = Arc::clone(&cancel);
            let source = Arc::clone(&source);

            let handle = std::thread::Builder::new()
                .name(format!("chunk-loader-{index}"))
                .spawn(move || {
                    worker_loop(request_rx, loaded_tx, in_flight, cancel, source, poll_interval)
                })
                .expect("failed to spawn chunk loader worker thread");
            workers.push(handle);
        }

        log::debug!("[LOAD] started {} chunk loader worker(s)", workers.len());

        Self {
            request_tx,
            loaded_rx,
            in_flight,
            cancel,
            workers,
        }
    }

    /// One worker, default poll interval
    pub fn with_defaults(source: Arc<dyn ChunkSource>) -> Self {
        Self::new(source, 1, DEFAULT_POLL_INTERVAL)
    }

    /// Queue a chunk for loading. Returns false when the coordinate is
    /// already queued or in flight (the request is dropped, not an error).
    pub fn request(&self, request: LoadRequest) -> bool {
        use dashmap::mapref::entry::Entry;

        match self.in_flight.entry(request.coord) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(entry) => {
                entry.insert(());
            }
        }

        if self.request_tx.send(request).is_err() {
            // Workers are gone; roll the reservation back.
            self.in_flight.remove(&request.coord);
            return false;
        }
        true
    }

    /// Whether a load for this coordinate is queued or running
    pub fn is_pending(&self, coord: IVec2) -> bool {
        self.in_flight.contains_key(&coord)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Collect every chunk finished since the last call, releasing their
    /// coordinates for future requests. Call once per tick from the
    /// simulation thread.
    pub fn drain_loaded(&self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Ok(chunk) = self.loaded_rx.try_recv() {
            self.in_flight.remove(&chunk.coord);
            chunks.push(chunk);
        }
        chunks
    }

    /// Signal cancellation and join the workers. Workers observe the signal
    /// within one poll interval; an in-progress build finishes (its result is
    /// simply never drained) rather than being torn down mid-write.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.cancel.store(true, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("[LOAD] chunk loader worker panicked during shutdown");
            }
        }
        log::debug!("[LOAD] chunk loader stopped");
    }
}

impl Drop for ChunkLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    requests: Receiver<LoadRequest>,
    loaded: Sender<Chunk>,
    in_flight: Arc<DashMap<IVec2, ()>>,
    cancel: Arc<AtomicBool>,
    source: Arc<dyn ChunkSource>,
    poll_interval: Duration,
) {
    while !cancel.load(Ordering::Relaxed) {
        match requests.try_recv() {
            Ok(request) => match source.build_chunk(request.coord) {
                Ok(chunk) => {
                    log::debug!(
                        "[LOAD] built chunk ({}, {}) priority {}",
                        request.coord.x,
                        request.coord.y,
                        request.priority
                    );
                    if loaded.send(chunk).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    // Release the coordinate so a later request can retry.
                    log::error!(
                        "[LOAD] failed to build chunk ({}, {}): {e:#}",
                        request.coord.x,
                        request.coord.y
                    );
                    in_flight.remove(&request.coord);
                }
            },
            Err(TryRecvError::Empty) => std::thread::sleep(poll_interval),
            Err(TryRecvError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Counts builds, optionally slowing each one down
    struct CountingSource {
        builds: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(delay: Duration) -> Self {
            Self {
                builds: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl ChunkSource for CountingSource {
        fn build_chunk(&self, coord: IVec2) -> anyhow::Result<Chunk> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            Ok(Chunk::new(coord))
        }
    }

    /// Fails the first build for every coordinate, succeeds afterwards
    struct FailOnceSource {
        attempts: DashMap<IVec2, usize>,
    }

    impl ChunkSource for FailOnceSource {
        fn build_chunk(&self, coord: IVec2) -> anyhow::Result<Chunk> {
            let mut attempts = self.attempts.entry(coord).or_insert(0);
            *attempts += 1;
            if *attempts == 1 {
                anyhow::bail!("transient failure");
            }
            Ok(Chunk::new(coord))
        }
    }

    fn drain_until(loader: &ChunkLoader, count: usize, deadline: Duration) -> Vec<Chunk> {
        let start = Instant::now();
        let mut chunks = Vec::new();
        while chunks.len() < count && start.elapsed() < deadline {
            chunks.extend(loader.drain_loaded());
            std::thread::sleep(Duration::from_millis(2));
        }
        chunks
    }

    #[test]
    fn test_loads_complete_and_release() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        let loader = ChunkLoader::new(source, 2, Duration::from_millis(1));

        for x in 0..6 {
            assert!(loader.request(LoadRequest::new(IVec2::new(x, 0), x)));
        }

        let chunks = drain_until(&loader, 6, Duration::from_secs(5));
        assert_eq!(chunks.len(), 6);
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[test]
    fn test_duplicate_requests_build_once() {
        let source = Arc::new(CountingSource::new(Duration::from_millis(20)));
        let loader = ChunkLoader::new(Arc::clone(&source) as Arc<dyn ChunkSource>, 4, Duration::from_millis(1));

        let coord = IVec2::new(5, 5);
        assert!(loader.request(LoadRequest::new(coord, 0)));
        for _ in 0..10 {
            assert!(!loader.request(LoadRequest::new(coord, 0)));
        }

        let chunks = drain_until(&loader, 1, Duration::from_secs(5));
        assert_eq!(chunks.len(), 1);
        assert_eq!(source.builds.load(Ordering::SeqCst), 1);

        // Once drained the coordinate is free again.
        assert!(loader.request(LoadRequest::new(coord, 0)));
        let chunks = drain_until(&loader, 1, Duration::from_secs(5));
        assert_eq!(chunks.len(), 1);
        assert_eq!(source.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_build_releases_coordinate_for_retry() {
        let loader = ChunkLoader::new(
            Arc::new(FailOnceSource {
                attempts: DashMap::new(),
            }),
            1,
            Duration::from_millis(1),
        );

        let coord = IVec2::new(3, -3);
        assert!(loader.request(LoadRequest::new(coord, 0)));

        // The failing build never produces a chunk; wait for the release.
        let start = Instant::now();
        while loader.is_pending(coord) && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(!loader.is_pending(coord), "failed load must release its coordinate");
        assert!(loader.drain_loaded().is_empty());

        // Second attempt succeeds.
        assert!(loader.request(LoadRequest::new(coord, 0)));
        let chunks = drain_until(&loader, 1, Duration::from_secs(5));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].coord, coord);
    }

    #[test]
    fn test_shutdown_joins_within_poll_interval() {
        let mut loader = ChunkLoader::new(
            Arc::new(CountingSource::new(Duration::ZERO)),
            2,
            Duration::from_millis(10),
        );

        let start = Instant::now();
        loader.shutdown();
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "workers should observe cancellation within a poll interval"
        );

        // Requests after shutdown are refused once workers disconnect.
        loader.shutdown(); // idempotent
    }

    #[test]
    fn test_empty_source_builds_bare_chunk() {
        let chunk = EmptyChunkSource
            .build_chunk(IVec2::new(2, 7))
            .expect("build");
        assert_eq!(chunk.coord, IVec2::new(2, 7));
        assert!(chunk.tile_colliders().is_empty());
        assert_eq!(chunk.cached_entity_count(), 0);
    }
}
