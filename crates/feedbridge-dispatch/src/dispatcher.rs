//! Bounded worker pool executing rendered requests.
//!
//! Submissions go into a FIFO queue. A pool task takes a free slot from a
//! semaphore before dequeuing the next request, so admission follows
//! submission order and at most `capacity` requests are in flight. Completion
//! order is not guaranteed.
//!
//! Every failure (transport error, timeout, non-OK status, malformed payload,
//! even a panicking worker) ends only the request it belongs to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use feedbridge_core::config::DEFAULT_POOL_SIZE;
use feedbridge_core::{BridgeConfig, RenderedRequest, ResponseFormat};
use feedbridge_normalize::ResponseNormalizer;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::transport::{OutputSink, Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("dispatcher is shutting down")]
    ShuttingDown,
    #[error("submission queue is full")]
    QueueFull,
    #[error("dispatch pool has stopped")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShutdownError {
    #[error("dispatcher already stopped")]
    AlreadyStopped,
    #[error("pool did not drain within {0:?}")]
    Timeout(Duration),
    #[error("dispatch pool failed: {0}")]
    Pool(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Maximum concurrent in-flight requests.
    pub capacity: usize,
    /// Bounded queue depth; `None` queues without limit.
    pub queue_depth: Option<usize>,
    /// Per-request timeout; `None` uses the transport default.
    pub timeout: Option<Duration>,
    pub format: ResponseFormat,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_SIZE,
            queue_depth: None,
            timeout: None,
            format: ResponseFormat::Json,
        }
    }
}

impl DispatchConfig {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            capacity: config.pool_size,
            queue_depth: config.queue_depth,
            timeout: config.timeout,
            format: config.response_format,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time dispatch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Accepted into the queue.
    pub submitted: u64,
    /// Refused at submission.
    pub rejected: u64,
    /// Answered with the OK status.
    pub completed: u64,
    /// Transport failure, timeout, non-OK status, or worker panic.
    pub failed: u64,
    /// Documents handed to the sink.
    pub emitted: u64,
    /// OK responses whose payload could not be normalized.
    pub dropped: u64,
}

/// Outcome of a completed drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub stats: DispatchStats,
    pub elapsed: Duration,
}

enum QueueTx {
    Unbounded(mpsc::UnboundedSender<RenderedRequest>),
    Bounded(mpsc::Sender<RenderedRequest>),
}

enum QueueRx {
    Unbounded(mpsc::UnboundedReceiver<RenderedRequest>),
    Bounded(mpsc::Receiver<RenderedRequest>),
}

impl QueueRx {
    async fn recv(&mut self) -> Option<RenderedRequest> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }
}

fn queue(depth: Option<usize>) -> (QueueTx, QueueRx) {
    match depth {
        Some(depth) => {
            let (tx, rx) = mpsc::channel(depth.max(1));
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        }
    }
}

/// Fire-and-forget request executor with a fixed number of slots.
pub struct Dispatcher {
    queue: Mutex<Option<QueueTx>>,
    pool: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<Counters>,
}

impl Dispatcher {
    /// Start the pool on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(
        config: DispatchConfig,
        transport: Arc<dyn Transport>,
        normalizer: Arc<ResponseNormalizer>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        let stats = Arc::new(Counters::default());
        let (tx, rx) = queue(config.queue_depth);
        let capacity = config.capacity.max(1);
        let worker = Arc::new(Worker {
            transport,
            normalizer,
            sink,
            timeout: config.timeout,
            format: config.format,
            stats: stats.clone(),
        });

        info!(
            capacity,
            queue_depth = ?config.queue_depth,
            timeout = ?config.timeout,
            format = %config.format,
            "dispatch pool started"
        );
        let pool = tokio::spawn(run_pool(rx, worker, capacity));

        Self {
            queue: Mutex::new(Some(tx)),
            pool: Mutex::new(Some(pool)),
            stats,
        }
    }

    /// Queue `request` for execution. Never waits for a free slot.
    pub fn submit(&self, request: RenderedRequest) -> Result<(), SubmitError> {
        let guard = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match guard.as_ref() {
            None => Err((SubmitError::ShuttingDown, request)),
            Some(QueueTx::Unbounded(tx)) => tx
                .send(request)
                .map_err(|e| (SubmitError::Closed, e.0)),
            Some(QueueTx::Bounded(tx)) => tx.try_send(request).map_err(|e| match e {
                TrySendError::Full(r) => (SubmitError::QueueFull, r),
                TrySendError::Closed(r) => (SubmitError::Closed, r),
            }),
        };
        drop(guard);

        match result {
            Ok(()) => {
                Counters::bump(&self.stats.submitted);
                Ok(())
            }
            Err((err, request)) => {
                Counters::bump(&self.stats.rejected);
                warn!(url = %request.url, error = %err, "request rejected");
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.snapshot()
    }

    /// Stop accepting requests and wait up to `wait` for queued and in-flight work.
    ///
    /// Queued requests still run. If `wait` elapses the remaining work keeps
    /// running detached and [`ShutdownError::Timeout`] is returned.
    pub async fn shutdown(&self, wait: Duration) -> Result<DrainReport, ShutdownError> {
        let queue = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let (Some(queue), Some(pool)) = (queue, pool) else {
            return Err(ShutdownError::AlreadyStopped);
        };
        // Closing the queue lets the pool finish once it is empty.
        drop(queue);

        info!(wait = ?wait, "draining dispatch pool");
        let started = Instant::now();
        match tokio::time::timeout(wait, pool).await {
            Ok(Ok(())) => {
                let stats = self.stats();
                let elapsed = started.elapsed();
                info!(
                    submitted = stats.submitted,
                    completed = stats.completed,
                    failed = stats.failed,
                    emitted = stats.emitted,
                    dropped = stats.dropped,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "dispatch pool drained"
                );
                Ok(DrainReport { stats, elapsed })
            }
            Ok(Err(e)) => Err(ShutdownError::Pool(e.to_string())),
            Err(_) => {
                error!(wait = ?wait, "dispatch pool did not drain in time");
                Err(ShutdownError::Timeout(wait))
            }
        }
    }
}

async fn run_pool(mut queue: QueueRx, worker: Arc<Worker>, capacity: usize) {
    let slots = Arc::new(Semaphore::new(capacity));
    let mut tasks = JoinSet::new();

    loop {
        // Take a slot before dequeuing so requests are admitted in submission order.
        let Ok(permit) = slots.clone().acquire_owned().await else {
            break;
        };
        let Some(request) = queue.recv().await else {
            break;
        };
        let task_worker = worker.clone();
        tasks.spawn(async move {
            let _permit = permit;
            task_worker.execute(request).await;
        });
        while let Some(joined) = tasks.try_join_next() {
            worker.reap(joined);
        }
    }

    while let Some(joined) = tasks.join_next().await {
        worker.reap(joined);
    }
    debug!("dispatch pool finished");
}

struct Worker {
    transport: Arc<dyn Transport>,
    normalizer: Arc<ResponseNormalizer>,
    sink: Arc<dyn OutputSink>,
    timeout: Option<Duration>,
    format: ResponseFormat,
    stats: Arc<Counters>,
}

impl Worker {
    async fn execute(&self, request: RenderedRequest) {
        let started = Instant::now();
        let outcome = match self.timeout {
            Some(limit) => {
                tokio::time::timeout(limit, self.transport.execute(&request, Some(limit)))
                    .await
                    .unwrap_or(Err(TransportError::Timeout(limit)))
            }
            None => self.transport.execute(&request, None).await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                Counters::bump(&self.stats.failed);
                error!(method = %request.method, url = %request.url, error = %e, elapsed_ms, "request failed");
                return;
            }
        };

        if !response.is_ok() {
            Counters::bump(&self.stats.failed);
            error!(
                method = %request.method,
                url = %request.url,
                status = response.status,
                status_text = %response.status_text,
                elapsed_ms,
                "request failed"
            );
            return;
        }
        Counters::bump(&self.stats.completed);
        debug!(url = %request.url, bytes = response.body.len(), elapsed_ms, "response received");

        if response.body.trim().is_empty() {
            debug!(url = %request.url, "empty response body, nothing to emit");
            return;
        }

        // Parsing and registry calls block; keep them off the async workers.
        let normalizer = self.normalizer.clone();
        let format = self.format;
        let body = response.body;
        let normalized =
            tokio::task::spawn_blocking(move || normalizer.normalize(&body, format)).await;

        match normalized {
            Ok(Ok(document)) => {
                self.sink.emit(document);
                Counters::bump(&self.stats.emitted);
            }
            Ok(Err(e)) => {
                Counters::bump(&self.stats.dropped);
                error!(url = %request.url, format = %self.format, error = %e, "record dropped");
            }
            Err(e) => {
                Counters::bump(&self.stats.dropped);
                error!(url = %request.url, format = %self.format, error = %e, "normalization task failed");
            }
        }
    }

    fn reap(&self, joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            Counters::bump(&self.stats.failed);
            if e.is_panic() {
                error!(error = %e, "dispatch worker panicked");
            } else {
                warn!(error = %e, "dispatch worker cancelled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemorySink, TransportResponse};
    use async_trait::async_trait;
    use feedbridge_normalize::{DelimitedOptions, SchemaMode};
    use feedbridge_schema::{
        InMemoryRegistry, SchemaCandidate, SchemaError, SchemaId, SchemaRegistry, SchemaResolver,
    };
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    type Respond = dyn Fn(&RenderedRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

    /// Transport answering from a closure after a delay, tracking concurrency.
    struct FakeTransport {
        delay: Duration,
        respond: Box<Respond>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(
            delay: Duration,
            respond: impl Fn(&RenderedRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                delay,
                respond: Box::new(respond),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn ok_json(delay: Duration) -> Arc<Self> {
            Self::new(delay, |req| {
                Ok(TransportResponse::ok(format!(r#"{{"url": "{}"}}"#, req.url)))
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(
            &self,
            request: &RenderedRequest,
            _timeout: Option<Duration>,
        ) -> Result<TransportResponse, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(request.url.clone());
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.respond)(request)
        }
    }

    fn normalizer() -> Arc<ResponseNormalizer> {
        normalizer_with(Arc::new(InMemoryRegistry::new()))
    }

    fn normalizer_with(registry: Arc<dyn SchemaRegistry>) -> Arc<ResponseNormalizer> {
        Arc::new(ResponseNormalizer::new(
            DelimitedOptions {
                separator: ",".into(),
                mode: SchemaMode::Create,
                schema_name: "test".into(),
                geometry_from_fields: false,
            },
            Arc::new(SchemaResolver::new(registry)),
        ))
    }

    /// Registry whose every call blocks the calling thread.
    struct SlowRegistry {
        inner: InMemoryRegistry,
        latency: Duration,
    }

    impl SchemaRegistry for SlowRegistry {
        fn search_by_name(&self, name: &str) -> Result<Vec<SchemaCandidate>, SchemaError> {
            std::thread::sleep(self.latency);
            self.inner.search_by_name(name)
        }

        fn get(&self, id: &SchemaId) -> Result<Option<SchemaCandidate>, SchemaError> {
            std::thread::sleep(self.latency);
            self.inner.get(id)
        }

        fn create(&self, name: &str, fields: Vec<String>) -> Result<SchemaCandidate, SchemaError> {
            std::thread::sleep(self.latency);
            self.inner.create(name, fields)
        }

        fn delete(&self, id: &SchemaId) -> Result<(), SchemaError> {
            self.inner.delete(id)
        }
    }

    fn start(
        config: DispatchConfig,
        transport: Arc<FakeTransport>,
    ) -> (Dispatcher, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::start(config, transport, normalizer(), sink.clone());
        (dispatcher, sink)
    }

    fn request(i: usize) -> RenderedRequest {
        RenderedRequest::get(format!("http://host/item/{i}"))
    }

    const DRAIN: Duration = Duration::from_secs(10);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fifty_requests_through_twenty_slots() {
        let transport = FakeTransport::ok_json(Duration::from_millis(20));
        let (dispatcher, sink) = start(
            DispatchConfig {
                capacity: 20,
                ..Default::default()
            },
            transport.clone(),
        );

        for i in 0..50 {
            dispatcher.submit(request(i)).unwrap();
        }
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;

        let mut calls = transport.calls();
        calls.sort();
        calls.dedup();
        assert_eq!(calls.len(), 50, "every request runs exactly once");
        assert_eq!(transport.calls().len(), 50);
        assert!(transport.peak.load(Ordering::SeqCst) <= 20);
        assert_eq!(stats.submitted, 50);
        assert_eq!(stats.completed, 50);
        assert_eq!(sink.len(), 50);
    }

    #[tokio::test]
    async fn admission_follows_submission_order() {
        let transport = FakeTransport::ok_json(Duration::from_millis(1));
        let (dispatcher, _sink) = start(
            DispatchConfig {
                capacity: 1,
                ..Default::default()
            },
            transport.clone(),
        );
        for i in 0..5 {
            dispatcher.submit(request(i)).unwrap();
        }
        dispatcher.shutdown(DRAIN).await.unwrap();

        let expected: Vec<String> = (0..5).map(|i| request(i).url).collect();
        assert_eq!(transport.calls(), expected);
    }

    #[tokio::test]
    async fn normalized_documents_reach_sink() {
        let transport = FakeTransport::new(Duration::ZERO, |_| {
            Ok(TransportResponse::ok("<a><b>1</b></a>"))
        });
        let (dispatcher, sink) = start(
            DispatchConfig {
                format: ResponseFormat::Xml,
                ..Default::default()
            },
            transport,
        );
        dispatcher.submit(request(1)).unwrap();
        dispatcher.shutdown(DRAIN).await.unwrap();

        let docs = sink.take();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].as_value(), &json!({"a": {"b": "1"}}));
    }

    #[tokio::test]
    async fn non_ok_status_is_dropped() {
        let transport = FakeTransport::new(Duration::ZERO, |_| {
            Ok(TransportResponse {
                status: 503,
                status_text: "Service Unavailable".into(),
                body: r#"{"error": true}"#.into(),
            })
        });
        let (dispatcher, sink) = start(DispatchConfig::default(), transport.clone());
        dispatcher.submit(request(1)).unwrap();
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;

        assert_eq!(transport.calls().len(), 1, "no retry");
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_isolated_to_its_request() {
        let transport = FakeTransport::new(Duration::from_millis(1), |req| {
            if req.url.ends_with("/2") {
                Err(TransportError::Connection("refused".into()))
            } else {
                Ok(TransportResponse::ok("{}"))
            }
        });
        let (dispatcher, sink) = start(DispatchConfig::default(), transport);
        for i in 0..5 {
            dispatcher.submit(request(i)).unwrap();
        }
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 4);
        assert_eq!(sink.len(), 4);
    }

    #[tokio::test]
    async fn panicking_worker_does_not_stop_pool() {
        let transport = FakeTransport::new(Duration::ZERO, |req| {
            if req.url.ends_with("/0") {
                panic!("transport blew up");
            }
            Ok(TransportResponse::ok("{}"))
        });
        let (dispatcher, sink) = start(
            DispatchConfig {
                capacity: 2,
                ..Default::default()
            },
            transport,
        );
        for i in 0..4 {
            dispatcher.submit(request(i)).unwrap();
        }
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;

        assert_eq!(stats.failed, 1);
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let transport = FakeTransport::ok_json(Duration::from_millis(500));
        let (dispatcher, sink) = start(
            DispatchConfig {
                timeout: Some(Duration::from_millis(20)),
                ..Default::default()
            },
            transport,
        );
        dispatcher.submit(request(1)).unwrap();
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;

        assert_eq!(stats.failed, 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_dropped() {
        let transport =
            FakeTransport::new(Duration::ZERO, |_| Ok(TransportResponse::ok("<a><b>")));
        let (dispatcher, sink) = start(
            DispatchConfig {
                format: ResponseFormat::Xml,
                ..Default::default()
            },
            transport,
        );
        dispatcher.submit(request(1)).unwrap();
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.dropped, 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn empty_body_emits_nothing() {
        let transport = FakeTransport::new(Duration::ZERO, |_| Ok(TransportResponse::ok("  ")));
        let (dispatcher, sink) = start(DispatchConfig::default(), transport);
        dispatcher.submit(request(1)).unwrap();
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.dropped, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn slow_registry_does_not_stall_the_runtime() {
        let transport = FakeTransport::new(Duration::ZERO, |_| Ok(TransportResponse::ok("1,a,2.5")));
        let registry = Arc::new(SlowRegistry {
            inner: InMemoryRegistry::new(),
            latency: Duration::from_millis(100),
        });
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::start(
            DispatchConfig {
                format: ResponseFormat::Csv,
                capacity: 5,
                ..Default::default()
            },
            transport,
            normalizer_with(registry),
            sink.clone(),
        );
        for i in 0..5 {
            dispatcher.submit(request(i)).unwrap();
        }

        // Timers on this single-threaded runtime still fire while the registry works.
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(
            started.elapsed() < Duration::from_millis(150),
            "runtime stalled for {:?}",
            started.elapsed()
        );

        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;
        assert_eq!(stats.emitted, 5);
        assert_eq!(sink.len(), 5);
    }

    #[tokio::test]
    async fn bounded_queue_rejects_when_full() {
        let transport = FakeTransport::ok_json(Duration::from_millis(10));
        let (dispatcher, _sink) = start(
            DispatchConfig {
                capacity: 1,
                queue_depth: Some(1),
                ..Default::default()
            },
            transport,
        );
        // The pool task has not run yet on this single-threaded runtime.
        dispatcher.submit(request(1)).unwrap();
        assert_eq!(dispatcher.submit(request(2)), Err(SubmitError::QueueFull));

        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_queued_work() {
        let transport = FakeTransport::ok_json(Duration::from_millis(5));
        let (dispatcher, sink) = start(
            DispatchConfig {
                capacity: 2,
                ..Default::default()
            },
            transport,
        );
        for i in 0..10 {
            dispatcher.submit(request(i)).unwrap();
        }
        let stats = dispatcher.shutdown(DRAIN).await.unwrap().stats;
        assert_eq!(stats.completed, 10);
        assert_eq!(sink.len(), 10);
    }

    #[tokio::test]
    async fn submit_after_shutdown_rejected() {
        let transport = FakeTransport::ok_json(Duration::ZERO);
        let (dispatcher, _sink) = start(DispatchConfig::default(), transport);
        dispatcher.shutdown(DRAIN).await.unwrap();

        assert_eq!(
            dispatcher.submit(request(1)),
            Err(SubmitError::ShuttingDown)
        );
        assert_eq!(
            dispatcher.shutdown(DRAIN).await,
            Err(ShutdownError::AlreadyStopped)
        );
    }

    #[tokio::test]
    async fn shutdown_wait_is_bounded() {
        let transport = FakeTransport::ok_json(Duration::from_secs(5));
        let (dispatcher, _sink) = start(DispatchConfig::default(), transport);
        dispatcher.submit(request(1)).unwrap();

        let started = Instant::now();
        let result = dispatcher.shutdown(Duration::from_millis(50)).await;
        assert_eq!(result, Err(ShutdownError::Timeout(Duration::from_millis(50))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
