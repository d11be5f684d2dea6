//! Startup and shutdown of the gateway's background resources.
//!
//! [`Lifespan`] starts resources in registration order before the first
//! request is admitted and stops them in reverse order after in-flight work
//! has drained. A partial start rolls back whatever already started.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TrackedFuture;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// A process-wide resource with an explicit start/stop lifecycle.
#[async_trait]
pub trait BackgroundResource: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), String>;

    async fn stop(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifespanError {
    /// A resource failed to start. Resources started before it were stopped.
    Start { resource: String, message: String },
    /// `stop` began before or during `start`. Anything started was stopped.
    AlreadyStopped,
    /// `start` already succeeded once.
    AlreadyStarted,
}

impl fmt::Display for LifespanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifespanError::Start { resource, message } => {
                write!(f, "Failed to start {resource}: {message}")
            }
            LifespanError::AlreadyStopped => write!(f, "Lifespan has already been stopped"),
            LifespanError::AlreadyStarted => write!(f, "Lifespan has already been started"),
        }
    }
}

impl StdError for LifespanError {}

/// Cheap-clone handle shared by the transports and the binary.
#[derive(Clone)]
pub struct Lifespan {
    inner: Arc<LifespanInner>,
}

struct LifespanInner {
    resources: Vec<Arc<dyn BackgroundResource>>,
    started: Mutex<Vec<Arc<dyn BackgroundResource>>>,
    accepting: AtomicBool,
    stopping: AtomicBool,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    grace_period: Duration,
}

impl Lifespan {
    pub fn new(resources: Vec<Arc<dyn BackgroundResource>>, grace_period: Duration) -> Self {
        Self {
            inner: Arc::new(LifespanInner {
                resources,
                started: Mutex::new(Vec::new()),
                accepting: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
                grace_period,
            }),
        }
    }

    /// Starts every resource in order, then opens admission. Returns
    /// [`LifespanError::AlreadyStopped`] if `stop` begins before admission
    /// opens; resources started so far are stopped again.
    pub async fn start(&self) -> Result<(), LifespanError> {
        if self.inner.stopping.load(Ordering::SeqCst) {
            return Err(LifespanError::AlreadyStopped);
        }

        let mut started = self.inner.started.lock().await;
        if self.inner.accepting.load(Ordering::SeqCst) {
            return Err(LifespanError::AlreadyStarted);
        }
        for resource in &self.inner.resources {
            debug!(resource = resource.name(), "Starting background resource");
            if let Err(message) = resource.start().await {
                warn!(resource = resource.name(), %message, "Background resource failed to start");
                roll_back(&mut started).await;
                return Err(LifespanError::Start {
                    resource: resource.name().to_string(),
                    message,
                });
            }
            started.push(Arc::clone(resource));
            if self.inner.stopping.load(Ordering::SeqCst) {
                break;
            }
        }

        // `stop` sets `stopping` before clearing `accepting`. Re-reading it
        // after the store means one side always closes admission.
        if !self.inner.stopping.load(Ordering::SeqCst) {
            self.inner.accepting.store(true, Ordering::SeqCst);
        }
        if self.inner.stopping.load(Ordering::SeqCst) {
            self.inner.accepting.store(false, Ordering::SeqCst);
            warn!("Lifespan stopped while starting; rolling back");
            roll_back(&mut started).await;
            return Err(LifespanError::AlreadyStopped);
        }

        info!(resources = started.len(), "Lifespan started");
        Ok(())
    }

    /// Stops admitting requests, waits for in-flight work to drain (bounded
    /// by the grace period), then stops every started resource in reverse
    /// order. Calling it more than once is a no-op.
    pub async fn stop(&self) {
        if self.inner.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.shutdown.cancel();
        self.inner.tracker.close();

        let in_flight = self.inner.tracker.len();
        if in_flight > 0 {
            debug!(in_flight, "Draining in-flight requests");
        }
        if tokio::time::timeout(self.inner.grace_period, self.inner.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.inner.tracker.len(),
                grace_ms = self.inner.grace_period.as_millis() as u64,
                "Grace period elapsed before in-flight requests drained"
            );
        }

        let mut started = self.inner.started.lock().await;
        roll_back(&mut started).await;
        info!("Lifespan stopped");
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Cancelled as soon as `stop` begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Wraps `future` so that `stop` waits for it before tearing down resources.
    pub fn track<F: Future>(&self, future: F) -> TrackedFuture<F> {
        self.inner.tracker.track_future(future)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }
}

async fn roll_back(started: &mut Vec<Arc<dyn BackgroundResource>>) {
    while let Some(previous) = started.pop() {
        debug!(resource = previous.name(), "Stopping background resource");
        previous.stop().await;
    }
}

/// Shared outbound HTTP client for vendor calls, built on start and released
/// on stop.
pub struct HttpClientPool {
    client: RwLock<Option<reqwest::Client>>,
    timeout: Duration,
}

impl HttpClientPool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: RwLock::new(None),
            timeout,
        }
    }

    /// Returns the pooled client, or `None` outside the started window.
    pub fn client(&self) -> Option<reqwest::Client> {
        self.client
            .read()
            .ok()
            .and_then(|client| client.as_ref().cloned())
    }
}

#[async_trait]
impl BackgroundResource for HttpClientPool {
    fn name(&self) -> &str {
        "http-client-pool"
    }

    async fn start(&self) -> Result<(), String> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("switchboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| err.to_string())?;
        let mut slot = self
            .client
            .write()
            .map_err(|_| "HTTP client pool lock poisoned".to_string())?;
        *slot = Some(client);
        Ok(())
    }

    async fn stop(&self) {
        if let Ok(mut slot) = self.client.write() {
            slot.take();
        }
    }
}
