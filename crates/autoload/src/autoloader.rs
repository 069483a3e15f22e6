//! Lifecycle controller: startup discovery, mutation subscription, and shutdown.
//!
//! # Task layout
//!
//! - `enable()` runs discovery and the initial load on the caller's task,
//!   then spawns one pump task that owns the mutation subscription.
//! - The pump turns each mutation batch into a delta and spawns a separate
//!   task per non-empty delta, so batches overlap freely and stopping the
//!   pump never cancels a load already in flight.
//! - `disable()` cancels the pump via its token; the subscription is dropped
//!   when the pump exits.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::{
    sync::{Mutex as AsyncMutex, broadcast},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    AttributeSelector, AutoloadConfig, BatchOrigin, BatchReport, DocumentTree, Loader,
    LoadOutcome, ModuleImporter, MutationSource, MutationSubscription, ObserveOptions, Registry,
    Result, delta::mutation_targets,
};

/// Capacity of the batch report channel.
const REPORT_CAPACITY: usize = 256;

/// External capabilities the autoloader is composed from.
#[derive(Clone)]
pub struct Collaborators {
    /// Tree queried once at startup.
    pub document: Arc<dyn DocumentTree>,
    /// Source of mutation batches after startup.
    pub mutations: Arc<dyn MutationSource>,
    /// Dynamic import capability.
    pub importer: Arc<dyn ModuleImporter>,
    /// Registration target and error sink.
    pub registry: Arc<dyn Registry>,
}

/// Active subscription: pump task plus its cancellation token.
struct Watch {
    /// Cancels the pump loop.
    token: CancellationToken,
    /// Pump task handle.
    handle: JoinHandle<()>,
}

impl Watch {
    /// False once the pump has exited, e.g. because the source closed.
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Shared state behind an [`Autoloader`] handle.
struct Inner {
    /// Batch loader.
    loader: Loader,
    /// Tree queried at startup.
    document: Arc<dyn DocumentTree>,
    /// Mutation source subscribed to while enabled.
    mutations: Arc<dyn MutationSource>,
    /// Discovery selector, `[attribute]`.
    selector: AttributeSelector,
    /// Serializes `enable()` calls.
    gate: AsyncMutex<()>,
    /// Current subscription, if enabled.
    watch: Mutex<Option<Watch>>,
    /// Bumped by `disable()` so a racing `enable()` does not subscribe afterwards.
    generation: AtomicU64,
    /// Settled batch reports.
    reports: broadcast::Sender<BatchReport>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(watch) = self.watch.get_mut().take() {
            watch.token.cancel();
        }
    }
}

/// Discovers declared behaviors, loads them, and keeps loading as the tree changes.
///
/// Construct with [`Autoloader::new`], then call [`Autoloader::enable`]. The
/// handle is cheap to clone; clones share one subscription.
#[derive(Clone)]
pub struct Autoloader {
    /// Shared state.
    inner: Arc<Inner>,
}

impl Autoloader {
    /// Create a disabled autoloader.
    pub fn new(collaborators: Collaborators, cfg: AutoloadConfig) -> Self {
        let selector = AttributeSelector::new(cfg.attribute.clone());
        let loader = Loader::new(
            collaborators.importer,
            collaborators.registry,
            Arc::new(cfg),
        );
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                loader,
                document: collaborators.document,
                mutations: collaborators.mutations,
                selector,
                gate: AsyncMutex::new(()),
                watch: Mutex::new(None),
                generation: AtomicU64::new(0),
                reports,
            }),
        }
    }

    /// The underlying batch loader.
    pub fn loader(&self) -> &Loader {
        &self.inner.loader
    }

    /// Discovery selector.
    pub fn selector(&self) -> &AttributeSelector {
        &self.inner.selector
    }

    /// True while a mutation subscription is active.
    ///
    /// A subscription whose source has closed no longer counts.
    pub fn is_enabled(&self) -> bool {
        self.inner.watch.lock().as_ref().is_some_and(Watch::is_live)
    }

    /// Subscribe to settled batch reports (initial and mutation-driven).
    pub fn reports(&self) -> broadcast::Receiver<BatchReport> {
        self.inner.reports.subscribe()
    }

    /// Load everything currently declared, then start watching for changes.
    ///
    /// Returns once every initial task has settled. Load failures are logged
    /// to the registry and show up in the returned report; the only error
    /// returned here is a failure to subscribe. Calling this while already
    /// enabled is a no-op returning an empty report.
    pub async fn enable(&self) -> Result<BatchReport> {
        let _gate = self.inner.gate.lock().await;
        if self.is_enabled() {
            debug!("autoloader already enabled");
            return Ok(BatchReport {
                origin: BatchOrigin::Initial,
                outcomes: Arc::from(Vec::<LoadOutcome>::new()),
            });
        }
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let elements = self.inner.document.query_all(&self.inner.selector);
        debug!(
            selector = %self.inner.selector,
            count = elements.len(),
            "autoload discovery"
        );
        let outcomes = self.inner.loader.load_elements(&elements).await;
        let report = publish(&self.inner.reports, BatchOrigin::Initial, outcomes);

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!("autoloader disabled during initial load; not subscribing");
            return Ok(report);
        }

        let subscription = self
            .inner
            .mutations
            .observe(ObserveOptions::for_attribute(self.inner.selector.attribute()))?;

        // Checked again under the watch lock: `disable()` bumps the generation
        // before it takes the lock.
        let mut watch = self.inner.watch.lock();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!("autoloader disabled while subscribing; dropping subscription");
            return Ok(report);
        }
        if let Some(stale) = watch.take() {
            stale.token.cancel();
        }
        let token = CancellationToken::new();
        let handle = tokio::spawn(pump(
            subscription,
            self.inner.loader.clone(),
            self.inner.reports.clone(),
            token.clone(),
        ));
        *watch = Some(Watch { token, handle });
        debug!("autoloader enabled");
        Ok(report)
    }

    /// Stop watching for changes (non-blocking).
    ///
    /// Loads already in flight run to completion.
    pub fn disable(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(watch) = self.inner.watch.lock().take() {
            watch.token.cancel();
            debug!("autoloader disabled");
        }
    }

    /// Stop watching and wait for the pump task to release its subscription.
    pub async fn disable_async(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let watch = self.inner.watch.lock().take();
        if let Some(watch) = watch {
            watch.token.cancel();
            if let Err(e) = watch.handle.await {
                debug!(error = %e, "autoload pump ended abnormally");
            }
            debug!("autoloader disabled");
        }
    }
}

/// Wrap settled outcomes in a report and broadcast it.
fn publish(
    reports: &broadcast::Sender<BatchReport>,
    origin: BatchOrigin,
    outcomes: Vec<LoadOutcome>,
) -> BatchReport {
    let report = BatchReport {
        origin,
        outcomes: Arc::from(outcomes),
    };
    debug!(?origin, outcomes = report.outcomes.len(), "batch report");
    // No receivers is fine; reports are diagnostic.
    reports.send(report.clone()).ok();
    report
}

/// Read mutation batches until cancelled or the source closes.
async fn pump(
    mut subscription: MutationSubscription,
    loader: Loader,
    reports: broadcast::Sender<BatchReport>,
    token: CancellationToken,
) {
    loop {
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            batch = subscription.next_batch() => match batch {
                Some(batch) => batch,
                None => {
                    debug!("mutation source closed");
                    break;
                }
            },
        };
        let targets = mutation_targets(&batch, &loader.config().attribute);
        if targets.is_empty() {
            trace!(records = batch.len(), "mutation batch without declarations");
            continue;
        }
        trace!(
            records = batch.len(),
            targets = targets.len(),
            "mutation delta"
        );
        let loader = loader.clone();
        let reports = reports.clone();
        tokio::spawn(async move {
            let outcomes = loader.load_elements(&targets).await;
            publish(&reports, BatchOrigin::Mutation, outcomes);
        });
    }
}
