//! Refresh coordination
//!
//! A refresh moves through `Idle → Downloading → Extracting → Done → Idle`.
//! Only one refresh may run at a time; a second request while one is in flight
//! is rejected with [`Error::RefreshInProgress`].
//!
//! Events of one refresh travel through a single ordered channel owned by the
//! returned [`RefreshHandle`], so the caller observes them sequentially on its
//! own task. The same events are mirrored to a broadcast channel for passive
//! observers obtained via [`SyncCoordinator::subscribe`].


use crate::config::Config;
use crate::error::{Error, InstallError, Result};
use crate::fetch::ArchiveFetcher;
use crate::install::{ArchiveInstaller, InstallReport};
use crate::store::LayeredStore;
use crate::types::{Event, RefreshPhase, RefreshState};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message of the terminal event of a successful refresh
pub const SUCCESS_MESSAGE: &str = "Cache updated successfully";

/// Label of the single transition event between download and install
pub const EXTRACTING_LABEL: &str = "Extracting…";

/// Owns the page store and runs refreshes of its cache layer
#[derive(Clone)]
pub struct SyncCoordinator {
    config: Arc<Config>,
    store: LayeredStore,
    fetcher: ArchiveFetcher,
    refreshing: Arc<AtomicBool>,
    state: Arc<Mutex<Option<RefreshState>>>,
    event_tx: broadcast::Sender<Event>,
}

impl SyncCoordinator {
    /// Validate `config`, create the cache directory and build the store
    ///
    /// A page tree left aside by an install that was interrupted mid-swap is
    /// restored before the store is built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let cache_dir = config.store.cache_dir();
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| InstallError::io("create directory", &cache_dir, e))?;
        ArchiveInstaller::recover_interrupted(&config.store.cache_root)?;

        let store = LayeredStore::new(&config.store);
        let fetcher = ArchiveFetcher::new(&config.sync)?;
        let (event_tx, _rx) = broadcast::channel(config.sync.event_capacity.max(1));

        info!(
            bundled_root = ?config.store.bundled_root,
            cache_root = ?config.store.cache_root,
            active_layer = %store.resolve_active_layer(),
            "sync coordinator ready"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            fetcher,
            refreshing: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(None)),
            event_tx,
        })
    }

    /// Read-side view over the page trees
    pub fn store(&self) -> &LayeredStore {
        &self.store
    }

    /// Configuration this coordinator was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to the events of every refresh started after this call
    ///
    /// Receivers that fall behind lose the oldest events (see
    /// [`broadcast::error::RecvError::Lagged`]); the handle's own channel never does.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Snapshot of the in-flight refresh, or `None` when idle
    pub fn state(&self) -> Option<RefreshState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a refresh of the cache layer
    ///
    /// Must be called from within a tokio runtime. Returns
    /// [`Error::RefreshInProgress`] without touching the running refresh if one
    /// is already in flight.
    pub fn refresh(&self) -> Result<RefreshHandle> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("refresh requested while another is running");
            return Err(Error::RefreshInProgress);
        }
        let guard = RefreshGuard {
            flag: self.refreshing.clone(),
            state: self.state.clone(),
        };
        guard.set(RefreshState::new());

        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let pipeline = RefreshPipeline {
            url: self.config.sync.archive_url.clone(),
            archive_path: self.config.archive_path(),
            cache_root: self.config.store.cache_root.clone(),
            fetcher: self.fetcher.clone(),
            cancel: cancel.clone(),
            tx,
            event_tx: self.event_tx.clone(),
        };

        info!(url = %pipeline.url, "starting cache refresh");

        let task = tokio::spawn(async move {
            let result = pipeline.run(&guard).await;

            let finished = match &result {
                Ok(_) => Event::Finished {
                    success: true,
                    message: SUCCESS_MESSAGE.to_string(),
                },
                Err(e) => Event::Finished {
                    success: false,
                    message: e.user_message(),
                },
            };

            // Subscribers get this refresh's terminal event before any event of the
            // next one, and the handle's owner sees the flag already released
            pipeline.broadcast(finished.clone());
            drop(guard);
            pipeline.deliver(finished);
            result
        });

        Ok(RefreshHandle {
            events,
            task,
            cancel,
        })
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("store", &self.store)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag and state snapshot when a refresh ends, even on panic
struct RefreshGuard {
    flag: Arc<AtomicBool>,
    state: Arc<Mutex<Option<RefreshState>>>,
}

impl RefreshGuard {
    fn set(&self, state: RefreshState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(state);
    }

    fn update(&self, f: impl FnOnce(&mut RefreshState)) {
        if let Some(state) = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            f(state);
        }
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.flag.store(false, Ordering::SeqCst);
    }
}

struct RefreshPipeline {
    url: String,
    archive_path: PathBuf,
    cache_root: PathBuf,
    fetcher: ArchiveFetcher,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Event>,
    event_tx: broadcast::Sender<Event>,
}

impl RefreshPipeline {
    async fn run(&self, guard: &RefreshGuard) -> Result<InstallReport> {
        let fetched = self
            .fetcher
            .fetch_with_cancel(&self.url, &self.archive_path, &self.cancel, |progress| {
                guard.update(|state| {
                    state.bytes_downloaded = progress.bytes_received;
                    state.total_bytes = progress.total_bytes;
                });
                self.emit(Event::Progress {
                    phase: RefreshPhase::Downloading,
                    fraction: progress.fraction,
                    label: progress.label,
                });
            })
            .await?;

        if self.cancel.is_cancelled() {
            if let Err(e) = tokio::fs::remove_file(&fetched.path).await {
                warn!(path = ?fetched.path, error = %e, "failed to remove downloaded archive");
            }
            info!("refresh cancelled before install");
            return Err(Error::Cancelled);
        }

        guard.update(|state| state.phase = RefreshPhase::Extracting);
        self.emit(Event::Progress {
            phase: RefreshPhase::Extracting,
            fraction: 1.0,
            label: EXTRACTING_LABEL.to_string(),
        });

        let report = ArchiveInstaller::install(&fetched.path, &self.cache_root).await?;
        guard.update(|state| state.phase = RefreshPhase::InstallingDone);

        info!(
            cache_root = ?report.cache_root,
            languages = report.languages,
            pages = report.pages,
            bytes = fetched.bytes,
            "cache refresh finished"
        );
        Ok(report)
    }

    fn emit(&self, event: Event) {
        self.deliver(event.clone());
        self.broadcast(event);
    }

    // Receivers may be gone; a refresh is never aborted for lack of observers
    fn deliver(&self, event: Event) {
        self.tx.send(event).ok();
    }

    fn broadcast(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Handle to one running refresh
///
/// Dropping the handle does not stop the refresh; call [`cancel`](Self::cancel)
/// for that.
#[derive(Debug)]
pub struct RefreshHandle {
    events: mpsc::UnboundedReceiver<Event>,
    task: JoinHandle<Result<InstallReport>>,
    cancel: CancellationToken,
}

impl RefreshHandle {
    /// Next event of this refresh, or `None` once the terminal event has been taken
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Request cancellation
    ///
    /// Honored while downloading and before the install starts. An install that
    /// has already begun runs to completion, since it swaps the tree atomically.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the refresh to end, discarding any events not yet taken
    pub async fn wait(self) -> Result<InstallReport> {
        self.task
            .await
            .map_err(|e| InstallError::TaskFailed(e.to_string()))?
    }

    /// Deliver every event to the callbacks, in order, then return the outcome
    ///
    /// `on_progress` receives `(fraction, label)` for each progress event and
    /// `on_finished` receives `(success, message)` exactly once.
    pub async fn drive(
        mut self,
        mut on_progress: impl FnMut(f64, &str),
        on_finished: impl FnOnce(bool, &str),
    ) -> Result<InstallReport> {
        let mut on_finished = Some(on_finished);
        while let Some(event) = self.events.recv().await {
            match event {
                Event::Progress {
                    fraction, label, ..
                } => on_progress(fraction, &label),
                Event::Finished { success, message } => {
                    if let Some(on_finished) = on_finished.take() {
                        on_finished(success, &message);
                    }
                }
            }
        }
        self.wait().await
    }
}
