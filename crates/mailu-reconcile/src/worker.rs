//! Reconciliation dispatcher
//!
//! Feeds object keys to a [`Reconciler`] with bounded concurrency and at most
//! one in-flight run per key. Requeue requests are honoured with a delayed
//! re-submit, and a periodic resync re-submits every stored key so objects
//! that ended in a terminal error are retried eventually.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{Outcome, Reconciler};
use crate::resource::MailResource;
use crate::store::ObjectKey;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of keys reconciled concurrently.
    pub concurrency: usize,

    /// How often every stored key is re-submitted.
    pub resync_interval: Duration,

    /// Delay before retrying a key whose reconciliation hit a transient error.
    pub error_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            resync_interval: Duration::from_secs(300),
            error_backoff: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct KeyState {
    in_flight: HashSet<ObjectKey>,
    /// Keys submitted again while in flight.
    dirty: HashSet<ObjectKey>,
}

/// Drives one [`Reconciler`] from a work queue.
pub struct Dispatcher<R: MailResource> {
    reconciler: Arc<Reconciler<R>>,
    config: DispatcherConfig,
    sender: mpsc::UnboundedSender<ObjectKey>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ObjectKey>>>,
    keys: Arc<Mutex<KeyState>>,
    shutdown: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
}

impl<R: MailResource> Dispatcher<R> {
    /// Create a dispatcher.
    pub fn new(reconciler: Reconciler<R>, config: DispatcherConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            reconciler: Arc::new(reconciler),
            config,
            sender,
            receiver: Mutex::new(Some(receiver)),
            keys: Arc::new(Mutex::new(KeyState::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
        }
    }

    /// Submit a key for reconciliation.
    pub fn enqueue(&self, key: ObjectKey) {
        if self.sender.send(key).is_err() {
            debug!("Work queue closed, dropping key");
        }
    }

    /// Run until [`Dispatcher::shutdown`] is called.
    #[instrument(skip(self), fields(kind = %R::KIND))]
    pub async fn run(&self) {
        let Some(mut receiver) = self.receiver.lock().await.take() else {
            warn!("Dispatcher is already running");
            return;
        };

        info!(
            concurrency = self.config.concurrency,
            resync_interval_secs = self.config.resync_interval.as_secs(),
            "Starting dispatcher"
        );

        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut resync = interval(self.config.resync_interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown_notify.notified() => {
                    info!("Dispatcher shutdown requested, stopping intake");
                    break;
                }
                Some(key) = receiver.recv() => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    self.dispatch(key, &semaphore).await;
                }
                _ = resync.tick() => {
                    self.resync().await;
                }
            }
        }

        info!("Waiting for in-flight reconciliations to complete...");
        let _ = semaphore.acquire_many(concurrency as u32).await;
        info!("Dispatcher stopped");
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.shutdown_notify.notify_one();
    }

    /// Check if shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    async fn resync(&self) {
        match self.reconciler.store().list_keys().await {
            Ok(keys) => {
                debug!(count = keys.len(), "Resync");
                for key in keys {
                    self.enqueue(key);
                }
            }
            Err(e) => error!(error = %e, "Failed to list keys for resync"),
        }
    }

    async fn dispatch(&self, key: ObjectKey, semaphore: &Arc<Semaphore>) {
        {
            let mut state = self.keys.lock().await;
            if state.in_flight.contains(&key) {
                state.dirty.insert(key);
                return;
            }
            state.in_flight.insert(key.clone());
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            self.keys.lock().await.in_flight.remove(&key);
            return;
        };

        let reconciler = Arc::clone(&self.reconciler);
        let sender = self.sender.clone();
        let keys = Arc::clone(&self.keys);
        let shutdown = Arc::clone(&self.shutdown);
        let error_backoff = self.config.error_backoff;

        tokio::spawn(async move {
            let _permit = permit;

            // A panicking reconcile must still release the key below.
            let run = {
                let key = key.clone();
                tokio::spawn(async move { reconciler.reconcile(&key).await })
            };

            match run.await {
                Err(e) => {
                    error!(key = %key, error = %e, "Reconciliation task panicked");
                }
                Ok(Ok(Outcome::Done)) => {
                    debug!(key = %key, "Reconciled");
                }
                Ok(Ok(Outcome::RequeueAfter(delay))) => {
                    debug!(key = %key, delay_secs = delay.as_secs(), "Requeue requested");
                    schedule(&sender, &shutdown, key.clone(), delay);
                }
                Ok(Err(e)) if e.is_transient() => {
                    warn!(key = %key, error = %e, "Transient reconciliation error, backing off");
                    schedule(&sender, &shutdown, key.clone(), error_backoff);
                }
                Ok(Err(e)) => {
                    error!(
                        key = %key,
                        error = %e,
                        code = e.error_code(),
                        "Reconciliation failed"
                    );
                }
            }

            let mut state = keys.lock().await;
            state.in_flight.remove(&key);
            if state.dirty.remove(&key) && !shutdown.load(Ordering::Relaxed) {
                let _ = sender.send(key);
            }
        });
    }
}

/// Re-submit `key` after `delay` unless the dispatcher is shutting down.
fn schedule(
    sender: &mpsc::UnboundedSender<ObjectKey>,
    shutdown: &Arc<AtomicBool>,
    key: ObjectKey,
    delay: Duration,
) {
    let sender = sender.clone();
    let shutdown = Arc::clone(shutdown);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !shutdown.load(Ordering::Relaxed) {
            let _ = sender.send(key);
        }
    });
}
