//! Email Dispatcher
//!
//! A single long-lived task owning a bounded FIFO queue of confirmation
//! emails. Producers enqueue fire-and-forget; when the queue is full the
//! producer suspends until capacity frees up (backpressure instead of
//! dropping work). The task drains everything currently queued into a
//! batch, dispatches the batch with bounded parallelism, and waits for the
//! whole batch before draining again.
//!
//! Delivery failures never reach the HTTP layer: failed jobs are retried
//! with linear backoff and dropped after the retry ceiling, leaving resend
//! as the user's recovery path.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::ports::{EmailTransport, TransportError};
use crate::support::shutdown::ShutdownSignal;

/// One queued confirmation email.
#[derive(Debug, Clone)]
pub struct EmailJob {
    pub recipient: String,
    pub code: String,
    pub retry_count: u32,
}

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bounded queue capacity; producers suspend beyond this.
    pub queue_capacity: usize,
    /// Concurrency slots for simultaneous outbound sends.
    pub max_parallel_sends: usize,
    /// Retries per job after the initial attempt.
    pub max_retries: u32,
    /// Deadline for a single delivery attempt.
    pub send_timeout: Duration,
    /// Retry n is re-enqueued after `retry_base_delay * n`.
    pub retry_base_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            max_parallel_sends: 10,
            max_retries: 3,
            send_timeout: Duration::from_secs(15),
            retry_base_delay: Duration::from_secs(30),
        }
    }
}

/// Why a delivery attempt failed. Internal to the dispatcher.
#[derive(Debug, Error)]
enum DispatchFailure {
    #[error(transparent)]
    Transport(TransportError),
    #[error("send timed out")]
    Timeout,
    #[error("shutdown in progress")]
    Shutdown,
}

/// Producer handle for the dispatch queue.
///
/// Cheap to clone; the background task stops when shutdown is triggered.
#[derive(Clone)]
pub struct EmailDispatcher {
    tx: mpsc::Sender<EmailJob>,
}

impl EmailDispatcher {
    /// Spawn the background task and return the producer handle plus the
    /// task handle for joining on shutdown.
    pub fn start(
        transport: Arc<dyn EmailTransport>,
        config: DispatcherConfig,
        shutdown: ShutdownSignal,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let worker = DispatchWorker {
            rx,
            tx: tx.clone(),
            transport,
            config,
            shutdown,
        };
        let handle = tokio::spawn(worker.run());
        (Self { tx }, handle)
    }

    /// Queue a confirmation email.
    ///
    /// Suspends the caller while the queue is at capacity. Enqueueing after
    /// the dispatcher stopped logs and discards the job; email delivery is
    /// best-effort by contract.
    pub async fn enqueue(&self, recipient: String, code: String) {
        let job = EmailJob {
            recipient,
            code,
            retry_count: 0,
        };
        if let Err(e) = self.tx.send(job).await {
            warn!(recipient = %e.0.recipient, "email dispatcher stopped, job discarded");
        }
    }
}

struct DispatchWorker {
    rx: mpsc::Receiver<EmailJob>,
    /// Kept for delayed re-enqueue of failed jobs.
    tx: mpsc::Sender<EmailJob>,
    transport: Arc<dyn EmailTransport>,
    config: DispatcherConfig,
    shutdown: ShutdownSignal,
}

impl DispatchWorker {
    async fn run(mut self) {
        let slots = Arc::new(Semaphore::new(self.config.max_parallel_sends));
        info!(
            capacity = self.config.queue_capacity,
            parallel_sends = self.config.max_parallel_sends,
            "email dispatcher started"
        );

        'main: loop {
            // Cancellation point 1: waiting for queue contents.
            let first = tokio::select! {
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = self.shutdown.notified().wait() => break,
            };

            // Drain everything currently queued into one batch.
            let mut batch = vec![first];
            while let Ok(job) = self.rx.try_recv() {
                batch.push(job);
            }
            debug!(jobs = batch.len(), "dispatching email batch");

            let mut inflight = JoinSet::new();
            for job in batch {
                // Cancellation point 2: waiting for a concurrency slot.
                let permit = tokio::select! {
                    permit = slots.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break 'main,
                    },
                    _ = self.shutdown.notified().wait() => {
                        while inflight.join_next().await.is_some() {}
                        break 'main;
                    }
                };

                let transport = Arc::clone(&self.transport);
                let tx = self.tx.clone();
                let config = self.config.clone();
                let shutdown = self.shutdown.clone();
                inflight.spawn(async move {
                    let _permit = permit;
                    deliver(job, transport, tx, config, shutdown).await;
                });
            }

            // The whole batch finishes before the next drain.
            while inflight.join_next().await.is_some() {}
        }

        info!("email dispatcher stopped");
    }
}

/// One delivery attempt, with retry scheduling on failure.
async fn deliver(
    job: EmailJob,
    transport: Arc<dyn EmailTransport>,
    tx: mpsc::Sender<EmailJob>,
    config: DispatcherConfig,
    shutdown: ShutdownSignal,
) {
    // Cancellation point 3: the send deadline raced with shutdown.
    let outcome = tokio::select! {
        result = tokio::time::timeout(
            config.send_timeout,
            transport.send_confirmation(&job.recipient, &job.code),
        ) => match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DispatchFailure::Transport(e)),
            Err(_) => Err(DispatchFailure::Timeout),
        },
        _ = shutdown.notified().wait() => Err(DispatchFailure::Shutdown),
    };

    match outcome {
        Ok(()) => {
            counter!("emails_sent_total").increment(1);
            info!(recipient = %job.recipient, "confirmation email sent");
        }
        Err(DispatchFailure::Shutdown) => {
            warn!(recipient = %job.recipient, "send aborted by shutdown");
        }
        Err(failure) => schedule_retry(job, &failure, tx, &config, shutdown),
    }
}

/// Re-enqueue a failed job after its backoff delay, or drop it once the
/// retry ceiling is reached. Timeouts and transport errors are treated
/// identically.
fn schedule_retry(
    job: EmailJob,
    failure: &DispatchFailure,
    tx: mpsc::Sender<EmailJob>,
    config: &DispatcherConfig,
    shutdown: ShutdownSignal,
) {
    if job.retry_count >= config.max_retries {
        counter!("emails_dropped_total").increment(1);
        error!(
            recipient = %job.recipient,
            attempts = job.retry_count + 1,
            error = %failure,
            "confirmation email dropped after exhausting retries"
        );
        return;
    }

    let retry = EmailJob {
        retry_count: job.retry_count + 1,
        ..job
    };
    let delay = config.retry_base_delay * retry.retry_count;
    counter!("emails_retried_total").increment(1);
    warn!(
        recipient = %retry.recipient,
        retry = retry.retry_count,
        delay_secs = delay.as_secs(),
        error = %failure,
        "email send failed, retry scheduled"
    );

    // Detached timer; the retry re-enters at the back of the queue. A timer
    // that observes shutdown must not re-enqueue.
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                if shutdown.is_triggered() {
                    warn!(recipient = %retry.recipient, "retry canceled by shutdown");
                    return;
                }
                if tx.send(retry).await.is_err() {
                    warn!("email dispatcher stopped, retry discarded");
                }
            }
            _ = shutdown.notified().wait() => {
                warn!(recipient = %retry.recipient, "retry canceled by shutdown");
            }
        }
    });
}
