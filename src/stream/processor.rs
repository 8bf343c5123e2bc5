//! # Stream Command Processor
//!
//! Long-running mode: read control lines, queue jobs, synthesize them one at
//! a time on a dedicated worker thread.
//!
//! ## States:
//! - **Idle**: constructed, nothing running
//! - **Running**: worker started, control lines being read
//! - **Draining**: control loop ended (`exit`, end of input or interrupt);
//!   the shutdown sentinel is queued behind the remaining jobs
//! - **Stopped**: worker observed the sentinel, or the wait for it ran out
//!
//! ## Threads:
//! The control loop runs on the async runtime and is the only producer. The
//! worker is a plain OS thread and the only consumer, and the only code that
//! touches the voice model. A blocking worker thread keeps long synthesis
//! calls off the runtime's threads.
//!
//! ## Shutdown:
//! After `exit` or end of input every queued job still runs. After an
//! interrupt the processor waits at most `shutdown_timeout` for the worker.

use super::channel::ControlReader;
use super::job::ControlLine;
use super::report::{Status, StatusSink};
use crate::synthesis::{OutputNaming, SynthesisOrchestrator};
use anyhow::{Context, Result};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Counts for the final shutdown banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub queued: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Whether the worker stopped before the processor gave up waiting
    pub worker_stopped: bool,
}

/// Worker queue entries. `Shutdown` is the sentinel.
enum QueueItem {
    Job { text: String, destination: PathBuf },
    Shutdown,
}

#[derive(Default)]
struct WorkerCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Why the control loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Exit,
    EndOfInput,
    Interrupted,
}

pub struct StreamCommandProcessor {
    language: String,
    naming: OutputNaming,
    sink: Arc<dyn StatusSink>,
    shutdown_timeout: Duration,
    state: ProcessorState,
}

impl StreamCommandProcessor {
    /// `language` is fixed for the session. `naming` resolves job paths
    /// before `QUEUED` is reported, so QUEUED and SUCCESS carry the same path.
    pub fn new(
        language: impl Into<String>,
        naming: OutputNaming,
        sink: Arc<dyn StatusSink>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            language: language.into(),
            naming,
            sink,
            shutdown_timeout,
            state: ProcessorState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    fn transition(&mut self, next: ProcessorState) {
        debug!(from = ?self.state, to = ?next, "stream state");
        self.state = next;
    }

    /// Run the stream until `exit`, end of `input`, or `shutdown` resolves.
    ///
    /// The orchestrator is moved onto the worker thread and dropped there.
    /// It receives fully resolved destinations, so it should be built with
    /// pass-through naming (`OutputNaming::single_shot()`).
    pub async fn run<R, F>(
        &mut self,
        orchestrator: SynthesisOrchestrator,
        input: R,
        shutdown: F,
    ) -> Result<StreamSummary>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = ()>,
    {
        let (queue, jobs) = mpsc::unbounded_channel();
        let (drained_tx, mut drained) = oneshot::channel();
        let counters = Arc::new(WorkerCounters::default());

        let worker = {
            let sink = Arc::clone(&self.sink);
            let counters = Arc::clone(&counters);
            let language = self.language.clone();
            thread::Builder::new()
                .name("synthesis-worker".to_string())
                .spawn(move || run_worker(orchestrator, language, jobs, sink, counters, drained_tx))
                .context("starting synthesis worker")?
        };
        self.transition(ProcessorState::Running);
        info!(language = %self.language, "stream mode started");

        let mut summary = StreamSummary::default();
        tokio::pin!(shutdown);
        let mut channel = ControlReader::new(input);

        let reason = loop {
            let read = tokio::select! {
                read = channel.next_line() => read,
                _ = &mut shutdown => break StopReason::Interrupted,
            };
            let line = match read {
                Ok(Some(line)) => line,
                Ok(None) => break StopReason::EndOfInput,
                Err(e) => {
                    warn!(error = %e, "control channel read failed");
                    break StopReason::EndOfInput;
                }
            };

            match ControlLine::parse(&line) {
                Ok(ControlLine::Blank) => {}
                Ok(ControlLine::Exit) => break StopReason::Exit,
                Ok(ControlLine::Job(job)) => {
                    let destination = self.naming.resolve(job.destination.as_deref(), &self.language);
                    self.sink.emit(Status::Queued(destination.clone()));
                    let item = QueueItem::Job {
                        text: job.text,
                        destination,
                    };
                    if queue.send(item).is_err() {
                        warn!("synthesis worker is gone, no further jobs accepted");
                        self.sink.emit(Status::Error("synthesis worker is not running".to_string()));
                        break StopReason::EndOfInput;
                    }
                    summary.queued += 1;
                }
                Err(e) => {
                    summary.rejected += 1;
                    warn!(error = %e, "rejected control line");
                    self.sink.emit(Status::Error(e.to_string()));
                }
            }
        };

        self.transition(ProcessorState::Draining);
        info!(reason = ?reason, pending = summary.queued, "control loop finished, draining queue");
        let _ = queue.send(QueueItem::Shutdown);
        drop(queue);

        let drained_in_time = if reason == StopReason::Interrupted {
            timeout(self.shutdown_timeout, &mut drained).await.is_ok()
        } else {
            tokio::select! {
                _ = &mut drained => true,
                _ = &mut shutdown => {
                    info!("interrupted while draining");
                    timeout(self.shutdown_timeout, &mut drained).await.is_ok()
                }
            }
        };

        summary.worker_stopped = drained_in_time && join_within(worker, self.shutdown_timeout).await;
        if !summary.worker_stopped {
            warn!(
                "synthesis worker did not stop within {:?}, exiting anyway",
                self.shutdown_timeout
            );
        }

        summary.succeeded = counters.succeeded.load(Ordering::Relaxed);
        summary.failed = counters.failed.load(Ordering::Relaxed);
        self.transition(ProcessorState::Stopped);
        info!(
            "stream stopped: {} queued, {} rejected, {} succeeded, {} failed",
            summary.queued, summary.rejected, summary.succeeded, summary.failed
        );
        Ok(summary)
    }
}

/// Worker loop: one job at a time until the sentinel or a closed queue.
fn run_worker(
    mut orchestrator: SynthesisOrchestrator,
    language: String,
    mut jobs: mpsc::UnboundedReceiver<QueueItem>,
    sink: Arc<dyn StatusSink>,
    counters: Arc<WorkerCounters>,
    drained: oneshot::Sender<()>,
) {
    while let Some(item) = jobs.blocking_recv() {
        let (text, destination) = match item {
            QueueItem::Job { text, destination } => (text, destination),
            QueueItem::Shutdown => break,
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            orchestrator.synthesize(&text, &language, Some(&destination))
        }));

        let status = match result {
            Ok(Ok(outcome)) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                Status::Success(outcome.path)
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(path = %destination.display(), error = %e, "job failed");
                Status::Error(e.to_string())
            }
            Err(payload) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                let message = panic_message(&*payload);
                warn!(path = %destination.display(), panic = message, "synthesis panicked");
                Status::Error(format!("synthesis panicked: {}", message))
            }
        };
        sink.emit(status);
    }

    debug!("synthesis worker stopping");
    let _ = drained.send(());
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Wait for the worker thread to exit without blocking the runtime.
async fn join_within(worker: JoinHandle<()>, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while !worker.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
    worker.join().is_ok()
}
