//! # Print Service
//!
//! Background task queue and connection lifecycle for one printer.
//!
//! The device tolerates exactly one command exchange at a time, goes to
//! standby when idle, and drops the link whenever it feels like it. The
//! service hides all of that behind a fire-and-forget queue:
//!
//! - **One worker**: a single dedicated thread owns the [`Printer`] handle;
//!   all device I/O happens there. Submitters only append to the queue and
//!   never block on the device.
//! - **Reconnect forever**: while the transport is down the worker redials
//!   (and resets — the device ignores everything until reset) every
//!   `offline_interval`, indefinitely, until the service is stopped. Queued
//!   tasks wait; none are attempted while disconnected.
//! - **Keep-alive**: a battery query is issued every `ping_interval` to keep
//!   the device out of standby, and once more immediately before each task
//!   in case the device is already drifting off. Pings happen only between
//!   tasks, never inside one, so a multi-chunk image transfer is never
//!   interleaved with a query.
//! - **At-most-once**: a task is popped before it runs and is never
//!   requeued. A failed task may already have advanced the device's line
//!   buffer, so retrying it could print half its output twice. The failure
//!   flips the advisory failure flag and sends the worker back to
//!   reconnecting.
//!
//! ## Example
//!
//! ```no_run
//! use papelito::printer::{Model, Printer};
//! use papelito::service::{PrintService, ServiceConfig};
//! use papelito::transport::{RfcommConnector, Session, DEFAULT_TIMEOUT};
//!
//! let session = Session::new(Box::new(RfcommConnector::default_device()), DEFAULT_TIMEOUT);
//! let printer = Printer::new(session, Model::A6p);
//! let service = PrintService::start(printer, ServiceConfig::default());
//!
//! service.enqueue(|p| {
//!     p.println_text("hello")?;
//!     p.print_break(100)
//! });
//! service.print_text("queued from anywhere\n", true);
//! # service.stop();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::PapelitoError;
use crate::printer::Printer;

/// A unit of work executed on the worker against the live printer.
///
/// Ownership moves into the queue on submission; the worker runs it once and
/// discards it. A transport error returned here is treated as a connection
/// failure, not reported to the submitter.
pub type Task = Box<dyn FnOnce(&mut Printer) -> Result<(), PapelitoError> + Send + 'static>;

/// # Service Timing Configuration
///
/// All cadences of the worker loop. Defaults match long-running deployment
/// against a battery-powered device; tests shrink everything to
/// milliseconds.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Keep-alive cadence while idle.
    pub ping_interval: Duration,

    /// Pause between worker cycles.
    pub poll_interval: Duration,

    /// Backoff between reconnect attempts while the device is unreachable.
    pub offline_interval: Duration,

    /// Settle time after a successful connect before the first command.
    pub startup_interval: Duration,

    /// Pause between the pre-task guard ping and the task itself.
    pub guard_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            offline_interval: Duration::from_secs(1),
            startup_interval: Duration::from_secs(1),
            guard_interval: Duration::from_secs(1),
        }
    }
}

/// State shared between submitters and the worker.
struct Shared {
    /// FIFO task queue; submitters push back, the worker pops front.
    queue: Mutex<VecDeque<Task>>,

    /// Cooperative stop flag, observed at the top of each worker cycle.
    stop: AtomicBool,

    /// Advisory telemetry: true while the last connect attempt or command
    /// exchange failed. Submitters can read it; only the worker writes it.
    failed: AtomicBool,
}

/// # Print Service
///
/// Owns the worker thread. Dropping or [`PrintService::stop`]ping the
/// service stops the worker cooperatively and disconnects the transport; a
/// task already executing finishes first (the protocol has no abort).
pub struct PrintService {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl PrintService {
    /// Spawn the worker and take ownership of `printer`.
    ///
    /// The service starts in the failed state until the first connect
    /// succeeds.
    pub fn start(printer: Printer, config: ServiceConfig) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            stop: AtomicBool::new(false),
            failed: AtomicBool::new(true),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("papelito-print-service".to_string())
            .spawn(move || run_worker(printer, config, worker_shared))
            .expect("failed to spawn print service worker");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Append a task to the queue. Returns immediately; the task runs on
    /// the worker once the connection is live and all earlier tasks have
    /// finished.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce(&mut Printer) -> Result<(), PapelitoError> + Send + 'static,
    {
        self.shared.queue.lock().unwrap().push_back(Box::new(task));
    }

    /// Convenience: queue a text print, optionally flushing the wrap buffer
    /// afterwards.
    pub fn print_text(&self, text: impl Into<String>, flush: bool) {
        let text = text.into();
        self.enqueue(move |printer| {
            printer.print_text(&text)?;
            if flush {
                printer.flush_text()?;
            }
            Ok(())
        });
    }

    /// Number of tasks waiting (not counting one currently executing).
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    /// Drop all waiting tasks. Does not interrupt an executing task.
    pub fn clear(&self) {
        self.shared.queue.lock().unwrap().clear();
    }

    /// Advisory failure flag: true while the connection is down or the last
    /// exchange failed. Submitted tasks are never individually reported on;
    /// this and [`PrintService::pending_count`] are the only telemetry.
    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for it to exit. The transport is
    /// disconnected; waiting tasks are dropped.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("print service worker panicked");
            }
        }
    }
}

impl Drop for PrintService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// WORKER
// ============================================================================

/// Worker states. Failures in `Connected` always transition back to
/// `Connecting`; `Connecting` loops on itself until the device answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    /// Transport down; redial with backoff.
    Connecting,
    /// Transport up and reset; ping and execute tasks.
    Connected,
}

fn run_worker(mut printer: Printer, config: ServiceConfig, shared: Arc<Shared>) {
    let mut state = WorkerState::Connecting;
    let mut last_ping = Instant::now();

    while !shared.stop.load(Ordering::SeqCst) {
        state = match state {
            WorkerState::Connecting => match establish(&mut printer) {
                Ok(()) => {
                    shared.failed.store(false, Ordering::SeqCst);
                    info!("printer connected");
                    thread::sleep(config.startup_interval);
                    last_ping = Instant::now();
                    WorkerState::Connected
                }
                Err(e) => {
                    debug!("connect attempt failed: {}", e);
                    shared.failed.store(true, Ordering::SeqCst);
                    thread::sleep(config.offline_interval);
                    WorkerState::Connecting
                }
            },
            WorkerState::Connected => match serve_cycle(&mut printer, &config, &shared, &mut last_ping)
            {
                Ok(()) => {
                    thread::sleep(config.poll_interval);
                    WorkerState::Connected
                }
                Err(e) => {
                    warn!("transport failure, reconnecting: {}", e);
                    shared.failed.store(true, Ordering::SeqCst);
                    WorkerState::Connecting
                }
            },
        };
    }

    printer.disconnect();
    debug!("print service worker stopped");
}

/// Redial and reset. The reset is part of establishing the link: without it
/// the device ignores every subsequent command, so a connect that cannot
/// reset is a failed connect.
fn establish(printer: &mut Printer) -> Result<(), PapelitoError> {
    printer.reconnect()?;
    printer.reset()
}

/// One `Connected` cycle: keep-alive if due, then at most one task.
fn serve_cycle(
    printer: &mut Printer,
    config: &ServiceConfig,
    shared: &Shared,
    last_ping: &mut Instant,
) -> Result<(), PapelitoError> {
    if !printer.is_connected() {
        return Err(PapelitoError::Transport("link lost".to_string()));
    }

    if last_ping.elapsed() >= config.ping_interval {
        printer.query_battery()?;
        *last_ping = Instant::now();
    }

    let has_task = !shared.queue.lock().unwrap().is_empty();
    if has_task {
        // Guard ping regardless of interval: the device may already be
        // drifting into standby, and waking it mid-task corrupts output
        printer.query_battery()?;
        *last_ping = Instant::now();
        thread::sleep(config.guard_interval);

        // Popped before running: at-most-once, never requeued. The lock is
        // released before the task executes so submitters are never blocked
        // on device I/O.
        let task = shared.queue.lock().unwrap().pop_front();
        if let Some(task) = task {
            task(printer)?;
        }
    }

    Ok(())
}
