//! # Print Service Tests
//!
//! End-to-end scenarios for the background print service, driven against an
//! in-memory transport that records every device write and answers queries
//! with canned replies. Reachability can be flipped at runtime to exercise
//! the reconnect cycle.
//!
//! Timing: all intervals are shrunk to milliseconds and every assertion
//! about worker progress polls with a generous deadline, so the tests are
//! insensitive to scheduler jitter.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use papelito::error::PapelitoError;
use papelito::printer::{Model, Printer};
use papelito::protocol::commands;
use papelito::service::{PrintService, ServiceConfig};
use papelito::transport::{Connector, Session, Transport};

use pretty_assertions::assert_eq;

// ============================================================================
// IN-MEMORY TRANSPORT
// ============================================================================

/// Shared wire state: recorded writes plus runtime-controllable
/// reachability.
struct Wire {
    writes: Mutex<Vec<Vec<u8>>>,
    opened: AtomicUsize,
    reachable: AtomicBool,
}

impl Wire {
    fn new(reachable: bool) -> Arc<Self> {
        Arc::new(Self {
            writes: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            reachable: AtomicBool::new(reachable),
        })
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

struct MemTransport {
    wire: Arc<Wire>,
}

impl Transport for MemTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), PapelitoError> {
        if !self.wire.reachable.load(Ordering::SeqCst) {
            return Err(PapelitoError::Transport("peer gone".to_string()));
        }
        self.wire.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn recv(&mut self, _max_len: usize) -> Result<Vec<u8>, PapelitoError> {
        if !self.wire.reachable.load(Ordering::SeqCst) {
            return Err(PapelitoError::Transport("peer gone".to_string()));
        }
        // Battery-style reply; all service queries in these tests are
        // battery keep-alives
        Ok(vec![0x00, 0x42])
    }

    fn is_live(&self) -> bool {
        self.wire.reachable.load(Ordering::SeqCst)
    }

    fn set_timeout(&mut self, _timeout: Duration) {}
}

struct MemConnector {
    wire: Arc<Wire>,
}

impl Connector for MemConnector {
    fn open(&mut self, _timeout: Duration) -> Result<Box<dyn Transport>, PapelitoError> {
        self.wire.opened.fetch_add(1, Ordering::SeqCst);
        if !self.wire.reachable.load(Ordering::SeqCst) {
            return Err(PapelitoError::Transport("host is down".to_string()));
        }
        Ok(Box::new(MemTransport {
            wire: Arc::clone(&self.wire),
        }))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn test_printer(wire: &Arc<Wire>) -> Printer {
    let connector = MemConnector {
        wire: Arc::clone(wire),
    };
    let session = Session::new(Box::new(connector), Duration::from_millis(50));
    let mut printer = Printer::new(session, Model::A6);
    printer.set_text_delay(Duration::ZERO);
    printer.set_row_delay(Duration::ZERO);
    printer
}

fn fast_config() -> ServiceConfig {
    ServiceConfig {
        ping_interval: Duration::from_secs(60),
        poll_interval: Duration::from_millis(1),
        offline_interval: Duration::from_millis(1),
        startup_interval: Duration::from_millis(1),
        guard_interval: Duration::from_millis(1),
    }
}

/// Poll `cond` until it holds or the deadline passes.
fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

const DEADLINE: Duration = Duration::from_secs(5);

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn unreachable_transport_flags_failure_and_keeps_queue() {
    let wire = Wire::new(false);
    let service = PrintService::start(test_printer(&wire), fast_config());

    // Submission always succeeds, even while disconnected
    for _ in 0..3 {
        service.enqueue(|p| p.print_break(50));
    }

    assert!(wait_until(DEADLINE, || service.is_failed()));
    // Reconnects keep being attempted at the offline cadence
    assert!(wait_until(DEADLINE, || {
        wire.opened.load(Ordering::SeqCst) >= 3
    }));

    // No task is attempted while disconnected: the queue never drains
    assert_eq!(service.pending_count(), 3);
    assert!(service.is_failed());
    assert!(wire.writes().is_empty());

    service.stop();
}

#[test]
fn reset_is_sent_before_any_queued_task() {
    let wire = Wire::new(false);
    let service = PrintService::start(test_printer(&wire), fast_config());

    service.enqueue(|p| p.print_break(42));
    assert!(wait_until(DEADLINE, || service.is_failed()));

    // Device comes online; the very next cycle must reset before the task
    wire.set_reachable(true);
    assert!(wait_until(DEADLINE, || service.pending_count() == 0
        && !wire.writes().is_empty()));
    assert!(wait_until(DEADLINE, || !service.is_failed()));

    service.stop();

    let writes = wire.writes();
    assert_eq!(writes[0], commands::reset());
    // Guard ping precedes the task
    assert_eq!(writes[1], commands::query::BATTERY.to_vec());
    assert_eq!(writes[2], commands::print_break(42));
}

#[test]
fn tasks_execute_in_submission_order() {
    let wire = Wire::new(true);
    let service = PrintService::start(test_printer(&wire), fast_config());

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 1..=5u8 {
        let order = Arc::clone(&order);
        service.enqueue(move |p| {
            order.lock().unwrap().push(i);
            p.print_break(i32::from(i))
        });
    }

    assert!(wait_until(DEADLINE, || service.pending_count() == 0));
    assert!(wait_until(DEADLINE, || order.lock().unwrap().len() == 5));
    service.stop();

    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4, 5]);

    // The break writes land on the wire in the same order
    let breaks: Vec<Vec<u8>> = wire
        .writes()
        .into_iter()
        .filter(|w| w.first() == Some(&0x1B))
        .collect();
    assert_eq!(
        breaks,
        (1..=5i32).map(commands::print_break).collect::<Vec<_>>()
    );
}

#[test]
fn failing_task_is_dropped_and_service_reconnects() {
    let wire = Wire::new(true);
    let service = PrintService::start(test_printer(&wire), fast_config());

    let ran = Arc::new(Mutex::new(Vec::new()));

    let r = Arc::clone(&ran);
    service.enqueue(move |_| {
        r.lock().unwrap().push("bad");
        Err(PapelitoError::Transport("mid-write timeout".to_string()))
    });
    let r = Arc::clone(&ran);
    service.enqueue(move |p| {
        r.lock().unwrap().push("good");
        p.print_break(7)
    });

    // Both tasks eventually run, the failed one exactly once
    assert!(wait_until(DEADLINE, || ran.lock().unwrap().len() == 2));
    assert!(wait_until(DEADLINE, || service.pending_count() == 0));
    // The failure forced a redial
    assert!(wait_until(DEADLINE, || {
        wire.opened.load(Ordering::SeqCst) >= 2
    }));
    assert!(wait_until(DEADLINE, || !service.is_failed()));
    service.stop();

    assert_eq!(*ran.lock().unwrap(), vec!["bad", "good"]);
}

#[test]
fn keep_alive_pings_while_idle() {
    let wire = Wire::new(true);
    let config = ServiceConfig {
        ping_interval: Duration::from_millis(5),
        ..fast_config()
    };
    let service = PrintService::start(test_printer(&wire), config);

    // No tasks at all; pings must still flow
    assert!(wait_until(DEADLINE, || {
        wire.writes()
            .iter()
            .filter(|w| w.as_slice() == commands::query::BATTERY)
            .count()
            >= 3
    }));

    service.stop();
}

#[test]
fn clear_drops_waiting_tasks() {
    let wire = Wire::new(false);
    let service = PrintService::start(test_printer(&wire), fast_config());

    for _ in 0..4 {
        service.enqueue(|p| p.print_break(10));
    }
    assert_eq!(service.pending_count(), 4);

    service.clear();
    assert_eq!(service.pending_count(), 0);

    // Coming online finds nothing to do
    wire.set_reachable(true);
    assert!(wait_until(DEADLINE, || !service.is_failed()));
    service.stop();

    let writes = wire.writes();
    assert!(writes.iter().all(|w| w.first() != Some(&0x1B)));
}

#[test]
fn queued_text_prints_through_wrap_buffer() {
    let wire = Wire::new(true);
    let service = PrintService::start(test_printer(&wire), fast_config());

    service.print_text("hello\nwor", true);

    assert!(wait_until(DEADLINE, || service.pending_count() == 0));
    assert!(wait_until(DEADLINE, || {
        wire.writes().iter().any(|w| w.as_slice() == b"wor\n")
    }));
    service.stop();

    let writes = wire.writes();
    let hello = writes.iter().position(|w| w.as_slice() == b"hello\n");
    let wor = writes.iter().position(|w| w.as_slice() == b"wor\n");
    assert!(hello.is_some() && wor.is_some());
    assert!(hello < wor);
}

#[test]
fn image_task_sends_reset_per_chunk() {
    let wire = Wire::new(true);
    let service = PrintService::start(test_printer(&wire), fast_config());

    let rows = vec![vec![0xFFu8; 48]; 300];
    service.enqueue(move |p| p.print_image(&rows));

    assert!(wait_until(DEADLINE, || service.pending_count() == 0));
    // chunks: 255 + 45 rows, each prefixed reset + header
    assert!(wait_until(DEADLINE, || {
        wire.writes().iter().filter(|w| w.len() == 48).count() == 300
    }));
    service.stop();

    let writes = wire.writes();
    let headers: Vec<&Vec<u8>> = writes
        .iter()
        .filter(|w| w.starts_with(&[0x1D, 0x76, 0x30, 0x00]))
        .collect();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0].as_slice(), &[0x1D, 0x76, 0x30, 0x00, 0x30, 0x00, 0xFF, 0x00]);
    assert_eq!(headers[1].as_slice(), &[0x1D, 0x76, 0x30, 0x00, 0x30, 0x00, 0x2D, 0x00]);

    // One reset establishes the session, one precedes each chunk
    let resets = writes.iter().filter(|w| w.as_slice() == commands::reset()).count();
    assert_eq!(resets, 3);

    // Every header is directly preceded by a reset
    for (i, w) in writes.iter().enumerate() {
        if w.starts_with(&[0x1D, 0x76, 0x30, 0x00]) {
            assert_eq!(writes[i - 1], commands::reset());
        }
    }
}
