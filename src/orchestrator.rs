//! Single-check lifecycle: `Idle -> Running -> (result delivered) -> Idle`.
//!
//! The thread that owns a `RequestOrchestrator` is the control context. It
//! calls `submit`, then drives `pump` (or `run_until_idle`), and every
//! observer callback runs there. The blocking check runs on one worker
//! thread per submission and only talks back through a channel, so no state
//! the observer can see is ever touched from two threads.

use crate::checker::Checker;
use crate::config::CheckerConfig;
use crate::types::{CheckRequest, CheckResult, ErrorKind};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Idle,
    Running,
}

/// Receives progress for the current check, always on the control context.
pub trait ProgressObserver {
    fn on_start(&mut self, file_name: &str, line_count: usize);

    /// Display-only elapsed time since `on_start`, independent of heartbeats.
    fn on_tick(&mut self, elapsed: Duration);

    /// The server is still working; `heartbeats` counts them for this check.
    fn on_heartbeat(&mut self, heartbeats: u64);

    /// Terminal result, delivered exactly once per accepted submission.
    fn on_result(&mut self, result: CheckResult);
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("a check is already running")]
    Busy,

    #[error("nothing to check: the code is empty")]
    EmptyCode,

    #[error("failed to start check worker: {0}")]
    Spawn(#[from] io::Error),
}

enum WorkerMessage {
    Heartbeat,
    Finished(CheckResult),
}

struct InFlight {
    id: u64,
    started: Instant,
    next_tick: Instant,
    heartbeats: u64,
}

pub struct RequestOrchestrator<O> {
    checker: Arc<dyn Checker>,
    config: CheckerConfig,
    observer: O,
    tx: Sender<(u64, WorkerMessage)>,
    rx: Receiver<(u64, WorkerMessage)>,
    // The one "current check" slot. Set by `submit`, cleared on the result.
    current: Option<InFlight>,
    next_id: u64,
    tick_interval: Duration,
}

impl<O: ProgressObserver> RequestOrchestrator<O> {
    pub fn new(checker: Arc<dyn Checker>, config: CheckerConfig, observer: O) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            checker,
            config,
            observer,
            tx,
            rx,
            current: None,
            next_id: 1,
            tick_interval: TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn state(&self) -> CheckState {
        if self.current.is_some() {
            CheckState::Running
        } else {
            CheckState::Idle
        }
    }

    /// True once the current check has sent at least one heartbeat.
    pub fn server_active(&self) -> bool {
        self.current.as_ref().is_some_and(|c| c.heartbeats > 0)
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Start a check. Refused while another one is running.
    ///
    /// On success the orchestrator is `Running` before this returns and the
    /// observer has seen `on_start`. The returned id identifies the submission.
    pub fn submit(&mut self, code: &str, file_name: &str, line_count: usize) -> Result<u64, SubmitError> {
        if self.current.is_some() {
            warn!(file = file_name, "check refused, another one is still running");
            return Err(SubmitError::Busy);
        }
        if code.trim().is_empty() {
            return Err(SubmitError::EmptyCode);
        }

        let id = self.next_id;
        let request = CheckRequest::new(code, file_name, self.config.output_format);
        self.spawn_worker(id, request)?;
        self.next_id += 1;

        let now = Instant::now();
        self.current = Some(InFlight {
            id,
            started: now,
            next_tick: now + self.tick_interval,
            heartbeats: 0,
        });
        debug!(id, file = file_name, line_count, "check started");
        self.observer.on_start(file_name, line_count);
        Ok(id)
    }

    fn spawn_worker(&self, id: u64, request: CheckRequest) -> io::Result<()> {
        let checker = Arc::clone(&self.checker);
        let tx = self.tx.clone();

        thread::Builder::new()
            .name(format!("code-check-worker-{}", id))
            .spawn(move || {
                let beat_tx = tx.clone();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    checker.check(&request, &mut || {
                        // The receiver only disappears with the orchestrator.
                        let _ = beat_tx.send((id, WorkerMessage::Heartbeat));
                    })
                }));
                let result = outcome.unwrap_or_else(|_| {
                    CheckResult::failure("unexpected error: check worker panicked", ErrorKind::ServerError)
                });
                let _ = tx.send((id, WorkerMessage::Finished(result)));
            })?;
        Ok(())
    }

    /// Run the control loop for at most `wait`, emitting ticks and delivering
    /// worker messages. Returns whether a check is still running.
    pub fn pump(&mut self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            let Some(flight) = self.current.as_mut() else {
                return false;
            };

            let now = Instant::now();
            if now >= flight.next_tick {
                flight.next_tick += self.tick_interval;
                let elapsed = now - flight.started;
                self.observer.on_tick(elapsed);
                continue;
            }
            if now >= deadline {
                return true;
            }

            match self.rx.recv_timeout(flight.next_tick.min(deadline) - now) {
                Ok((id, message)) => self.handle(id, message),
                Err(RecvTimeoutError::Timeout) => {}
                // Unreachable while `self.tx` lives.
                Err(RecvTimeoutError::Disconnected) => return self.current.is_some(),
            }
        }
    }

    /// Block the control context until the current check (if any) completes.
    pub fn run_until_idle(&mut self) {
        while self.pump(self.tick_interval) {}
    }

    fn handle(&mut self, id: u64, message: WorkerMessage) {
        let Some(flight) = self.current.as_mut().filter(|c| c.id == id) else {
            debug!(id, "dropping message from a finished check");
            return;
        };

        match message {
            WorkerMessage::Heartbeat => {
                flight.heartbeats += 1;
                let heartbeats = flight.heartbeats;
                self.observer.on_heartbeat(heartbeats);
            }
            WorkerMessage::Finished(result) => {
                if let Some(done) = self.current.take() {
                    debug!(
                        id,
                        elapsed_ms = done.started.elapsed().as_millis() as u64,
                        heartbeats = done.heartbeats,
                        success = result.is_success(),
                        "check completed"
                    );
                }
                self.observer.on_result(result);
            }
        }
    }
}
