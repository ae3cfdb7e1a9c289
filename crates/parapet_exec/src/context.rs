//! Execution context manager.
//!
//! One execution at a time: parse, arm ceilings and the wall-clock deadline,
//! run on a disposable worker thread, translate every failure into a
//! [`Fault`]. The deadline is enforced by supervising the worker's result
//! channel; expiry flips the shared cancellation flag the evaluator polls on
//! every operation. A worker that never yields (wedged in a native call) is
//! abandoned after a short grace period; that abandonment is the documented
//! best-effort escape, not a silent failure mode.

use crate::capture::StreamCapture;
use crate::limits::ExecLimits;
use crate::mediator::ImportMediator;
use indexmap::IndexMap;
use parapet_core::{elapsed_seconds, Fault};
use parapet_script::{parse, EvalError, Evaluator, ImportError, ScriptError, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long the supervisor waits for a cancelled worker to yield before
/// abandoning it.
const ABANDON_GRACE: Duration = Duration::from_millis(200);

/// Lifecycle of the context manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Ready for a run
    Idle,
    /// A run is in flight
    Running,
    /// Last run finished without fault
    Completed,
    /// Last run faulted
    Failed,
    /// Last run hit the wall-clock deadline or CPU budget
    TimedOut,
    /// Last run was cancelled by the caller
    Cancelled,
}

/// Everything one run produced.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Terminal state of the run
    pub status: ContextState,
    /// Captured stdout, partial on abort
    pub stdout: String,
    /// Captured stderr, partial on abort
    pub stderr: String,
    /// Final execution scope
    pub scope: IndexMap<String, Value>,
    /// The translated fault, `None` on success
    pub fault: Option<Fault>,
    /// Wall-clock duration in fractional seconds
    pub elapsed_seconds: f64,
    /// Peak accounted memory in bytes
    pub memory_bytes: u64,
    /// Evaluator operations consumed
    pub ops_consumed: u64,
}

/// Cancellation flags for a single run. Each run gets a fresh pair, so an
/// abandoned worker keeps its own flag permanently set and can never be
/// un-cancelled by a later run.
#[derive(Clone)]
struct RunFlags {
    cancel: Arc<AtomicBool>,
    external: Arc<AtomicBool>,
}

impl RunFlags {
    fn fresh() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            external: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Converts an external stop request into cooperative cancellation of the
/// in-flight run. The handle always targets the current run's flags.
#[derive(Clone)]
pub struct CancelHandle {
    current: Arc<Mutex<RunFlags>>,
}

impl CancelHandle {
    /// Request cancellation of the current run
    pub fn cancel(&self) {
        let flags = self.current.lock().unwrap();
        flags.external.store(true, Ordering::Relaxed);
        flags.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested for the current run
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.current.lock().unwrap().external.load(Ordering::Relaxed)
    }
}

struct WorkerReport {
    result: Result<(), ScriptError>,
    scope: IndexMap<String, Value>,
    stdout: String,
    stderr: String,
    ops: u64,
    memory: u64,
}

/// Bounds and supervises single executions.
pub struct ContextManager {
    limits: ExecLimits,
    importer: ImportMediator,
    current: Arc<Mutex<RunFlags>>,
    state: ContextState,
}

impl ContextManager {
    /// Build a manager over ceilings and an import mediator
    #[must_use]
    pub fn new(limits: ExecLimits, importer: ImportMediator) -> Self {
        Self {
            limits,
            importer,
            current: Arc::new(Mutex::new(RunFlags::fresh())),
            state: ContextState::Idle,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// The configured ceilings
    #[must_use]
    pub fn limits(&self) -> &ExecLimits {
        &self.limits
    }

    /// A handle for cancelling the in-flight run from another thread
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            current: Arc::clone(&self.current),
        }
    }

    /// Run one code unit to completion, fault, deadline, or cancellation.
    /// Never panics on user input and never returns an error: every failure
    /// is folded into the outcome.
    pub fn run(
        &mut self,
        code: &str,
        globals: IndexMap<String, Value>,
        timeout: Option<Duration>,
    ) -> ExecutionOutcome {
        if self.state == ContextState::Running {
            return self.finish(
                Instant::now(),
                ContextState::Failed,
                WorkerReport::empty(),
                Some(Fault::infrastructure("an execution is already running")),
            );
        }
        self.state = ContextState::Running;
        let started = Instant::now();
        // Fresh flags each run; a worker abandoned by an earlier run holds
        // the old pair and stays cancelled.
        let flags = RunFlags::fresh();
        *self.current.lock().unwrap() = flags.clone();
        self.importer.reset_counters();

        let program = match parse(code) {
            Ok(program) => program,
            Err(err) => {
                return self.finish(
                    started,
                    ContextState::Failed,
                    WorkerReport::empty(),
                    Some(Fault::user(format!("syntax error: {err}"))),
                );
            }
        };

        let config = self.limits.eval_config(Arc::clone(&flags.cancel));
        let output_limit = self.limits.output_bytes;
        let mut importer = self.importer.clone();
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("parapet-exec".to_string())
            .spawn(move || {
                let mut capture = StreamCapture::new(output_limit);
                let mut evaluator = Evaluator::new(config, globals);
                let result = evaluator.run(&program, &mut importer, &mut capture);
                let ops = evaluator.cost_consumed();
                let memory = evaluator.memory_peak();
                let scope = evaluator.into_scope();
                let (stdout, stderr) = capture.into_streams();
                // The supervisor may have abandoned us; a dead channel is
                // not an error.
                let _ = tx.send(WorkerReport {
                    result,
                    scope,
                    stdout,
                    stderr,
                    ops,
                    memory,
                });
            });
        let worker = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                return self.finish(
                    started,
                    ContextState::Failed,
                    WorkerReport::empty(),
                    Some(Fault::infrastructure(format!(
                        "failed to spawn worker: {err}"
                    ))),
                );
            }
        };

        let deadline = self.limits.effective_timeout(timeout);
        let report = match rx.recv_timeout(deadline) {
            Ok(report) => {
                let _ = worker.join();
                report
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                return self.finish(
                    started,
                    ContextState::Failed,
                    WorkerReport::empty(),
                    Some(Fault::infrastructure("worker terminated unexpectedly")),
                );
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                flags.cancel.store(true, Ordering::Relaxed);
                match rx.recv_timeout(ABANDON_GRACE) {
                    Ok(report) => {
                        let _ = worker.join();
                        report
                    }
                    Err(_) => {
                        warn!(?deadline, "worker did not yield after deadline, abandoning");
                        return self.finish(
                            started,
                            ContextState::TimedOut,
                            WorkerReport::empty(),
                            Some(Fault::timeout(format!(
                                "wall clock limit of {deadline:?} exceeded"
                            ))),
                        );
                    }
                }
            }
        };

        let externally_cancelled = flags.external.load(Ordering::Relaxed);
        let (status, fault) = match &report.result {
            Ok(()) => (ContextState::Completed, None),
            Err(err) => {
                let (status, fault) = translate(err, externally_cancelled, deadline);
                (status, Some(fault))
            }
        };
        self.finish(started, status, report, fault)
    }

    fn finish(
        &mut self,
        started: Instant,
        status: ContextState,
        report: WorkerReport,
        fault: Option<Fault>,
    ) -> ExecutionOutcome {
        // Whatever happened, the manager is ready for the next run.
        self.state = ContextState::Idle;
        let elapsed = elapsed_seconds(started.elapsed());
        debug!(?status, elapsed, "execution finished");
        ExecutionOutcome {
            status,
            stdout: report.stdout,
            stderr: report.stderr,
            scope: report.scope,
            fault,
            elapsed_seconds: elapsed,
            memory_bytes: report.memory,
            ops_consumed: report.ops,
        }
    }
}

impl WorkerReport {
    fn empty() -> Self {
        Self {
            result: Ok(()),
            scope: IndexMap::new(),
            stdout: String::new(),
            stderr: String::new(),
            ops: 0,
            memory: 0,
        }
    }
}

fn translate(err: &ScriptError, external: bool, deadline: Duration) -> (ContextState, Fault) {
    let trace = format!("line {}", err.line);
    match &err.error {
        EvalError::Cancelled => {
            if external {
                (
                    ContextState::Cancelled,
                    Fault::infrastructure("execution cancelled by caller"),
                )
            } else {
                (
                    ContextState::TimedOut,
                    Fault::timeout(format!("wall clock limit of {deadline:?} exceeded")),
                )
            }
        }
        EvalError::CostExhausted { .. } => (
            ContextState::TimedOut,
            Fault::timeout(err.error.to_string()).with_trace(trace),
        ),
        EvalError::MemoryExceeded { .. } | EvalError::OutputExceeded { .. } => (
            ContextState::Failed,
            Fault::resource(err.error.to_string()).with_trace(trace),
        ),
        EvalError::Import(ImportError::Denied { .. }) | EvalError::Forbidden(_) => (
            ContextState::Failed,
            Fault::policy(err.error.to_string()).with_trace(trace),
        ),
        EvalError::Import(ImportError::LimitExceeded { .. }) => (
            ContextState::Failed,
            Fault::resource(err.error.to_string()).with_trace(trace),
        ),
        EvalError::Import(_) => (
            ContextState::Failed,
            Fault::user(err.error.to_string()).with_trace(trace),
        ),
        other => (
            ContextState::Failed,
            Fault::user(other.to_string()).with_trace(trace),
        ),
    }
}
