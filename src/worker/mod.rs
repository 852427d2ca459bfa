//! Sandboxed script workers
//!
//! A [`Worker`] is one isolated JavaScript execution context with its own
//! heap, global namespace, and message channel to the host. Boa's `Context`
//! is single-threaded and not `Send`, so each worker owns a dedicated
//! thread that owns the context; the `Worker` handle itself is `Send +
//! Sync` and forwards operations over a command channel, blocking the
//! caller until the worker thread replies.
//!
//! Concurrency contract:
//! - Calls into the same worker from multiple host threads serialize in
//!   strict program order (a per-worker lock is held across each
//!   command/reply round trip).
//! - Calls into different workers proceed fully in parallel.
//! - `send`/`send_sync` block the calling host thread until the script
//!   handler returns; script-initiated `$send`/`$sendSync` block script
//!   execution until the host callback returns. A host callback that
//!   re-enters the *same* worker deadlocks; do not re-enter.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use boa_engine::{Context, JsValue, Script, Source, context::ContextBuilder, js_string};
use parking_lot::Mutex;
use thiserror::Error;

mod bindings;
mod diagnostics;
mod origin;
mod registry;
mod stats;

pub use origin::ScriptOrigin;
pub use registry::{RecvCallback, RecvSyncCallback};
pub use stats::HeapStatistics;

use registry::Callbacks;

/// Sentinel reply for a sync message sent before the script registered
/// `$recvSync`. The sync reply channel always yields a value, so a missing
/// handler is reported in-band rather than as a hard error.
pub const ERR_SYNC_HANDLER_MISSING: &str = "err: $recvSync not called";

/// Sentinel reply for a sync handler that returned a non-string value.
pub const ERR_NON_STRING_REPLY: &str = "err: non-string return value";

/// Worker identities are assigned from this sequence and never reused for
/// the lifetime of the process.
static WORKER_ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Errors surfaced by worker operations.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Source failed to compile; the payload is the translated diagnostic.
    #[error("{0}")]
    Compile(String),

    /// Script raised an uncaught fault; the payload is the translated
    /// diagnostic, including a stack trace when one exists.
    #[error("{0}")]
    Runtime(String),

    /// `send` was called before the script registered an async handler.
    #[error("$recv not called")]
    HandlerMissing,

    /// Operation on a disposed worker handle.
    #[error("worker has been disposed")]
    InvalidHandle,

    /// Execution was interrupted by `terminate_execution`.
    #[error("execution terminated")]
    Terminated,
}

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Configuration for a worker's execution context.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Recursion limit for script call stacks.
    pub recursion_limit: usize,
    /// Stack size limit, in bytes.
    pub stack_size_limit: usize,
    /// Optional cap on loop iterations, as a backstop against scripts that
    /// spin without ever crossing a host boundary.
    pub loop_iteration_limit: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 16384,
            stack_size_limit: 1024 * 1024, // 1MB
            loop_iteration_limit: None,
        }
    }
}

/// Operations shipped from the host handle to the worker thread.
enum Command {
    Load {
        origin: ScriptOrigin,
        code: String,
        reply: mpsc::Sender<WorkerResult<()>>,
    },
    Send {
        msg: String,
        reply: mpsc::Sender<WorkerResult<()>>,
    },
    SendSync {
        msg: String,
        reply: mpsc::Sender<WorkerResult<String>>,
    },
    HeapStatistics {
        reply: mpsc::Sender<HeapStatistics>,
    },
    LowMemoryNotification {
        reply: mpsc::Sender<()>,
    },
    IdleNotification {
        reply: mpsc::Sender<bool>,
    },
    Dispose {
        reply: mpsc::Sender<()>,
    },
}

// ============================================================================
// Worker handle
// ============================================================================

/// Handle to one isolated script execution context.
pub struct Worker {
    /// Unique identity, never reused within the process lifetime.
    id: u64,
    /// Command channel to the worker thread. The lock is held across each
    /// command/reply round trip to serialize same-worker callers.
    commands: Mutex<mpsc::Sender<Command>>,
    /// Set once by `dispose` (or `Drop`); all later operations fail fast.
    disposed: AtomicBool,
    /// Termination request flag, shared with the worker thread and the
    /// reserved bindings.
    terminated: Arc<AtomicBool>,
    /// Diagnostic of the most recent failing operation.
    last_diagnostic: Mutex<String>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Create a worker with the default configuration.
    ///
    /// `recv` is invoked for script-initiated `$send` messages; `recv_sync`
    /// for `$sendSync`, with its return value handed back into the script.
    /// Both run on the worker's thread while script execution is blocked.
    ///
    /// # Panics
    ///
    /// Panics if the execution context cannot be created. Context creation
    /// only fails on resource exhaustion, which is unrecoverable for the
    /// embedding host.
    pub fn new(
        recv: impl Fn(&str) + Send + Sync + 'static,
        recv_sync: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::with_config(WorkerConfig::default(), recv, recv_sync)
    }

    /// Create a worker with an explicit configuration.
    ///
    /// # Panics
    ///
    /// See [`Worker::new`].
    pub fn with_config(
        config: WorkerConfig,
        recv: impl Fn(&str) + Send + Sync + 'static,
        recv_sync: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        let id = WORKER_ID_SEQUENCE.fetch_add(1, Ordering::SeqCst);

        // The registry entry exists before the context can run any script,
        // so script-initiated sends always find their callbacks.
        registry::register(
            id,
            Callbacks {
                recv: Arc::new(recv),
                recv_sync: Arc::new(recv_sync),
            },
        );

        let terminated = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_terminated = terminated.clone();
        let handle = thread::Builder::new()
            .name(format!("krait-worker-{}", id))
            .spawn(move || run_worker(id, config, thread_terminated, command_rx, ready_tx))
            .unwrap_or_else(|e| {
                registry::unregister(id);
                panic!("worker {}: failed to spawn context thread: {}", id, e);
            });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                registry::unregister(id);
                panic!("worker {}: failed to create execution context: {}", id, e);
            }
            Err(_) => {
                registry::unregister(id);
                panic!("worker {}: context thread died during startup", id);
            }
        }

        Self {
            id,
            commands: Mutex::new(command_tx),
            disposed: AtomicBool::new(false),
            terminated,
            last_diagnostic: Mutex::new(String::new()),
            thread: Mutex::new(Some(handle)),
        }
    }

    /// This worker's identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Compile and execute `code` attributed to `script_name`.
    ///
    /// May be called repeatedly; every unit executes against the same
    /// accumulating global namespace.
    pub fn load(&self, script_name: &str, code: &str) -> WorkerResult<()> {
        self.load_with_origin(ScriptOrigin::named(script_name), code)
    }

    /// Compile and execute `code` with full origin metadata. An origin
    /// with an empty name gets a synthetic sequential one.
    pub fn load_with_origin(&self, origin: ScriptOrigin, code: &str) -> WorkerResult<()> {
        let code = code.to_string();
        let result = self
            .roundtrip(|reply| Command::Load { origin, code, reply })
            .and_then(|r| r);
        self.record_failure(result)
    }

    /// Deliver `msg` to the script's registered async handler (`$recv`).
    ///
    /// Blocks until the handler returns. Fails with
    /// [`WorkerError::HandlerMissing`] if the script never registered one.
    pub fn send(&self, msg: &str) -> WorkerResult<()> {
        let msg = msg.to_string();
        let result = self
            .roundtrip(|reply| Command::Send { msg, reply })
            .and_then(|r| r);
        self.record_failure(result)
    }

    /// Deliver `msg` to the script's registered sync handler (`$recvSync`)
    /// and return its reply.
    ///
    /// A missing handler or a non-string reply yields the documented
    /// sentinel text ([`ERR_SYNC_HANDLER_MISSING`], [`ERR_NON_STRING_REPLY`])
    /// rather than an error; the sync channel always produces a value.
    pub fn send_sync(&self, msg: &str) -> WorkerResult<String> {
        let msg = msg.to_string();
        let result = self
            .roundtrip(|reply| Command::SendSync { msg, reply })
            .and_then(|r| r);
        self.record_failure(result)
    }

    /// Request interruption of script execution on this worker.
    ///
    /// Asynchronous with respect to the calling thread: the request takes
    /// effect at the script's next reserved-binding call or at the next
    /// entry into the worker, whichever comes first, surfacing as
    /// [`WorkerError::Terminated`] from the in-flight operation. This
    /// deliberately bypasses the per-worker serialization so it remains
    /// usable while another call is blocked in script code.
    pub fn terminate_execution(&self) -> WorkerResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WorkerError::InvalidHandle);
        }
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Notify the engine that the system is running low on memory, forcing
    /// a garbage collection pass.
    pub fn low_memory_notification(&self) -> WorkerResult<()> {
        self.roundtrip(|reply| Command::LowMemoryNotification { reply })
    }

    /// Notify the engine that the host is idle. Pending engine jobs are
    /// drained; returns `true` when no further idle work remains.
    pub fn idle_notification_deadline(&self, _deadline_in_seconds: f64) -> WorkerResult<bool> {
        self.roundtrip(|reply| Command::IdleNotification { reply })
    }

    /// Snapshot memory statistics for this worker's context.
    pub fn heap_statistics(&self) -> WorkerResult<HeapStatistics> {
        self.roundtrip(|reply| Command::HeapStatistics { reply })
    }

    /// Diagnostic text of the most recent failing operation. Empty until
    /// an operation fails; not cleared on success.
    pub fn last_diagnostic(&self) -> String {
        self.last_diagnostic.lock().clone()
    }

    /// Tear down the execution context and remove the registry entry.
    ///
    /// When this returns, no script-initiated lookup can observe the
    /// worker. Any further operation on this handle, including a second
    /// `dispose`, returns [`WorkerError::InvalidHandle`].
    pub fn dispose(&self) -> WorkerResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::InvalidHandle);
        }
        self.shutdown();
        Ok(())
    }

    fn shutdown(&self) {
        {
            let commands = self.commands.lock();
            let (reply_tx, reply_rx) = mpsc::channel();
            if commands.send(Command::Dispose { reply: reply_tx }).is_ok() {
                let _ = reply_rx.recv();
            }
        }
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }

    /// Ship one command to the worker thread and wait for its reply. The
    /// channel lock is held for the whole round trip so calls into the
    /// same worker execute in strict program order.
    fn roundtrip<T>(&self, build: impl FnOnce(mpsc::Sender<T>) -> Command) -> WorkerResult<T> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WorkerError::InvalidHandle);
        }
        let commands = self.commands.lock();
        let (reply_tx, reply_rx) = mpsc::channel();
        commands
            .send(build(reply_tx))
            .map_err(|_| WorkerError::InvalidHandle)?;
        reply_rx.recv().map_err(|_| WorkerError::InvalidHandle)
    }

    fn record_failure<T>(&self, result: WorkerResult<T>) -> WorkerResult<T> {
        if let Err(e) = &result {
            *self.last_diagnostic.lock() = e.to_string();
        }
        result
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Explicit dispose is the primary mechanism; this is the
        // deterministic backstop for handles dropped without one.
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.shutdown();
        }
    }
}

// ============================================================================
// Worker thread
// ============================================================================

fn run_worker(
    id: u64,
    config: WorkerConfig,
    terminated: Arc<AtomicBool>,
    commands: mpsc::Receiver<Command>,
    ready: mpsc::Sender<Result<(), String>>,
) {
    let mut context = match build_context(&config) {
        Ok(context) => context,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    bindings::activate(id, terminated.clone());
    if ready.send(Ok(())).is_err() {
        bindings::deactivate();
        return;
    }

    while let Ok(command) = commands.recv() {
        match command {
            Command::Load {
                origin,
                code,
                reply,
            } => {
                let _ = reply.send(exec_load(&mut context, &terminated, &origin, &code));
            }
            Command::Send { msg, reply } => {
                let _ = reply.send(exec_send(&mut context, &terminated, &msg));
            }
            Command::SendSync { msg, reply } => {
                let _ = reply.send(exec_send_sync(&mut context, &terminated, &msg));
            }
            Command::HeapStatistics { reply } => {
                let _ = reply.send(stats::snapshot());
            }
            Command::LowMemoryNotification { reply } => {
                boa_gc::force_collect();
                let _ = reply.send(());
            }
            Command::IdleNotification { reply } => {
                let _ = context.run_jobs();
                let _ = reply.send(true);
            }
            Command::Dispose { reply } => {
                // Unregister before acknowledging: once dispose returns to
                // the host, no lookup may observe this worker.
                registry::unregister(id);
                bindings::deactivate();
                let _ = reply.send(());
                return;
            }
        }
    }

    // Handle dropped without an explicit dispose.
    registry::unregister(id);
    bindings::deactivate();
}

fn build_context(config: &WorkerConfig) -> Result<Context, String> {
    let mut context = ContextBuilder::default()
        .build()
        .map_err(|e| e.to_string())?;

    context
        .runtime_limits_mut()
        .set_recursion_limit(config.recursion_limit);
    context
        .runtime_limits_mut()
        .set_stack_size_limit(config.stack_size_limit);
    if let Some(limit) = config.loop_iteration_limit {
        context.runtime_limits_mut().set_loop_iteration_limit(limit);
    }

    bindings::install(&mut context).map_err(|e| e.to_string())?;

    Ok(context)
}

/// Consume a pending termination request, if any.
fn take_termination(terminated: &AtomicBool) -> bool {
    terminated.swap(false, Ordering::SeqCst)
}

fn exec_load(
    context: &mut Context,
    terminated: &AtomicBool,
    origin: &ScriptOrigin,
    code: &str,
) -> WorkerResult<()> {
    if take_termination(terminated) {
        return Err(WorkerError::Terminated);
    }

    let name = origin.resolved_name();
    let source = Source::from_bytes(code.as_bytes()).with_path(Path::new(&name));

    let script = match Script::parse(source, None, context) {
        Ok(script) => script,
        Err(e) => {
            return Err(WorkerError::Compile(diagnostics::compile_diagnostic(
                origin, &name, code, &e,
            )));
        }
    };

    if let Err(e) = script.evaluate(context) {
        if take_termination(terminated) {
            return Err(WorkerError::Terminated);
        }
        return Err(WorkerError::Runtime(diagnostics::runtime_diagnostic(
            origin,
            &name,
            Some(code),
            &e,
            context,
        )));
    }

    let _ = context.run_jobs();
    Ok(())
}

fn exec_send(context: &mut Context, terminated: &AtomicBool, msg: &str) -> WorkerResult<()> {
    if take_termination(terminated) {
        return Err(WorkerError::Terminated);
    }

    let Some(handler) = bindings::recv_handler() else {
        return Err(WorkerError::HandlerMissing);
    };

    let arg = JsValue::from(js_string!(msg));
    if let Err(e) = handler.call(&JsValue::undefined(), &[arg], context) {
        if take_termination(terminated) {
            return Err(WorkerError::Terminated);
        }
        let origin = ScriptOrigin::named("$recv");
        return Err(WorkerError::Runtime(diagnostics::runtime_diagnostic(
            &origin, "$recv", None, &e, context,
        )));
    }

    let _ = context.run_jobs();
    Ok(())
}

fn exec_send_sync(
    context: &mut Context,
    terminated: &AtomicBool,
    msg: &str,
) -> WorkerResult<String> {
    if take_termination(terminated) {
        return Err(WorkerError::Terminated);
    }

    let Some(handler) = bindings::recv_sync_handler() else {
        return Ok(ERR_SYNC_HANDLER_MISSING.to_string());
    };

    let arg = JsValue::from(js_string!(msg));
    let value = match handler.call(&JsValue::undefined(), &[arg], context) {
        Ok(value) => value,
        Err(e) => {
            if take_termination(terminated) {
                return Err(WorkerError::Terminated);
            }
            let origin = ScriptOrigin::named("$recvSync");
            return Err(WorkerError::Runtime(diagnostics::runtime_diagnostic(
                &origin,
                "$recvSync",
                None,
                &e,
                context,
            )));
        }
    };

    // Copy the reply out as an owned String before anything else touches
    // the context; the caller never observes engine-owned storage.
    let reply = value
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_else(|| ERR_NON_STRING_REPLY.to_string());

    let _ = context.run_jobs();
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn quiet_worker() -> Worker {
        Worker::new(|_msg| {}, |_msg| String::new())
    }

    #[test]
    fn test_load_and_print() {
        let worker = quiet_worker();
        let result = worker.load("hello.js", r#"$print("hello", "world");"#);
        assert!(result.is_ok());
    }

    #[test]
    fn test_identities_unique_across_disposal() {
        let mut seen = Vec::new();
        for _ in 0..3 {
            let worker = quiet_worker();
            seen.push(worker.id());
            worker.dispose().unwrap();
        }
        let keeper = quiet_worker();
        seen.push(keeper.id());

        let mut deduped = seen.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), seen.len());
        // Monotonic assignment, never reused.
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_loads_share_global_namespace() {
        let worker = quiet_worker();
        worker.load("a.js", "globalThis.counter = 41;").unwrap();
        worker.load("b.js", "counter += 1;").unwrap();
        worker
            .load("c.js", "$recvSync(function (m) { return String(counter); });")
            .unwrap();
        assert_eq!(worker.send_sync("").unwrap(), "42");
    }

    #[test]
    fn test_send_without_handler_is_hard_error() {
        let worker = quiet_worker();
        worker.load("setup.js", "globalThis.x = 1;").unwrap();

        let err = worker.send("ping").unwrap_err();
        assert!(matches!(err, WorkerError::HandlerMissing));

        // The worker is otherwise unaffected.
        worker
            .load("recv.js", "$recv(function (m) { globalThis.last = m; });")
            .unwrap();
        assert!(worker.send("pong").is_ok());
    }

    #[test]
    fn test_send_sync_round_trip() {
        let worker = quiet_worker();
        worker
            .load("echo.js", "$recvSync(function (m) { return m; });")
            .unwrap();

        assert_eq!(worker.send_sync("hello").unwrap(), "hello");
        assert_eq!(worker.send_sync("").unwrap(), "");
        assert_eq!(worker.send_sync("héllo ☃ 漢字").unwrap(), "héllo ☃ 漢字");
    }

    #[test]
    fn test_send_sync_without_handler_is_sentinel() {
        let worker = quiet_worker();
        assert_eq!(worker.send_sync("ping").unwrap(), ERR_SYNC_HANDLER_MISSING);
    }

    #[test]
    fn test_send_sync_non_string_reply_is_sentinel() {
        let worker = quiet_worker();
        worker
            .load("num.js", "$recvSync(function (m) { return 42; });")
            .unwrap();
        assert_eq!(worker.send_sync("ping").unwrap(), ERR_NON_STRING_REPLY);
    }

    #[test]
    fn test_compile_error_diagnostic_names_origin_and_line() {
        let worker = quiet_worker();
        let err = worker
            .load("bad.js", "let a = 1;\nlet b = ;\n")
            .unwrap_err();
        let WorkerError::Compile(diagnostic) = err else {
            panic!("expected a compile error");
        };
        assert!(
            diagnostic.contains("bad.js:2"),
            "diagnostic should attribute line 2: {}",
            diagnostic
        );
    }

    #[test]
    fn test_runtime_fault_diagnostic_carries_message() {
        let worker = quiet_worker();
        let err = worker
            .load(
                "boom.js",
                "function boom() { throw new Error('kaboom'); }\nboom();\n",
            )
            .unwrap_err();
        let WorkerError::Runtime(diagnostic) = err else {
            panic!("expected a runtime fault");
        };
        assert!(diagnostic.contains("kaboom"), "got: {}", diagnostic);
    }

    #[test]
    fn test_script_to_host_async() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let worker = Worker::new(
            move |msg| sink.lock().push(msg.to_string()),
            |_msg| String::new(),
        );

        worker
            .load("out.js", r#"$send("ping"); $send("pong");"#)
            .unwrap();

        assert_eq!(*received.lock(), vec!["ping".to_string(), "pong".to_string()]);
    }

    #[test]
    fn test_script_to_host_sync_reply_reaches_script() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let worker = Worker::new(
            move |msg| sink.lock().push(msg.to_string()),
            |msg| format!("reply:{}", msg),
        );

        worker
            .load("ask.js", r#"$send($sendSync("question"));"#)
            .unwrap();

        assert_eq!(*received.lock(), vec!["reply:question".to_string()]);
    }

    #[test]
    fn test_distinct_workers_do_not_block_each_other() {
        let slow = Arc::new(quiet_worker());
        slow.load(
            "slow.js",
            r#"$recvSync(function (m) {
                const end = Date.now() + 300;
                while (Date.now() < end) {}
                return "slow:" + m;
            });"#,
        )
        .unwrap();

        let fast = quiet_worker();
        fast.load("fast.js", r#"$recvSync(function (m) { return "fast:" + m; });"#)
            .unwrap();

        let slow_handle = slow.clone();
        let slow_thread = thread::spawn(move || slow_handle.send_sync("a").unwrap());

        // Give the slow worker a head start into its busy-wait.
        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        let fast_reply = fast.send_sync("b").unwrap();
        let fast_elapsed = started.elapsed();

        assert_eq!(fast_reply, "fast:b");
        assert!(
            fast_elapsed < Duration::from_millis(200),
            "fast worker waited {:?} behind the slow one",
            fast_elapsed
        );
        assert_eq!(slow_thread.join().unwrap(), "slow:a");
    }

    #[test]
    fn test_dispose_invalidates_handle() {
        let worker = quiet_worker();
        worker.load("a.js", "1 + 1;").unwrap();
        worker.dispose().unwrap();

        assert!(matches!(
            worker.load("b.js", "2 + 2;"),
            Err(WorkerError::InvalidHandle)
        ));
        assert!(matches!(worker.send("x"), Err(WorkerError::InvalidHandle)));
        assert!(matches!(
            worker.send_sync("x"),
            Err(WorkerError::InvalidHandle)
        ));
        assert!(matches!(
            worker.heap_statistics(),
            Err(WorkerError::InvalidHandle)
        ));
        assert!(matches!(
            worker.terminate_execution(),
            Err(WorkerError::InvalidHandle)
        ));
        assert!(matches!(worker.dispose(), Err(WorkerError::InvalidHandle)));
    }

    #[test]
    fn test_heap_statistics_after_loads() {
        let worker = quiet_worker();
        worker
            .load("alloc.js", "globalThis.data = new Array(1000).fill('x');")
            .unwrap();

        let stats = worker.heap_statistics().unwrap();
        assert!(stats.used_heap_size <= stats.total_heap_size);
        if stats.heap_size_limit != 0 {
            assert!(stats.total_heap_size <= stats.heap_size_limit);
        }
    }

    #[test]
    fn test_last_diagnostic_records_failure() {
        let worker = quiet_worker();
        assert_eq!(worker.last_diagnostic(), "");

        let _ = worker.load("oops.js", "let = ;");
        assert!(worker.last_diagnostic().contains("oops.js"));
    }

    #[test]
    fn test_resource_hooks() {
        let worker = quiet_worker();
        worker.load("a.js", "globalThis.junk = new Array(100);").unwrap();
        worker.low_memory_notification().unwrap();
        assert!(worker.idle_notification_deadline(0.01).unwrap());
    }

    #[test]
    fn test_terminate_applies_to_next_entry() {
        let worker = quiet_worker();
        worker.terminate_execution().unwrap();

        assert!(matches!(
            worker.load("a.js", "1 + 1;"),
            Err(WorkerError::Terminated)
        ));
        // The request is consumed; the worker keeps working.
        worker.load("b.js", "2 + 2;").unwrap();
    }

    #[test]
    fn test_terminate_unblocks_spinning_script() {
        let worker = Arc::new(Worker::new(|_msg| {}, |_msg| String::new()));

        let handle = worker.clone();
        let interrupter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            handle.terminate_execution().unwrap();
        });

        let err = worker
            .load("spin.js", r#"while (true) { $send("tick"); }"#)
            .unwrap_err();
        assert!(matches!(err, WorkerError::Terminated));
        interrupter.join().unwrap();

        // Flag consumed; the context is still usable.
        worker.load("after.js", "1 + 1;").unwrap();
    }
}
