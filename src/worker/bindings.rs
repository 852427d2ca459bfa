//! Reserved script bindings
//!
//! Every worker context gets exactly five reserved globals:
//!
//! - `$print(...)` writes its arguments space-joined to host stdout
//! - `$recv(fn)` registers the script's async inbound handler
//! - `$recvSync(fn)` registers the script's sync inbound handler
//! - `$send(msg)` routes a message to the host async callback
//! - `$sendSync(msg)` routes a message to the host sync callback and
//!   returns the callback's reply as the binding's return value
//!
//! A `console` object is installed as well, wired to the same host output.
//!
//! Handler slots and the worker identity live in a thread-local: each
//! worker's context is owned by exactly one dedicated thread, so the
//! bindings (which only ever run on that thread) reach their worker state
//! without going through the context itself.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use boa_engine::{
    Context, JsError, JsNativeError, JsObject, JsResult, JsValue, NativeFunction, js_string,
};
use boa_gc::{Finalize, Trace};
use boa_runtime::{ConsoleState, Logger, extensions::ConsoleExtension, register_extensions};

use super::registry;

/// Fault message raised inside the context when termination is requested.
pub(crate) const TERMINATION_FAULT: &str = "execution terminated";

/// Per-thread state of the worker whose context runs on this thread.
struct ActiveWorker {
    id: u64,
    terminated: Arc<AtomicBool>,
    recv: Option<JsObject>,
    recv_sync: Option<JsObject>,
}

thread_local! {
    static ACTIVE: RefCell<Option<ActiveWorker>> = const { RefCell::new(None) };
}

/// Bind this thread to a worker identity. Must be called before the
/// context executes any script.
pub(crate) fn activate(id: u64, terminated: Arc<AtomicBool>) {
    ACTIVE.with_borrow_mut(|active| {
        *active = Some(ActiveWorker {
            id,
            terminated,
            recv: None,
            recv_sync: None,
        });
    });
}

/// Drop the thread's worker state, releasing both handler slots. Must run
/// before the context itself is torn down. Idempotent.
pub(crate) fn deactivate() {
    ACTIVE.with_borrow_mut(|active| {
        *active = None;
    });
}

/// The registered async inbound handler, if the script installed one.
pub(crate) fn recv_handler() -> Option<JsObject> {
    ACTIVE.with_borrow(|active| active.as_ref().and_then(|a| a.recv.clone()))
}

/// The registered sync inbound handler, if the script installed one.
pub(crate) fn recv_sync_handler() -> Option<JsObject> {
    ACTIVE.with_borrow(|active| active.as_ref().and_then(|a| a.recv_sync.clone()))
}

fn set_recv_handler(handler: JsObject) {
    ACTIVE.with_borrow_mut(|active| {
        if let Some(a) = active.as_mut() {
            // Last registration wins.
            a.recv = Some(handler);
        }
    });
}

fn set_recv_sync_handler(handler: JsObject) {
    ACTIVE.with_borrow_mut(|active| {
        if let Some(a) = active.as_mut() {
            a.recv_sync = Some(handler);
        }
    });
}

fn active_id() -> Option<u64> {
    ACTIVE.with_borrow(|active| active.as_ref().map(|a| a.id))
}

fn termination_pending() -> bool {
    ACTIVE.with_borrow(|active| {
        active
            .as_ref()
            .map(|a| a.terminated.load(Ordering::SeqCst))
            .unwrap_or(false)
    })
}

fn termination_error() -> JsError {
    JsError::from_opaque(JsValue::from(js_string!(TERMINATION_FAULT)))
}

/// Console logger that prints to host stdout/stderr.
#[derive(Debug, Clone, Default, Trace, Finalize)]
struct WorkerLogger;

impl Logger for WorkerLogger {
    fn log(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        println!("{}", msg);
        Ok(())
    }

    fn info(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        println!("{}", msg);
        Ok(())
    }

    fn warn(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        eprintln!("{}", msg);
        Ok(())
    }

    fn error(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        eprintln!("{}", msg);
        Ok(())
    }
}

/// Install the reserved bindings and the console into a fresh context.
pub(crate) fn install(context: &mut Context) -> JsResult<()> {
    register_extensions((ConsoleExtension(WorkerLogger),), None, context)
        .map_err(|e| JsError::from(JsNativeError::error().with_message(e.to_string())))?;

    context.register_global_callable(
        js_string!("$print"),
        1,
        NativeFunction::from_fn_ptr(print),
    )?;
    context.register_global_callable(js_string!("$recv"), 1, NativeFunction::from_fn_ptr(recv))?;
    context.register_global_callable(
        js_string!("$recvSync"),
        1,
        NativeFunction::from_fn_ptr(recv_sync),
    )?;
    context.register_global_callable(js_string!("$send"), 1, NativeFunction::from_fn_ptr(send))?;
    context.register_global_callable(
        js_string!("$sendSync"),
        1,
        NativeFunction::from_fn_ptr(send_sync),
    )?;

    Ok(())
}

/// `$print(...)` - write arguments space-joined to stdout.
fn print(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    if termination_pending() {
        return Err(termination_error());
    }

    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(arg.to_string(context)?.to_std_string_escaped());
    }
    println!("{}", parts.join(" "));

    Ok(JsValue::undefined())
}

/// `$recv(fn)` - set the worker's async inbound handler.
fn recv(_this: &JsValue, args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    let handler = args
        .get(0)
        .and_then(|v| v.as_callable())
        .map(|c| c.clone())
        .ok_or_else(|| JsNativeError::typ().with_message("$recv expects a function"))?;

    set_recv_handler(handler);
    Ok(JsValue::undefined())
}

/// `$recvSync(fn)` - set the worker's sync inbound handler.
fn recv_sync(_this: &JsValue, args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    let handler = args
        .get(0)
        .and_then(|v| v.as_callable())
        .map(|c| c.clone())
        .ok_or_else(|| JsNativeError::typ().with_message("$recvSync expects a function"))?;

    set_recv_sync_handler(handler);
    Ok(JsValue::undefined())
}

/// `$send(msg)` - route a message to the host async callback. The script
/// does not observe the callback's outcome.
fn send(_this: &JsValue, args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    if termination_pending() {
        return Err(termination_error());
    }

    let msg = args
        .get(0)
        .and_then(|v| v.as_string())
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| JsNativeError::typ().with_message("$send expects a string message"))?;

    let id = active_id()
        .ok_or_else(|| JsNativeError::error().with_message("no worker bound to this thread"))?;
    let callbacks = registry::lookup(id)
        .ok_or_else(|| JsNativeError::error().with_message("worker is not registered"))?;

    // Script execution blocks here until the host callback returns.
    (callbacks.recv)(&msg);

    Ok(JsValue::undefined())
}

/// `$sendSync(msg)` - route a message to the host sync callback and hand
/// its reply back to the script as the return value.
fn send_sync(_this: &JsValue, args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    if termination_pending() {
        return Err(termination_error());
    }

    let msg = args
        .get(0)
        .and_then(|v| v.as_string())
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| JsNativeError::typ().with_message("$sendSync expects a string message"))?;

    let id = active_id()
        .ok_or_else(|| JsNativeError::error().with_message("no worker bound to this thread"))?;
    let callbacks = registry::lookup(id)
        .ok_or_else(|| JsNativeError::error().with_message("worker is not registered"))?;

    // The reply is an owned String copied into the context; nothing the
    // callback owned needs to survive past this call.
    let reply = (callbacks.recv_sync)(&msg);

    Ok(JsValue::from(js_string!(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_slots_empty_without_active_worker() {
        assert!(recv_handler().is_none());
        assert!(recv_sync_handler().is_none());
        assert!(active_id().is_none());
        assert!(!termination_pending());
    }

    #[test]
    fn test_activate_binds_identity_and_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        activate(41, flag.clone());

        assert_eq!(active_id(), Some(41));
        assert!(!termination_pending());

        flag.store(true, Ordering::SeqCst);
        assert!(termination_pending());

        deactivate();
        assert!(active_id().is_none());
    }
}
