//! Exception translation
//!
//! Converts an engine-level fault into the single diagnostic string handed
//! back to the host. When the fault text carries a source position the
//! diagnostic shows `<resource-name>:<line>`, the offending source line, a
//! caret marker under the implicated column, and the stack trace when one
//! exists; otherwise it falls back to the bare fault message.
//!
//! The diagnostic is human-readable text, not a structured error object.
//! The layout is kept stable, but hosts should not parse it as a contract.

use boa_engine::{Context, JsError, js_string};

use super::origin::ScriptOrigin;

/// A 1-based line/column position extracted from an engine fault message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

/// Translate a compilation failure into a diagnostic.
pub(crate) fn compile_diagnostic(
    origin: &ScriptOrigin,
    resource_name: &str,
    source: &str,
    error: &JsError,
) -> String {
    let fault = error.to_string();
    let position = position_in_message(&fault);
    render(origin, resource_name, Some(source), position, &fault, None)
}

/// Translate an uncaught fault raised while executing script code.
///
/// `source` is the unit being executed when the fault has a position to
/// point into; handler invocations pass `None`.
pub(crate) fn runtime_diagnostic(
    origin: &ScriptOrigin,
    resource_name: &str,
    source: Option<&str>,
    error: &JsError,
    context: &mut Context,
) -> String {
    let fault = error.to_string();
    let position = position_in_message(&fault);
    let stack = stack_of(error, context);
    render(origin, resource_name, source, position, &fault, stack.as_deref())
}

/// Pull the `stack` property off a thrown error object, if the engine
/// populated one.
fn stack_of(error: &JsError, context: &mut Context) -> Option<String> {
    let thrown = error.to_opaque(context);
    let object = thrown.as_object()?;
    let stack = object.get(js_string!("stack"), context).ok()?;
    let text = stack.as_string().map(|s| s.to_std_string_escaped())?;
    if text.is_empty() { None } else { Some(text) }
}

/// Assemble the diagnostic text.
///
/// With no position metadata this is just the fault message. With a
/// position, the origin's line offset shifts the reported line number and
/// its column offset shifts first-line columns, matching how offsets are
/// meant to re-anchor embedded snippets inside a larger resource.
fn render(
    origin: &ScriptOrigin,
    resource_name: &str,
    source: Option<&str>,
    position: Option<SourcePosition>,
    fault: &str,
    stack: Option<&str>,
) -> String {
    let Some(position) = position else {
        return format!("{}\n", fault);
    };

    let reported_line = (i64::from(position.line) + i64::from(origin.line_offset)).max(1);
    let mut column = position.column;
    if position.line == 1 && origin.column_offset > 0 {
        column = column.saturating_add(origin.column_offset as u32);
    }

    let mut out = format!("{}:{}\n", resource_name, reported_line);

    if let Some(line_text) = source.and_then(|s| s.lines().nth(position.line as usize - 1)) {
        out.push_str(line_text);
        out.push('\n');
        for _ in 1..column {
            out.push(' ');
        }
        out.push('^');
        out.push('\n');
    }

    out.push_str(stack.unwrap_or(fault));
    out.push('\n');
    out
}

/// Extract a trailing `at line N, col M` position from an engine fault
/// message. Returns `None` when the message carries no position.
pub(crate) fn position_in_message(message: &str) -> Option<SourcePosition> {
    let idx = message.rfind(" at line ")?;
    let rest = &message[idx + " at line ".len()..];

    let line_digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let line: u32 = line_digits.parse().ok()?;

    let rest = rest[line_digits.len()..].strip_prefix(", col ")?;
    let col_digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let column: u32 = col_digits.parse().ok()?;

    if line == 0 {
        return None;
    }
    Some(SourcePosition { line, column })
}
