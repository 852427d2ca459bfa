//! Script origin metadata
//!
//! Every unit of source loaded into a worker is attributed to a
//! `ScriptOrigin` so that diagnostics can point back at the resource the
//! embedder handed us. All fields are optional; an unset name is replaced
//! by a synthetic sequential one.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sequence for synthetic script names, process-wide
static SCRIPT_NAME_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Origin metadata attached to a compiled script unit.
///
/// Mirrors the classic embedder script-origin record: a resource name,
/// line/column offsets applied to reported positions, and a handful of
/// attribution flags that are carried through to diagnostics verbatim.
#[derive(Debug, Clone, Default)]
pub struct ScriptOrigin {
    /// Resource name shown in diagnostics. Empty means "generate one".
    pub script_name: String,
    /// Offset added to reported line numbers.
    pub line_offset: i32,
    /// Offset added to reported columns on the first line.
    pub column_offset: i32,
    /// Whether the source is shared cross-origin.
    pub is_shared_cross_origin: bool,
    /// Embedder-assigned numeric script id.
    pub script_id: i32,
    /// Whether this is an embedder debug script.
    pub is_embedder_debug_script: bool,
    /// Source map URL, if any.
    pub source_map_url: String,
    /// Whether the source is opaque to the embedder.
    pub is_opaque: bool,
}

impl ScriptOrigin {
    /// Create an origin carrying only a resource name.
    pub fn named(script_name: impl Into<String>) -> Self {
        Self {
            script_name: script_name.into(),
            ..Default::default()
        }
    }

    /// The resource name to attribute diagnostics to, generating a
    /// synthetic sequential name when the embedder left it unset.
    pub(crate) fn resolved_name(&self) -> String {
        if self.script_name.is_empty() {
            next_script_name()
        } else {
            self.script_name.clone()
        }
    }
}

/// Generate the next synthetic script name ("VM0", "VM1", ...).
///
/// Names are unique for the lifetime of the process.
fn next_script_name() -> String {
    let seq = SCRIPT_NAME_SEQUENCE.fetch_add(1, Ordering::SeqCst);
    format!("VM{}", seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_origin_keeps_name() {
        let origin = ScriptOrigin::named("app.js");
        assert_eq!(origin.resolved_name(), "app.js");
        assert_eq!(origin.line_offset, 0);
        assert!(!origin.is_opaque);
    }

    #[test]
    fn test_unset_name_is_synthetic() {
        let origin = ScriptOrigin::default();
        let name = origin.resolved_name();
        assert!(name.starts_with("VM"));
        assert!(name[2..].parse::<u64>().is_ok());
    }

    #[test]
    fn test_synthetic_names_are_distinct_and_monotonic() {
        let first: u64 = next_script_name()[2..].parse().unwrap();
        let second: u64 = next_script_name()[2..].parse().unwrap();
        let third: u64 = next_script_name()[2..].parse().unwrap();
        assert!(first < second);
        assert!(second < third);
    }
}
