//! Krait - Sandboxed JavaScript workers powered by the Boa JS Engine
//!
//! Krait embeds isolated scripting contexts in a host process:
//! - Boa: ECMAScript engine written in Rust
//! - boa_runtime: console support wired to the host
//! - A bidirectional opaque-string message bridge between host and script
//!
//! Each [`Worker`] is one isolated context with its own heap and global
//! namespace. The host talks to the script through `send`/`send_sync`; the
//! script talks back through the reserved `$send`/`$sendSync` globals,
//! which land in the callbacks registered at worker construction.

pub mod worker;

// Re-export commonly used types
pub use worker::{
    ERR_NON_STRING_REPLY, ERR_SYNC_HANDLER_MISSING, HeapStatistics, ScriptOrigin, Worker,
    WorkerConfig, WorkerError, WorkerResult,
};

/// The crate version, as embedded at build time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
        assert!(!version().is_empty());
    }
}
