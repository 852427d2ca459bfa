//! Heap statistics snapshots
//!
//! The embedded engine does not publish per-context heap counters, so the
//! snapshot is derived from process memory probes: `/proc/self/statm` on
//! Unix and the Win32 process-memory counters on Windows. Fields the probe
//! cannot populate report zero. `heap_size_limit` is zero because no
//! explicit limit is imposed on the engine heap.

/// Point-in-time memory statistics for a worker's execution context.
///
/// Produced on demand by [`Worker::heap_statistics`](super::Worker::heap_statistics),
/// never persisted. `used_heap_size <= total_heap_size` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStatistics {
    pub total_heap_size: u64,
    pub total_heap_size_executable: u64,
    pub total_physical_size: u64,
    pub total_available_size: u64,
    pub used_heap_size: u64,
    pub heap_size_limit: u64,
    pub malloced_memory: u64,
    pub does_zap_garbage: bool,
}

/// Take a snapshot of the current process's memory use.
pub(crate) fn snapshot() -> HeapStatistics {
    probe().unwrap_or_default()
}

#[cfg(unix)]
fn probe() -> Option<HeapStatistics> {
    use std::fs;

    // statm reports pages: size resident shared text lib data dirty
    let statm = fs::read_to_string("/proc/self/statm").ok()?;
    let fields: Vec<u64> = statm
        .split_whitespace()
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 7 {
        return None;
    }

    let page = 4096; // page size typically 4KB
    let total = fields[0] * page;
    let resident = fields[1] * page;
    let text = fields[3] * page;
    let data = fields[5] * page;
    let dirty = fields[6] * page;

    Some(HeapStatistics {
        total_heap_size: total,
        total_heap_size_executable: text,
        total_physical_size: resident,
        total_available_size: 0,
        used_heap_size: data.min(total),
        heap_size_limit: 0,
        malloced_memory: dirty,
        does_zap_garbage: false,
    })
}

#[cfg(windows)]
fn probe() -> Option<HeapStatistics> {
    use std::mem::MaybeUninit;
    use windows_sys::Win32::System::ProcessStatus::{
        GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS,
    };
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    let mut pmc = MaybeUninit::<PROCESS_MEMORY_COUNTERS>::uninit();
    unsafe {
        let handle = GetCurrentProcess();
        let size = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;
        if GetProcessMemoryInfo(handle, pmc.as_mut_ptr(), size) == 0 {
            return None;
        }
        let pmc = pmc.assume_init();
        let working_set = pmc.WorkingSetSize as u64;
        let committed = pmc.PagefileUsage as u64;
        let total = committed.max(working_set);

        Some(HeapStatistics {
            total_heap_size: total,
            total_heap_size_executable: 0,
            total_physical_size: working_set,
            total_available_size: 0,
            used_heap_size: committed.min(total),
            heap_size_limit: 0,
            malloced_memory: 0,
            does_zap_garbage: false,
        })
    }
}

#[cfg(not(any(unix, windows)))]
fn probe() -> Option<HeapStatistics> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_invariants() {
        let stats = snapshot();
        assert!(stats.used_heap_size <= stats.total_heap_size);
        assert!(stats.total_physical_size <= stats.total_heap_size);
        if stats.heap_size_limit != 0 {
            assert!(stats.total_heap_size <= stats.heap_size_limit);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_snapshot_is_populated_on_linux() {
        let stats = snapshot();
        assert!(stats.total_heap_size > 0);
        assert!(stats.used_heap_size > 0);
    }

    #[test]
    fn test_default_is_zeroed() {
        let stats = HeapStatistics::default();
        assert_eq!(stats.total_heap_size, 0);
        assert!(!stats.does_zap_garbage);
    }
}
