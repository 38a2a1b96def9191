//! Process memory reporting.
//!
//! Reads the resident set size from `/proc/self/status`. On platforms
//! without procfs the figure is simply absent.

use tracing::{debug, info};

/// Parse the `VmRSS:` line of a `/proc/<pid>/status` dump, in KiB.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// Resident set size of this process in KiB.
pub fn resident_set_kib() -> Option<u64> {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .as_deref()
        .and_then(parse_vm_rss)
}

/// Log the current resident set size. `final_report` selects `info` over
/// `debug`.
pub fn log_memory_usage(context: &str, final_report: bool) {
    let Some(kib) = resident_set_kib() else {
        debug!(context, "resident set size unavailable");
        return;
    };
    let mib = kib as f64 / 1024.0;
    if final_report {
        info!(context, rss_kib = kib, "memory usage: {mib:.1} MiB");
    } else {
        debug!(context, rss_kib = kib, "memory usage: {mib:.1} MiB");
    }
}
