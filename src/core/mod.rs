//! Core logic: bounded bitset and the fixed-size token-bucket rate limiter.

pub mod bitmap;
pub mod rate_limiter;

/// Best-effort CPU pinning for `--cpu`: a failed pin is logged, not fatal.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    if let Err(e) = set.set(cpu) {
        tracing::warn!("--cpu {cpu} is not a valid CPU index: {e}");
        return;
    }
    match sched_setaffinity(Pid::from_raw(0), &set) {
        Ok(()) => tracing::info!("pinned to CPU {cpu}"),
        Err(e) => tracing::warn!("failed to pin to CPU {cpu}: {e}"),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(cpu: usize) {
    tracing::warn!("CPU pinning is not supported on this platform (requested CPU {cpu})");
}
