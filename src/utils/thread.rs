// src/utils/thread.rs
//! Worker thread setup: scheduling priority and core pinning.

/// Drops the calling thread to the lowest scheduling priority.
///
/// Hashing threads must never starve interactive use of the machine. On
/// Linux `nice` applies to the calling thread only.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn lower_current_priority() {
    // SAFETY: nice(2) takes a plain integer and touches no caller memory.
    let result = unsafe { libc::nice(19) };
    if result == -1 {
        log::debug!("Could not lower thread priority");
    }
}

#[cfg(not(unix))]
pub fn lower_current_priority() {}

/// Pins the calling thread to the given logical core, if it exists.
///
/// Returns `false` when the platform does not expose core ids or the core
/// index is out of range; the thread then keeps floating.
pub fn pin_current_to_core(core: usize) -> bool {
    core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == core))
        .map(core_affinity::set_for_current)
        .unwrap_or(false)
}
