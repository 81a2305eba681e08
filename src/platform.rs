//! Platform probes: L1 cache-line size query and cancellation-aware sleep.
//!
//! Treated as an external collaborator by the design: the coordination engine only
//! consumes the interface below, never the platform quirks behind it.

use std::io;
use std::time::Duration;

use crate::constants::FALLBACK_CACHE_LINE_SIZE;
use crate::error::{ Result, RingFenceError };

/// Query the L1 data cache line size via `sysconf(_SC_LEVEL1_DCACHE_LINESIZE)`.
///
/// Falls back to [`FALLBACK_CACHE_LINE_SIZE`] on platforms where the sysconf key
/// is unknown or reports an invalid value (some sandboxes and virtualized CI
/// runners return 0 rather than failing outright).
#[cfg(target_os = "linux")]
pub fn cache_line_size() -> Result<usize> {
    let line_size = unsafe { libc::sysconf(libc::_SC_LEVEL1_DCACHE_LINESIZE) };

    if line_size <= 0 {
        Ok(FALLBACK_CACHE_LINE_SIZE)
    } else {
        Ok(line_size as usize)
    }
}

#[cfg(not(target_os = "linux"))]
pub fn cache_line_size() -> Result<usize> {
    Ok(FALLBACK_CACHE_LINE_SIZE)
}

/// Assert that `actual` bytes are sufficient to isolate `type_name` on its own
/// cache line, returning a construction error otherwise.
pub fn check_cache_isolation(type_name: &'static str, actual: usize) -> Result<()> {
    let required = cache_line_size()?;

    if actual < required {
        return Err(RingFenceError::Undersized { type_name, actual, required });
    }

    Ok(())
}

/// Sleep for the given duration. Isolated behind this probe so that a future
/// cancellation-aware variant (e.g. a condvar wait with timeout) can replace
/// the plain `thread::sleep` without touching call sites.
pub fn sleep(duration: Duration) -> io::Result<()> {
    std::thread::sleep(duration);
    Ok(())
}
