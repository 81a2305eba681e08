//! Insights - observability for ringfence.
//!
//! Thin tracing spans around the claim/publish protocol. Zero-cost when the
//! `tracing` feature is disabled.
//!
//! ```toml
//! ringfence = { version = "0.1", features = ["tracing"] }
//! ```
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```

/// Record a slot claim (creates a span visible to any active subscriber).
#[cfg(feature = "tracing")]
#[inline]
pub fn record_claim(fence_kind: &str, seq: u64) {
    let _span = tracing::trace_span!("acquire_slot", fence_kind, seq).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_claim(_fence_kind: &str, _seq: u64) {}

/// Record a slot publish.
#[cfg(feature = "tracing")]
#[inline]
pub fn record_publish(fence_kind: &str, seq: u64) {
    let _span = tracing::trace_span!("release_slot", fence_kind, seq).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_publish(_fence_kind: &str, _seq: u64) {}

/// Record escalation from spinning to sleeping in the back-off loop.
#[cfg(feature = "tracing")]
#[inline]
pub fn record_backoff_escalation(fence_kind: &str, sleep_ms: u64) {
    let _span = tracing::debug_span!("backoff_escalate", fence_kind, sleep_ms).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_backoff_escalation(_fence_kind: &str, _sleep_ms: u64) {}

/// Record cooperative cancellation of a task.
#[cfg(feature = "tracing")]
#[inline]
pub fn record_cancellation(seq: u64) {
    let _span = tracing::info_span!("task_cancelled", seq).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_cancellation(_seq: u64) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_compile_and_run() {
        record_claim("producer", 0);
        record_publish("producer", 0);
        record_backoff_escalation("consumer", 25);
        record_cancellation(0);
    }
}
