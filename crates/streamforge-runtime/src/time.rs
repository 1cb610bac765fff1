//! Monotonic millisecond ticks used to timestamp events.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since this process first called `ticks()`. Monotonic;
/// unaffected by wall-clock adjustments.
pub fn ticks() -> i64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as i64
}
