//! Monotonic clock helper, used by callers that want to stamp events without depending on the
//! wall clock.

use std::sync::Once;
use std::time::Instant;

static INIT: Once = Once::new();
static mut EPOCH: Option<Instant> = None;

fn epoch() -> Instant {
    unsafe {
        INIT.call_once(|| {
            EPOCH = Some(Instant::now());
        });
        EPOCH.expect("epoch initialized by Once above")
    }
}

/// Nanoseconds since an unspecified, process-local epoch (the first call to this function).
/// Monotonic; unaffected by wall-clock adjustments.
pub fn now_ns() -> u64 {
    epoch().elapsed().as_nanos() as u64
}
