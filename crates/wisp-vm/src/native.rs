//! Native (host-implemented) functions.
//!
//! A native is a plain `fn(&[Value]) -> Value`: it may read its arguments
//! but must not trigger GC other than through the VM's own allocator.
//! `CALL` dispatches to a native directly, without pushing a `CallFrame`.

use crate::value::Value;
use std::time::Instant;

use std::sync::OnceLock;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// `clock() -> number`: seconds of wall-clock time since the VM started.
///
/// Measured as wall-clock time since first use rather than CPU time, which
/// is what every embedder of this VM actually observes.
pub fn clock(_args: &[Value]) -> Value {
    let start = PROCESS_START.get_or_init(Instant::now);
    Value::Number(start.elapsed().as_secs_f64())
}
