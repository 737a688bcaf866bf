//! Free-standing control operations that don't belong to any one node
//! kind: `untrack`, `batch`, `peek`, and the current-observer accessor.

use crate::arena::NodeId;
use crate::runtime::{with_runtime, BatchGuard, UntrackGuard};

/// Run `f` with dependency tracking suppressed, even if a computation is
/// currently being (re-)evaluated. Reads performed inside do not become
/// dependencies of the enclosing observer.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _guard = UntrackGuard::enter();
    f()
}

/// Shorthand for `untrack`, for the common case of just wanting a value
/// without tracking it — matches the "peek" naming used on `Signal`/`Memo`
/// themselves.
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

/// Group every signal write made inside `f` into a single flush at the
/// end, instead of one flush per write. Nested calls are flattened: only
/// the outermost `batch` triggers the flush.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    let _guard = BatchGuard::enter();
    f()
}

/// The computation currently being (re-)evaluated, if any — the node
/// that a `Signal`/`Memo` read right now would record a dependency on.
pub fn get_observer() -> Option<NodeId> {
    with_runtime(|rt| rt.current_observer.get())
}
