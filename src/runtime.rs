//! The thread-local runtime: the two arenas (nodes, owners) plus the
//! cursors and queues every other module operates through.
//!
//! The runtime assumes a single-threaded cooperative scheduling model (see
//! the crate-level docs): all operations act on `thread_local` state with
//! no locking. Handles minted against one thread's runtime are rejected if
//! presented to another thread's (not that they can be, since `NodeId` /
//! `OwnerId` / `Signal<T>` / `Memo<T>` are not `Send`).

use std::cell::{Cell, RefCell};

use slotmap::SlotMap;

use crate::arena::{NodeId, OwnerId};
use crate::config::RuntimeConfig;
use crate::node::NodeSlot;
use crate::owner::OwnerSlot;

type ScheduleHook = Box<dyn Fn()>;

pub(crate) struct Runtime {
    pub nodes: RefCell<SlotMap<NodeId, NodeSlot>>,
    pub owners: RefCell<SlotMap<OwnerId, OwnerSlot>>,

    pub current_owner: Cell<Option<OwnerId>>,
    pub current_observer: Cell<Option<NodeId>>,

    /// Sources read so far during the computation currently being
    /// (re-)evaluated, accumulated only past `source_index` (see
    /// `crate::tracking`).
    pub new_sources: RefCell<Vec<NodeId>>,
    pub source_index: Cell<usize>,

    pub untracking: Cell<bool>,
    pub batch_depth: Cell<u32>,

    pub pure_queue: RefCell<Vec<NodeId>>,
    pub render_queue: RefCell<Vec<NodeId>>,
    pub effect_queue: RefCell<Vec<NodeId>>,

    pub scheduled: Cell<bool>,
    pub running: Cell<bool>,
    pub clock: Cell<u64>,

    pub schedule_hook: RefCell<Option<ScheduleHook>>,
    pub config: RefCell<RuntimeConfig>,
}

impl Runtime {
    fn new() -> Self {
        Runtime {
            nodes: RefCell::new(SlotMap::with_key()),
            owners: RefCell::new(SlotMap::with_key()),
            current_owner: Cell::new(None),
            current_observer: Cell::new(None),
            new_sources: RefCell::new(Vec::new()),
            source_index: Cell::new(0),
            untracking: Cell::new(false),
            batch_depth: Cell::new(0),
            pure_queue: RefCell::new(Vec::new()),
            render_queue: RefCell::new(Vec::new()),
            effect_queue: RefCell::new(Vec::new()),
            scheduled: Cell::new(false),
            running: Cell::new(false),
            clock: Cell::new(0),
            schedule_hook: RefCell::new(None),
            config: RefCell::new(RuntimeConfig::default()),
        }
    }
}

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Run `f` with a reference to this thread's runtime. The great majority
/// of the crate's internals go through this function; it exists mainly so
/// call sites read as ordinary function calls rather than
/// `RUNTIME.with(...)` noise.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
    RUNTIME.with(f)
}

/// Replace the installed schedule hook. The hook is called whenever new
/// work is enqueued and no flush is currently running or batching; its
/// default behavior is to call [`crate::flush_sync`] immediately (suited to
/// hosts without a microtask queue of their own). A host with an event
/// loop can install a hook that instead defers onto its own task queue.
pub fn set_schedule_hook(hook: impl Fn() + 'static) {
    with_runtime(|rt| {
        *rt.schedule_hook.borrow_mut() = Some(Box::new(hook));
    });
}

/// Restore the default immediate-flush scheduling behavior.
pub fn clear_schedule_hook() {
    with_runtime(|rt| {
        *rt.schedule_hook.borrow_mut() = None;
    });
}

/// Install a new [`RuntimeConfig`] for this thread.
pub fn set_config(config: RuntimeConfig) {
    with_runtime(|rt| *rt.config.borrow_mut() = config);
}

/// RAII guard restoring `current_observer` (and the source-tracking
/// cursors) to whatever they were before this guard was created, on drop
/// — including when the guarded section panics.
pub(crate) struct ObserverGuard {
    prev_observer: Option<NodeId>,
    prev_sources: Vec<NodeId>,
    prev_index: usize,
}

impl ObserverGuard {
    pub(crate) fn enter(observer: Option<NodeId>) -> Self {
        with_runtime(|rt| {
            let prev_observer = rt.current_observer.replace(observer);
            let prev_sources = rt.new_sources.replace(Vec::new());
            let prev_index = rt.source_index.replace(0);
            ObserverGuard {
                prev_observer,
                prev_sources,
                prev_index,
            }
        })
    }

    /// Take the sources accumulated during this scope, leaving the guard's
    /// saved pre-scope accumulator untouched until restoration.
    pub(crate) fn take_new_sources(&self) -> Vec<NodeId> {
        with_runtime(|rt| rt.new_sources.replace(Vec::new()))
    }

    pub(crate) fn source_index(&self) -> usize {
        with_runtime(|rt| rt.source_index.get())
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        with_runtime(|rt| {
            rt.current_observer.set(self.prev_observer);
            rt.new_sources
                .replace(std::mem::take(&mut self.prev_sources));
            rt.source_index.set(self.prev_index);
        });
    }
}

/// RAII guard for `untrack` / `peek`: disables dependency recording for
/// its lifetime, restoring the previous flag on drop.
pub(crate) struct UntrackGuard {
    prev: bool,
}

impl UntrackGuard {
    pub(crate) fn enter() -> Self {
        let prev = with_runtime(|rt| rt.untracking.replace(true));
        UntrackGuard { prev }
    }
}

impl Drop for UntrackGuard {
    fn drop(&mut self) {
        with_runtime(|rt| rt.untracking.set(self.prev));
    }
}

/// RAII guard for `batch`: increments the batch depth on entry and, when
/// the outermost batch exits, triggers a flush.
pub(crate) struct BatchGuard;

impl BatchGuard {
    pub(crate) fn enter() -> Self {
        with_runtime(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let should_flush = with_runtime(|rt| {
            let depth = rt.batch_depth.get().saturating_sub(1);
            rt.batch_depth.set(depth);
            depth == 0
        });
        if should_flush {
            crate::scheduler::request_flush();
        }
    }
}
