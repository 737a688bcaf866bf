//! The ownership tree: lifetime scoping, cleanup callbacks, the context
//! map, and the error-handler chain.
//!
//! Every signal, memo, and effect carries its own owner scope so that
//! `on_cleanup` calls made during its compute, and any child effects it
//! creates, are torn down together when the node is disposed or re-run.
//! Siblings are linked newest-first (`first_child` always points at the
//! most recently created child), so a depth-first walk starting there
//! naturally visits nodes in reverse-creation order — the ordering
//! `dispose` relies on to produce LIFO cleanup semantics.

use std::any::Any;
use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::arena::{NodeId, OwnerId, OwnerState};
use crate::error::ReactiveError;
use crate::runtime::with_runtime;

type ErrorHandler = Box<dyn Fn(&ReactiveError) -> Result<(), ReactiveError>>;

pub(crate) struct OwnerSlot {
    pub parent: Option<OwnerId>,
    pub first_child: Option<OwnerId>,
    pub next_sibling: Option<OwnerId>,
    pub cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    /// Keyed by [`crate::context::Context`] id, not `TypeId` — two
    /// contexts created independently over the same `T` are distinct
    /// keys, matching the "opaque token" contract in the spec.
    pub contexts: RefCell<FxHashMap<u64, Box<dyn Any>>>,
    pub error_handlers: RefCell<Vec<ErrorHandler>>,
    pub state: std::cell::Cell<OwnerState>,
    /// The graph node this owner was created for, if any. Root owners and
    /// `run_with_owner` scopes created directly by a host have no node.
    pub node: Option<NodeId>,
}

impl OwnerSlot {
    pub(crate) fn new(parent: Option<OwnerId>, node: Option<NodeId>) -> Self {
        OwnerSlot {
            parent,
            first_child: None,
            next_sibling: None,
            cleanups: RefCell::new(Vec::new()),
            contexts: RefCell::new(FxHashMap::default()),
            error_handlers: RefCell::new(Vec::new()),
            state: std::cell::Cell::new(OwnerState::Clean),
            node,
        }
    }
}

/// An opaque handle to a scope in the ownership tree.
///
/// Most code never touches `Owner` directly — it is implicit in whichever
/// signal/memo/effect is currently being created or updated. It becomes
/// explicit when a host wants to capture "the scope active right now" and
/// re-enter it later, e.g. to create resources outside of a request
/// handler's call stack but dispose them with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub(crate) OwnerId);

/// Create a fresh, detached root scope, run `init` with it current, and
/// return whatever `init` returns. The root is never disposed
/// automatically; callers that want cleanup must call
/// [`dispose`] on the returned `Owner`, typically via the `dispose`
/// callback pattern shown in the crate documentation.
pub fn create_root<T>(init: impl FnOnce(Owner) -> T) -> T {
    let owner = with_runtime(|rt| {
        let id = rt.owners.borrow_mut().insert(OwnerSlot::new(None, None));
        Owner(id)
    });
    run_with_owner(owner, move || init(owner))
}

/// Run `f` with `owner` installed as the current owner, restoring whatever
/// owner was current beforehand even if `f` panics.
pub fn run_with_owner<T>(owner: Owner, f: impl FnOnce() -> T) -> T {
    let prev = with_runtime(|rt| rt.current_owner.replace(Some(owner.0)));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    with_runtime(|rt| rt.current_owner.set(prev));
    match result {
        Ok(v) => v,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Return the owner currently active, if any.
pub fn get_owner() -> Option<Owner> {
    with_runtime(|rt| rt.current_owner.get().map(Owner))
}

/// Record, after the fact, which graph node an owner scope belongs to.
/// Node construction needs an `OwnerId` to stamp into the node's slot
/// before the node itself has an id, so owner and node are linked in two
/// steps: create the owner, create the node under it, then attach.
pub(crate) fn attach_node_to_owner(owner: OwnerId, node: NodeId) {
    with_runtime(|rt| {
        rt.owners.borrow_mut()[owner].node = Some(node);
    });
}

/// Create a child scope of the current owner (or a detached root if there
/// is none) and return its id. Used internally by signal/memo/effect
/// constructors.
pub(crate) fn create_child_owner(node: Option<NodeId>) -> OwnerId {
    with_runtime(|rt| {
        let parent = rt.current_owner.get();
        let id = rt.owners.borrow_mut().insert(OwnerSlot::new(parent, node));
        if let Some(parent_id) = parent {
            let mut owners = rt.owners.borrow_mut();
            let sibling = owners[parent_id].first_child;
            owners[id].next_sibling = sibling;
            owners[parent_id].first_child = Some(id);
        }
        id
    })
}

/// Register `cb` to run when the current owner is disposed. Runs in LIFO
/// order relative to other cleanups registered on the same owner. A no-op
/// if there is no current owner.
pub fn on_cleanup(cb: impl FnOnce() + 'static) {
    with_runtime(|rt| {
        if let Some(owner) = rt.current_owner.get() {
            rt.owners.borrow()[owner]
                .cleanups
                .borrow_mut()
                .push(Box::new(cb));
        }
    })
}

/// Dispose `owner`: recursively disposes every child scope first (newest
/// child first), then runs this owner's own cleanups in LIFO order, then
/// detaches the owner's graph node (if any) from the dependency graph.
/// Calling `dispose` on an already-disposed owner is a no-op.
pub fn dispose(owner: Owner) {
    dispose_owner(owner.0);
}

pub(crate) fn dispose_owner(id: OwnerId) {
    let (already_disposed, children, node) = with_runtime(|rt| {
        let owners = rt.owners.borrow();
        let slot = &owners[id];
        if slot.state.get() == OwnerState::Disposed {
            return (true, Vec::new(), None);
        }
        let mut children = Vec::new();
        let mut cur = slot.first_child;
        while let Some(c) = cur {
            children.push(c);
            cur = owners[c].next_sibling;
        }
        (false, children, slot.node)
    });
    if already_disposed {
        return;
    }

    for child in children {
        dispose_owner(child);
    }

    let cleanups = with_runtime(|rt| {
        std::mem::take(&mut *rt.owners.borrow()[id].cleanups.borrow_mut())
    });
    for cb in cleanups.into_iter().rev() {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(cb));
    }

    if let Some(node_id) = node {
        crate::propagator::detach_node(node_id);
    }

    with_runtime(|rt| {
        let owners = rt.owners.borrow();
        let slot = &owners[id];
        slot.state.set(OwnerState::Disposed);
        slot.contexts.borrow_mut().clear();
        slot.error_handlers.borrow_mut().clear();
    });
}

/// Tear down everything a previous run of `owner`'s computation produced —
/// its child scopes (recursively) and its own cleanup callbacks, run LIFO
/// — without disposing `owner` itself or touching its contexts or error
/// handlers, which persist across re-executions. Called just before a
/// memo or effect re-runs its compute function.
pub(crate) fn reset_owner_for_rerun(id: OwnerId) {
    let children = with_runtime(|rt| {
        let owners = rt.owners.borrow();
        let mut children = Vec::new();
        let mut cur = owners[id].first_child;
        while let Some(c) = cur {
            children.push(c);
            cur = owners[c].next_sibling;
        }
        children
    });
    for child in children {
        dispose_owner(child);
    }
    with_runtime(|rt| {
        rt.owners.borrow_mut()[id].first_child = None;
    });
    let cleanups = with_runtime(|rt| {
        std::mem::take(&mut *rt.owners.borrow()[id].cleanups.borrow_mut())
    });
    for cb in cleanups.into_iter().rev() {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(cb));
    }
}

/// Insert `boxed` under `ctx_id` on the current owner's context map.
/// A no-op (per (O-any): "fails silently if no current owner") if there
/// is no current owner. Used by `crate::context::set_context`.
pub(crate) fn with_current_owner_contexts(f: impl FnOnce(&mut FxHashMap<u64, Box<dyn Any>>)) {
    with_runtime(|rt| {
        if let Some(owner) = rt.current_owner.get() {
            f(&mut rt.owners.borrow()[owner].contexts.borrow_mut());
        }
    })
}

/// Walk the owner chain from the current owner outward for the nearest
/// entry matching `ctx_id`, applying `decode` to the boxed value found.
/// Used by `crate::context::get_context`.
pub(crate) fn lookup_context<R>(ctx_id: u64, decode: impl FnOnce(&Box<dyn Any>) -> R) -> Option<R> {
    with_runtime(|rt| {
        let owners = rt.owners.borrow();
        let mut cur = rt.current_owner.get();
        let mut decode = Some(decode);
        while let Some(id) = cur {
            let slot = &owners[id];
            if let Some(v) = slot.contexts.borrow().get(&ctx_id) {
                return Some((decode.take().unwrap())(v));
            }
            cur = slot.parent;
        }
        None
    })
}

/// Whether `ctx_id` has been provided anywhere in the current owner chain.
/// Used by `crate::context::has_context`.
pub(crate) fn context_is_provided(ctx_id: u64) -> bool {
    with_runtime(|rt| {
        let owners = rt.owners.borrow();
        let mut cur = rt.current_owner.get();
        while let Some(id) = cur {
            let slot = &owners[id];
            if slot.contexts.borrow().contains_key(&ctx_id) {
                return true;
            }
            cur = slot.parent;
        }
        false
    })
}

/// Run `f` under a fresh child scope whose error handler is `handler`. Any
/// panic raised while running `f` (including panics raised transitively by
/// effects created within it, at the point they are executed) is caught and
/// handed to `handler`. Returning `Err` from `handler` re-raises to the
/// next-outer handler; returning `Ok(())` stops propagation.
pub fn catch_error<T>(
    f: impl FnOnce() -> T,
    handler: impl Fn(&ReactiveError) -> Result<(), ReactiveError> + 'static,
) -> Option<T> {
    let owner_id = create_child_owner(None);
    with_runtime(|rt| {
        rt.owners.borrow()[owner_id]
            .error_handlers
            .borrow_mut()
            .push(Box::new(handler));
    });
    let owner = Owner(owner_id);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        run_with_owner(owner, f)
    }));
    match result {
        Ok(v) => Some(v),
        Err(payload) => {
            dispatch_error(owner_id, ReactiveError::Compute(payload));
            None
        }
    }
}

/// Walk the owner chain starting at `start`, handing `err` to each
/// registered handler in registration order, until one returns `Ok(())`.
/// A handler that returns `Err` (its own error, or the original passed
/// back through) escalates that error to the next handler up the chain,
/// not the one it was originally given.
///
/// If the error reaches the root with no handler absorbing it, it is not
/// dropped: this function resumes the unwind with it, so it surfaces as a
/// panic out of whichever public operation triggered it — a write, a
/// `flush_sync`, or a synchronous read.
pub(crate) fn dispatch_error(start: OwnerId, err: ReactiveError) {
    let unhandled = with_runtime(|rt| {
        let owners = rt.owners.borrow();
        let mut cur = Some(start);
        let mut err = err;
        while let Some(id) = cur {
            let slot = &owners[id];
            for handler in slot.error_handlers.borrow().iter() {
                match handler(&err) {
                    Ok(()) => return None,
                    Err(next) => err = next,
                }
            }
            cur = slot.parent;
        }
        Some(err)
    });
    if let Some(err) = unhandled {
        #[cfg(feature = "trace")]
        tracing::debug!("unhandled reactive error, re-raising: {err:?}");
        std::panic::resume_unwind(err.into_payload());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn nested_scopes_dispose_children_before_own_cleanups() {
        let order = Rc::new(RefCell::new(Vec::new()));
        create_root(|root_owner| {
            // A genuine child scope of `root_owner` (unlike `create_root`,
            // which always starts a new detached tree).
            let sub = Owner(create_child_owner(None));
            run_with_owner(sub, || {
                let o2 = order.clone();
                on_cleanup(move || o2.borrow_mut().push("sub1"));
            });
            let o3 = order.clone();
            on_cleanup(move || o3.borrow_mut().push("root"));
            dispose(root_owner);
        });
        assert_eq!(*order.borrow(), vec!["sub1", "root"]);
    }

    #[test]
    fn dispose_is_idempotent() {
        let order = Rc::new(RefCell::new(Vec::new()));
        create_root(|root_owner| {
            let o = order.clone();
            on_cleanup(move || o.borrow_mut().push("root"));
            dispose(root_owner);
            dispose(root_owner);
            dispose(root_owner);
        });
        assert_eq!(*order.borrow(), vec!["root"]);
    }

    #[test]
    fn provide_and_use_context_walks_ancestors() {
        use crate::context::{create_context, get_context, set_context};
        create_root(|_| {
            let ctx = create_context::<i32>(None);
            set_context(&ctx, 42);
            create_root(|inner| {
                run_with_owner(inner, || {
                    // inner is a detached root (no parent), so it should
                    // NOT see the outer value.
                    assert_eq!(get_context(&ctx), None);
                });
            });
            assert_eq!(get_context(&ctx), Some(42));
        });
    }

    #[test]
    fn dispose_twice_is_a_no_op() {
        create_root(|owner| {
            let hits = Rc::new(RefCell::new(0));
            let h = hits.clone();
            on_cleanup(move || *h.borrow_mut() += 1);
            dispose(owner);
            dispose(owner);
            assert_eq!(*hits.borrow(), 1);
        });
    }
}
