//! Side-effectful leaves: `createEffect` / `createRenderEffect`.
//!
//! An effect enqueues itself the moment it is created (not on first
//! notify — see SPEC_FULL.md's open-question resolution) and runs on the
//! next flush. The one-argument form (`create_effect(|| { .. })`) folds
//! its entire body into the pure-phase compute function, so the side
//! effect happens as part of the queue drain itself; the two-argument
//! form (`create_effect_with(compute, effect)`) separates a tracked
//! `compute` (pure phase) from an `effect` callback that receives
//! `(current, previous)` and is deferred to the effect phase, run only
//! when `compute`'s result actually changed.

use std::any::Any;

use crate::arena::NodeState;
use crate::node::{NodeKind, NodeSlot};
use crate::owner::{attach_node_to_owner, create_child_owner};
use crate::runtime::with_runtime;

fn enqueue_new_effect(id: crate::arena::NodeId, render: bool) {
    with_runtime(|rt| rt.nodes.borrow()[id].state.set(NodeState::Dirty));
    crate::scheduler::enqueue(id, render);
}

/// Create a user effect whose entire body is the tracked compute
/// function. Runs once per flush, after render effects have settled.
pub fn create_effect(compute: impl FnMut() + 'static) {
    create_effect_impl(compute, false);
}

/// Create a render effect whose entire body is the tracked compute
/// function. Runs once per flush, before user effects.
pub fn create_render_effect(compute: impl FnMut() + 'static) {
    create_effect_impl(compute, true);
}

fn create_effect_impl(mut compute: impl FnMut() + 'static, render: bool) {
    let owner = create_child_owner(None);
    let erased: Box<dyn FnMut() -> Box<dyn Any>> = Box::new(move || {
        compute();
        Box::new(()) as Box<dyn Any>
    });
    let equals: Box<dyn Fn(&dyn Any, &dyn Any) -> bool> = Box::new(|_, _| false);
    let id = with_runtime(|rt| {
        rt.nodes.borrow_mut().insert(NodeSlot::new(
            NodeKind::Effect {
                render,
                two_arg: false,
            },
            Box::new(()),
            equals,
            owner,
            Some(erased),
            None,
        ))
    });
    attach_node_to_owner(owner, id);
    enqueue_new_effect(id, render);
}

/// Create a user effect with a separate tracked `compute` and deferred
/// `effect` callback, matching `createEffect(compute, effect)` in the
/// language-neutral API.
pub fn create_effect_with<T, C, E>(compute: C, effect: E)
where
    T: 'static + PartialEq,
    C: FnMut() -> T + 'static,
    E: FnMut(&T, Option<&T>) + 'static,
{
    create_effect_with_impl(compute, effect, false);
}

/// As [`create_effect_with`], scheduled in the render-effect phase.
pub fn create_render_effect_with<T, C, E>(compute: C, effect: E)
where
    T: 'static + PartialEq,
    C: FnMut() -> T + 'static,
    E: FnMut(&T, Option<&T>) + 'static,
{
    create_effect_with_impl(compute, effect, true);
}

fn create_effect_with_impl<T, C, E>(mut compute: C, mut effect: E, render: bool)
where
    T: 'static + PartialEq,
    C: FnMut() -> T + 'static,
    E: FnMut(&T, Option<&T>) + 'static,
{
    let owner = create_child_owner(None);
    let erased_compute: Box<dyn FnMut() -> Box<dyn Any>> =
        Box::new(move || Box::new(compute()) as Box<dyn Any>);
    let erased_effect: Box<dyn FnMut(&dyn Any, Option<&dyn Any>)> =
        Box::new(move |current, prev| {
            let current = current.downcast_ref::<T>().unwrap();
            let prev = prev.and_then(|p| p.downcast_ref::<T>());
            effect(current, prev);
        });
    let equals: Box<dyn Fn(&dyn Any, &dyn Any) -> bool> = Box::new(|a: &dyn Any, b: &dyn Any| {
        a.downcast_ref::<T>().unwrap() == b.downcast_ref::<T>().unwrap()
    });
    let id = with_runtime(|rt| {
        rt.nodes.borrow_mut().insert(NodeSlot::new(
            NodeKind::Effect {
                render,
                two_arg: true,
            },
            Box::new(()) as Box<dyn Any>,
            equals,
            owner,
            Some(erased_compute),
            None,
        ))
    });
    with_runtime(|rt| {
        *rt.nodes.borrow()[id].effect_cb.borrow_mut() = Some(erased_effect);
    });
    attach_node_to_owner(owner, id);
    enqueue_new_effect(id, render);
}

/// Dispose the effect (or any node) whose owner is `owner`. Provided for
/// hosts that captured the current owner at creation time; the ordinary
/// path is disposing an ancestor scope, which sweeps this node up
/// automatically.
pub fn dispose_effect(owner: crate::owner::Owner) {
    crate::owner::dispose(owner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::{create_root, on_cleanup};
    use crate::scheduler::flush_sync;
    use crate::signal::create_signal;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn effect_runs_on_first_flush_and_on_change() {
        create_root(|_| {
            let calls = Rc::new(Cell::new(0));
            let s = create_signal(0);
            let c = calls.clone();
            create_effect(move || {
                s.get();
                c.set(c.get() + 1);
            });
            flush_sync();
            assert_eq!(calls.get(), 1);
            s.set(1);
            flush_sync();
            assert_eq!(calls.get(), 2);
        });
    }

    #[test]
    fn two_arg_effect_sees_current_and_previous() {
        create_root(|_| {
            let s = create_signal(1);
            let seen = Rc::new(RefCell::new(Vec::new()));
            let seen2 = seen.clone();
            create_effect_with(
                move || s.get(),
                move |current, prev| {
                    seen2.borrow_mut().push((*current, prev.copied()));
                },
            );
            flush_sync();
            s.set(2);
            flush_sync();
            assert_eq!(*seen.borrow(), vec![(1, None), (2, Some(1))]);
        });
    }

    #[test]
    fn nested_effect_cleanup_reruns_fresh_child() {
        // S2 from SPEC_FULL.md
        create_root(|_| {
            let x = create_signal(0);
            let y = create_signal(0);
            let outer_calls = Rc::new(Cell::new(0));
            let inner_calls = Rc::new(Cell::new(0));
            let inner_disposes = Rc::new(Cell::new(0));

            let oc = outer_calls.clone();
            let ic = inner_calls.clone();
            let id_ = inner_disposes.clone();
            create_effect(move || {
                x.get();
                let ic = ic.clone();
                let id_ = id_.clone();
                create_effect(move || {
                    y.get();
                    ic.set(ic.get() + 1);
                    let id_ = id_.clone();
                    on_cleanup(move || id_.set(id_.get() + 1));
                });
                oc.set(oc.get() + 1);
            });

            flush_sync();
            assert_eq!(outer_calls.get(), 1);
            assert_eq!(inner_calls.get(), 1);
            assert_eq!(inner_disposes.get(), 0);

            y.set(1);
            flush_sync();
            assert_eq!(outer_calls.get(), 1);
            assert_eq!(inner_calls.get(), 2);
            assert_eq!(inner_disposes.get(), 1);

            x.set(1);
            flush_sync();
            assert_eq!(outer_calls.get(), 2);
            assert_eq!(inner_calls.get(), 3);
            assert_eq!(inner_disposes.get(), 2);
        });
    }
}
