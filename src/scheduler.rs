//! Microtask-batched flush scheduler.
//!
//! Rust has no built-in microtask queue, so "scheduled" here means
//! "a [`crate::runtime::set_schedule_hook`] callback has been invoked";
//! its default implementation just calls [`flush_sync`] immediately,
//! matching the design notes' fallback for hosts with no event loop of
//! their own. A host with a real event loop installs its own hook and
//! defers `run_scheduled` onto it instead.
//!
//! [`enqueue`] only ever pushes a node onto its queue — it never asks for
//! a flush itself. An effect newly registered by `create_effect` (or woken
//! from `Clean` by [`crate::propagator::notify`] during a write) runs on
//! the *next* flush, not at the moment it lands in the queue. The actual
//! flush trigger lives at the top of whichever operation made the queue
//! non-empty in the first place — a signal write (`Signal::set`'s call to
//! [`request_flush`] once its whole notify walk has settled) or a batch's
//! closing guard — so that everything queued while walking the dependency
//! graph is visible before the drain starts.

use crate::arena::{NodeId, NodeState};
use crate::propagator::update_if_necessary;
use crate::runtime::with_runtime;

/// Add a dirty effect to its queue. Does not itself request a flush — see
/// the module docs for why the caller is responsible for that.
pub(crate) fn enqueue(node: NodeId, render: bool) {
    with_runtime(|rt| {
        if render {
            rt.render_queue.borrow_mut().push(node);
        } else {
            rt.effect_queue.borrow_mut().push(node);
        }
    });
}

/// Request that a flush happen soon. A no-op while a batch is open or a
/// flush is already running — in both cases the enqueued work will be
/// picked up by the batch's closing flush or the current flush's next
/// drain pass.
pub(crate) fn request_flush() {
    let should_schedule = with_runtime(|rt| {
        if rt.batch_depth.get() > 0 || rt.running.get() || rt.scheduled.get() {
            false
        } else {
            rt.scheduled.set(true);
            true
        }
    });
    if !should_schedule {
        return;
    }
    let hook_ran = with_runtime(|rt| {
        let hook = rt.schedule_hook.borrow();
        if let Some(hook) = hook.as_ref() {
            hook();
            true
        } else {
            false
        }
    });
    if !hook_ran {
        flush_sync();
    }
}

/// Synchronously drain every queue to a fixed point. Re-entrant calls
/// (from within an already-running flush, e.g. an effect callback that
/// calls `flush_sync` itself) are a no-op — the outer call owns the
/// drain loop.
///
/// An uncaught reactive error (a compute panic with no absorbing handler
/// on the owner chain) unwinds out of this call. `running` is reset
/// before that unwind continues so a later `flush_sync` isn't
/// permanently a no-op.
pub fn flush_sync() {
    let already_running = with_runtime(|rt| rt.running.replace(true));
    if already_running {
        return;
    }
    with_runtime(|rt| rt.scheduled.set(false));

    let max_iterations = with_runtime(|rt| rt.config.borrow().max_flush_iterations);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut iterations = 0u32;
        loop {
            let pure_empty = with_runtime(|rt| rt.pure_queue.borrow().is_empty());
            let render_empty = with_runtime(|rt| rt.render_queue.borrow().is_empty());
            let effect_empty = with_runtime(|rt| rt.effect_queue.borrow().is_empty());
            if pure_empty && render_empty && effect_empty {
                break;
            }

            iterations += 1;
            if iterations > max_iterations {
                panic!(
                    "reactive flush did not reach a fixed point after {max_iterations} \
                     iterations (an effect is likely writing to one of its own transitive \
                     dependencies on every run)"
                );
            }

            run_scheduled();
        }
    }));

    with_runtime(|rt| rt.running.set(false));
    if let Err(payload) = result {
        std::panic::resume_unwind(payload);
    }
}

/// One pass: drain pure -> render -> user queues (pulling each node
/// Clean), bump the logical clock, then run effect callbacks for
/// whatever settled as modified, render-effects before user-effects.
fn run_scheduled() {
    // Each queue is taken (not cloned) so that work enqueued while we
    // drain it — e.g. a nested effect created during an ancestor's
    // recompute — lands in a fresh, empty queue and is picked up by the
    // next iteration of `flush_sync`'s loop rather than lost or
    // double-processed.
    let pure = with_runtime(|rt| std::mem::take(&mut *rt.pure_queue.borrow_mut()));
    for node in pure {
        update_if_necessary(node);
    }

    let render = with_runtime(|rt| std::mem::take(&mut *rt.render_queue.borrow_mut()));
    for &node in &render {
        update_if_necessary(node);
    }

    let effects = with_runtime(|rt| std::mem::take(&mut *rt.effect_queue.borrow_mut()));
    for &node in &effects {
        update_if_necessary(node);
    }

    with_runtime(|rt| rt.clock.set(rt.clock.get() + 1));

    run_effect_callbacks(&render);
    run_effect_callbacks(&effects);
}

fn run_effect_callbacks(queue: &[NodeId]) {
    for &node in queue {
        let ready = with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let Some(slot) = nodes.get(node) else { return None };
            if slot.state.get() == NodeState::Disposed || !slot.modified.get() {
                return None;
            }
            if !slot.is_two_arg_effect() {
                slot.modified.set(false);
                return None;
            }
            slot.effect_cb.borrow_mut().take()
        });
        let Some(mut cb) = ready else { continue };

        // Check the current/prev values out of their cells so the
        // callback runs without any RefCell borrow held across it, then
        // restore everything afterward (this node cannot be concurrently
        // touched — single-threaded runtime).
        let (current, prev) = with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let slot = &nodes[node];
            let current = slot.value.replace(Box::new(()));
            let prev = slot.prev_for_effect.borrow_mut().take();
            slot.modified.set(false);
            (current, prev)
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cb(&*current, prev.as_deref());
        }));

        with_runtime(|rt| {
            if let Some(slot) = rt.nodes.borrow().get(node) {
                *slot.value.borrow_mut() = current;
                *slot.prev_for_effect.borrow_mut() = prev;
                *slot.effect_cb.borrow_mut() = Some(cb);
            }
        });

        if let Err(payload) = result {
            let owner = with_runtime(|rt| rt.nodes.borrow().get(node).map(|s| s.owner));
            if let Some(owner) = owner {
                crate::owner::dispatch_error(owner, crate::error::ReactiveError::Compute(payload));
            }
        }
    }
}
