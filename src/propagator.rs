//! The mark-and-sweep propagator: `notify`, `update_if_necessary`, and
//! `update` — the three operations that give the graph glitch-free,
//! minimal re-execution.
//!
//! States move monotonically downhill during a single notification
//! (`Clean < Check < Dirty < Disposed`, see [`rank`]) and are only ever
//! reset back to `Clean` by a successful `update`, or back to `Dirty` by a
//! failed one (so a later input change retries it). No other transition
//! exists; this is what makes `notify` safe to call redundantly — a node
//! already at or past the target state is left untouched.

use std::any::Any;

use crate::arena::{NodeId, NodeState};
use crate::owner::{dispatch_error, reset_owner_for_rerun, run_with_owner, Owner};
use crate::runtime::{with_runtime, ObserverGuard};

fn rank(state: NodeState) -> u8 {
    match state {
        NodeState::Clean => 0,
        NodeState::Check => 1,
        NodeState::Dirty => 2,
        NodeState::Disposed => 3,
    }
}

/// Propagate `target` (`Check` or `Dirty`) to `node`, and `Check` onward to
/// every transitive observer. A node already at or past `target` is left
/// alone — this is what keeps a diamond write O(nodes) instead of
/// exponential in depth.
pub(crate) fn notify(node: NodeId, target: NodeState) {
    let Some(prior) = with_runtime(|rt| rt.nodes.borrow().get(node).map(|s| s.state.get())) else {
        return;
    };
    if rank(prior) >= rank(target) {
        return;
    }

    let (is_effect, is_render) = with_runtime(|rt| {
        let nodes = rt.nodes.borrow();
        let slot = &nodes[node];
        (slot.is_effect(), slot.is_render_effect())
    });

    with_runtime(|rt| rt.nodes.borrow()[node].state.set(target));

    if is_effect && prior == NodeState::Clean {
        crate::scheduler::enqueue(node, is_render);
    }

    let observers =
        with_runtime(|rt| rt.nodes.borrow().get(node).map(|s| s.observers.borrow().clone()))
            .unwrap_or_default();
    for obs in observers {
        notify(obs, NodeState::Check);
    }
}

/// The pull half of the protocol: bring `node` to `Clean`, recursing into
/// sources first so a `Check` node never recomputes unless one of its
/// real inputs actually changed.
pub(crate) fn update_if_necessary(node: NodeId) {
    let Some(state) = with_runtime(|rt| rt.nodes.borrow().get(node).map(|s| s.state.get())) else {
        return;
    };

    match state {
        NodeState::Clean | NodeState::Disposed => {}
        NodeState::Dirty => update(node),
        NodeState::Check => {
            let sources = with_runtime(|rt| {
                rt.nodes.borrow().get(node).map(|s| s.sources.borrow().clone())
            })
            .unwrap_or_default();

            for src in sources {
                update_if_necessary(src);
                let now = with_runtime(|rt| rt.nodes.borrow().get(node).map(|s| s.state.get()));
                if now == Some(NodeState::Dirty) {
                    // A source really changed; the remaining declared
                    // sources may not even be dependencies once we
                    // recompute, so stop walking them.
                    break;
                }
            }

            match with_runtime(|rt| rt.nodes.borrow().get(node).map(|s| s.state.get())) {
                Some(NodeState::Dirty) => update(node),
                Some(NodeState::Check) => {
                    with_runtime(|rt| {
                        if let Some(s) = rt.nodes.borrow().get(node) {
                            s.state.set(NodeState::Clean);
                        }
                    });
                }
                _ => {}
            }
        }
    }
}

/// Re-run `node`'s compute function, reconcile its source list, and
/// propagate the result.
pub(crate) fn update(node: NodeId) {
    let Some(mut compute) =
        with_runtime(|rt| rt.nodes.borrow().get(node).and_then(|s| s.compute.borrow_mut().take()))
    else {
        // Plain signals have no compute function and are never scheduled
        // for `update`; defensively settle to Clean if this is ever hit.
        with_runtime(|rt| {
            if let Some(s) = rt.nodes.borrow().get(node) {
                s.state.set(NodeState::Clean);
            }
        });
        return;
    };

    let owner_id = with_runtime(|rt| rt.nodes.borrow()[node].owner);
    reset_owner_for_rerun(owner_id);

    let guard = ObserverGuard::enter(Some(node));
    let result = run_with_owner(Owner(owner_id), || {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| compute()))
    });
    let new_sources = guard.take_new_sources();
    let skip = guard.source_index();
    drop(guard);

    with_runtime(|rt| {
        if let Some(s) = rt.nodes.borrow().get(node) {
            *s.compute.borrow_mut() = Some(compute);
        }
    });

    match result {
        Ok(value) => {
            crate::tracking::install_sources(node, skip, new_sources);
            finish_update(node, value);
        }
        Err(payload) => {
            // Leave the prior source list untouched — the partial
            // accumulator from this aborted run is simply dropped without
            // ever being linked.
            with_runtime(|rt| {
                if let Some(s) = rt.nodes.borrow().get(node) {
                    s.state.set(NodeState::Dirty);
                }
            });
            dispatch_error(owner_id, crate::error::ReactiveError::Compute(payload));
        }
    }
}

fn finish_update(node: NodeId, value: Box<dyn Any>) {
    let changed = with_runtime(|rt| {
        let nodes = rt.nodes.borrow();
        let slot = &nodes[node];
        if !slot.initialized.get() {
            true
        } else {
            let old = slot.value.borrow();
            !(slot.equals)(&**old, &*value)
        }
    });

    if changed {
        with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let slot = &nodes[node];
            if slot.is_two_arg_effect() {
                let old = slot.value.replace(value);
                *slot.prev_for_effect.borrow_mut() = Some(old);
            } else {
                *slot.value.borrow_mut() = value;
            }
            slot.initialized.set(true);
            slot.modified.set(true);
        });

        let observers = with_runtime(|rt| rt.nodes.borrow()[node].observers.borrow().clone());
        for obs in observers {
            notify(obs, NodeState::Dirty);
        }
    } else {
        with_runtime(|rt| {
            let slot = &rt.nodes.borrow()[node];
            slot.initialized.set(true);
        });
    }

    with_runtime(|rt| rt.nodes.borrow()[node].state.set(NodeState::Clean));
}

/// Called when a node's owning scope is disposed: remove it from the
/// graph, drop its compute/effect closures (releasing whatever they
/// captured), and freeze its state so `notify`/`update_if_necessary`
/// treat it as permanently settled. The value slot is left in place so a
/// disposed reader can still return its last value.
pub(crate) fn detach_node(node: NodeId) {
    crate::tracking::unlink_all(node);
    with_runtime(|rt| {
        if let Some(slot) = rt.nodes.borrow().get(node) {
            slot.state.set(NodeState::Disposed);
            slot.compute.borrow_mut().take();
            slot.effect_cb.borrow_mut().take();
        }
    });
}
