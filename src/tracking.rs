//! The dependency tracker: records source -> observer edges during a
//! computation and reconciles the observer's source list against what was
//! actually read once the computation finishes.
//!
//! Strategy: **re-use-on-match**. A computation's existing source list
//! from its previous run is left in place at the start of a re-run; each
//! read either advances past an already-correct entry (no allocation, no
//! edge churn) or, the moment a mismatch is found, starts accumulating a
//! fresh list from that point on. This is cheap for the overwhelmingly
//! common case of a computation reading the same sources in the same
//! order on every run, and falls back to full reconciliation only when
//! the dependency set actually changed (e.g. `cond() ? a() : b()` after
//! `cond` flips).

use crate::arena::NodeId;
use crate::runtime::with_runtime;

/// Called whenever a signal or memo is read. Recording only happens while
/// a computation is being (re-)evaluated and tracking has not been
/// suppressed by `untrack`.
pub(crate) fn track_read(source: NodeId) {
    let observer = match with_runtime(|rt| {
        if rt.untracking.get() {
            None
        } else {
            rt.current_observer.get()
        }
    }) {
        Some(o) => o,
        None => return,
    };

    with_runtime(|rt| {
        let accumulator_empty = rt.new_sources.borrow().is_empty();
        let idx = rt.source_index.get();
        let reused = accumulator_empty
            && rt
                .nodes
                .borrow()
                .get(observer)
                .map(|slot| slot.sources.borrow().get(idx).copied() == Some(source))
                .unwrap_or(false);
        if reused {
            rt.source_index.set(idx + 1);
        } else {
            rt.new_sources.borrow_mut().push(source);
        }
    });
}

/// Reconcile `observer`'s source list after a (re-)run: entries from
/// `new_sources[..skip]`... no — entries up to `skip` in the *existing*
/// list were confirmed still valid by `track_read` and are kept; anything
/// past `skip` is stale and unlinked, then `new_sources` (freshly read,
/// beyond what matched) is appended and linked.
pub(crate) fn install_sources(observer: NodeId, skip: usize, new_sources: Vec<NodeId>) {
    let stale = with_runtime(|rt| {
        let nodes = rt.nodes.borrow();
        let Some(obs_slot) = nodes.get(observer) else {
            return Vec::new();
        };
        let mut sources = obs_slot.sources.borrow_mut();
        let stale = if sources.len() > skip {
            sources[skip..].to_vec()
        } else {
            Vec::new()
        };
        sources.truncate(skip);
        sources.extend_from_slice(&new_sources);
        stale
    });
    unlink_observer_from(observer, &stale);
    link_observer_to(observer, &new_sources);
}

fn unlink_observer_from(observer: NodeId, stale_sources: &[NodeId]) {
    let mut newly_unobserved: Vec<NodeId> = Vec::new();
    with_runtime(|rt| {
        let nodes = rt.nodes.borrow();
        for &src in stale_sources {
            if let Some(src_slot) = nodes.get(src) {
                src_slot.observers.borrow_mut().retain(|&o| o != observer);
                if src_slot.observers.borrow().is_empty() && src_slot.unobserved.borrow().is_some()
                {
                    newly_unobserved.push(src);
                }
            }
        }
    });
    // Checked out (not just borrowed) so the callback can run without a
    // `RefCell` borrow held across it, then put back so it fires again on
    // the *next* non-empty -> empty transition instead of only the first.
    for src in newly_unobserved {
        let cb = with_runtime(|rt| {
            rt.nodes
                .borrow()
                .get(src)
                .and_then(|slot| slot.unobserved.borrow_mut().take())
        });
        let Some(mut cb) = cb else { continue };
        cb();
        with_runtime(|rt| {
            if let Some(slot) = rt.nodes.borrow().get(src) {
                *slot.unobserved.borrow_mut() = Some(cb);
            }
        });
    }
}

fn link_observer_to(observer: NodeId, sources: &[NodeId]) {
    with_runtime(|rt| {
        let nodes = rt.nodes.borrow();
        for &src in sources {
            if let Some(src_slot) = nodes.get(src) {
                let mut observers = src_slot.observers.borrow_mut();
                if !observers.contains(&observer) {
                    observers.push(observer);
                }
            }
        }
    });
}

/// Remove every edge touching `node`, in both directions. Used when a node
/// is disposed.
pub(crate) fn unlink_all(node: NodeId) {
    let (sources, observers) = with_runtime(|rt| {
        let nodes = rt.nodes.borrow();
        match nodes.get(node) {
            Some(slot) => (
                slot.sources.borrow().clone(),
                slot.observers.borrow().clone(),
            ),
            None => (Vec::new(), Vec::new()),
        }
    });
    unlink_observer_from(node, &sources);
    with_runtime(|rt| {
        let nodes = rt.nodes.borrow();
        for &obs in &observers {
            if let Some(obs_slot) = nodes.get(obs) {
                obs_slot.sources.borrow_mut().retain(|&s| s != node);
            }
        }
    });
}
