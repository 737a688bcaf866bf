//! Pure derived values: cached, recomputed only when pulled and only as
//! far up the dependency chain as real changes require.

use std::any::Any;
use std::marker::PhantomData;

use crate::arena::{NodeId, NodeState};
use crate::node::{NodeKind, NodeSlot};
use crate::owner::{attach_node_to_owner, create_child_owner};
use crate::propagator::update_if_necessary;
use crate::runtime::with_runtime;
use crate::signal::{erase_equals, EqualsMode};
use crate::tracking::track_read;

/// Construction options for [`create_memo_with`].
pub struct MemoOptions<T> {
    pub equals: EqualsMode<T>,
    pub name: Option<&'static str>,
}

impl<T> Default for MemoOptions<T> {
    fn default() -> Self {
        MemoOptions {
            equals: EqualsMode::Default,
            name: None,
        }
    }
}

/// A read-only handle to a cached derived computation.
pub struct Memo<T: 'static> {
    pub(crate) id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Memo<T> {}

impl<T: 'static> Memo<T> {
    /// Pull the value up to date (if `Check` or `Dirty`) and read it,
    /// recording a dependency on the current observer.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(Clone::clone)
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        update_if_necessary(self.id);
        track_read(self.id);
        with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let slot = &nodes[self.id];
            let value = slot.value.borrow();
            f(value.downcast_ref::<T>().unwrap())
        })
    }

    /// Read the cached value without pulling it up to date or recording a
    /// dependency — whatever was last computed.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let slot = &nodes[self.id];
            slot.value.borrow().downcast_ref::<T>().unwrap().clone()
        })
    }

    pub fn is_disposed(&self) -> bool {
        with_runtime(|rt| {
            rt.nodes
                .borrow()
                .get(self.id)
                .map(|s| s.state.get() == NodeState::Disposed)
                .unwrap_or(true)
        })
    }
}

/// Create a memo with default options.
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: 'static + PartialEq,
    F: FnMut() -> T + 'static,
{
    create_memo_with(compute, MemoOptions::default())
}

/// Create a memo with explicit [`MemoOptions`]. The compute function is
/// not run at construction time: the node starts `Dirty` and is pulled up
/// to date on its first read (see §9's "initialized" flag).
pub fn create_memo_with<T, F>(mut compute: F, options: MemoOptions<T>) -> Memo<T>
where
    T: 'static + PartialEq,
    F: FnMut() -> T + 'static,
{
    let owner = create_child_owner(None);
    let equals = erase_equals::<T>(options.equals);
    let erased_compute: Box<dyn FnMut() -> Box<dyn Any>> =
        Box::new(move || Box::new(compute()) as Box<dyn Any>);
    let id = with_runtime(|rt| {
        rt.nodes.borrow_mut().insert(NodeSlot::new(
            NodeKind::Memo,
            Box::new(()) as Box<dyn Any>, // placeholder until the first `update`
            equals,
            owner,
            Some(erased_compute),
            options.name,
        ))
    });
    attach_node_to_owner(owner, id);
    with_runtime(|rt| rt.nodes.borrow()[id].state.set(NodeState::Dirty));
    Memo {
        id,
        _marker: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::create_root;
    use crate::signal::create_signal;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn lazy_until_first_read() {
        create_root(|_| {
            let runs = Rc::new(Cell::new(0));
            let r = runs.clone();
            let _m = create_memo(move || {
                r.set(r.get() + 1);
                1
            });
            assert_eq!(runs.get(), 0);
        });
    }

    #[test]
    fn recomputes_only_when_source_changes() {
        create_root(|_| {
            let runs = Rc::new(Cell::new(0));
            let s = create_signal(1);
            let r = runs.clone();
            let m = create_memo(move || {
                r.set(r.get() + 1);
                s.get() * 2
            });
            assert_eq!(m.get(), 2);
            assert_eq!(runs.get(), 1);
            assert_eq!(m.get(), 2);
            assert_eq!(runs.get(), 1);
            s.set(5);
            assert_eq!(m.get(), 10);
            assert_eq!(runs.get(), 2);
        });
    }
}
