//! Mutable leaf signals — the only source of change in the graph.

use std::any::Any;
use std::marker::PhantomData;

use crate::arena::{NodeId, NodeState};
use crate::node::{NodeKind, NodeSlot};
use crate::owner::create_child_owner;
use crate::propagator::notify;
use crate::runtime::with_runtime;
use crate::tracking::track_read;

/// How a signal (or memo) decides whether a new value counts as a change.
pub enum EqualsMode<T> {
    /// `T: PartialEq`; the common case.
    Default,
    /// Every write propagates, even if the new value is "equal" to the
    /// old one — the `equals: false` option in the language-neutral API.
    Always,
    /// A user-supplied comparison.
    Custom(Box<dyn Fn(&T, &T) -> bool>),
}

impl<T> Default for EqualsMode<T> {
    fn default() -> Self {
        EqualsMode::Default
    }
}

/// Construction options for [`create_signal_with`].
pub struct SignalOptions<T> {
    pub equals: EqualsMode<T>,
    pub name: Option<&'static str>,
    /// Called once when the signal's observer set transitions from
    /// non-empty back to empty.
    pub unobserved: Option<Box<dyn FnMut()>>,
}

impl<T> Default for SignalOptions<T> {
    fn default() -> Self {
        SignalOptions {
            equals: EqualsMode::Default,
            name: None,
            unobserved: None,
        }
    }
}

pub(crate) fn erase_equals<T: 'static>(
    mode: EqualsMode<T>,
) -> Box<dyn Fn(&dyn Any, &dyn Any) -> bool>
where
    T: PartialEq,
{
    match mode {
        EqualsMode::Default => Box::new(|a: &dyn Any, b: &dyn Any| {
            a.downcast_ref::<T>().unwrap() == b.downcast_ref::<T>().unwrap()
        }),
        EqualsMode::Always => Box::new(|_: &dyn Any, _: &dyn Any| false),
        EqualsMode::Custom(f) => Box::new(move |a: &dyn Any, b: &dyn Any| {
            f(a.downcast_ref::<T>().unwrap(), b.downcast_ref::<T>().unwrap())
        }),
    }
}

/// A mutable reactive leaf. Cheap to copy and clone: it is just a handle
/// into the arena plus a phantom type tag.
pub struct Signal<T: 'static> {
    pub(crate) id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Signal<T> {}

impl<T: 'static> Signal<T> {
    /// Read the value, recording a dependency on the current observer if
    /// one is active.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(Clone::clone)
    }

    /// Read the value without cloning it, still recording a dependency.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track_read(self.id);
        with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let slot = &nodes[self.id];
            let value = slot.value.borrow();
            f(value.downcast_ref::<T>().unwrap())
        })
    }

    /// Read without recording a dependency, regardless of the current
    /// observer.
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

    /// Overwrite the value. Returns whether the write was considered a
    /// change (and therefore propagated to observers).
    pub fn set(&self, value: T) -> bool {
        let mut new_value = Some(Box::new(value) as Box<dyn Any>);
        let changed = with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let Some(slot) = nodes.get(self.id) else {
                return false;
            };
            let incoming = new_value.as_ref().unwrap();
            let is_equal =
                slot.initialized.get() && (slot.equals)(&**slot.value.borrow(), &**incoming);
            if !is_equal {
                *slot.value.borrow_mut() = new_value.take().unwrap();
                slot.initialized.set(true);
            }
            !is_equal
        });
        if changed {
            self.propagate();
        }
        changed
    }

    /// Compute a new value from the old one and write it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let new_value = with_runtime(|rt| {
            let nodes = rt.nodes.borrow();
            let slot = &nodes[self.id];
            f(slot.value.borrow().downcast_ref::<T>().unwrap())
        });
        self.set(new_value)
    }

    fn propagate(&self) {
        let observers =
            with_runtime(|rt| rt.nodes.borrow()[self.id].observers.borrow().clone());
        for obs in observers {
            notify(obs, NodeState::Dirty);
        }
        crate::scheduler::request_flush();
    }

    /// Whether this handle's node has been disposed. Reads still return
    /// the frozen last value after this becomes true.
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

/// Create a signal with default options (referential/`PartialEq` equality,
/// no name, no unobserved callback).
pub fn create_signal<T: 'static + PartialEq>(initial: T) -> Signal<T> {
    create_signal_with(initial, SignalOptions::default())
}

/// Create a signal with explicit [`SignalOptions`].
pub fn create_signal_with<T: 'static + PartialEq>(
    initial: T,
    options: SignalOptions<T>,
) -> Signal<T> {
    let owner = create_child_owner(None);
    let equals = erase_equals(options.equals);
    let id = with_runtime(|rt| {
        rt.nodes.borrow_mut().insert(NodeSlot::new(
            NodeKind::Signal,
            Box::new(initial),
            equals,
            owner,
            None,
            options.name,
        ))
    });
    if let Some(cb) = options.unobserved {
        with_runtime(|rt| {
            *rt.nodes.borrow()[id].unobserved.borrow_mut() = Some(cb);
        });
    }
    crate::owner::attach_node_to_owner(owner, id);
    Signal {
        id,
        _marker: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::create_root;

    #[test]
    fn get_set_roundtrip() {
        create_root(|_| {
            let s = create_signal(1);
            assert_eq!(s.get(), 1);
            assert!(s.set(2));
            assert_eq!(s.get(), 2);
        });
    }

    #[test]
    fn set_same_value_reports_no_change() {
        create_root(|_| {
            let s = create_signal(1);
            assert!(!s.set(1));
        });
    }

    #[test]
    fn always_equals_forces_propagation() {
        create_root(|_| {
            let s = create_signal_with(
                1,
                SignalOptions {
                    equals: EqualsMode::Always,
                    ..Default::default()
                },
            );
            assert!(s.set(1));
        });
    }

    #[test]
    fn unobserved_fires_exactly_on_the_non_empty_to_empty_transition() {
        use std::cell::Cell;
        use std::rc::Rc;

        create_root(|_| {
            let fired = Rc::new(Cell::new(0));
            let f = fired.clone();
            let s = create_signal_with(
                1,
                SignalOptions {
                    unobserved: Some(Box::new(move || f.set(f.get() + 1))),
                    ..Default::default()
                },
            );

            // Two independent observers subscribe, in turn.
            let m1 = crate::memo::create_memo(move || s.get() + 1);
            m1.get();
            assert_eq!(fired.get(), 0);

            let m2 = crate::memo::create_memo(move || s.get() + 2);
            m2.get();
            assert_eq!(fired.get(), 0);

            // Disposing one observer still leaves the other subscribed:
            // the callback must not fire yet.
            let owner1 = with_runtime(|rt| rt.nodes.borrow()[m1.id].owner);
            crate::owner::dispose_owner(owner1);
            assert_eq!(fired.get(), 0);

            // Disposing the last observer drains the set to empty: now
            // it fires, exactly once.
            let owner2 = with_runtime(|rt| rt.nodes.borrow()[m2.id].owner);
            crate::owner::dispose_owner(owner2);
            assert_eq!(fired.get(), 1);

            // A later subscriber re-observes the signal, then drops too:
            // the callback is not a one-shot, it fires again on this
            // second non-empty -> empty transition.
            let m3 = crate::memo::create_memo(move || s.get() + 3);
            m3.get();
            assert_eq!(fired.get(), 1);
            let owner3 = with_runtime(|rt| rt.nodes.borrow()[m3.id].owner);
            crate::owner::dispose_owner(owner3);
            assert_eq!(fired.get(), 2);
        });
    }
}
