//! Storage for the three kinds of reactive node: signals, memos, and
//! effects. All three share one arena slot shape — a tagged variant with a
//! type-erased value — so the propagator and tracker can treat them
//! uniformly; the typed `Signal<T>` / `Memo<T>` wrappers in
//! `crate::signal` / `crate::memo` are the only places a concrete `T`
//! appears.

use std::any::Any;
use std::cell::{Cell, RefCell};

use crate::arena::{NodeId, NodeState, OwnerId};

/// What kind of node a slot represents.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum NodeKind {
    /// A mutable leaf signal; has no compute function.
    Signal,
    /// A pure derived value, cached and recomputed on demand.
    Memo,
    /// A side-effectful leaf. `render` selects which scheduler queue it
    /// drains through; `two_arg` selects whether `effect_cb` is invoked
    /// separately in the effect phase (true) or folded into `compute`
    /// itself (false, the common `effect(|| { .. })` form).
    Effect { render: bool, two_arg: bool },
}

pub(crate) type ComputeFn = Box<dyn FnMut() -> Box<dyn Any>>;
pub(crate) type EffectCallback = Box<dyn FnMut(&dyn Any, Option<&dyn Any>)>;
pub(crate) type EqualsErased = Box<dyn Fn(&dyn Any, &dyn Any) -> bool>;
pub(crate) type UnobservedCallback = Box<dyn FnMut()>;

pub(crate) struct NodeSlot {
    pub kind: NodeKind,
    pub state: Cell<NodeState>,
    pub value: RefCell<Box<dyn Any>>,
    pub equals: EqualsErased,
    pub sources: RefCell<Vec<NodeId>>,
    pub observers: RefCell<Vec<NodeId>>,
    pub owner: OwnerId,
    /// Taken out while running (see `propagator::run_compute`) so the
    /// arena is never borrowed across a call into user code.
    pub compute: RefCell<Option<ComputeFn>>,
    pub effect_cb: RefCell<Option<EffectCallback>>,
    pub prev_for_effect: RefCell<Option<Box<dyn Any>>>,
    pub modified: Cell<bool>,
    pub unobserved: RefCell<Option<UnobservedCallback>>,
    pub name: Option<&'static str>,
    pub initialized: Cell<bool>,
}

impl NodeSlot {
    pub(crate) fn new(
        kind: NodeKind,
        initial: Box<dyn Any>,
        equals: EqualsErased,
        owner: OwnerId,
        compute: Option<ComputeFn>,
        name: Option<&'static str>,
    ) -> Self {
        let initialized = compute.is_none();
        NodeSlot {
            kind,
            state: Cell::new(NodeState::Clean),
            value: RefCell::new(initial),
            equals,
            sources: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            owner,
            compute: RefCell::new(compute),
            effect_cb: RefCell::new(None),
            prev_for_effect: RefCell::new(None),
            modified: Cell::new(false),
            unobserved: RefCell::new(None),
            name,
            initialized: Cell::new(initialized),
        }
    }

    pub(crate) fn is_memo_like(&self) -> bool {
        matches!(self.kind, NodeKind::Memo)
    }

    pub(crate) fn is_effect(&self) -> bool {
        matches!(self.kind, NodeKind::Effect { .. })
    }

    pub(crate) fn is_render_effect(&self) -> bool {
        matches!(self.kind, NodeKind::Effect { render: true, .. })
    }

    pub(crate) fn is_two_arg_effect(&self) -> bool {
        matches!(self.kind, NodeKind::Effect { two_arg: true, .. })
    }
}
