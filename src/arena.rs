//! Arena handle types.
//!
//! Both the ownership tree and the computation graph are stored in
//! generation-checked slot arenas (`slotmap`) and addressed by opaque,
//! `Copy` handles. A handle captured before its slot is disposed and used
//! afterward is rejected by the arena (`SlotMap::get` returns `None`)
//! instead of dereferencing freed or reused memory — the systems-language
//! analogue of the garbage-collected heap references a host like
//! JavaScript would use for the same graph.
//!
//! Handles are deliberately not `Send`/`Sync`: a handle minted against one
//! thread's runtime must never be used against another thread's arena, and
//! the type system enforces that rather than a runtime check.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a node (signal, memo, or effect) in the reactive graph.
    pub struct NodeId;
}

new_key_type! {
    /// Handle to an owner scope in the ownership tree.
    pub struct OwnerId;
}

/// The four-state lifecycle a computation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Value is known to match its current inputs.
    Clean,
    /// An ancestor changed; this node may or may not need to recompute.
    Check,
    /// A direct input changed; this node must recompute.
    Dirty,
    /// The node has been disposed; reads return the last value and never
    /// change again.
    Disposed,
}

impl NodeState {
    pub fn is_disposed(self) -> bool {
        matches!(self, NodeState::Disposed)
    }
}

/// Lifecycle state of an owner scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerState {
    Clean,
    Disposed,
}
