// ============================================================================
// signalgraph - A fine-grained push-pull reactive graph
// ============================================================================
//
// Signals, memos and effects over a three-state (Clean/Check/Dirty) mark-
// and-sweep propagator, with an ownership tree for scoped cleanup and a
// microtask-batched scheduler that runs render-effects before user-effects.
// ============================================================================

mod arena;
mod config;
mod context;
mod control;
mod effect;
mod error;
#[macro_use]
mod macros;
mod memo;
mod node;
mod owner;
mod propagator;
mod runtime;
mod scheduler;
mod signal;
mod tracking;

pub use config::RuntimeConfig;
pub use context::{create_context, get_context, has_context, set_context, Context};
pub use control::{batch, get_observer, peek, untrack};
pub use effect::{
    create_effect, create_effect_with, create_render_effect, create_render_effect_with,
    dispose_effect,
};
pub use error::{ReactiveError, ReactiveResult};
pub use memo::{create_memo, create_memo_with, Memo, MemoOptions};
pub use owner::{catch_error, create_root, dispose, get_owner, on_cleanup, run_with_owner, Owner};
pub use runtime::{clear_schedule_hook, set_config, set_schedule_hook};
pub use scheduler::flush_sync;
pub use signal::{create_signal, create_signal_with, EqualsMode, Signal, SignalOptions};
