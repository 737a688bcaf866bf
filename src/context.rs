//! `createContext` / `setContext` / `getContext` / `hasContext`.
//!
//! Contexts are opaque tokens (an incrementing id paired with a phantom
//! type), not keyed by `TypeId` — two `Context<i32>`s created independently
//! are distinct keys, matching the language-neutral API's "keys (opaque
//! tokens)" wording in §3 rather than one-value-per-type.

use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;

use crate::owner::with_current_owner_contexts;

thread_local! {
    static NEXT_CONTEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// A typed key for a context value. Copy/Clone like the other handles;
/// holding onto one costs nothing beyond its id.
pub struct Context<T> {
    id: u64,
    default: Option<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone> Clone for Context<T> {
    fn clone(&self) -> Self {
        Context {
            id: self.id,
            default: self.default.clone(),
            _marker: PhantomData,
        }
    }
}

/// Mint a fresh context token, optionally with a default value returned
/// by [`get_context`] when no ancestor has provided one.
pub fn create_context<T: Clone + 'static>(default: Option<T>) -> Context<T> {
    let id = NEXT_CONTEXT_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    });
    Context {
        id,
        default,
        _marker: PhantomData,
    }
}

/// Provide `value` for `ctx` on the current owner; visible to this owner
/// and its descendants via [`get_context`] until shadowed by a nearer
/// provider.
pub fn set_context<T: Clone + 'static>(ctx: &Context<T>, value: T) {
    with_current_owner_contexts(|contexts| {
        contexts.insert(ctx.id, Box::new(value) as Box<dyn Any>);
    });
}

/// Walk the owner chain from the current owner outward for the nearest
/// provided value of `ctx`, falling back to its default.
pub fn get_context<T: Clone + 'static>(ctx: &Context<T>) -> Option<T> {
    crate::owner::lookup_context(ctx.id, |boxed| {
        boxed.downcast_ref::<T>().cloned()
    })
    .or_else(|| ctx.default.clone())
}

/// Whether `ctx` is visible (provided by this owner or an ancestor, or
/// carries a default).
pub fn has_context<T: Clone + 'static>(ctx: &Context<T>) -> bool {
    ctx.default.is_some() || crate::owner::context_is_provided(ctx.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::create_root;

    #[test]
    fn default_used_when_unprovided() {
        create_root(|_| {
            let theme = create_context(Some("light".to_string()));
            assert_eq!(get_context(&theme), Some("light".to_string()));
        });
    }

    #[test]
    fn nearest_provider_wins() {
        create_root(|_| {
            let ctx = create_context::<i32>(None);
            set_context(&ctx, 1);
            create_root(|inner| {
                crate::owner::run_with_owner(inner, || {
                    assert_eq!(get_context(&ctx), None);
                });
            });
            assert_eq!(get_context(&ctx), Some(1));
        });
    }
}
