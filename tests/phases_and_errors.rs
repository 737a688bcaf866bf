//! Black-box tests for scheduler phase ordering (property 5), error-handler
//! rebinding via `catch_error` (S4), and context scoping.

use signalgraph::{
    catch_error, create_context, create_effect, create_render_effect, create_root, create_signal,
    flush_sync, get_context, run_with_owner, set_context, ReactiveError,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn render_effects_settle_before_user_effects_in_every_flush() {
    create_root(|_| {
        let order = Rc::new(RefCell::new(Vec::new()));
        let s = create_signal(0);

        let o1 = order.clone();
        create_effect(move || {
            s.get();
            o1.borrow_mut().push("user");
        });
        let o2 = order.clone();
        create_render_effect(move || {
            s.get();
            o2.borrow_mut().push("render");
        });

        flush_sync();
        assert_eq!(*order.borrow(), vec!["render", "user"]);

        order.borrow_mut().clear();
        s.set(1);
        flush_sync();
        assert_eq!(*order.borrow(), vec!["render", "user"]);
    });
}

#[test]
fn catch_error_receives_a_panic_raised_by_a_descendant_effect_exactly_once() {
    create_root(|_| {
        let caught = Rc::new(RefCell::new(Vec::new()));
        let c = caught.clone();
        catch_error(
            || {
                create_effect(|| {
                    panic!("boom");
                });
            },
            move |err| {
                c.borrow_mut().push(format!("{err:?}"));
                Ok(())
            },
        );
        flush_sync();
        assert_eq!(caught.borrow().len(), 1);
    });
}

#[test]
fn a_handler_that_reraises_escalates_to_the_parent_chain() {
    create_root(|_| {
        let outer_caught = Rc::new(RefCell::new(0));
        let inner_caught = Rc::new(RefCell::new(0));

        let outer = outer_caught.clone();
        catch_error(
            || {
                let inner = inner_caught.clone();
                catch_error(
                    || {
                        create_effect(|| panic!("nested boom"));
                    },
                    move |_err| {
                        *inner.borrow_mut() += 1;
                        Err(ReactiveError::NotReady)
                    },
                );
            },
            move |_err| {
                *outer.borrow_mut() += 1;
                Ok(())
            },
        );
        flush_sync();
        assert_eq!(*inner_caught.borrow(), 1);
        assert_eq!(*outer_caught.borrow(), 1);
    });
}

#[test]
fn nearest_provided_context_value_shadows_outer_ones_for_descendants_only() {
    create_root(|_| {
        let theme = create_context(Some("light"));
        assert_eq!(get_context(&theme), Some("light"));

        set_context(&theme, "dark");
        create_root(|inner| {
            run_with_owner(inner, || {
                // A detached root created inside, but with no parent link:
                // it must not see the outer provider.
                assert_eq!(get_context(&theme), None);
            });
        });
        assert_eq!(get_context(&theme), Some("dark"));
    });
}
