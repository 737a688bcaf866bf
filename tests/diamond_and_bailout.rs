//! Black-box tests against the public API for the diamond-graph and
//! bailout scenarios (S1, S3, property 3 "minimal recomputes" and
//! property 4 "bailout").

use signalgraph::{create_memo, create_root, create_signal};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn diamond_write_recomputes_each_node_exactly_once() {
    create_root(|_| {
        let x = create_signal("a".to_string());

        let a_runs = Rc::new(Cell::new(0));
        let ar = a_runs.clone();
        let a = create_memo(move || {
            ar.set(ar.get() + 1);
            x.get()
        });

        let b_runs = Rc::new(Cell::new(0));
        let br = b_runs.clone();
        let b = create_memo(move || {
            br.set(br.get() + 1);
            x.get()
        });

        let c_runs = Rc::new(Cell::new(0));
        let cr = c_runs.clone();
        let c = create_memo(move || {
            cr.set(cr.get() + 1);
            format!("{} {}", a.get(), b.get())
        });

        assert_eq!(c.get(), "a a");
        assert_eq!((a_runs.get(), b_runs.get(), c_runs.get()), (1, 1, 1));

        x.set("aa".to_string());
        assert_eq!(c.get(), "aa aa");
        assert_eq!((a_runs.get(), b_runs.get(), c_runs.get()), (2, 2, 2));
    });
}

#[test]
fn deeper_diamond_still_settles_each_node_once() {
    // x -> {a, b, c} -> d, a 3-way diamond rather than 2-way.
    create_root(|_| {
        let x = create_signal(1);
        let make_leg = |x: signalgraph::Signal<i32>| {
            let runs = Rc::new(Cell::new(0));
            let r = runs.clone();
            (create_memo(move || { r.set(r.get() + 1); x.get() + 1 }), runs)
        };
        let (a, a_runs) = make_leg(x);
        let (b, b_runs) = make_leg(x);
        let (c, c_runs) = make_leg(x);

        let d_runs = Rc::new(Cell::new(0));
        let dr = d_runs.clone();
        let d = create_memo(move || {
            dr.set(dr.get() + 1);
            a.get() + b.get() + c.get()
        });

        assert_eq!(d.get(), 6);
        x.set(10);
        assert_eq!(d.get(), 33);
        assert_eq!((a_runs.get(), b_runs.get(), c_runs.get(), d_runs.get()), (2, 2, 2, 2));
    });
}

#[test]
fn bailout_stops_propagation_when_a_memo_recomputes_to_the_same_value() {
    create_root(|_| {
        let x = create_signal(5);

        let clamp_runs = Rc::new(Cell::new(0));
        let cr = clamp_runs.clone();
        let clamped = create_memo(move || {
            cr.set(cr.get() + 1);
            x.get().clamp(0, 10)
        });

        let observer_runs = Rc::new(Cell::new(0));
        let or_ = observer_runs.clone();
        let observer = create_memo(move || {
            or_.set(or_.get() + 1);
            clamped.get() * 100
        });

        assert_eq!(observer.get(), 500);
        assert_eq!((clamp_runs.get(), observer_runs.get()), (1, 1));

        // 5 -> 20 clamps to 10: a genuine change, observer must recompute.
        x.set(20);
        assert_eq!(observer.get(), 1000);
        assert_eq!((clamp_runs.get(), observer_runs.get()), (2, 2));

        // 20 -> 15 also clamps to 10: clamped recomputes but its output
        // is unchanged, so observer must NOT recompute.
        x.set(15);
        assert_eq!(observer.get(), 1000);
        assert_eq!((clamp_runs.get(), observer_runs.get()), (3, 2));
    });
}

#[test]
fn unread_memo_never_runs_its_compute_function() {
    create_root(|_| {
        let x = create_signal(1);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let _m = create_memo(move || {
            r.set(r.get() + 1);
            x.get()
        });
        x.set(2);
        x.set(3);
        assert_eq!(runs.get(), 0, "a memo nobody reads must never execute");
    });
}
