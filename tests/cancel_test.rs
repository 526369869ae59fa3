use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use linda::{
    BatchOutcome, CancelFlag, CancelMode, Error, GetOutcome, LimitOutcome, Linda, ReceiveOutcome,
    SendOutcome, SetOutcome, Universe, UniverseConfig, Value,
};

fn universe() -> Arc<Universe> {
    Universe::new(UniverseConfig::default())
}

#[test]
#[cfg_attr(miri, ignore)]
fn soft_cancel_wakes_blocked_reader() {
    // S5: a blocked receive returns the cancel sentinel promptly
    let u = universe();
    let l = Linda::new(&u, "x", 0).unwrap();

    let reader = {
        let l = l.clone();
        thread::spawn(move || {
            let start = Instant::now();
            let outcome = l.receive(None, &["k".into()]).unwrap();
            (outcome, start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    l.cancel(CancelMode::Read);

    let (outcome, waited) = reader.join().unwrap();
    assert_eq!(outcome, ReceiveOutcome::Cancelled);
    assert!(waited < Duration::from_secs(5));
}

#[test]
#[cfg_attr(miri, ignore)]
fn soft_cancel_wakes_blocked_writer() {
    let u = universe();
    let l = Linda::new(&u, "x", 0).unwrap();

    l.limit("k", Some(1)).unwrap();
    l.send(None, "k", &[Value::Int(1)]).unwrap();

    let writer = {
        let l = l.clone();
        thread::spawn(move || l.send(None, "k", &[Value::Int(2)]).unwrap())
    };

    thread::sleep(Duration::from_millis(50));
    l.cancel(CancelMode::Write);

    assert_eq!(writer.join().unwrap(), SendOutcome::Cancelled);
}

#[test]
#[cfg_attr(miri, ignore)]
fn cancel_both_wakes_everyone() {
    let u = universe();
    let l = Linda::new(&u, "x", 0).unwrap();
    l.limit("full", Some(0)).unwrap();

    let reader = {
        let l = l.clone();
        thread::spawn(move || l.receive(None, &["empty".into()]).unwrap())
    };
    let writer = {
        let l = l.clone();
        thread::spawn(move || l.send(None, "full", &[Value::Int(1)]).unwrap())
    };

    thread::sleep(Duration::from_millis(50));
    l.cancel(CancelMode::Both);

    assert_eq!(reader.join().unwrap(), ReceiveOutcome::Cancelled);
    assert_eq!(writer.join().unwrap(), SendOutcome::Cancelled);
}

#[test]
fn cancel_none_clears_the_flag() {
    let u = universe();
    let l = Linda::new(&u, "x", 0).unwrap();

    l.cancel(CancelMode::Read);
    l.cancel(CancelMode::Both);
    l.cancel(CancelMode::None);

    // no longer cancelled, just empty
    assert_eq!(
        l.receive(Some(Duration::ZERO), &["k".into()]).unwrap(),
        ReceiveOutcome::TimedOut
    );
    // clearing again is harmless
    l.cancel(CancelMode::None);
    assert_eq!(
        l.send(Some(Duration::ZERO), "k", &[Value::Int(1)]).unwrap(),
        SendOutcome::Sent
    );
}

#[test]
fn cancelled_linda_still_reports_counts() {
    let u = universe();
    let l = Linda::new(&u, "x", 0).unwrap();
    l.send(None, "k", &[Value::Int(1)]).unwrap();

    l.cancel(CancelMode::Both);

    // count and dump ignore the soft flag
    assert_eq!(l.count("k").unwrap(), Some(1));
    assert_eq!(l.dump().unwrap().len(), 1);

    // set, get and limit observe it
    assert_eq!(l.set("k", &[Value::Int(2)]).unwrap(), SetOutcome::Cancelled);
    assert_eq!(l.get("k", 1).unwrap(), GetOutcome::Cancelled);
    assert_eq!(l.limit("k", Some(3)).unwrap(), LimitOutcome::Cancelled);

    // and the untouched slot is still there once the flag clears
    l.cancel(CancelMode::None);
    assert_eq!(l.count("k").unwrap(), Some(1));
}

#[test]
fn worker_soft_flag_short_circuits() {
    let u = universe();
    let flag = CancelFlag::new();
    let l = Linda::new(&u, "x", 0).unwrap().for_worker(flag.clone());

    flag.request_soft();
    assert_eq!(
        l.send(None, "k", &[Value::Int(1)]).unwrap(),
        SendOutcome::Cancelled
    );
    assert_eq!(
        l.receive(None, &["k".into()]).unwrap(),
        ReceiveOutcome::Cancelled
    );
    assert_eq!(
        l.receive_batched(None, "k", 1, None).unwrap(),
        BatchOutcome::Cancelled
    );

    flag.clear();
    assert_eq!(
        l.send(None, "k", &[Value::Int(1)]).unwrap(),
        SendOutcome::Sent
    );
}

#[test]
fn worker_hard_flag_errors_out() {
    let u = universe();
    let flag = CancelFlag::new();
    let l = Linda::new(&u, "x", 0).unwrap().for_worker(flag.clone());

    flag.request_hard();
    assert_eq!(l.send(None, "k", &[Value::Int(1)]), Err(Error::Cancelled));
    assert_eq!(l.receive(None, &["k".into()]), Err(Error::Cancelled));

    // the linda itself is untouched; an unbound proxy keeps working
    let plain = Linda::new(&u, "y", 0).unwrap();
    assert_eq!(
        plain.send(None, "k", &[Value::Int(1)]).unwrap(),
        SendOutcome::Sent
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn hard_cancel_unblocks_a_waiter() {
    let u = universe();
    let flag = CancelFlag::new();
    let l = Linda::new(&u, "x", 0).unwrap();
    let bound = l.for_worker(flag.clone());

    let reader = thread::spawn(move || bound.receive(None, &["k".into()]));

    thread::sleep(Duration::from_millis(50));
    // flag the worker, then nudge the linda so the waiter resamples
    flag.request_hard();
    l.cancel(CancelMode::Read);

    // the worker flag wins over the linda's soft flag
    assert_eq!(reader.join().unwrap(), Err(Error::Cancelled));
}

#[test]
fn worker_flag_beats_linda_flag() {
    let u = universe();
    let flag = CancelFlag::new();
    let l = Linda::new(&u, "x", 0).unwrap().for_worker(flag.clone());

    l.cancel(CancelMode::Both); // linda-level soft
    flag.request_hard(); // worker-level hard

    assert_eq!(l.receive(None, &["k".into()]), Err(Error::Cancelled));
}
