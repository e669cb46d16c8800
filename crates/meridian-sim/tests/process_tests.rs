//! Process-mode behaviour: delays, condition registries, failures and
//! shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meridian_sim::{
    ControllerPhase, EventScheduling, ModelBuilder, ProcessControl, ProcessScheduling,
    SchedulerConfig, Signature, SimError, StopReason, SuperScheduler, Ticks, Value, ValueKind,
    VirtualTime, TIMED_OUT,
};
use parking_lot::Mutex;
use test_case::test_case;

type Log = Arc<Mutex<Vec<(i64, String)>>>;

fn model<M: Send + 'static>(name: &str, state: M) -> ModelBuilder<M, Ticks> {
    ModelBuilder::new(name, state)
}

fn at(t: i64) -> VirtualTime {
    VirtualTime::at(t)
}

fn ticks(time: VirtualTime) -> i64 {
    time.get().unwrap_or(-1)
}

fn async_scheduler() -> SuperScheduler {
    SuperScheduler::new(SchedulerConfig::asynchronous())
}

/// Waiters park on the condition named by their argument and log what
/// they receive.
fn waiters(log: &Log) -> meridian_sim::Model<Log> {
    model("waiters", Arc::clone(log))
        .on_process("wait", Signature::exact([ValueKind::Text]), |ctx, args| {
            let condition = args[0].as_text().unwrap_or_default().to_string();
            let outcome = ctx.wait_on_condition(&condition)?;
            let entry = format!("P{}:{outcome}", ctx.process_id().as_u64());
            let now = ticks(ctx.now());
            ctx.with_state(|log| log.lock().push((now, entry)));
            Ok(())
        })
        .build()
}

#[test]
fn test_wait_for_delay_advances_time() {
    let log = Log::default();
    let mut scheduler = async_scheduler();
    let sleeper = scheduler
        .register(
            model("sleeper", Arc::clone(&log))
                .on_process("sleep", Signature::none(), |ctx, _| {
                    for delay in [5, 7, 0] {
                        ctx.wait_for_delay(delay)?;
                        let now = ticks(ctx.now());
                        ctx.with_state(|log| log.lock().push((now, format!("woke+{delay}"))));
                    }
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    sleeper.schedule_process_myself("sleep", Vec::new(), at(0)).unwrap();

    let summary = scheduler.run().unwrap();
    assert_eq!(summary.final_time, at(12));
    assert_eq!(
        *log.lock(),
        [
            (5, "woke+5".to_string()),
            (12, "woke+7".to_string()),
            (12, "woke+0".to_string()),
        ]
    );
}

#[test]
fn test_release_one_delivers_to_oldest_waiter() {
    let log = Log::default();
    let mut scheduler = async_scheduler();
    let parked = scheduler.register(waiters(&log)).unwrap();
    let releaser = scheduler
        .register(
            model("releaser", Arc::clone(&log))
                .on_process("release", Signature::none(), |ctx, _| {
                    let found = ctx.release_one_on_condition("C", "m")?;
                    let missing = ctx.release_one_on_condition("Z", "m")?;
                    ctx.with_state(|log| {
                        log.lock().push((1, format!("found:{found} missing:{missing}")));
                    });
                    Ok(())
                })
                .build(),
        )
        .unwrap();

    for _ in 0..3 {
        parked
            .schedule_process_myself("wait", vec![Value::from("C")], at(0))
            .unwrap();
    }
    releaser.schedule_process_myself("release", Vec::new(), at(1)).unwrap();

    let summary = scheduler.run().unwrap();
    assert_eq!(summary.releases_processed, 2);
    assert_eq!(parked.waiting_on("C"), 2);
    assert_eq!(parked.phase(), ControllerPhase::Suspended);

    let log = log.lock();
    assert!(log.contains(&(1, "P1:m".to_string())), "{log:?}");
    assert!(log.contains(&(1, "found:true missing:false".to_string())), "{log:?}");
    assert_eq!(log.len(), 2);
}

#[test]
fn test_release_all_clears_condition() {
    let log = Log::default();
    let mut scheduler = async_scheduler();
    let parked = scheduler.register(waiters(&log)).unwrap();
    let opener = scheduler
        .register(
            model("opener", Arc::clone(&log))
                .on_process("open", Signature::none(), |ctx, _| {
                    let released = ctx.release_all_on_condition("B", "open")?;
                    let now = ticks(ctx.now());
                    ctx.with_state(|log| log.lock().push((now, format!("released:{released}"))));
                    Ok(())
                })
                .build(),
        )
        .unwrap();

    for _ in 0..3 {
        parked
            .schedule_process_myself("wait", vec![Value::from("B")], at(0))
            .unwrap();
    }
    opener.schedule_process_myself("open", Vec::new(), at(2)).unwrap();

    scheduler.run().unwrap();
    assert_eq!(parked.waiting_on("B"), 0);
    assert_eq!(parked.phase(), ControllerPhase::Idle);

    let mut log = log.lock().clone();
    log.sort();
    assert_eq!(
        log,
        [
            (2, "P1:open".to_string()),
            (2, "P2:open".to_string()),
            (2, "P3:open".to_string()),
            (2, "released:3".to_string()),
        ]
    );
}

#[test]
fn test_release_cancels_timeout() {
    let log = Log::default();
    let mut scheduler = async_scheduler();
    let pair = scheduler
        .register(
            model("pair", Arc::clone(&log))
                .on_process("wait", Signature::none(), |ctx, _| {
                    let outcome = ctx.wait_on_condition_for_delay("X", 10)?;
                    let now = ticks(ctx.now());
                    ctx.with_state(|log| log.lock().push((now, outcome.to_string())));
                    Ok(())
                })
                .on_process("release", Signature::none(), |ctx, _| {
                    ctx.wait_for_delay(2)?;
                    ctx.release_one_on_condition("X", "early")?;
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    pair.schedule_process_myself("wait", Vec::new(), at(0)).unwrap();
    pair.schedule_process_myself("release", Vec::new(), at(0)).unwrap();

    let summary = scheduler.run().unwrap();
    assert_eq!(summary.final_time, at(2));
    assert_eq!(*log.lock(), [(2, "early".to_string())]);
    assert_eq!(pair.pending_events(), 0);
}

#[test]
fn test_negative_condition_delay_waits_forever() {
    let mut scheduler = async_scheduler();
    let waiter = scheduler
        .register(
            model("waiter", ())
                .on_process("wait", Signature::none(), |ctx, _| {
                    ctx.wait_on_condition_for_delay("never", -1)?;
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    waiter.schedule_process_myself("wait", Vec::new(), at(0)).unwrap();

    let summary = scheduler.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(waiter.waiting_on("never"), 1);
    assert_eq!(waiter.pending_events(), 0);
}

#[test]
fn test_releaser_cannot_send_timeout_sentinel() {
    let rejected = Arc::new(AtomicBool::new(false));
    let mut scheduler = async_scheduler();
    let flag = Arc::clone(&rejected);
    let releaser = scheduler
        .register(
            model("releaser", ())
                .on_process("release", Signature::none(), move |ctx, _| {
                    let result = ctx.release_one_on_condition("X", TIMED_OUT);
                    flag.store(
                        matches!(result, Err(SimError::IllegalWaitResult(_))),
                        Ordering::SeqCst,
                    );
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    releaser.schedule_process_myself("release", Vec::new(), at(0)).unwrap();

    let summary = scheduler.run().unwrap();
    assert!(rejected.load(Ordering::SeqCst));
    assert_eq!(summary.releases_processed, 0);
}

#[test]
fn test_quit_interrupts_parked_processes() {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    let mut scheduler = async_scheduler();
    let waiter = scheduler
        .register(
            model("waiter", ())
                .on_process("wait", Signature::none(), move |ctx, _| {
                    match ctx.wait_on_condition("never") {
                        Err(err) if err.is_recoverable() => {
                            flag.store(true, Ordering::SeqCst);
                            // The controller is gone; further waits fail fast.
                            assert!(matches!(
                                ctx.wait_for_delay(1),
                                Err(SimError::ControllerStopped(_))
                            ));
                            Ok(())
                        }
                        other => other.map(|_| ()),
                    }
                })
                .build(),
        )
        .unwrap();
    waiter.schedule_process_myself("wait", Vec::new(), at(0)).unwrap();

    scheduler.run().unwrap();
    assert!(!interrupted.load(Ordering::SeqCst));

    scheduler.quit();
    assert!(interrupted.load(Ordering::SeqCst));
    assert_eq!(waiter.phase(), ControllerPhase::Stopped);
    assert!(matches!(
        waiter.schedule_process_myself("wait", Vec::new(), at(5)),
        Err(SimError::ControllerStopped(_))
    ));
}

#[test]
fn test_failing_process_terminates_run() {
    let mut scheduler = async_scheduler();
    let broken = scheduler
        .register(
            model("broken", ())
                .on_process("fail", Signature::none(), |ctx, _| ctx.wait_for_delay(-3))
                .build(),
        )
        .unwrap();
    broken.schedule_process_myself("fail", Vec::new(), at(1)).unwrap();

    let err = scheduler.run().unwrap_err();
    match err {
        SimError::ProcessFailed { source, .. } => {
            assert!(matches!(*source, SimError::NegativeDelay(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(scheduler.is_stopped());
    assert_eq!(broken.phase(), ControllerPhase::Stopped);
}

#[test]
fn test_panicking_process_terminates_run() {
    let mut scheduler = async_scheduler();
    let broken = scheduler
        .register(
            model("broken", ())
                .on_process("explode", Signature::none(), |_, _| panic!("boiler burst"))
                .build(),
        )
        .unwrap();
    broken.schedule_process_myself("explode", Vec::new(), at(0)).unwrap();

    let err = scheduler.run().unwrap_err();
    assert!(
        matches!(&err, SimError::ProcessPanicked { message, .. } if message.contains("boiler burst")),
        "{err}"
    );
}

#[test]
fn test_event_callback_can_start_processes() {
    let log = Log::default();
    let mut scheduler = async_scheduler();
    let mixed = scheduler
        .register(
            model("mixed", Arc::clone(&log))
                .on_init(|_, ctx| {
                    ctx.schedule_event_myself("kick", Vec::new(), VirtualTime::at(4))?;
                    Ok(())
                })
                .on_event("kick", Signature::none(), |_, ctx, _| {
                    ctx.schedule_process_myself("worker", Vec::new(), ctx.now())?;
                    Ok(())
                })
                .on_process("worker", Signature::none(), |ctx, _| {
                    ctx.wait_for_delay(3)?;
                    let now = ticks(ctx.now());
                    ctx.with_state(|log| log.lock().push((now, "worker done".to_string())));
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    assert_eq!(mixed.phase(), ControllerPhase::Created);

    let summary = scheduler.run().unwrap();
    assert_eq!(summary.processes_started, 1);
    assert_eq!(summary.events_dispatched, 3);
    assert_eq!(*log.lock(), [(7, "worker done".to_string())]);
    assert_eq!(mixed.phase(), ControllerPhase::Idle);
}

#[test]
fn test_iterate_release_from_outside_the_run() {
    let log = Log::default();
    let mut scheduler = async_scheduler();
    let first = scheduler.register(waiters(&log)).unwrap();
    let second = scheduler.register(waiters(&log)).unwrap();
    second
        .schedule_process_myself("wait", vec![Value::from("door")], at(0))
        .unwrap();
    first
        .schedule_process_myself("wait", vec![Value::from("door")], at(0))
        .unwrap();
    scheduler.run().unwrap();
    assert_eq!(first.waiting_on("door") + second.waiting_on("door"), 2);

    // The second model's process waited first, so it is released first.
    assert!(scheduler.iterate_release_one_on_condition("door", "knock").unwrap());
    assert_eq!(first.waiting_on("door"), 1);
    assert_eq!(second.waiting_on("door"), 0);
    assert!(!first.resume_ready());
    assert!(second.resume_ready());

    assert_eq!(scheduler.iterate_release_all_on_condition("door", "knock").unwrap(), 1);
    assert!(!scheduler.iterate_release_one_on_condition("door", "knock").unwrap());

    scheduler.run().unwrap();
    assert_eq!(log.lock().len(), 2);
    assert!(log.lock().iter().all(|(t, entry)| *t == 0 && entry.ends_with(":knock")));
}

#[test]
fn test_release_one_follows_wait_order_across_models() {
    let log = Log::default();
    let mut scheduler = async_scheduler();
    let early_model = scheduler.register(waiters(&log)).unwrap();
    let late_model = scheduler.register(waiters(&log)).unwrap();
    let releaser = scheduler
        .register(
            model("releaser", ())
                .on_process("release", Signature::none(), |ctx, _| {
                    ctx.release_one_on_condition("X", "go")?;
                    Ok(())
                })
                .build(),
        )
        .unwrap();

    // The model registered last is the first to wait.
    late_model
        .schedule_process_myself("wait", vec![Value::from("X")], at(1))
        .unwrap();
    early_model
        .schedule_process_myself("wait", vec![Value::from("X")], at(2))
        .unwrap();
    releaser.schedule_process_myself("release", Vec::new(), at(5)).unwrap();

    scheduler.run().unwrap();
    assert_eq!(late_model.waiting_on("X"), 0);
    assert_eq!(early_model.waiting_on("X"), 1);
    assert_eq!(*log.lock(), [(5, "P1:go".to_string())]);
}

#[test_case(-1 ; "negative")]
#[test_case(i64::MAX ; "overflowing")]
fn test_bad_delays_are_rejected(delay: i64) {
    let mut scheduler = async_scheduler();
    let controller = scheduler
        .register(
            model("m", ())
                .on_event("noop", Signature::none(), |_, _, _| Ok(()))
                .build(),
        )
        .unwrap();
    controller.schedule_event_myself("noop", Vec::new(), at(1)).unwrap();
    scheduler.run().unwrap();
    assert!(controller.schedule_event_in("noop", Vec::new(), delay).is_err());
}

#[test]
fn test_callback_errors_surface_at_schedule_time() {
    let mut scheduler = async_scheduler();
    let controller = scheduler
        .register(
            model("m", ())
                .on_event("only_int", Signature::exact([ValueKind::Int]), |_, _, _| Ok(()))
                .on_process("body", Signature::none(), |_, _| Ok(()))
                .build(),
        )
        .unwrap();

    assert!(matches!(
        controller.schedule_event_myself("missing", Vec::new(), at(1)),
        Err(SimError::UnknownCallback { .. })
    ));
    assert!(matches!(
        controller.schedule_event_myself("only_int", vec![Value::from("x")], at(1)),
        Err(SimError::IllegalCallback { .. })
    ));
    assert!(matches!(
        controller.schedule_event_myself("body", Vec::new(), at(1)),
        Err(SimError::IllegalCallback { .. })
    ));
    assert!(matches!(
        controller.schedule_event_myself("only_int", vec![Value::Int(1)], VirtualTime::NEVER),
        Err(SimError::InvalidDeadline { .. })
    ));
    assert_eq!(controller.pending_events(), 0);
}

#[test]
fn test_scheduling_in_the_past_is_rejected() {
    let mut scheduler = async_scheduler();
    let controller = scheduler
        .register(
            model("m", ())
                .on_event("noop", Signature::none(), |_, _, _| Ok(()))
                .build(),
        )
        .unwrap();
    controller.schedule_event_myself("noop", Vec::new(), at(5)).unwrap();
    scheduler.run().unwrap();

    assert_eq!(controller.now(), at(5));
    assert!(matches!(
        controller.schedule_event_myself("noop", Vec::new(), at(4)),
        Err(SimError::InvalidDeadline { .. })
    ));
    assert!(controller.schedule_event_myself("noop", Vec::new(), at(5)).is_ok());
}
