//! End-to-end pipeline tests for [`LifecycleController`].

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use scriptorium_engine::{ErrorRecord, codes};
use scriptorium_hooks::{AsyncHookFn, Checkpoint, CodeSlot, HookContext};
use scriptorium_runtime::{AttachOutcome, LifecycleError, Placement, ScriptUnit, UnitState};

use common::{fixture, fixture_with_sources};

#[tokio::test]
async fn completed_run_dispatches_ready_and_done() {
    let fx = fixture();
    let unit = ScriptUnit::script("print(1)");

    let outcome = fx.controller.attach(&unit).await.unwrap();

    assert_eq!(outcome, AttachOutcome::Completed);
    assert_eq!(
        fx.host.events_for(&unit),
        vec!["py:ready".to_owned(), "py:done".to_owned()]
    );
    assert_eq!(unit.state(), UnitState::DoneDispatched);

    let runs = fx.engine.take_runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].code, "print(1)");
    assert!(!runs[0].asynchronous);
}

#[tokio::test]
async fn reattachment_is_a_no_op() {
    let fx = fixture();
    let unit = ScriptUnit::script("print(1)");

    assert_eq!(
        fx.controller.attach(&unit).await.unwrap(),
        AttachOutcome::Completed
    );
    assert_eq!(
        fx.controller.attach(&unit).await.unwrap(),
        AttachOutcome::AlreadyExecuted
    );
    assert_eq!(fx.engine.run_count(), 1);
    assert_eq!(fx.host.events_for(&unit).len(), 2);
}

#[tokio::test]
async fn body_unit_gets_a_target_after_itself() {
    let fx = fixture();
    let unit = ScriptUnit::script("print(1)");

    fx.controller.attach(&unit).await.unwrap();

    let created = fx.host.created_targets();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1, Placement::AfterUnit);
}

#[tokio::test]
async fn head_unit_gets_a_target_at_end_of_body() {
    let fx = fixture();
    let unit = ScriptUnit::script("print(1)").in_head();

    fx.controller.attach(&unit).await.unwrap();

    let created = fx.host.created_targets();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1, Placement::EndOfBody);
}

#[tokio::test]
async fn missing_explicit_target_aborts_before_ready() {
    let fx = fixture();
    let unit = ScriptUnit::script("print(1)").with_target("nowhere");

    let err = fx.controller.attach(&unit).await.unwrap_err();

    assert!(matches!(err, LifecycleError::TargetNotFound(name) if name == "nowhere"));
    assert!(fx.host.events_for(&unit).is_empty());
    assert_eq!(fx.engine.run_count(), 0);
}

#[tokio::test]
async fn explicit_target_is_looked_up_not_created() {
    let fx = fixture();
    fx.host.add_target("out");
    let unit = ScriptUnit::script("print(1)").with_target("out");

    fx.controller.attach(&unit).await.unwrap();

    assert!(fx.host.created_targets().is_empty());
    assert_eq!(fx.engine.run_count(), 1);
}

#[tokio::test]
async fn recorded_error_preempts_execution() {
    let fx = fixture();
    let unit = ScriptUnit::script("print(1)");
    fx.ledger.record(
        unit.id().clone(),
        ErrorRecord::invalid_content("setup failed"),
    );

    let outcome = fx.controller.attach(&unit).await.unwrap();

    assert_eq!(outcome, AttachOutcome::Preempted);
    assert_eq!(fx.engine.run_count(), 0);
    assert!(fx.host.events_for(&unit).is_empty());
    assert!(fx.host.created_targets().is_empty());
    assert_eq!(unit.state(), UnitState::SourceResolved);
    assert!(unit.executed());

    let stderr = fx.io.stderr_lines();
    assert_eq!(stderr.len(), 1);
    assert!(stderr[0].contains(codes::CONFLICTING_CODE.as_str()));
    assert!(stderr[0].contains("setup failed"));
}

#[tokio::test]
async fn engine_failure_still_dispatches_done() {
    let fx = fixture();
    fx.engine.fail_with("boom");
    let unit = ScriptUnit::script("print(1)");

    let outcome = fx.controller.attach(&unit).await.unwrap();

    assert_eq!(outcome, AttachOutcome::Completed);
    assert_eq!(
        fx.host.events_for(&unit),
        vec!["py:ready".to_owned(), "py:done".to_owned()]
    );
    assert!(fx.io.stderr_lines().iter().any(|l| l.contains("boom")));
}

#[tokio::test]
async fn hook_failure_suppresses_done() {
    let fx = fixture();
    fx.hooks
        .register(HookContext::Main, Checkpoint::Ready, "failing", |_, _| {
            Err("no thanks".into())
        })
        .unwrap();
    let unit = ScriptUnit::script("print(1)");

    let err = fx.controller.attach(&unit).await.unwrap_err();

    assert!(matches!(err, LifecycleError::Hook(_)));
    assert_eq!(fx.host.events_for(&unit), vec!["py:ready".to_owned()]);
    assert_eq!(fx.engine.run_count(), 0);
}

#[tokio::test]
async fn fetch_failure_falls_back_to_inline() {
    let fx = fixture();
    let unit = ScriptUnit::script("print('inline')").with_src("https://x/missing.py");

    let outcome = fx.controller.attach(&unit).await.unwrap();

    assert_eq!(outcome, AttachOutcome::Completed);
    let runs = fx.engine.take_runs();
    assert_eq!(runs[0].code, "print('inline')");
    assert!(
        fx.io
            .stderr_lines()
            .iter()
            .any(|l| l.contains(codes::FETCH_FAILED.as_str()))
    );
}

#[tokio::test]
async fn src_wins_over_inline_for_script_units() {
    let fx = fixture_with_sources([("https://x/app.py", "print('fetched')")]);
    let unit = ScriptUnit::script("print('inline')").with_src("https://x/app.py");

    fx.controller.attach(&unit).await.unwrap();

    assert_eq!(fx.engine.take_runs()[0].code, "print('fetched')");
}

#[tokio::test]
async fn hooks_run_in_order_around_execution() {
    let fx = fixture();
    let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    fx.hooks
        .register_eager(Checkpoint::Ready, "eager", {
            let trace = Arc::clone(&trace);
            move |_, _| {
                trace.lock().push("eager-ready");
                Ok(())
            }
        })
        .unwrap();
    for (checkpoint, label) in [
        (Checkpoint::Ready, "ready"),
        (Checkpoint::BeforeRun, "before"),
        (Checkpoint::AfterRun, "after"),
    ] {
        fx.hooks
            .register(HookContext::Main, checkpoint, label, {
                let trace = Arc::clone(&trace);
                move |_, _| {
                    trace.lock().push(label);
                    Ok(())
                }
            })
            .unwrap();
    }

    fx.controller
        .attach(&ScriptUnit::script("print(1)"))
        .await
        .unwrap();

    assert_eq!(
        *trace.lock(),
        vec!["eager-ready", "ready", "before", "after"]
    );
    assert_eq!(fx.engine.run_count(), 1);
}

#[tokio::test]
async fn async_units_use_the_async_channel() {
    let fx = fixture();
    let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for (checkpoint, label) in [
        (Checkpoint::BeforeRunAsync, "before-async"),
        (Checkpoint::AfterRunAsync, "after-async"),
    ] {
        let trace = Arc::clone(&trace);
        let hook: AsyncHookFn = Arc::new(move |_scope, _event| {
            let trace = Arc::clone(&trace);
            Box::pin(async move {
                trace.lock().push(label);
                Ok(())
            })
        });
        fx.hooks
            .register_async(HookContext::Main, checkpoint, label, hook)
            .unwrap();
    }

    fx.controller
        .attach(&ScriptUnit::script("print(1)").with_async())
        .await
        .unwrap();

    assert_eq!(*trace.lock(), vec!["before-async", "after-async"]);
    let runs = fx.engine.take_runs();
    assert!(runs[0].asynchronous);
}

#[tokio::test]
async fn async_hook_rejection_suppresses_done() {
    let fx = fixture();
    let failing: AsyncHookFn =
        Arc::new(|_scope, _event| Box::pin(async { Err("rejected".into()) }));
    fx.hooks
        .register_async(
            HookContext::Main,
            Checkpoint::AfterRunAsync,
            "failing",
            failing,
        )
        .unwrap();
    let unit = ScriptUnit::script("print(1)").with_async();

    let err = fx.controller.attach(&unit).await.unwrap_err();

    assert!(matches!(err, LifecycleError::Hook(_)));
    assert_eq!(fx.host.events_for(&unit), vec!["py:ready".to_owned()]);
    assert_eq!(fx.engine.run_count(), 1);
}

#[tokio::test]
async fn code_snippets_are_spliced_around_source() {
    let fx = fixture();
    fx.hooks
        .register_code(HookContext::Main, CodeSlot::BeforeRun, "import setup");
    fx.hooks
        .register_code(HookContext::Main, CodeSlot::AfterRun, "teardown()");

    fx.controller
        .attach(&ScriptUnit::script("print(1)"))
        .await
        .unwrap();

    assert_eq!(
        fx.engine.take_runs()[0].code,
        "import setup\nprint(1)\nteardown()"
    );
}

#[tokio::test]
async fn scope_target_redirection_reaches_the_engine_scope() {
    let fx = fixture();
    fx.host.add_target("elsewhere");
    let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    fx.hooks
        .register(HookContext::Main, Checkpoint::BeforeRun, "redirect", |scope, _| {
            scope.set_target("elsewhere");
            Ok(())
        })
        .unwrap();
    fx.hooks
        .register(HookContext::Main, Checkpoint::AfterRun, "observe", {
            let seen = Arc::clone(&seen);
            move |scope, _| {
                *seen.lock() = scope.target().map(str::to_owned);
                Ok(())
            }
        })
        .unwrap();

    fx.controller
        .attach(&ScriptUnit::script("print(1)"))
        .await
        .unwrap();

    assert_eq!(seen.lock().as_deref(), Some("elsewhere"));
}

#[tokio::test]
async fn block_units_defer_to_the_element_path() {
    let fx = fixture();
    let unit = ScriptUnit::block("print(1)");

    let outcome = fx.controller.attach(&unit).await.unwrap();

    assert_eq!(outcome, AttachOutcome::DeferredToElement);
    assert_eq!(fx.engine.run_count(), 0);
    assert!(fx.host.events_for(&unit).is_empty());
}

#[tokio::test]
async fn element_path_prefers_inline_and_reveals() {
    let fx = fixture_with_sources([("https://x/app.py", "print('fetched')")]);
    let unit = ScriptUnit::block("print(1 &lt; 2)").with_src("https://x/app.py");
    assert_eq!(
        fx.controller.attach(&unit).await.unwrap(),
        AttachOutcome::DeferredToElement
    );

    let outcome = fx.controller.attach_element(&unit).await.unwrap();

    assert_eq!(outcome, AttachOutcome::Completed);
    // Inline wins over src, and the parsed body is unescaped.
    assert_eq!(fx.engine.take_runs()[0].code, "print(1 < 2)");
    assert_eq!(
        fx.host.revealed_units(),
        vec![unit.id().as_str().to_owned()]
    );
}

#[tokio::test]
async fn element_path_runs_at_most_once() {
    let fx = fixture();
    let unit = ScriptUnit::block("print(1)");
    assert_eq!(
        fx.controller.attach(&unit).await.unwrap(),
        AttachOutcome::DeferredToElement
    );

    assert_eq!(
        fx.controller.attach_element(&unit).await.unwrap(),
        AttachOutcome::Completed
    );
    assert_eq!(
        fx.controller.attach_element(&unit).await.unwrap(),
        AttachOutcome::AlreadyExecuted
    );

    assert_eq!(fx.engine.run_count(), 1);
    assert_eq!(fx.host.events_for(&unit).len(), 2);
    assert_eq!(unit.state(), UnitState::DoneDispatched);
}

#[tokio::test]
async fn preempted_element_is_not_revealed() {
    let fx = fixture();
    let unit = ScriptUnit::block("print(1)");
    assert_eq!(
        fx.controller.attach(&unit).await.unwrap(),
        AttachOutcome::DeferredToElement
    );
    fx.ledger
        .record(unit.id().clone(), ErrorRecord::new("late failure"));

    let outcome = fx.controller.attach_element(&unit).await.unwrap();

    assert_eq!(outcome, AttachOutcome::Preempted);
    assert!(fx.host.revealed_units().is_empty());
    assert_eq!(fx.io.stderr_lines(), vec!["late failure".to_owned()]);
}

#[tokio::test]
async fn indented_inline_source_is_dedented() {
    let fx = fixture();
    let unit = ScriptUnit::script("\n    if True:\n        print(1)\n");

    fx.controller.attach(&unit).await.unwrap();

    assert_eq!(fx.engine.take_runs()[0].code, "\nif True:\n    print(1)\n");
}

#[test]
fn controller_debug_names_engine() {
    let fx = fixture();
    let debug = format!("{:?}", fx.controller);
    assert!(debug.contains("stub"));
}
