//! Structured lifecycle events emitted during a verification run.

use std::io::Cursor;
use std::path::Path;
use std::rc::Rc;

use presubmit_core::fakes::MemoryMetadataSource;
use presubmit_core::obs::{emit_script_fault, emit_script_started, emit_verdict};
use presubmit_core::{do_presubmit_checks, Action, Change, RunOptions, RunSpan};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_run_span_and_script_events() {
    let _span = RunSpan::enter("run-1", "mychange");
    emit_script_started(Path::new("/repo/PRESUBMIT.rhai"));
    emit_script_fault(Path::new("/repo/PRESUBMIT.rhai"), &"boom");
    emit_verdict(false, 1, 0, 0);

    assert!(logs_contain("presubmit.script_started"));
    assert!(logs_contain("presubmit.script_fault"));
    assert!(logs_contain("boom"));
    assert!(logs_contain("presubmit.verdict"));
}

#[traced_test]
#[test]
fn test_full_run_emits_lifecycle_events() {
    let change = Rc::new(Change::new(
        "logged",
        "",
        "/nonexistent-presubmit-root",
        [(Action::Modified, "a.txt")],
        Rc::new(MemoryMetadataSource::new().with_file("/nonexistent-presubmit-root/a.txt", "x")),
    ));
    let options = RunOptions {
        default_script: Some(
            r#"
            fn check_change_on_upload(input, output) {
                print("hello from script");
                input.change.affected_text_files();
                [output.notify("done")]
            }
            "#
            .into(),
        ),
        ..RunOptions::default()
    };
    let mut output = Vec::new();
    let verdict =
        do_presubmit_checks(change.clone(), &options, &mut output, &mut Cursor::new(Vec::new()))
            .unwrap();
    assert!(verdict.passed);
    assert!(change.deprecation_warned());

    assert!(logs_contain("presubmit.run_started"));
    assert!(logs_contain("presubmit.no_script_found"));
    assert!(logs_contain("presubmit.script_finished"));
    assert!(logs_contain("hello from script"));
    assert!(logs_contain("presubmit.deprecated"));
    assert!(logs_contain("presubmit.verdict"));
}
