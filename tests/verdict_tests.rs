use quiz_judge::{
    InternalCategory, VerdictStatus,
    java::{Diagnostic, RunOutcome, TestFailure},
    verdict::{Stages, UnitCompile, assemble},
};

fn failure(name: &str) -> TestFailure {
    TestFailure {
        name:    name.to_string(),
        message: "expected 5, got 4".to_string(),
        line:    14,
    }
}

#[test]
fn candidate_compile_error_wins_over_everything() {
    let diagnostics = vec![Diagnostic::error(Some("Foo".into()), 3, "';' expected")];
    let run = RunOutcome::passed(3);
    let verdict = assemble(Stages {
        candidate: Some(UnitCompile::Failed(&diagnostics)),
        test: Some(UnitCompile::Compiled),
        run: Some(&run),
        ..Stages::new("Foo", "FooTest")
    });
    assert_eq!(verdict.status, VerdictStatus::CompileError);
    assert_eq!(verdict.unit.as_deref(), Some("Foo"));
    assert_eq!(verdict.diagnostics, diagnostics);
    assert!(verdict.failures.is_empty());
    assert!(verdict.error.is_none());
}

#[test]
fn test_compile_error_is_attributed_to_the_test_unit() {
    let diagnostics = vec![Diagnostic::error(Some("FooTest".into()), 5, "cannot find symbol")];
    let verdict = assemble(Stages {
        candidate: Some(UnitCompile::Compiled),
        test: Some(UnitCompile::Failed(&diagnostics)),
        ..Stages::new("Foo", "FooTest")
    });
    assert_eq!(verdict.status, VerdictStatus::CompileError);
    assert_eq!(verdict.unit.as_deref(), Some("FooTest"));
    assert_eq!(verdict.diagnostics.len(), 1);
}

#[test]
fn failing_tests_give_a_test_failure_on_the_test_unit() {
    let run = RunOutcome::failed(3, vec![failure("subtracts()")]);
    let verdict = assemble(Stages {
        candidate: Some(UnitCompile::Compiled),
        test: Some(UnitCompile::Compiled),
        run: Some(&run),
        ..Stages::new("Foo", "FooTest")
    });
    assert_eq!(verdict.status, VerdictStatus::TestFailure);
    assert_eq!(verdict.unit.as_deref(), Some("FooTest"));
    assert_eq!(verdict.failures, vec![failure("subtracts()")]);
    assert!(!verdict.is_success());
}

#[test]
fn passing_run_is_success_on_the_candidate() {
    for run in [RunOutcome::passed(3), RunOutcome::passed(0)] {
        let verdict = assemble(Stages {
            candidate: Some(UnitCompile::Compiled),
            test: Some(UnitCompile::Compiled),
            run: Some(&run),
            ..Stages::new("Foo", "FooTest")
        });
        assert!(verdict.is_success());
        assert_eq!(verdict.unit.as_deref(), Some("Foo"));
        assert!(verdict.diagnostics.is_empty());
    }
}

#[test]
fn unsuccessful_run_without_failures_is_still_a_test_failure() {
    let run = RunOutcome::failed(2, Vec::new());
    let verdict = assemble(Stages {
        candidate: Some(UnitCompile::Compiled),
        test: Some(UnitCompile::Compiled),
        run: Some(&run),
        ..Stages::new("Foo", "FooTest")
    });
    assert_eq!(verdict.status, VerdictStatus::TestFailure);
}

#[test]
fn missing_stages_become_unexpected_internal_errors() {
    let nothing = assemble(Stages::new("Foo", "FooTest"));
    assert_eq!(nothing.status, VerdictStatus::InternalError);
    let error = nothing.error.expect("error present");
    assert_eq!(error.category, InternalCategory::Unexpected);
    assert!(error.message.contains("candidate compilation"));

    let no_run = assemble(Stages {
        candidate: Some(UnitCompile::Compiled),
        test: Some(UnitCompile::Compiled),
        ..Stages::new("Foo", "FooTest")
    });
    assert!(no_run.error.unwrap().message.contains("test execution"));
}

#[test]
fn assembly_is_deterministic_and_serializes_snake_case() {
    let run = RunOutcome::failed(3, vec![failure("subtracts()")]);
    let stages = Stages {
        candidate: Some(UnitCompile::Compiled),
        test: Some(UnitCompile::Compiled),
        run: Some(&run),
        ..Stages::new("Foo", "FooTest")
    };
    assert_eq!(assemble(stages), assemble(stages));

    let snapshot = serde_json::to_value(assemble(stages)).unwrap();
    assert_eq!(snapshot["status"], "test_failure");
    assert_eq!(snapshot["unit"], "FooTest");
    assert_eq!(snapshot["failures"][0]["name"], "subtracts()");
    assert!(snapshot["error"].is_null());
}
