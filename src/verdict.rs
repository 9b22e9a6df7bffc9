use serde::{Deserialize, Serialize};

use crate::{
    error::{InternalCategory, InternalError},
    java::{Diagnostic, RunOutcome, TestFailure},
};

/// Terminal state of one judge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Everything compiled and every test passed.
    Success,
    /// The candidate or the test unit did not compile.
    CompileError,
    /// At least one test failed.
    TestFailure,
    /// The pipeline itself failed.
    InternalError,
}

/// Structured outcome handed back to the caller. Carries no presentation
/// markup and no wall-clock data, so identical inputs give equal verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// terminal state
    pub status:      VerdictStatus,
    /// unit the verdict is attributed to
    pub unit:        Option<String>,
    /// compiler diagnostics, for `CompileError`
    pub diagnostics: Vec<Diagnostic>,
    /// failed tests, for `TestFailure`
    pub failures:    Vec<TestFailure>,
    /// category and message, for `InternalError`
    pub error:       Option<InternalError>,
}

impl Verdict {
    /// An `InternalError` verdict.
    pub fn internal(error: InternalError) -> Self {
        Self {
            status:      VerdictStatus::InternalError,
            unit:        None,
            diagnostics: Vec::new(),
            failures:    Vec::new(),
            error:       Some(error),
        }
    }

    /// A `CompileError` verdict attributed to `unit`.
    fn compile_error(unit: &str, diagnostics: &[Diagnostic]) -> Self {
        Self {
            status:      VerdictStatus::CompileError,
            unit:        Some(unit.to_string()),
            diagnostics: diagnostics.to_vec(),
            failures:    Vec::new(),
            error:       None,
        }
    }

    /// True for `Success`.
    pub fn is_success(&self) -> bool {
        self.status == VerdictStatus::Success
    }
}

/// How one unit fared in compilation.
#[derive(Debug, Clone, Copy)]
pub enum UnitCompile<'a> {
    /// Compiled (freshly or from the cache).
    Compiled,
    /// Did not compile; the diagnostics to report.
    Failed(&'a [Diagnostic]),
}

/// Everything the pipeline learnt, stage by stage. A stage left at `None`
/// never completed.
#[derive(Debug, Clone, Copy)]
pub struct Stages<'a> {
    /// candidate unit name
    pub candidate_unit: &'a str,
    /// test unit name
    pub test_unit:      &'a str,
    /// candidate compilation
    pub candidate:      Option<UnitCompile<'a>>,
    /// test compilation, fresh or cached
    pub test:           Option<UnitCompile<'a>>,
    /// test execution
    pub run:            Option<&'a RunOutcome>,
}

impl<'a> Stages<'a> {
    /// Nothing has happened yet.
    pub fn new(candidate_unit: &'a str, test_unit: &'a str) -> Self {
        Self {
            candidate_unit,
            test_unit,
            candidate: None,
            test: None,
            run: None,
        }
    }
}

/// Turns stage outcomes into a verdict. Pure.
pub fn assemble(stages: Stages<'_>) -> Verdict {
    let incomplete = |stage: &str| {
        Verdict::internal(InternalError::new(
            InternalCategory::Unexpected,
            format!("pipeline stopped before {stage}"),
        ))
    };

    match stages.candidate {
        None => return incomplete("candidate compilation"),
        Some(UnitCompile::Failed(diagnostics)) => {
            return Verdict::compile_error(stages.candidate_unit, diagnostics);
        }
        Some(UnitCompile::Compiled) => {}
    }

    match stages.test {
        None => return incomplete("test compilation"),
        Some(UnitCompile::Failed(diagnostics)) => {
            return Verdict::compile_error(stages.test_unit, diagnostics);
        }
        Some(UnitCompile::Compiled) => {}
    }

    let Some(run) = stages.run else {
        return incomplete("test execution");
    };

    if run.success && run.failures.is_empty() {
        Verdict {
            status:      VerdictStatus::Success,
            unit:        Some(stages.candidate_unit.to_string()),
            diagnostics: Vec::new(),
            failures:    Vec::new(),
            error:       None,
        }
    } else {
        Verdict {
            status:      VerdictStatus::TestFailure,
            unit:        Some(stages.test_unit.to_string()),
            diagnostics: Vec::new(),
            failures:    run.failures.clone(),
            error:       None,
        }
    }
}
