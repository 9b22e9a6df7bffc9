#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{ffi::OsString, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    loader::LoadedUnits,
    parsers::parser,
    util::{classpath, java_path},
};
use crate::{
    config::JudgeConfig,
    error::{InternalCategory, InternalError, JudgeError},
    process,
    types::LineRef,
};

/// Main class of the JUnit console launcher.
const CONSOLE_LAUNCHER: &str = "org.junit.platform.console.ConsoleLauncher";

/// How much of a crashed runner's output ends up in the error message.
const CRASH_EXCERPT_CHARS: usize = 2000;

/// One failed test entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    /// display name of the test, eg. `testAdd()`
    pub name:    String,
    /// summarised error message
    pub message: String,
    /// best-effort line in the test unit, at least 1
    pub line:    u32,
}

/// Result of running one test unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// true iff no entry point failed
    pub success:     bool,
    /// number of entry points discovered
    pub tests_found: u32,
    /// failed entry points
    pub failures:    Vec<TestFailure>,
}

impl RunOutcome {
    /// Every discovered test passed.
    pub fn passed(tests_found: u32) -> Self {
        Self {
            success: true,
            tests_found,
            failures: Vec::new(),
        }
    }

    /// Some tests failed; an empty list still counts as a failure.
    pub fn failed(tests_found: u32, failures: Vec<TestFailure>) -> Self {
        Self {
            success: false,
            tests_found,
            failures,
        }
    }
}

/// Strategy that discovers and runs the test entry points of a loaded test
/// unit against a loaded candidate unit.
pub trait TestRunner: Send + Sync {
    /// Runs every entry point declared on `test_unit`. A failing entry point
    /// never stops the others.
    fn run(
        &self,
        loaded: &LoadedUnits,
        candidate_unit: &str,
        test_unit: &str,
    ) -> impl Future<Output = Result<RunOutcome, JudgeError>> + Send;
}

/// Runs the JUnit console launcher in a separate, resource-limited JVM.
#[derive(Debug, Clone)]
pub struct JunitRunner {
    /// java executable
    java:         OsString,
    /// flags placed before the classpath
    jvm_options:  Vec<String>,
    /// wall-clock limit for the JVM
    timeout:      Duration,
    /// per-stream cap on captured output
    output_limit: usize,
}

impl JunitRunner {
    /// Locates `java` on `PATH` and configures it from `config`.
    pub fn new(config: &JudgeConfig) -> Result<Self, JudgeError> {
        Ok(Self::with_java(java_path()?, config))
    }

    /// Uses the given `java` executable.
    pub fn with_java(java: impl Into<OsString>, config: &JudgeConfig) -> Self {
        Self {
            java:         java.into(),
            jvm_options:  config.jvm_options().to_vec(),
            timeout:      config.java_timeout(),
            output_limit: config.max_output_bytes(),
        }
    }
}

impl TestRunner for JunitRunner {
    async fn run(
        &self,
        loaded: &LoadedUnits,
        candidate_unit: &str,
        test_unit: &str,
    ) -> Result<RunOutcome, JudgeError> {
        if loaded.unit(candidate_unit).is_none() {
            return Err(JudgeError::internal(
                InternalCategory::Resolution,
                format!("candidate unit `{candidate_unit}` is not loaded"),
            ));
        }
        let test = loaded.unit(test_unit).ok_or_else(|| {
            JudgeError::internal(
                InternalCategory::Resolution,
                format!("test unit `{test_unit}` is not loaded"),
            )
        })?;
        let test_class = test.primary_class().ok_or_else(|| {
            JudgeError::internal(
                InternalCategory::Resolution,
                format!("test unit `{test_unit}` has no top-level class"),
            )
        })?;

        let mut args: Vec<OsString> = self.jvm_options.iter().map(OsString::from).collect();
        args.extend([
            OsString::from("-cp"),
            OsString::from(classpath(&loaded.classpath())),
            OsString::from(CONSOLE_LAUNCHER),
            OsString::from("--disable-banner"),
            OsString::from("--disable-ansi-colors"),
            OsString::from("--details=tree"),
            OsString::from(format!("--select-class={test_class}")),
        ]);

        debug!(test_class, "launching junit console");
        let collected = process::run_collect(
            &self.java,
            &args,
            Some(loaded.classes_dir()),
            Some(self.timeout),
            self.output_limit,
        )
        .await?;
        if collected.truncated {
            warn!(test_class, "test output exceeded the capture limit");
        }

        let stem = test_unit.rsplit('.').next().unwrap_or(test_unit);
        let mut output = String::from_utf8_lossy(&collected.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&collected.stderr));
        let outcome = parse_console_report(&output, stem)?;
        info!(
            test_class,
            found = outcome.tests_found,
            failed = outcome.failures.len(),
            "test run finished"
        );
        Ok(outcome)
    }
}

/// A failure block being accumulated from the report.
struct FailureBlock {
    /// display name from the header line
    name:       String,
    /// message from the `=>` line plus continuations
    message:    Option<String>,
    /// parsed stack frames
    frames:     Vec<LineRef>,
    /// true while lines after `=>` belong to the message
    in_message: bool,
}

impl FailureBlock {
    /// Starts a block from a header such as `JUnit Jupiter:FooTest:testAdd()`.
    fn new(header: &str) -> Self {
        let name = header
            .splitn(3, ':')
            .nth(2)
            .unwrap_or(header)
            .trim()
            .to_string();
        Self {
            name,
            message: None,
            frames: Vec::new(),
            in_message: false,
        }
    }

    /// Finishes the block, picking the line from the first frame in the
    /// test file, then the first frame anywhere, then 1.
    fn finish(self, test_stem: &str) -> TestFailure {
        let line = self
            .frames
            .iter()
            .find(|f| f.is_in(test_stem))
            .or_else(|| self.frames.first())
            .map(|f| f.line_number)
            .unwrap_or(1);
        TestFailure {
            name:    self.name,
            message: self.message.unwrap_or_default(),
            line:    u32::try_from(line).unwrap_or(u32::MAX).max(1),
        }
    }
}

/// `org.opentest4j.AssertionFailedError: expected 5` becomes `expected 5`;
/// a bare exception type becomes its simple name.
fn summarise_exception(text: &str) -> String {
    let text = text.trim();
    if let Some((kind, message)) = text.split_once(": ")
        && !kind.contains(char::is_whitespace)
    {
        let message = message.trim();
        if !message.is_empty() {
            return message.to_string();
        }
        return kind.rsplit('.').next().unwrap_or(kind).to_string();
    }
    if !text.contains(char::is_whitespace) {
        return text.rsplit('.').next().unwrap_or(text).to_string();
    }
    text.to_string()
}

/// Headers look like `  JUnit Jupiter:FooTest:testAdd()`. Once a block is
/// open, only a two-space line naming the test class, after the block's
/// `=>` line, starts the next one; anything else continues the message.
fn is_failure_header(
    trimmed: &str,
    indent: usize,
    current: Option<&FailureBlock>,
    test_stem: &str,
) -> bool {
    let Some(block) = current else {
        return indent <= 2;
    };
    let mut parts = trimmed.splitn(3, ':');
    indent == 2
        && block.message.is_some()
        && parts.nth(1).is_some_and(|class| class.trim() == test_stem)
        && parts.next().is_some()
}

/// Parses the JUnit console launcher's output.
///
/// Failures come from the `Failures (N):` section, counts from the summary
/// box. A report without a `tests found` line means the launcher never got
/// to run, which is a runner crash.
pub fn parse_console_report(output: &str, test_stem: &str) -> Result<RunOutcome, InternalError> {
    let mut found = None;
    let mut failed = None;
    let mut in_failures = false;
    let mut current: Option<FailureBlock> = None;
    let mut failures = Vec::new();

    for raw in output.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();

        if trimmed.starts_with("Test run finished") || parser::summary_box(trimmed).is_ok() {
            if let Some(block) = current.take() {
                failures.push(block.finish(test_stem));
            }
            in_failures = false;
            if let Ok(n) = parser::tests_found(trimmed) {
                found = Some(n);
            } else if let Ok(n) = parser::tests_failed(trimmed) {
                failed = Some(n);
            }
            continue;
        }
        if parser::failures_header(trimmed).is_ok() {
            in_failures = true;
            continue;
        }
        if !in_failures || trimmed.is_empty() {
            continue;
        }

        let indent = line.len() - trimmed.len();
        if is_failure_header(trimmed, indent, current.as_ref(), test_stem) {
            if let Some(block) = current.take() {
                failures.push(block.finish(test_stem));
            }
            current = Some(FailureBlock::new(trimmed));
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };
        if let Some(rest) = trimmed.strip_prefix("=>") {
            block.message = Some(summarise_exception(rest));
            block.in_message = true;
        } else if let Ok(frame) = parser::stack_frame(trimmed) {
            block.frames.push(frame);
            block.in_message = false;
        } else if block.in_message
            && let Some(message) = block.message.as_mut()
        {
            message.push('\n');
            message.push_str(trimmed);
        }
    }
    if let Some(block) = current.take() {
        failures.push(block.finish(test_stem));
    }

    let Some(found) = found else {
        let excerpt: String = output.chars().take(CRASH_EXCERPT_CHARS).collect();
        return Err(InternalError::new(
            InternalCategory::RunnerCrash,
            format!("test runner produced no summary: {}", excerpt.trim()),
        ));
    };

    let failed = failed.unwrap_or(failures.len() as u32);
    if failed == 0 && failures.is_empty() {
        return Ok(RunOutcome::passed(found));
    }
    if failures.is_empty() {
        failures.push(TestFailure {
            name:    "test run".to_string(),
            message: format!("{failed} test(s) failed"),
            line:    1,
        });
    }
    Ok(RunOutcome::failed(found, failures))
}
