use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{process::ProcessError, types::QuestionId};

/// Bad input shape, rejected before any compiler invocation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// Candidate source is empty or only whitespace.
    #[error("the submitted source is empty")]
    EmptySource,
    /// Candidate source length lies outside the configured bounds.
    #[error("the submitted source must be between {min} and {max} characters (got {actual})")]
    SourceLength {
        /// inclusive lower bound
        min:    usize,
        /// inclusive upper bound
        max:    usize,
        /// length of the rejected source
        actual: usize,
    },
    /// The question's test template is empty.
    #[error("the test template for this question is empty")]
    EmptyTemplate,
    /// No class declaration could be recovered from the candidate.
    #[error("could not determine the main class name of the submitted source")]
    NoCandidateClass,
    /// No class declaration could be recovered from the bound test source.
    #[error("could not determine the test class name of the question")]
    NoTestClass,
    /// A unit name does not match the Java identifier grammar.
    #[error("invalid class name for compilation: '{0}'")]
    InvalidIdentifier(String),
    /// Two units in the same compilation share a name.
    #[error("class '{0}' is declared by more than one unit")]
    DuplicateUnit(String),
    /// The question store has no template for the requested question.
    #[error("no question with id {0}")]
    UnknownQuestion(QuestionId),
}

/// Coarse class of an internal failure; the only part of a fault that crosses
/// the judge boundary besides its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalCategory {
    /// javac/java missing or not runnable.
    ToolchainUnavailable,
    /// Compilation, test execution or the whole submission ran past its deadline.
    Timeout,
    /// A class name resolved neither locally nor in the host namespace.
    Resolution,
    /// The test runner exited without producing a report.
    RunnerCrash,
    /// Filesystem failure in scratch space.
    Io,
    /// Anything else, including panics inside the pipeline.
    Unexpected,
}

impl Display for InternalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InternalCategory::ToolchainUnavailable => "toolchain unavailable",
            InternalCategory::Timeout => "timeout",
            InternalCategory::Resolution => "resolution failure",
            InternalCategory::RunnerCrash => "runner crash",
            InternalCategory::Io => "i/o failure",
            InternalCategory::Unexpected => "unexpected error",
        };
        f.write_str(label)
    }
}

/// A system fault, surfaced to callers only as a category and a message.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct InternalError {
    /// coarse category
    pub category: InternalCategory,
    /// one-line message, never a stack trace
    pub message:  String,
}

impl InternalError {
    /// Creates a new internal error.
    pub fn new(category: InternalCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Everything that can stop the pipeline before a verdict is assembled.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JudgeError {
    /// Input rejected locally.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// System fault.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl JudgeError {
    /// Shorthand for an internal error of the given category.
    pub fn internal(category: InternalCategory, message: impl Into<String>) -> Self {
        JudgeError::Internal(InternalError::new(category, message))
    }
}

impl From<ProcessError> for JudgeError {
    fn from(err: ProcessError) -> Self {
        let category = match &err {
            ProcessError::Spawn { .. } => InternalCategory::ToolchainUnavailable,
            ProcessError::TimedOut(_) => InternalCategory::Timeout,
            ProcessError::Other(_) => InternalCategory::Io,
        };
        JudgeError::internal(category, err.to_string())
    }
}

impl From<std::io::Error> for JudgeError {
    fn from(err: std::io::Error) -> Self {
        JudgeError::internal(InternalCategory::Io, err.to_string())
    }
}
