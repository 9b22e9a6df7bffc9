//! # quiz-judge
//!
//! Compiles a learner's Java class together with a question's JUnit test
//! template, runs the tests in a separate JVM and reports a structured
//! verdict. Compiled test units are cached by the hash of the bound test
//! source, so repeated submissions against the same question only pay for
//! compiling the learner's class.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Content-addressed cache of compiled test units
pub mod cache;
/// Runtime configuration
pub mod config;
/// Error taxonomy shared by every stage
pub mod error;
/// Java toolchain integration: extraction, compilation, loading, running
pub mod java;
/// The submission pipeline
pub mod judge;
/// Async subprocess helpers
pub mod process;
/// Question store collaborator
pub mod questions;
/// Small shared types
pub mod types;
/// Verdict assembly
pub mod verdict;

pub use cache::{CacheEntry, CacheKey, CompilationCache};
pub use config::JudgeConfig;
pub use error::{InternalCategory, InternalError, JudgeError, PreconditionError};
pub use judge::Judge;
pub use questions::{DirectoryQuestionStore, QuestionStore, judge_question};
pub use types::QuestionId;
pub use verdict::{Verdict, VerdictStatus};
