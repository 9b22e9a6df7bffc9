use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    error::{InternalCategory, JudgeError, PreconditionError},
    java::{Compiler, TestRunner},
    judge::Judge,
    types::QuestionId,
    verdict::Verdict,
};

/// Resolves question ids to test templates.
pub trait QuestionStore {
    /// Test template of `question`, or `None` if there is no such question.
    fn test_template(&self, question: QuestionId) -> Result<Option<String>>;
}

/// Questions stored as `<dir>/<id>.java`.
#[derive(Debug, Clone)]
pub struct DirectoryQuestionStore {
    /// directory holding the templates
    dir: PathBuf,
}

impl DirectoryQuestionStore {
    /// Store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the template for `question`.
    pub fn path_of(&self, question: QuestionId) -> PathBuf {
        self.dir.join(format!("{question}.java"))
    }
}

impl QuestionStore for DirectoryQuestionStore {
    fn test_template(&self, question: QuestionId) -> Result<Option<String>> {
        let path = self.path_of(question);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Could not read {}", path.display()))
    }
}

/// Looks the template up and judges `candidate_source` against it.
///
/// An unknown question is a precondition failure; a store that cannot be
/// read is an i/o fault.
pub async fn judge_question<C, R, S>(
    judge: &Judge<C, R>,
    store: &S,
    question: QuestionId,
    candidate_source: &str,
) -> Result<Verdict, JudgeError>
where
    C: Compiler,
    R: TestRunner,
    S: QuestionStore + ?Sized,
{
    let template = store
        .test_template(question)
        .map_err(|e| JudgeError::internal(InternalCategory::Io, format!("{e:#}")))?
        .ok_or(PreconditionError::UnknownQuestion(question))?;
    Ok(judge.judge(&template, question, candidate_source).await?)
}
