#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{any::Any, panic::AssertUnwindSafe, slice, sync::Arc};

use futures::FutureExt;
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CacheKey, CompilationCache, MissOutcome},
    config::JudgeConfig,
    error::{InternalCategory, InternalError, JudgeError, PreconditionError},
    java::{
        Compilation, Compiler, ExecutionLoader, HostNamespace, JavacCompiler, JunitRunner,
        SourceUnit, TestRunner, bind_template, extract_class_name,
    },
    types::QuestionId,
    verdict::{Stages, UnitCompile, Verdict, assemble},
};

/// Validated inputs of one submission.
#[derive(Debug, Clone)]
pub struct Submission {
    /// the learner's unit
    pub candidate: SourceUnit,
    /// the question-bound test unit
    pub test:      SourceUnit,
    /// cache identity of the bound test source
    pub key:       CacheKey,
}

/// Compiles, caches, loads and runs submissions.
///
/// Cheap to share behind an `Arc`; the only state carried across calls is
/// the compilation cache.
#[derive(Debug)]
pub struct Judge<C, R> {
    /// runtime settings
    config:   JudgeConfig,
    /// compilation strategy
    compiler: C,
    /// test execution strategy
    runner:   R,
    /// compiled test units shared across submissions
    cache:    Arc<CompilationCache>,
    /// per-call class materialisation
    loader:   ExecutionLoader,
    /// parent namespace for loaded units
    host:     HostNamespace,
    /// bounds concurrent compile/run work
    permits:  Arc<Semaphore>,
}

impl Judge<JavacCompiler, JunitRunner> {
    /// A judge backed by the host `javac`/`java` and the JUnit console jar.
    ///
    /// Loads the cache snapshot when one is configured; an unreadable
    /// snapshot is logged and replaced by an empty cache.
    pub fn from_config(config: JudgeConfig) -> Result<Self, JudgeError> {
        let compiler = JavacCompiler::new(&config)?;
        let runner = JunitRunner::new(&config)?;
        let cache = match config.cache_file() {
            Some(path) => CompilationCache::load(path, config.cache_capacity()).unwrap_or_else(|e| {
                warn!(path = %path.display(), "ignoring cache snapshot: {e:#}");
                CompilationCache::new(config.cache_capacity())
            }),
            None => CompilationCache::new(config.cache_capacity()),
        };
        Ok(Self::new(config, compiler, runner, Arc::new(cache)))
    }
}

impl<C: Compiler, R: TestRunner> Judge<C, R> {
    /// Assembles a judge from its strategies.
    pub fn new(config: JudgeConfig, compiler: C, runner: R, cache: Arc<CompilationCache>) -> Self {
        Self {
            loader: ExecutionLoader::new(config.scratch_dir()),
            host: HostNamespace::with_junit(config.junit_jar()),
            permits: Arc::new(Semaphore::new(config.max_concurrent())),
            config,
            compiler,
            runner,
            cache,
        }
    }

    /// Replaces the parent namespace loaded units are chained to.
    pub fn with_host(mut self, host: HostNamespace) -> Self {
        self.host = host;
        self
    }

    /// The compilation cache.
    pub fn cache(&self) -> &Arc<CompilationCache> {
        &self.cache
    }

    /// The active configuration.
    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Saves the cache snapshot, if a snapshot file is configured.
    pub fn persist_cache(&self) -> anyhow::Result<()> {
        match self.config.cache_file() {
            Some(path) => self.cache.save(path),
            None => Ok(()),
        }
    }

    /// Checks the inputs of a submission without compiling anything.
    pub fn prepare(
        &self,
        template: &str,
        question: QuestionId,
        candidate_source: &str,
    ) -> Result<Submission, PreconditionError> {
        if candidate_source.trim().is_empty() {
            return Err(PreconditionError::EmptySource);
        }
        let (min, max) = self.config.source_bounds();
        let actual = candidate_source.chars().count();
        if actual < min || actual > max {
            return Err(PreconditionError::SourceLength { min, max, actual });
        }
        if template.trim().is_empty() {
            return Err(PreconditionError::EmptyTemplate);
        }

        let candidate_name =
            extract_class_name(candidate_source).ok_or(PreconditionError::NoCandidateClass)?;
        let candidate = SourceUnit::new(candidate_name, candidate_source)?;

        let bound = bind_template(template, self.config.placeholder(), candidate.name());
        let test_name = extract_class_name(&bound).ok_or(PreconditionError::NoTestClass)?;
        let test = SourceUnit::new(test_name, bound)?;
        if test.name() == candidate.name() {
            return Err(PreconditionError::DuplicateUnit(test.name().to_string()));
        }

        let key = CacheKey::for_source(test.text(), question);
        Ok(Submission {
            candidate,
            test,
            key,
        })
    }

    /// Judges one submission.
    ///
    /// Bad inputs are returned as `Err` before any compiler runs. Every
    /// other outcome is a [`Verdict`]; faults, timeouts and panics inside the
    /// pipeline become an `InternalError` verdict.
    pub async fn judge(
        &self,
        template: &str,
        question: QuestionId,
        candidate_source: &str,
    ) -> Result<Verdict, PreconditionError> {
        let submission = self.prepare(template, question, candidate_source)?;

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return Ok(Verdict::internal(InternalError::new(
                    InternalCategory::Unexpected,
                    format!("worker pool closed: {e}"),
                )));
            }
        };

        let limit = self.config.submission_timeout();
        let work = AssertUnwindSafe(self.pipeline(&submission)).catch_unwind();
        let result = match timeout(limit, work).await {
            Err(_) => Err(JudgeError::internal(
                InternalCategory::Timeout,
                format!("submission exceeded {}s", limit.as_secs_f64()),
            )),
            Ok(Err(panic)) => Err(JudgeError::internal(
                InternalCategory::Unexpected,
                panic_message(panic.as_ref()),
            )),
            Ok(Ok(result)) => result,
        };

        match result {
            Ok(verdict) => Ok(verdict),
            Err(JudgeError::Precondition(e)) => Err(e),
            Err(JudgeError::Internal(e)) => {
                error!(
                    category = ?e.category,
                    candidate = submission.candidate.name(),
                    question = %question,
                    "judge failed: {}",
                    e.message
                );
                Ok(Verdict::internal(e))
            }
        }
    }

    /// Compile, cache, load, run, assemble.
    async fn pipeline(&self, submission: &Submission) -> Result<Verdict, JudgeError> {
        let Submission {
            candidate,
            test,
            key,
        } = submission;
        let base = Stages::new(candidate.name(), test.name());

        let mut artifacts = match self.compiler.compile(slice::from_ref(candidate)).await? {
            Compilation::Success(artifacts) => artifacts,
            Compilation::Failure(failure) => {
                info!(candidate = candidate.name(), "candidate does not compile");
                debug!(diagnostics = %failure.render());
                let diagnostics = failure.diagnostics_for(candidate.name());
                return Ok(assemble(Stages {
                    candidate: Some(UnitCompile::Failed(&diagnostics)),
                    ..base
                }));
            }
        };
        let compiled = Stages {
            candidate: Some(UnitCompile::Compiled),
            ..base
        };

        let test_artifact = match self.cache.lookup(&key.hash, key.question) {
            Some(entry) => {
                let entry = self.cache.touch(&entry).unwrap_or(entry);
                info!(
                    hash = %key.hash,
                    question = %key.question,
                    success = entry.success,
                    "compilation cache hit"
                );
                match entry.artifact {
                    Some(artifact) if entry.success => artifact,
                    _ => {
                        return Ok(assemble(Stages {
                            test: Some(UnitCompile::Failed(&entry.diagnostics)),
                            ..compiled
                        }));
                    }
                }
            }
            None => {
                info!(hash = %key.hash, question = %key.question, "compilation cache miss");
                let units = [candidate.clone(), test.clone()];
                match self.compiler.compile(&units).await? {
                    Compilation::Success(mut joint) => {
                        let artifact = joint.remove(test.name()).ok_or_else(|| {
                            JudgeError::internal(
                                InternalCategory::Unexpected,
                                format!("compiler returned no artifact for `{}`", test.name()),
                            )
                        })?;
                        self.cache.record_miss(
                            key.clone(),
                            test.name(),
                            MissOutcome::Compiled(artifact.clone()),
                        );
                        artifact
                    }
                    Compilation::Failure(failure) => {
                        if failure.is_attributed_to(candidate.name())
                            && !failure.is_attributed_to(test.name())
                        {
                            info!(candidate = candidate.name(), "joint compile blames candidate");
                            let diagnostics = failure.diagnostics_for(candidate.name());
                            return Ok(assemble(Stages {
                                candidate: Some(UnitCompile::Failed(&diagnostics)),
                                ..base
                            }));
                        }
                        let entry =
                            self.cache
                                .record_miss(key.clone(), test.name(), MissOutcome::Failed(failure));
                        return Ok(assemble(Stages {
                            test: Some(UnitCompile::Failed(&entry.diagnostics)),
                            ..compiled
                        }));
                    }
                }
            }
        };

        artifacts.insert(test.name().to_string(), test_artifact);
        let loaded = self.loader.load(&artifacts, &self.host)?;
        debug!(classpath = ?loaded.classpath(), "units loaded");

        let outcome = self.runner.run(&loaded, candidate.name(), test.name()).await?;
        drop(loaded);

        Ok(assemble(Stages {
            test: Some(UnitCompile::Compiled),
            run: Some(&outcome),
            ..compiled
        }))
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panic: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panic: {text}")
    } else {
        "panic with a non-string payload".to_string()
    }
}
