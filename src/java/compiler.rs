#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::BTreeMap,
    ffi::OsString,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use itertools::Itertools;
use tracing::{debug, info};

use super::{
    classfile::read_class_info,
    diagnostics::CompileFailure,
    unit::{CompiledArtifact, CompiledArtifacts, SourceUnit, ensure_distinct, outer_simple_name},
    util::{ScratchDir, classpath, find_files, javac_path},
};
use crate::{
    config::JudgeConfig,
    error::{InternalCategory, JudgeError},
    process,
};

/// Outcome of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compilation {
    /// One artifact per requested unit.
    Success(CompiledArtifacts),
    /// Diagnostics, attributed to units where possible.
    Failure(CompileFailure),
}

impl Compilation {
    /// True for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Compilation::Success(_))
    }
}

/// Strategy that turns named source units into class files.
///
/// All units are handed over in one call so that cross references between
/// them resolve. Implementations must not share collector or output state
/// between calls.
pub trait Compiler: Send + Sync {
    /// Compiles `units` together.
    ///
    /// Returns `Err` for precondition failures (duplicate names) and system
    /// faults; compiler-reported problems are `Ok(Compilation::Failure)`.
    fn compile(
        &self,
        units: &[SourceUnit],
    ) -> impl Future<Output = Result<Compilation, JudgeError>> + Send;
}

/// Runs the host `javac` inside a fresh scratch directory per call.
#[derive(Debug, Clone)]
pub struct JavacCompiler {
    /// javac executable
    javac:        OsString,
    /// host libraries visible to the compiled units
    class_path:   Vec<PathBuf>,
    /// parent of per-call scratch directories
    scratch_root: PathBuf,
    /// wall-clock limit per invocation
    timeout:      Duration,
    /// per-stream cap on captured output
    output_limit: usize,
}

impl JavacCompiler {
    /// Locates `javac` on `PATH` and configures it from `config`.
    pub fn new(config: &JudgeConfig) -> Result<Self, JudgeError> {
        Ok(Self::with_javac(javac_path()?, config))
    }

    /// Uses the given `javac` executable.
    pub fn with_javac(javac: impl Into<OsString>, config: &JudgeConfig) -> Self {
        Self {
            javac:        javac.into(),
            class_path:   vec![config.junit_jar()],
            scratch_root: config.scratch_dir(),
            timeout:      config.javac_timeout(),
            output_limit: config.max_output_bytes(),
        }
    }

    /// Arguments for compiling `files` into `out`.
    fn arguments(&self, out: &Path, files: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-d".into(),
            out.as_os_str().to_owned(),
            "-g".into(),
            "-encoding".into(),
            "UTF-8".into(),
            "-Xdiags:verbose".into(),
            "-proc:none".into(),
        ];
        if !self.class_path.is_empty() {
            args.push("--class-path".into());
            args.push(classpath(&self.class_path).into());
        }
        args.extend(files.iter().map(|f| f.as_os_str().to_owned()));
        args
    }
}

impl Compiler for JavacCompiler {
    async fn compile(&self, units: &[SourceUnit]) -> Result<Compilation, JudgeError> {
        ensure_distinct(units)?;
        if units.is_empty() {
            return Ok(Compilation::Success(CompiledArtifacts::new()));
        }

        let scratch = ScratchDir::create(&self.scratch_root, "javac")?;
        let src_dir = scratch.path().join("src");
        let out_dir = scratch.path().join("out");
        tokio::fs::create_dir_all(&out_dir).await?;

        let mut files = Vec::with_capacity(units.len());
        for unit in units {
            let relative = Path::new("src").join(unit.file_identity());
            let absolute = src_dir.join(unit.file_identity());
            if let Some(parent) = absolute.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&absolute, unit.text()).await?;
            files.push(relative);
        }

        let args = self.arguments(Path::new("out"), &files);
        debug!(units = units.len(), "invoking javac");
        let collected = process::run_collect(
            &self.javac,
            &args,
            Some(scratch.path()),
            Some(self.timeout),
            self.output_limit,
        )
        .await?;

        if !collected.status.success() {
            let failure = CompileFailure::from_javac_output(collected.combined_output(), units);
            info!(
                units = ?failure.units,
                diagnostics = failure.diagnostics.len(),
                "javac reported errors"
            );
            return Ok(Compilation::Failure(failure));
        }

        let artifacts = collect_artifacts(&out_dir, units).await?;
        Ok(Compilation::Success(artifacts))
    }
}

/// Reads every class file below `out_dir` and groups them per unit.
///
/// A class belongs to the unit whose file its `SourceFile` attribute names,
/// so top-level helpers declared next to the public class stay with it.
/// Without that attribute the outermost simple name decides, and classes
/// matching no unit go to the first one.
pub async fn collect_artifacts(
    out_dir: &Path,
    units: &[SourceUnit],
) -> Result<CompiledArtifacts, JudgeError> {
    let files = find_files("class", out_dir)
        .map_err(|e| JudgeError::internal(InternalCategory::Io, format!("{e:#}")))?;

    let mut grouped: Vec<BTreeMap<String, Vec<u8>>> = vec![BTreeMap::new(); units.len()];
    for file in files {
        let bytes = tokio::fs::read(&file).await?;
        let info = read_class_info(&bytes).ok();
        let Some(binary_name) = info
            .as_ref()
            .map(|i| i.this_class.clone())
            .or_else(|| binary_name(out_dir, &file))
        else {
            continue;
        };
        let source_file = info.as_ref().and_then(|i| i.source_file.as_deref());
        let index = owning_unit(units, source_file, &binary_name);
        if let Some(group) = grouped.get_mut(index) {
            group.insert(binary_name, bytes);
        }
    }

    Ok(units
        .iter()
        .zip(grouped)
        .map(|(unit, classes)| {
            (
                unit.name().to_string(),
                CompiledArtifact::new(unit, classes),
            )
        })
        .collect())
}

/// Index of the unit a class was compiled from.
fn owning_unit(units: &[SourceUnit], source_file: Option<&str>, binary_name: &str) -> usize {
    let by_source = source_file.and_then(|file| {
        let mut matching = units
            .iter()
            .positions(|u| file.strip_suffix(".java") == Some(u.simple_name()));
        // two units in different packages may share a file name
        match (matching.next(), matching.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    });
    let outer = outer_simple_name(binary_name);
    by_source
        .or_else(|| units.iter().position(|u| u.simple_name() == outer))
        .unwrap_or(0)
}

/// `out/a/b/Foo$1.class` becomes `a.b.Foo$1`.
fn binary_name(out_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(out_dir).ok()?;
    let stem = relative.with_extension("");
    let parts: Vec<String> = stem
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}
