#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use quiz_judge::{
    CompilationCache, Judge, JudgeConfig,
    error::{InternalCategory, JudgeError},
    java::{
        Compilation, CompileFailure, CompiledArtifact, Compiler, HostNamespace, LoadedUnits,
        RunOutcome, SourceUnit, TestFailure, TestRunner, unit::ensure_distinct,
    },
};
use uuid::Uuid;

/// A test template using the default placeholder.
pub const TEMPLATE: &str = "import org.junit.jupiter.api.Test;\n\
                            public class CodiceUtenteTest {\n    \
                            @Test\n    void adds() {\n        \
                            CodiceUtente c = new CodiceUtente();\n    }\n}\n";

/// A candidate declaring `name`, padded above the minimum length.
pub fn candidate(name: &str) -> String {
    format!("public class {name} {{\n    int add(int a, int b) {{ return a + b; }}\n}}\n")
}

/// A fresh scratch directory under the system temp dir.
pub fn temp_root(label: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("quiz-judge-{label}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create temp root");
    root
}

/// Builds a minimal class file for `name` whose constant pool references
/// `java.lang.Object` and every class in `refs`.
pub fn class_file(name: &str, refs: &[&str]) -> Vec<u8> {
    class_file_from(name, refs, None)
}

/// Like [`class_file`], with a `SourceFile` attribute naming `source` when
/// one is given, the way `javac -g` emits it.
pub fn class_file_from(name: &str, refs: &[&str], source: Option<&str>) -> Vec<u8> {
    let mut pool: Vec<Vec<u8>> = Vec::new();
    let utf8_index = |pool: &mut Vec<Vec<u8>>, text: &str| -> u16 {
        let mut utf8 = vec![1u8];
        utf8.extend_from_slice(&(text.len() as u16).to_be_bytes());
        utf8.extend_from_slice(text.as_bytes());
        pool.push(utf8);
        pool.len() as u16
    };
    let class_index = |pool: &mut Vec<Vec<u8>>, class: &str| -> u16 {
        let name_index = utf8_index(pool, &class.replace('.', "/"));
        let mut class_entry = vec![7u8];
        class_entry.extend_from_slice(&name_index.to_be_bytes());
        pool.push(class_entry);
        pool.len() as u16
    };

    let this_index = class_index(&mut pool, name);
    let super_index = class_index(&mut pool, "java.lang.Object");
    for r in refs {
        class_index(&mut pool, r);
    }
    let source_attribute = source.map(|file| {
        (
            utf8_index(&mut pool, "SourceFile"),
            utf8_index(&mut pool, file),
        )
    });

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&61u16.to_be_bytes());
    bytes.extend_from_slice(&((pool.len() + 1) as u16).to_be_bytes());
    for entry in &pool {
        bytes.extend_from_slice(entry);
    }
    bytes.extend_from_slice(&0x0021u16.to_be_bytes());
    bytes.extend_from_slice(&this_index.to_be_bytes());
    bytes.extend_from_slice(&super_index.to_be_bytes());
    // interfaces, fields, methods
    for _ in 0..3 {
        bytes.extend_from_slice(&0u16.to_be_bytes());
    }
    match source_attribute {
        Some((attribute_name, file)) => {
            bytes.extend_from_slice(&1u16.to_be_bytes());
            bytes.extend_from_slice(&attribute_name.to_be_bytes());
            bytes.extend_from_slice(&2u32.to_be_bytes());
            bytes.extend_from_slice(&file.to_be_bytes());
        }
        None => bytes.extend_from_slice(&0u16.to_be_bytes()),
    }
    bytes
}

/// Compiler double: a unit whose text contains `SYNTAX_ERROR` (or
/// `FAILS_WITH_TEST`, in a joint compile only) fails with a javac-style
/// diagnostic on line 3 of its own file; everything else
/// compiles to one class referencing the other units it mentions. A unit
/// mentioning `USES_MISSING` also references a class nobody provides.
#[derive(Clone, Default)]
pub struct FakeCompiler {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeCompiler {
    /// Unit names of every call so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of joint (multi-unit) compilations so far.
    pub fn joint_compiles(&self) -> usize {
        self.calls().iter().filter(|c| c.len() > 1).count()
    }
}

impl Compiler for FakeCompiler {
    async fn compile(&self, units: &[SourceUnit]) -> Result<Compilation, JudgeError> {
        ensure_distinct(units)?;
        self.calls
            .lock()
            .unwrap()
            .push(units.iter().map(|u| u.name().to_string()).collect());

        let broken: Vec<&SourceUnit> = units
            .iter()
            .filter(|u| {
                u.text().contains("SYNTAX_ERROR")
                    || (units.len() > 1 && u.text().contains("FAILS_WITH_TEST"))
            })
            .collect();
        if !broken.is_empty() {
            let output: String = broken
                .iter()
                .map(|u| format!("src/{}:3: error: ';' expected\n", u.file_identity()))
                .collect();
            return Ok(Compilation::Failure(CompileFailure::from_javac_output(
                output, units,
            )));
        }

        let mut artifacts = BTreeMap::new();
        for unit in units {
            let mut refs: Vec<&str> = units
                .iter()
                .filter(|other| other.name() != unit.name() && unit.text().contains(other.name()))
                .map(|other| other.name())
                .collect();
            if unit.text().contains("USES_MISSING") {
                refs.push("com.example.Missing");
            }
            let classes = BTreeMap::from([(unit.name().to_string(), class_file(unit.name(), &refs))]);
            artifacts.insert(unit.name().to_string(), CompiledArtifact::new(unit, classes));
        }
        Ok(Compilation::Success(artifacts))
    }
}

/// What the runner double does when asked to run.
#[derive(Clone)]
pub enum Script {
    /// Return this outcome.
    Outcome(RunOutcome),
    /// Sleep, then pass.
    Sleep(Duration),
    /// Panic.
    Panic,
}

/// Runner double that checks both units are loaded, then follows a script.
#[derive(Clone)]
pub struct FakeRunner {
    script:    Script,
    runs:      Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak:      Arc<AtomicUsize>,
}

impl FakeRunner {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            runs: Arc::default(),
            in_flight: Arc::default(),
            peak: Arc::default(),
        }
    }

    /// Every test passes.
    pub fn passing(tests: u32) -> Self {
        Self::new(Script::Outcome(RunOutcome::passed(tests)))
    }

    /// One failure among `tests`.
    pub fn failing(tests: u32, name: &str, message: &str, line: u32) -> Self {
        Self::new(Script::Outcome(RunOutcome::failed(
            tests,
            vec![TestFailure {
                name:    name.to_string(),
                message: message.to_string(),
                line,
            }],
        )))
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl TestRunner for FakeRunner {
    async fn run(
        &self,
        loaded: &LoadedUnits,
        candidate_unit: &str,
        test_unit: &str,
    ) -> Result<RunOutcome, JudgeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        for unit in [candidate_unit, test_unit] {
            let class = loaded
                .unit(unit)
                .and_then(|a| a.primary_class())
                .map(|c| loaded.classes_dir().join(format!("{}.class", c.replace('.', "/"))));
            match class {
                Some(path) if path.is_file() => {}
                _ => {
                    return Err(JudgeError::internal(
                        InternalCategory::Resolution,
                        format!("{unit} not loaded"),
                    ));
                }
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = match &self.script {
            Script::Outcome(outcome) => Ok(outcome.clone()),
            Script::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(RunOutcome::passed(1))
            }
            Script::Panic => panic!("runner exploded"),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Config pointing scratch space at a fresh temp directory.
pub fn config() -> JudgeConfig {
    JudgeConfig::builder()
        .scratch_dir(temp_root("scratch"))
        .build()
}

/// A judge over the doubles with platform-only host resolution.
pub fn judge_with(
    config: JudgeConfig,
    compiler: FakeCompiler,
    runner: FakeRunner,
) -> Judge<FakeCompiler, FakeRunner> {
    let cache = Arc::new(CompilationCache::new(config.cache_capacity()));
    Judge::new(config, compiler, runner, cache).with_host(HostNamespace::platform())
}
