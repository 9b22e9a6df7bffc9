#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::PathBuf, time::Duration};

use typed_builder::TypedBuilder;

use crate::java::util::absolute;

/// file name for JUnit platform console standard jar
pub const JUNIT_PLATFORM: &str = "junit-platform-console-standalone-1.10.2.jar";

/// Token in a question's test template replaced by the learner's class name.
pub const DEFAULT_PLACEHOLDER: &str = "CodiceUtente";

/// Default JVM flags for the test process.
const DEFAULT_JVM_OPTIONS: &[&str] = &[
    "-Xmx256m",
    "-Xss1m",
    "-XX:+UseSerialGC",
    "-Djava.awt.headless=true",
    "-Dfile.encoding=UTF-8",
];

/// Runtime configuration for the judge.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
pub struct JudgeConfig {
    /// Placeholder substituted with the candidate class name.
    #[builder(default = DEFAULT_PLACEHOLDER.to_string())]
    placeholder:         String,
    /// Inclusive lower bound on candidate source length, in characters.
    #[builder(default = 10)]
    min_source_chars:    usize,
    /// Inclusive upper bound on candidate source length, in characters.
    #[builder(default = 10_000)]
    max_source_chars:    usize,
    /// Maximum time allowed for one javac invocation.
    #[builder(default = Duration::from_secs(30))]
    javac_timeout:       Duration,
    /// Maximum time allowed for one test JVM.
    #[builder(default = Duration::from_secs(20))]
    java_timeout:        Duration,
    /// Maximum time for a whole submission, compile to verdict.
    #[builder(default = Duration::from_secs(90))]
    submission_timeout:  Duration,
    /// Number of submissions allowed to compile or run at the same time.
    #[builder(default = default_workers())]
    max_concurrent:      usize,
    /// Maximum number of compiled test units kept in the cache.
    #[builder(default = 512)]
    cache_capacity:      usize,
    /// Directory holding the JUnit console jar.
    #[builder(default = PathBuf::from("lib"))]
    lib_dir:             PathBuf,
    /// Root for per-call scratch directories.
    #[builder(default = std::env::temp_dir().join("quiz-judge"))]
    scratch_dir:         PathBuf,
    /// Flags passed to the test JVM before the classpath.
    #[builder(default = DEFAULT_JVM_OPTIONS.iter().map(|s| s.to_string()).collect())]
    jvm_options:         Vec<String>,
    /// Per-stream cap on captured subprocess output.
    #[builder(default = 1024 * 1024)]
    max_output_bytes:    usize,
    /// Optional JSON snapshot of the compilation cache.
    cache_file:          Option<PathBuf>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        JudgeConfig::builder().build()
    }
}

impl JudgeConfig {
    /// Reads overrides from `JUDGE_*` environment variables on top of the
    /// defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let defaults = JudgeConfig::default();

        let placeholder = std::env::var("JUDGE_PLACEHOLDER")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.placeholder);

        let jvm_options = std::env::var("JUDGE_JVM_OPTIONS")
            .ok()
            .map(|v| v.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.jvm_options);

        Self {
            placeholder,
            min_source_chars: read_usize("JUDGE_SOURCE_MIN_CHARS", defaults.min_source_chars),
            max_source_chars: read_usize("JUDGE_SOURCE_MAX_CHARS", defaults.max_source_chars),
            javac_timeout: read_timeout_secs("JUDGE_JAVAC_TIMEOUT_SECS", defaults.javac_timeout),
            java_timeout: read_timeout_secs("JUDGE_JAVA_TIMEOUT_SECS", defaults.java_timeout),
            submission_timeout: read_timeout_secs(
                "JUDGE_SUBMISSION_TIMEOUT_SECS",
                defaults.submission_timeout,
            ),
            max_concurrent: read_usize("JUDGE_WORKERS", defaults.max_concurrent).max(1),
            cache_capacity: read_usize("JUDGE_CACHE_CAPACITY", defaults.cache_capacity).max(1),
            lib_dir: read_path("JUDGE_LIB_DIR").unwrap_or(defaults.lib_dir),
            scratch_dir: read_path("JUDGE_SCRATCH_DIR").unwrap_or(defaults.scratch_dir),
            jvm_options,
            max_output_bytes: read_usize("JUDGE_MAX_OUTPUT_BYTES", defaults.max_output_bytes),
            cache_file: read_path("JUDGE_CACHE_FILE"),
        }
    }

    /// Returns the placeholder token.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Returns the inclusive bounds on candidate source length.
    pub fn source_bounds(&self) -> (usize, usize) {
        (self.min_source_chars, self.max_source_chars)
    }

    /// Returns the configured javac timeout.
    pub fn javac_timeout(&self) -> Duration {
        self.javac_timeout
    }

    /// Returns the configured test JVM timeout.
    pub fn java_timeout(&self) -> Duration {
        self.java_timeout
    }

    /// Returns the per-submission timeout.
    pub fn submission_timeout(&self) -> Duration {
        self.submission_timeout
    }

    /// Returns the concurrency bound.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Returns the cache capacity.
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity.max(1)
    }

    /// Returns the library directory.
    pub fn lib_dir(&self) -> &std::path::Path {
        &self.lib_dir
    }

    /// Absolute path of the JUnit console jar inside the library directory.
    pub fn junit_jar(&self) -> PathBuf {
        absolute(&self.lib_dir().join(JUNIT_PLATFORM))
    }

    /// Returns the scratch root as an absolute path.
    pub fn scratch_dir(&self) -> PathBuf {
        absolute(&self.scratch_dir)
    }

    /// Returns the JVM flags for the test process.
    pub fn jvm_options(&self) -> &[String] {
        &self.jvm_options
    }

    /// Returns the output cap.
    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }

    /// Returns the cache snapshot path, if configured.
    pub fn cache_file(&self) -> Option<&std::path::Path> {
        self.cache_file.as_deref()
    }
}

/// Number of CPUs, or 2 when it cannot be determined.
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default: Duration) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Parses an environment variable into a `usize`.
fn read_usize(env: &str, default: usize) -> usize {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Reads a non-empty path from the environment.
fn read_path(env: &str) -> Option<PathBuf> {
    std::env::var(env)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
