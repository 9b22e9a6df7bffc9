use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use quiz_judge::{
    JudgeConfig,
    config::{DEFAULT_PLACEHOLDER, JUNIT_PLATFORM},
};

#[test]
fn defaults_match_the_documented_values() {
    let config = JudgeConfig::default();
    assert_eq!(config.placeholder(), DEFAULT_PLACEHOLDER);
    assert_eq!(config.placeholder(), "CodiceUtente");
    assert_eq!(config.source_bounds(), (10, 10_000));
    assert_eq!(config.javac_timeout(), Duration::from_secs(30));
    assert_eq!(config.java_timeout(), Duration::from_secs(20));
    assert_eq!(config.submission_timeout(), Duration::from_secs(90));
    assert!(config.max_concurrent() >= 1);
    assert_eq!(config.cache_capacity(), 512);
    assert!(config.junit_jar().is_absolute());
    assert!(config.junit_jar().ends_with(Path::new("lib").join(JUNIT_PLATFORM)));
    assert!(config.scratch_dir().is_absolute());
    assert_eq!(config.max_output_bytes(), 1024 * 1024);
    assert!(config.cache_file().is_none());
    assert!(config.jvm_options().iter().any(|o| o.starts_with("-Xmx")));
}

#[test]
fn builder_overrides_individual_fields() {
    let config = JudgeConfig::builder()
        .placeholder("Student")
        .min_source_chars(1usize)
        .max_concurrent(0usize)
        .cache_capacity(0usize)
        .cache_file(Some(PathBuf::from("cache.json")))
        .build();
    assert_eq!(config.placeholder(), "Student");
    assert_eq!(config.source_bounds(), (1, 10_000));
    assert_eq!(config.max_concurrent(), 1);
    assert_eq!(config.cache_capacity(), 1);
    assert_eq!(config.cache_file(), Some(std::path::Path::new("cache.json")));
}

#[test]
fn relative_directories_are_anchored_at_the_working_directory() {
    let config = JudgeConfig::builder()
        .lib_dir(PathBuf::from("vendor/jars"))
        .scratch_dir(PathBuf::from("target/scratch"))
        .build();
    let cwd = std::env::current_dir().unwrap();
    assert_eq!(
        config.junit_jar(),
        cwd.join("vendor/jars").join(JUNIT_PLATFORM)
    );
    assert_eq!(config.scratch_dir(), cwd.join("target/scratch"));
    assert_eq!(config.lib_dir(), Path::new("vendor/jars"));
}

#[test]
fn environment_overrides_defaults() {
    // SAFETY: this is the only test in this binary touching these variables.
    unsafe {
        std::env::set_var("JUDGE_PLACEHOLDER", "Learner");
        std::env::set_var("JUDGE_SOURCE_MAX_CHARS", "500");
        std::env::set_var("JUDGE_JAVA_TIMEOUT_SECS", "5");
        std::env::set_var("JUDGE_CACHE_FILE", "/tmp/quiz-judge-cache.json");
        std::env::set_var("JUDGE_WORKERS", "not a number");
        std::env::set_var("JUDGE_JVM_OPTIONS", "-Xmx64m -Xss512k");
    }
    let config = JudgeConfig::from_env();
    assert_eq!(config.placeholder(), "Learner");
    assert_eq!(config.source_bounds(), (10, 500));
    assert_eq!(config.java_timeout(), Duration::from_secs(5));
    assert_eq!(
        config.cache_file(),
        Some(std::path::Path::new("/tmp/quiz-judge-cache.json"))
    );
    assert_eq!(config.max_concurrent(), JudgeConfig::default().max_concurrent());
    assert_eq!(config.jvm_options(), ["-Xmx64m".to_string(), "-Xss512k".to_string()]);
}
