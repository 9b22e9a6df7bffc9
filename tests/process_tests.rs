#![cfg(unix)]

use std::{ffi::OsString, time::Duration};

use quiz_judge::{
    InternalCategory, JudgeError,
    process::{ProcessError, run_collect},
};

fn args(list: &[&str]) -> Vec<OsString> {
    list.iter().map(OsString::from).collect()
}

#[tokio::test]
async fn collects_both_streams() {
    let collected = run_collect(
        "sh",
        &args(&["-c", "echo out; echo err >&2"]),
        None,
        Some(Duration::from_secs(10)),
        1024,
    )
    .await
    .expect("sh runs");
    assert!(collected.status.success());
    assert_eq!(collected.stdout, b"out\n");
    assert_eq!(collected.stderr, b"err\n");
    assert!(!collected.truncated);
    assert_eq!(collected.combined_output(), "err\nout\n");
}

#[tokio::test]
async fn runs_in_the_requested_directory() {
    let dir = std::env::temp_dir();
    let collected = run_collect("pwd", &[], Some(&dir), None, 4096)
        .await
        .expect("pwd runs");
    let printed = String::from_utf8_lossy(&collected.stdout).trim().to_string();
    let expected = dir.canonicalize().unwrap();
    assert_eq!(std::path::PathBuf::from(printed).canonicalize().unwrap(), expected);
}

#[tokio::test]
async fn output_beyond_the_limit_is_dropped() {
    let collected = run_collect(
        "sh",
        &args(&["-c", "head -c 5000 /dev/zero"]),
        None,
        Some(Duration::from_secs(10)),
        100,
    )
    .await
    .expect("sh runs");
    assert_eq!(collected.stdout.len(), 100);
    assert!(collected.truncated);
}

#[tokio::test]
async fn deadline_kills_the_child() {
    let err = run_collect(
        "sleep",
        &args(&["5"]),
        None,
        Some(Duration::from_millis(100)),
        1024,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ProcessError::TimedOut(_)));
    match JudgeError::from(err) {
        JudgeError::Internal(e) => assert_eq!(e.category, InternalCategory::Timeout),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn deadline_releases_pipes_held_by_grandchildren() {
    let marker = std::env::temp_dir().join(format!("quiz-judge-released-{}", uuid::Uuid::new_v4()));
    // the background job outlives `sh`; once nobody reads its pipe, `cat`
    // fails with EPIPE and the marker appears
    let script = format!(
        "( trap '' PIPE; sleep 0.5; cat /dev/zero; touch '{}' ) & echo started",
        marker.display()
    );
    let err = run_collect(
        "sh",
        &args(&["-c", &script]),
        None,
        Some(Duration::from_millis(200)),
        1024,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ProcessError::TimedOut(_)));

    let mut released = false;
    for _ in 0..50 {
        if marker.exists() {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let _ = std::fs::remove_file(&marker);
    assert!(released, "output pipe was still being drained after the deadline");
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let err = run_collect("quiz-judge-no-such-program", &[], None, None, 1024)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::Spawn { .. }));
    match JudgeError::from(err) {
        JudgeError::Internal(e) => {
            assert_eq!(e.category, InternalCategory::ToolchainUnavailable)
        }
        other => panic!("unexpected {other:?}"),
    }
}
