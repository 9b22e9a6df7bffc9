#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # quiz-judge
//!
//! Command line front end for the judge: judge a candidate file against a
//! question, extract a class name, or inspect the persisted compilation
//! cache. Configuration comes from `JUDGE_*` environment variables, which
//! may also be placed in a `.env` file.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use bpaf::*;
use dotenvy::dotenv;
use quiz_judge::{
    CompilationCache, DirectoryQuestionStore, Judge, JudgeConfig, JudgeError, QuestionId,
    java::extract_class_name, judge_question,
};
use serde_json::json;
use tracing::{Level, info, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Judge a candidate against a question
    Judge {
        /// question id
        question:  u64,
        /// directory of `<id>.java` templates
        questions: PathBuf,
        /// candidate source file
        candidate: PathBuf,
    },
    /// Print the primary class name of a file
    Extract(PathBuf),
    /// Summarise the cache snapshot
    Cache,
}

/// Global flags plus the chosen command.
#[derive(Debug, Clone)]
struct Opts {
    /// log at debug level
    verbose: bool,
    /// what to do
    cmd:     Cmd,
}

/// Parse the command line arguments and return `Opts`
fn options() -> Opts {
    /// parses a source file path
    fn f() -> impl Parser<PathBuf> {
        positional("FILE").help("Path of a java source file")
    }

    let question = long("question")
        .short('q')
        .help("Id of the question to judge against")
        .argument::<u64>("ID");
    let questions = long("questions")
        .help("Directory holding <ID>.java test templates")
        .argument::<PathBuf>("DIR")
        .fallback(PathBuf::from("questions"));
    let candidate = positional::<PathBuf>("CANDIDATE").help("Path of the learner's java file");

    let judge = construct!(Cmd::Judge {
        question,
        questions,
        candidate
    })
    .to_options()
    .command("judge")
    .help("Compile and test a candidate, printing the verdict as JSON");

    let extract = construct!(Cmd::Extract(f()))
        .to_options()
        .command("extract")
        .help("Print the primary class name declared in a file");

    let cache = pure(Cmd::Cache)
        .to_options()
        .command("cache")
        .help("Print a JSON summary of the persisted compilation cache");

    let verbose = short('v')
        .long("verbose")
        .help("Log debug output")
        .switch();
    let cmd = construct!([judge, extract, cache]);

    construct!(Opts { verbose, cmd })
        .to_options()
        .descr("Judge Java submissions against JUnit test templates")
        .run()
}

/// Runs the `judge` command.
async fn run_judge(question: u64, questions: PathBuf, candidate: PathBuf) -> Result<()> {
    let source = std::fs::read_to_string(&candidate)
        .with_context(|| format!("Could not read {}", candidate.display()))?;

    let config = JudgeConfig::from_env();
    let judge = Judge::from_config(config).map_err(|e| anyhow!("{e}"))?;
    let store = DirectoryQuestionStore::new(questions);

    let verdict = match judge_question(&judge, &store, QuestionId(question), &source).await {
        Ok(verdict) => verdict,
        Err(JudgeError::Precondition(e)) => bail!("submission rejected: {e}"),
        Err(JudgeError::Internal(e)) => bail!("{e}"),
    };

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    judge
        .persist_cache()
        .context("Failed to save the compilation cache")?;
    info!(status = ?verdict.status, "done");
    Ok(())
}

/// Runs the `cache` command.
fn run_cache() -> Result<()> {
    let config = JudgeConfig::from_env();
    let path = config
        .cache_file()
        .context("JUDGE_CACHE_FILE is not set")?;
    let cache = CompilationCache::load(path, config.cache_capacity())?;

    let entries: Vec<_> = cache
        .entries()
        .iter()
        .map(|e| {
            json!({
                "hash": e.hash,
                "question": e.question,
                "test_unit": e.test_unit,
                "success": e.success,
                "classes": e.artifact.as_ref().map(|a| a.classes().len()).unwrap_or(0),
                "created": e.created,
                "last_used": e.last_used,
            })
        })
        .collect();
    let summary = json!({
        "path": path.display().to_string(),
        "capacity": cache.capacity(),
        "len": cache.len(),
        "entries": entries,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let opts = options();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let level = if opts.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(fmt)
        .with(LevelFilter::from_level(level))
        .init();

    match opts.cmd {
        Cmd::Judge {
            question,
            questions,
            candidate,
        } => run_judge(question, questions, candidate).await?,
        Cmd::Extract(file) => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("Could not read {}", file.display()))?;
            match extract_class_name(&source) {
                Some(name) => println!("{name}"),
                None => bail!("no class declaration found in {}", file.display()),
            }
        }
        Cmd::Cache => run_cache()?,
    };

    Ok(())
}
