//! CLI entry point for the planner/executor loop driver.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};

use agent::core::types::{DuplicatePolicy, ParserKind};
use agent::driver::{AbortReason, FinalState, RunOutcome, RunRequest, run_task};
use agent::exit_codes;
use agent::io::command::ShellDispatcher;
use agent::io::completion::HttpCompletionClient;
use agent::io::config::load_config;
use agent::io::console::Console;
use agent::io::task::resolve_task;
use agent::io::transcript_log::append_transcript;
use agent::logging;

#[derive(Parser)]
#[command(
    name = "agent",
    version,
    about = "Turn-based planner/executor loop driver"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive one task to completion through the planner/executor loop.
    Run {
        /// Task statement. Falls back to AGENT_TASK, AGENT_TASK_FILE, then
        /// an interactive prompt.
        task: Option<String>,
        /// Run without an operator: skip information requests and dispatch
        /// destructive actions unconfirmed.
        #[arg(long)]
        non_interactive: bool,
        /// Response grammar the planner is instructed to use.
        #[arg(long, value_enum, default_value_t = ParserArg::Text)]
        parser: ParserArg,
        /// Duplicate-section resolution policy (text grammar). Duplicates
        /// fail the decode when omitted.
        #[arg(long, value_enum)]
        duplicates: Option<DuplicatesArg>,
        /// Override the configured consecutive decode-failure limit.
        #[arg(long)]
        max_failures: Option<u32>,
        /// Path to the agent config file.
        #[arg(long, default_value = "agent.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ParserArg {
    Text,
    Json,
}

impl From<ParserArg> for ParserKind {
    fn from(arg: ParserArg) -> Self {
        match arg {
            ParserArg::Text => Self::Text,
            ParserArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DuplicatesArg {
    KeepFirst,
    KeepLast,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(arg: DuplicatesArg) -> Self {
        match arg {
            DuplicatesArg::KeepFirst => Self::KeepFirst,
            DuplicatesArg::KeepLast => Self::KeepLast,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            task,
            non_interactive,
            parser,
            duplicates,
            max_failures,
            config,
        } => cmd_run(task, non_interactive, parser, duplicates, max_failures, &config),
    }
}

fn cmd_run(
    task: Option<String>,
    non_interactive: bool,
    parser: ParserArg,
    duplicates: Option<DuplicatesArg>,
    max_failures: Option<u32>,
    config_path: &Path,
) -> Result<i32> {
    let mut cfg = load_config(config_path)?;
    cfg.apply_env();
    let parser = ParserKind::from(parser);

    let failure_limit = max_failures.unwrap_or(cfg.max_consecutive_failures);
    if failure_limit == 0 {
        return Err(anyhow!("--max-failures must be > 0"));
    }

    let mut console = Console;
    let task = resolve_task(task, &mut console)?;
    println!("Task: {task}");

    let client = HttpCompletionClient::new(&cfg, parser)?;
    let dispatcher = ShellDispatcher::new(
        Duration::from_secs(cfg.command_timeout_secs),
        cfg.command_output_limit_bytes,
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            eprintln!("interrupt received, stopping the run...");
            cancel.store(true, Ordering::SeqCst);
        })
        .context("install interrupt handler")?;
    }

    let request = RunRequest {
        task,
        interactive: !non_interactive,
        parser,
        duplicate_policy: duplicates.map(Into::into),
        failure_limit,
    };
    let outcome = run_task(&client, &dispatcher, &mut console, &cancel, &request)?;

    if let Some(path) = &cfg.transcript_log_path {
        append_transcript(Path::new(path), &outcome.transcript)
            .context("persist run transcript")?;
    }

    print_report(&outcome);
    Ok(match outcome.state {
        FinalState::Completed => exit_codes::OK,
        FinalState::Aborted(_) => exit_codes::ABORTED,
    })
}

fn print_report(outcome: &RunOutcome) {
    match &outcome.state {
        FinalState::Completed => {
            if let Some(summary) = &outcome.summary {
                println!("Task completed: {summary}");
            }
        }
        FinalState::Aborted(AbortReason::FailureBudgetExhausted {
            consecutive_failures,
            last_response,
        }) => {
            println!("Run aborted: {consecutive_failures} undecodable responses in a row.");
            println!("Last raw response:\n{last_response}");
        }
        FinalState::Aborted(AbortReason::Interrupted) => {
            println!("Run aborted: interrupted.");
        }
    }
    let stats = &outcome.stats;
    println!("Execution statistics:");
    println!("  Time elapsed: {:.2} seconds", stats.elapsed.as_secs_f64());
    println!("  Model calls: {}", stats.model_calls);
    println!("  Total tokens used: {}", stats.tokens_used);
    println!("  Turns executed: {}", stats.turns_executed);
}
