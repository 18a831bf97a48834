//! The turn-driving state machine.
//!
//! One run is a single-threaded cooperative loop: request a completion over
//! the full transcript, decode it, route the intent (dispatch a command, ask
//! the operator, or finish), append the outcome to the transcript, repeat.
//! The only mutable run state is the transcript, the failure budget, and the
//! run statistics, all owned here and mutated once per state transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::core::budget::FailureBudget;
use crate::core::decode;
use crate::core::types::{
    CommandResult, DecodeFailure, DuplicatePolicy, Intent, Message, ParserKind, Transcript,
};
use crate::io::command::Dispatcher;
use crate::io::completion::CompletionClient;
use crate::io::console::HumanIo;

/// Pause between retries after a transport-level completion failure. The
/// retry itself is unbounded; only cancellation breaks out.
const TRANSPORT_RETRY_PAUSE: Duration = Duration::from_millis(250);

const NON_INTERACTIVE_INFO_REPLY: &str = "Skipped due to non-interactive mode. Please continue \
    with the task using available information (or terminate if it is impossible or dangerous).";

const DECLINED_ACTION_REPLY: &str = "The last action was declined by the user. Please suggest \
    an alternative approach or continue with other actions.";

/// Parameters for one task run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The task statement seeded into the transcript.
    pub task: String,
    /// Whether a human operator is available for confirmations and
    /// information requests.
    pub interactive: bool,
    /// Active response grammar.
    pub parser: ParserKind,
    /// Duplicate-section resolution policy (text grammar). `None` fails
    /// closed on duplicates.
    pub duplicate_policy: Option<DuplicatePolicy>,
    /// Consecutive decode failures tolerated before aborting.
    pub failure_limit: u32,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalState {
    /// The planner reported completion.
    Completed,
    /// The run ended without the planner reporting completion.
    Aborted(AbortReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Too many undecodable responses in a row. Carries the count and the
    /// last raw response for diagnosis.
    FailureBudgetExhausted {
        consecutive_failures: u32,
        last_response: String,
    },
    /// A cancellation request (e.g. SIGINT) was observed.
    Interrupted,
}

/// Per-run statistics, observable for telemetry. No process-wide globals:
/// the driver owns these and returns them with the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Planner turns processed (one per completion received).
    pub turns_executed: u32,
    /// Successful completion calls made.
    pub model_calls: u32,
    /// Total tokens reported by the generation service.
    pub tokens_used: u64,
    /// Consecutive decode failures at run end.
    pub consecutive_failures: u32,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Result of a task run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: FinalState,
    /// The planner's completion summary, when the run completed.
    pub summary: Option<String>,
    pub transcript: Transcript,
    pub stats: RunStats,
}

/// Drive one task to completion or abort.
///
/// `cancel` is checked at the top of every state transition; once set the
/// run jumps to `Aborted` with statistics and transcript intact.
pub fn run_task<C, D, H>(
    client: &C,
    dispatcher: &D,
    human: &mut H,
    cancel: &AtomicBool,
    request: &RunRequest,
) -> Result<RunOutcome>
where
    C: CompletionClient,
    D: Dispatcher,
    H: HumanIo,
{
    info!(task = %request.task, interactive = request.interactive, "starting task");
    let start = Instant::now();
    let mut transcript: Transcript = vec![Message::user(format!("Task: {}", request.task))];
    let mut budget = FailureBudget::new(request.failure_limit);
    let mut stats = RunStats::default();

    let interrupted = (FinalState::Aborted(AbortReason::Interrupted), None);

    let (state, summary) = 'run: loop {
        if cancel.load(Ordering::SeqCst) {
            break 'run interrupted;
        }

        // AwaitResponse: transport failures pause briefly and retry without
        // touching the decode budget (no decode was attempted).
        let completion = loop {
            if cancel.load(Ordering::SeqCst) {
                break 'run interrupted;
            }
            match client.complete(&transcript) {
                Ok(completion) => break completion,
                Err(err) => {
                    warn!(err = %err, "completion transport failure, retrying");
                    thread::sleep(TRANSPORT_RETRY_PAUSE);
                }
            }
        };
        stats.model_calls += 1;
        stats.tokens_used += completion.total_tokens;
        stats.turns_executed += 1;
        transcript.push(Message::assistant(completion.text.clone()));

        // Decode
        let intent = match decode(request.parser, &completion.text, request.duplicate_policy) {
            Ok(intent) => {
                budget.record_success();
                intent
            }
            Err(failure) => {
                warn!(%failure, "undecodable planner turn");
                transcript.push(Message::user(corrective_message(&failure)));
                if budget.record_failure() {
                    error!(
                        consecutive_failures = budget.consecutive_failures(),
                        "failure budget exhausted, aborting run"
                    );
                    break 'run (
                        FinalState::Aborted(AbortReason::FailureBudgetExhausted {
                            consecutive_failures: budget.consecutive_failures(),
                            last_response: completion.text,
                        }),
                        None,
                    );
                }
                // Retrying
                continue;
            }
        };

        match intent {
            Intent::TaskComplete { summary } => {
                info!(summary = %summary, "task complete");
                break 'run (FinalState::Completed, Some(summary));
            }
            Intent::RequestInfo { prompt, subtask } => {
                info!(subtask = %subtask, "planner requested information");
                if request.interactive {
                    if cancel.load(Ordering::SeqCst) {
                        break 'run interrupted;
                    }
                    let answer = human.ask(&prompt)?;
                    transcript.push(Message::user(answer));
                } else {
                    info!(prompt = %prompt, "skipping information request (non-interactive)");
                    transcript.push(Message::user(NON_INTERACTIVE_INFO_REPLY));
                }
            }
            Intent::Action {
                command,
                explanation,
                expected_outcome,
                subtask,
                destructive,
            } => {
                info!(
                    command = %command,
                    explanation = %explanation,
                    expected_outcome = %expected_outcome,
                    subtask = %subtask,
                    "planner proposed action"
                );

                // Destructive action gate
                let mut confirmation_bypassed = false;
                if destructive {
                    if request.interactive {
                        if cancel.load(Ordering::SeqCst) {
                            break 'run interrupted;
                        }
                        warn!(command = %command, "destructive action, requesting confirmation");
                        let approved = human.confirm(&format!(
                            "Proposed action: {command}\nExpected outcome: {expected_outcome}\nDo you want to proceed?"
                        ))?;
                        if !approved {
                            // Declining is not a decode failure: no budget use.
                            info!("action declined by user");
                            transcript.push(Message::user(DECLINED_ACTION_REPLY));
                            continue;
                        }
                    } else {
                        warn!(command = %command, "destructive action dispatched without confirmation (non-interactive)");
                        confirmation_bypassed = true;
                    }
                }

                if cancel.load(Ordering::SeqCst) {
                    break 'run interrupted;
                }
                let result = dispatcher.run(&command)?;
                if result.exit_code == 0 {
                    info!("command executed successfully (exit code 0)");
                } else {
                    warn!(exit_code = result.exit_code, "command completed with non-zero exit code");
                }
                transcript.push(Message::user(dispatch_report(&result, confirmation_bypassed)));
            }
        }
    };

    stats.consecutive_failures = budget.consecutive_failures();
    stats.elapsed = start.elapsed();
    Ok(RunOutcome {
        state,
        summary,
        transcript,
        stats,
    })
}

/// Corrective message appended after a decode failure so the planner can
/// self-correct on the next turn.
fn corrective_message(failure: &DecodeFailure) -> String {
    match failure {
        DecodeFailure::ExclusiveViolation { present } => format!(
            "Your last response contained {}. Please provide only one of these in your response.",
            describe_exclusive(present)
        ),
        other => format!(
            "Your last response did not match the requested format ({other}). \
            Please provide your response strictly in the required format."
        ),
    }
}

fn describe_exclusive(present: &[String]) -> &'static str {
    let has = |key: &str| present.iter().any(|p| p == key);
    match (has("action"), has("request_info"), has("task_complete")) {
        (true, true, false) => "an action and a request for information",
        (true, false, true) => "an action and a task completion message",
        (false, true, true) => "a request for information and a task completion message",
        _ => "multiple exclusive items",
    }
}

/// Transcript entry carrying a dispatched command's outcome back to the
/// planner.
fn dispatch_report(result: &CommandResult, confirmation_bypassed: bool) -> String {
    let bypass_note = if confirmation_bypassed {
        "\nNote: this destructive action was dispatched without confirmation (non-interactive run)."
    } else {
        ""
    };
    format!(
        "OK, I ran the suggested command.{bypass_note}\nReturn code: {}\nFull command output:\nstdout:\n{}\nstderr:\n{}\n\nDoes this meet the expectations of the initial task? What's the next step?",
        result.exit_code, result.stdout, result.stderr
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use crate::test_support::{ScriptedClient, ScriptedDispatcher, ScriptedHuman, ScriptedTurn};

    const COMPLETE_TURN: &str = "===TASK_COMPLETE===\ntrue\n===SUMMARY===\ndone\n===END===\n";

    fn request(interactive: bool) -> RunRequest {
        RunRequest {
            task: "list files".to_string(),
            interactive,
            parser: ParserKind::Text,
            duplicate_policy: None,
            failure_limit: 3,
        }
    }

    fn idle_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn exclusive_violation_gets_a_naming_corrective_message() {
        let both = "===ACTION===\nls\n===TASK_COMPLETE===\ntrue\n===END===\n";
        let client = ScriptedClient::new(vec![
            ScriptedTurn::reply(both),
            ScriptedTurn::reply(COMPLETE_TURN),
        ]);
        let dispatcher = ScriptedDispatcher::new(Vec::new());
        let mut human = ScriptedHuman::new();
        let cancel = idle_cancel();

        let outcome =
            run_task(&client, &dispatcher, &mut human, &cancel, &request(true)).expect("run");

        assert_eq!(outcome.state, FinalState::Completed);
        let corrective = &outcome.transcript[2];
        assert_eq!(corrective.role, Role::User);
        assert!(
            corrective
                .content
                .contains("an action and a task completion message"),
            "got: {}",
            corrective.content
        );
    }

    #[test]
    fn generic_decode_failure_asks_for_strict_reformatting() {
        let client = ScriptedClient::new(vec![
            ScriptedTurn::reply("free-form prose without any markers"),
            ScriptedTurn::reply(COMPLETE_TURN),
        ]);
        let dispatcher = ScriptedDispatcher::new(Vec::new());
        let mut human = ScriptedHuman::new();
        let cancel = idle_cancel();

        let outcome =
            run_task(&client, &dispatcher, &mut human, &cancel, &request(true)).expect("run");

        assert_eq!(outcome.state, FinalState::Completed);
        assert!(outcome.transcript[2].content.contains("did not match the requested format"));
        assert_eq!(outcome.stats.consecutive_failures, 0);
    }

    #[test]
    fn transport_failures_retry_without_charging_the_budget() {
        let client = ScriptedClient::new(vec![
            ScriptedTurn::TransportFailure,
            ScriptedTurn::TransportFailure,
            ScriptedTurn::reply(COMPLETE_TURN),
        ]);
        let dispatcher = ScriptedDispatcher::new(Vec::new());
        let mut human = ScriptedHuman::new();
        let cancel = idle_cancel();

        let outcome = run_task(
            &client,
            &dispatcher,
            &mut human,
            &cancel,
            &RunRequest {
                failure_limit: 1,
                ..request(true)
            },
        )
        .expect("run");

        assert_eq!(outcome.state, FinalState::Completed);
        assert_eq!(outcome.stats.model_calls, 1);
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn request_info_is_skipped_in_non_interactive_runs() {
        let info_turn = "===REQUEST_INFO===\nWhich dir?\n===SUBTASK===\npick dir\n===END===\n";
        let client = ScriptedClient::new(vec![
            ScriptedTurn::reply(info_turn),
            ScriptedTurn::reply(COMPLETE_TURN),
        ]);
        let dispatcher = ScriptedDispatcher::new(Vec::new());
        let mut human = ScriptedHuman::new();
        let cancel = idle_cancel();

        let outcome =
            run_task(&client, &dispatcher, &mut human, &cancel, &request(false)).expect("run");

        assert_eq!(outcome.state, FinalState::Completed);
        assert!(outcome.transcript[2].content.contains("non-interactive mode"));
    }

    #[test]
    fn request_info_blocks_for_the_operator_when_interactive() {
        let info_turn = "===REQUEST_INFO===\nWhich dir?\n===SUBTASK===\npick dir\n===END===\n";
        let client = ScriptedClient::new(vec![
            ScriptedTurn::reply(info_turn),
            ScriptedTurn::reply(COMPLETE_TURN),
        ]);
        let dispatcher = ScriptedDispatcher::new(Vec::new());
        let mut human = ScriptedHuman::new().with_answers(vec!["/tmp".to_string()]);
        let cancel = idle_cancel();

        let outcome =
            run_task(&client, &dispatcher, &mut human, &cancel, &request(true)).expect("run");

        assert_eq!(outcome.state, FinalState::Completed);
        assert_eq!(outcome.transcript[2].content, "/tmp");
        assert_eq!(human.ask_prompts, vec!["Which dir?".to_string()]);
    }

    #[test]
    fn destructive_dispatch_is_flagged_when_confirmation_is_bypassed() {
        let destructive_turn = "===ACTION===\nrm -rf build\n===EXPLANATION===\nclean\n\
            ===EXPECTED_OUTCOME===\nremoved\n===SUBTASK===\ncleanup\n\
            ===IS_DESTRUCTIVE===\ntrue\n===END===\n";
        let client = ScriptedClient::new(vec![
            ScriptedTurn::reply(destructive_turn),
            ScriptedTurn::reply(COMPLETE_TURN),
        ]);
        let dispatcher = ScriptedDispatcher::new(vec![CommandResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        }]);
        let mut human = ScriptedHuman::new();
        let cancel = idle_cancel();

        let outcome =
            run_task(&client, &dispatcher, &mut human, &cancel, &request(false)).expect("run");

        assert_eq!(outcome.state, FinalState::Completed);
        assert_eq!(dispatcher.commands(), vec!["rm -rf build".to_string()]);
        assert!(outcome.transcript[2].content.contains("without confirmation"));
    }

    #[test]
    fn pre_set_cancellation_aborts_before_any_completion_call() {
        let client = ScriptedClient::new(Vec::new());
        let dispatcher = ScriptedDispatcher::new(Vec::new());
        let mut human = ScriptedHuman::new();
        let cancel = AtomicBool::new(true);

        let outcome =
            run_task(&client, &dispatcher, &mut human, &cancel, &request(true)).expect("run");

        assert_eq!(outcome.state, FinalState::Aborted(AbortReason::Interrupted));
        assert_eq!(client.calls(), 0);
        assert_eq!(outcome.transcript.len(), 1);
    }
}
