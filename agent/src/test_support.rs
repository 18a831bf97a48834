//! Test-only scripted collaborators for driving the loop without network,
//! processes, or a terminal.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::types::{CommandResult, Message};
use crate::io::command::Dispatcher;
use crate::io::completion::{Completion, CompletionClient};
use crate::io::console::HumanIo;

/// One scripted generation-service turn.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Reply with this raw text.
    Reply(String),
    /// Simulate a transport-level failure.
    TransportFailure,
}

impl ScriptedTurn {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }
}

/// Completion client that replays a fixed script. Panics on calls beyond
/// the script, so tests catch unexpected extra turns.
pub struct ScriptedClient {
    turns: RefCell<VecDeque<ScriptedTurn>>,
    calls: Cell<u32>,
}

impl ScriptedClient {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: RefCell::new(turns.into()),
            calls: Cell::new(0),
        }
    }

    /// Completion calls attempted, including scripted transport failures.
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, _transcript: &[Message]) -> Result<Completion> {
        self.calls.set(self.calls.get() + 1);
        match self.turns.borrow_mut().pop_front() {
            Some(ScriptedTurn::Reply(text)) => Ok(Completion {
                text,
                total_tokens: 10,
            }),
            Some(ScriptedTurn::TransportFailure) => Err(anyhow!("scripted transport failure")),
            None => panic!("unexpected completion call #{}", self.calls.get()),
        }
    }
}

/// Dispatcher that records commands and replays fixed results. Panics on
/// dispatches beyond the script.
pub struct ScriptedDispatcher {
    results: RefCell<VecDeque<CommandResult>>,
    commands: RefCell<Vec<String>>,
}

impl ScriptedDispatcher {
    pub fn new(results: Vec<CommandResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Commands dispatched so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Dispatcher for ScriptedDispatcher {
    fn run(&self, command: &str) -> Result<CommandResult> {
        self.commands.borrow_mut().push(command.to_string());
        match self.results.borrow_mut().pop_front() {
            Some(result) => Ok(result),
            None => panic!("unexpected dispatch of '{command}'"),
        }
    }
}

/// Operator double with queued confirmations and answers. Panics when asked
/// something the test did not script.
#[derive(Default)]
pub struct ScriptedHuman {
    confirms: VecDeque<bool>,
    answers: VecDeque<String>,
    /// Prompts passed to `confirm`, in order.
    pub confirm_prompts: Vec<String>,
    /// Prompts passed to `ask`, in order.
    pub ask_prompts: Vec<String>,
}

impl ScriptedHuman {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confirms(mut self, confirms: Vec<bool>) -> Self {
        self.confirms = confirms.into();
        self
    }

    pub fn with_answers(mut self, answers: Vec<String>) -> Self {
        self.answers = answers.into();
        self
    }
}

impl HumanIo for ScriptedHuman {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self.confirm_prompts.push(prompt.to_string());
        match self.confirms.pop_front() {
            Some(answer) => Ok(answer),
            None => panic!("unexpected confirm: {prompt}"),
        }
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.ask_prompts.push(prompt.to_string());
        match self.answers.pop_front() {
            Some(answer) => Ok(answer),
            None => panic!("unexpected ask: {prompt}"),
        }
    }
}
