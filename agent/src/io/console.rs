//! Human confirmation and free-text input.
//!
//! The driver only ever needs two capabilities from the operator: a yes/no
//! confirmation for destructive actions, and a free-text answer to an
//! information request. Terminal details stay behind this seam.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

pub trait HumanIo {
    /// Ask a yes/no question. `true` means approved.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;

    /// Ask a free-text question and return the operator's answer.
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Stdin/stderr console implementation.
pub struct Console;

impl Console {
    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read from stdin")?;
        Ok(line.trim().to_string())
    }

    fn write_prompt(&self, prompt: &str) -> Result<()> {
        let mut err = std::io::stderr().lock();
        write!(err, "{prompt}").context("write prompt")?;
        err.flush().context("flush prompt")
    }
}

impl HumanIo for Console {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self.write_prompt(&format!("{prompt} (y/n): "))?;
        let answer = self.read_line()?;
        Ok(answer.eq_ignore_ascii_case("y"))
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.write_prompt(&format!("{prompt}\nYour response: "))?;
        self.read_line()
    }
}
