//! Terminal interaction adapter.
//!
//! Prompts are written to stderr so stdout stays reserved for the JSON
//! response.

use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Write};

use plcsync_core::interaction::{InteractionAdapter, InteractionError, InteractionResult};

/// Line-based yes/no prompt over any reader and writer.
pub struct PromptAdapter<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
    interactive: bool,
}

/// The adapter the binary uses: stdin for answers, stderr for prompts.
pub type StdioAdapter = PromptAdapter<io::StdinLock<'static>, io::Stderr>;

impl StdioAdapter {
    /// Adapter over the process's stdin. Reports `NonTty` on every prompt
    /// when stdin is not a terminal.
    pub fn stdio() -> Self {
        let interactive = io::stdin().is_terminal();
        PromptAdapter::new(io::stdin().lock(), io::stderr(), interactive)
    }
}

impl<R: BufRead, W: Write> PromptAdapter<R, W> {
    pub fn new(input: R, output: W, interactive: bool) -> Self {
        PromptAdapter {
            input: RefCell::new(input),
            output: RefCell::new(output),
            interactive,
        }
    }

    pub fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn write_line(&self, prefix: &str, message: &str) {
        let mut out = self.output.borrow_mut();
        let _ = writeln!(out, "{}{}", prefix, message);
        let _ = out.flush();
    }
}

/// Interpret one answer line. Blank input takes the default.
fn parse_answer(line: &str, default: bool) -> InteractionResult<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        other => Err(InteractionError::InvalidInput(other.to_string())),
    }
}

impl<R: BufRead, W: Write> InteractionAdapter for PromptAdapter<R, W> {
    fn ask_confirm(&self, prompt: &str, default: bool) -> InteractionResult<bool> {
        if !self.interactive {
            return Err(InteractionError::NonTty);
        }
        {
            let mut out = self.output.borrow_mut();
            let hint = if default { "[Y/n]" } else { "[y/N]" };
            write!(out, "{} {} ", prompt, hint)?;
            out.flush()?;
        }
        let mut line = String::new();
        let read = self.input.borrow_mut().read_line(&mut line)?;
        if read == 0 {
            // EOF is a dismissal
            return Err(InteractionError::Cancelled);
        }
        parse_answer(&line, default)
    }

    fn print_info(&self, message: &str) {
        self.write_line("", message);
    }

    fn print_warning(&self, message: &str) {
        self.write_line("warning: ", message);
    }
}
