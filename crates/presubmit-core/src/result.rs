//! Result values produced by verification scripts, and how each is reported.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

/// How a result affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the change; no prompt can override it.
    Fatal,
    /// Blocks unless the operator confirms.
    PromptWarning,
    /// Informational only.
    Notify,
}

/// One message produced by a verification script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub message: String,
    pub severity: Severity,
    /// Supporting lines printed indented under the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    /// Extended explanation printed between rulers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_text: Option<String>,
}

impl ResultItem {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            items: Vec::new(),
            long_text: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message)
    }

    pub fn prompt_warning(message: impl Into<String>) -> Self {
        Self::new(Severity::PromptWarning, message)
    }

    pub fn notify(message: impl Into<String>) -> Self {
        Self::new(Severity::Notify, message)
    }

    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }

    pub fn with_long_text(mut self, long_text: impl Into<String>) -> Self {
        let text = long_text.into();
        self.long_text = (!text.is_empty()).then_some(text);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn should_prompt(&self) -> bool {
        self.severity == Severity::PromptWarning
    }

    /// Print the result. Returns `false` if the result is fatal.
    pub fn print(&self, output: &mut dyn Write) -> io::Result<bool> {
        writeln!(output, "{}", self.message)?;
        for item in &self.items {
            writeln!(output, "  {item}")?;
        }
        if let Some(long_text) = &self.long_text {
            writeln!(output, "\n***************\n{long_text}\n***************")?;
        }
        Ok(!self.is_fatal())
    }

    /// Print the result and, for prompt warnings, ask the operator whether to
    /// continue. Returns whether this result lets the change proceed.
    pub fn handle(&self, output: &mut dyn Write, input: &mut dyn BufRead) -> io::Result<bool> {
        let proceed = self.print(output)?;
        if self.should_prompt() {
            return confirm(output, input, "Are you sure you want to continue?");
        }
        Ok(proceed)
    }
}

/// Write `question (y/N): `, read one line and report whether it was an
/// affirmative answer. End of input counts as a decline.
pub fn confirm(output: &mut dyn Write, input: &mut dyn BufRead, question: &str) -> io::Result<bool> {
    write!(output, "{question} (y/N): ")?;
    output.flush()?;
    let mut response = String::new();
    input.read_line(&mut response)?;
    Ok(is_affirmative(&response))
}

/// `y` or `yes`, case-insensitive, surrounding whitespace ignored.
pub fn is_affirmative(response: &str) -> bool {
    matches!(response.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
