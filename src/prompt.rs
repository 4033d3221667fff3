//! Operator confirmation before deleting.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;

/// Asks whether to go ahead with a destructive step
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Only a `y` (any case, surrounding whitespace ignored) counts as yes
pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Prompts on the terminal and reads one line from a reader (stdin by default)
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
    /// Where the candidate list can be read when it was not printed to the terminal
    report_location: Option<PathBuf>,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdin() -> Self {
        TerminalPrompt::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalPrompt {
            input,
            output,
            report_location: None,
        }
    }

    /// Name the run log holding the candidate list before each question
    pub fn with_report_location(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.report_location = Some(log_file.into());
        self
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        if let Some(log_file) = &self.report_location {
            let _ = write!(
                self.output,
                "\nCandidate list written to {}",
                log_file.display()
            );
        }
        let _ = write!(self.output, "\n{} {} ", question.bold(), "(y/n):".yellow());
        let _ = self.output.flush();

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(err) => {
                warn!("Failed to read input: {}", err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  Y  "));
        assert!(!is_yes("yes"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
    }

    #[test]
    fn test_prompt_reads_one_line() {
        let mut prompt = TerminalPrompt::new(Cursor::new("y\nn\n"), Vec::new());
        assert!(prompt.confirm("Proceed?"));
        assert!(!prompt.confirm("Proceed?"));
        // End of input declines
        assert!(!prompt.confirm("Proceed?"));

        let shown = String::from_utf8(prompt.output).unwrap();
        assert_eq!(shown.matches("Proceed?").count(), 3);
        assert!(!shown.contains("Candidate list written to"));
    }

    #[test]
    fn test_prompt_points_to_run_log() {
        let mut prompt = TerminalPrompt::new(Cursor::new("n\n"), Vec::new())
            .with_report_location("/var/log/ecr/ecr_cleaner_app_20250101_000000.log");
        assert!(!prompt.confirm("Proceed with deletion of the above 2 images (4 KiB)?"));

        let shown = String::from_utf8(prompt.output).unwrap();
        assert!(shown.contains(
            "Candidate list written to /var/log/ecr/ecr_cleaner_app_20250101_000000.log"
        ));
        assert!(shown.contains("Proceed with deletion of the above 2 images"));
    }
}
