use crate::search::MatchCandidate;
use std::io::{BufRead, Write};

/// Yes/no confirmation collaborator. Blocking and presentation live outside
/// the engine; the gate only consumes the decision.
pub trait ConfirmationPrompt {
    fn ask_yes_no(&mut self, prompt: &str) -> bool;
}

/// Presents a candidate list and returns the chosen 0-based index, or `None`
/// to cancel.
pub trait ChoicePresenter {
    fn present_choices(&mut self, candidates: &[MatchCandidate]) -> Option<usize>;
}

/// Everything a session needs from the human side.
pub trait SessionUi: ConfirmationPrompt + ChoicePresenter {}

impl<T: ConfirmationPrompt + ChoicePresenter> SessionUi for T {}

/// Stdin/stdout prompts for the CLI binary.
pub struct ConsolePrompt {
    identity_column: u32,
}

impl ConsolePrompt {
    pub fn new(identity_column: u32) -> Self {
        Self { identity_column }
    }

    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        Some(line.trim().to_string())
    }
}

impl ConfirmationPrompt for ConsolePrompt {
    fn ask_yes_no(&mut self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }
        match self.read_line() {
            Some(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }
}

impl ChoicePresenter for ConsolePrompt {
    fn present_choices(&mut self, candidates: &[MatchCandidate]) -> Option<usize> {
        println!("Several rows match:");
        for (idx, candidate) in candidates.iter().enumerate() {
            println!("  {}. {}", idx + 1, candidate.summary(self.identity_column));
        }
        loop {
            print!("Pick a number (empty cancels): ");
            if std::io::stdout().flush().is_err() {
                return None;
            }
            let answer = self.read_line()?;
            if answer.is_empty() {
                return None;
            }
            match answer.parse::<usize>() {
                Ok(n) if n >= 1 && n <= candidates.len() => return Some(n - 1),
                _ => println!("Enter a number between 1 and {}.", candidates.len()),
            }
        }
    }
}
