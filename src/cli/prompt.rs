//! Interactive yes/no confirmation on the terminal.

use crate::resolver::{Confirm, parse_answer};
use std::io::{BufRead, Write};

/// Asks on stderr and reads the answer from stdin.
///
/// Stdout stays free for the `--capture` JSON summary. End of input or a
/// read error counts as "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    async fn ask(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            read_answer(&prompt, std::io::stdin().lock(), std::io::stderr())
        })
        .await;

        match answer {
            Ok(Some(line)) => parse_answer(&line),
            Ok(None) => {
                log::warn!("No answer on stdin, treating as no");
                false
            }
            Err(e) => {
                log::warn!("Confirmation prompt failed: {}", e);
                false
            }
        }
    }
}

/// Writes `prompt` to `output` and reads one line from `input`
fn read_answer(prompt: &str, mut input: impl BufRead, mut output: impl Write) -> Option<String> {
    let _ = write!(output, "{}", prompt);
    let _ = output.flush();

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_answer_writes_prompt_to_output() {
        let mut output = Vec::new();
        let answer = read_answer("Continue? ", "yes\n".as_bytes(), &mut output);
        assert_eq!(answer.as_deref(), Some("yes\n"));
        assert_eq!(output, b"Continue? ");
    }

    #[test]
    fn test_read_answer_end_of_input() {
        let answer = read_answer("Continue? ", "".as_bytes(), std::io::sink());
        assert_eq!(answer, None);
    }
}
