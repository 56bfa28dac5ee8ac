//! Terminal consumer of the approval queue.

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use toolgate_core::security::UserRequest;
use tracing::warn;

/// Answer every queued request from stdin until the queue closes. Anything
/// but `y`/`yes` denies; so does end of input.
pub fn spawn_terminal_approver(mut requests: mpsc::Receiver<UserRequest>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(request) = requests.recv().await {
            eprintln!("{} {}", "?".yellow().bold(), request.prompt);
            eprint!("{} ", "Allow? [y/N]".bold());

            match lines.next_line().await {
                Ok(Some(answer)) if is_yes(&answer) => request.allow(),
                Ok(Some(_)) => request.disallow(),
                Ok(None) => {
                    warn!(tool_call_id = %request.tool_call_id, "Input closed, denying request");
                    request.disallow();
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read answer, denying request");
                    request.disallow();
                }
            }
        }
    })
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }
}
