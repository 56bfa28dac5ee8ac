//! Human-facing prompt text for approval requests.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use super::classifier::CommandCheckResult;

/// File operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
}

impl FileOperation {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

fn tool_label(tool_name: &str) -> &str {
    if tool_name.is_empty() {
        "the tool"
    } else {
        tool_name
    }
}

fn push_suffix(prompt: &mut String, request_permission: bool, reason: &str) {
    if request_permission {
        prompt.push_str(" (explicit permission requested)");
    }
    prompt.push('.');
    let reason = reason.trim();
    if !reason.is_empty() {
        let _ = write!(prompt, " Reason: {reason}");
    }
}

/// Prompt for a read or write of `paths`.
pub fn file_prompt(
    operation: FileOperation,
    tool_name: &str,
    paths: &[PathBuf],
    inside_sandbox: bool,
    request_permission: bool,
    reason: &str,
) -> String {
    let target = match paths {
        [single] => single.display().to_string(),
        many => format!("{} paths", many.len()),
    };
    let location = if inside_sandbox { "inside" } else { "outside" };
    let mut prompt = format!(
        "{} wants to {} {target} {location} the sandbox",
        tool_label(tool_name),
        operation.verb(),
    );
    push_suffix(&mut prompt, request_permission, reason);
    prompt
}

/// Prompt for running `argv` in `cwd`.
pub fn shell_prompt(
    argv: &[String],
    classification: CommandCheckResult,
    cwd: &Path,
    cwd_inside_sandbox: bool,
    request_permission: bool,
    reason: &str,
) -> String {
    let location = if cwd_inside_sandbox {
        "inside"
    } else {
        "outside"
    };
    let mut prompt = format!(
        "the tool wants to run `{}` (classified {classification}) in {} {location} the sandbox",
        argv.join(" "),
        cwd.display(),
    );
    push_suffix(&mut prompt, request_permission, reason);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_path_prompt() {
        let prompt = file_prompt(
            FileOperation::Read,
            "read_file",
            &[PathBuf::from("/work/a.rs")],
            true,
            true,
            "checking imports",
        );
        assert_eq!(
            prompt,
            "read_file wants to read /work/a.rs inside the sandbox \
             (explicit permission requested). Reason: checking imports"
        );
    }

    #[test]
    fn test_multi_path_prompt_without_tool() {
        let prompt = file_prompt(
            FileOperation::Write,
            "",
            &[PathBuf::from("/a"), PathBuf::from("/b")],
            false,
            false,
            "",
        );
        assert_eq!(prompt, "the tool wants to write 2 paths outside the sandbox.");
    }

    #[test]
    fn test_shell_prompt() {
        let argv = vec!["git".to_string(), "push".to_string()];
        let prompt = shell_prompt(
            &argv,
            CommandCheckResult::Dangerous,
            Path::new("/tmp"),
            false,
            false,
            "publish",
        );
        assert!(prompt.contains("`git push`"));
        assert!(prompt.contains("classified dangerous"));
        assert!(prompt.contains("/tmp outside the sandbox"));
        assert!(prompt.ends_with("Reason: publish"));
    }
}
