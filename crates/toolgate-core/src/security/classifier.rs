//! Lexical shell command classification.
//!
//! Classification never executes or fully parses shell syntax. Anything the
//! lexer cannot reason about with plain whitespace tokenization is reported as
//! [`CommandCheckResult::Inscrutable`] so the caller falls back to a prompt.

use std::fmt;

use toolgate_traits::{AuthError, Result};

use super::commands::ShellAllowedCommands;

/// Risk classification of an argv.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCheckResult {
    /// Not recognized by any matcher
    None,
    Safe,
    Blocked,
    Dangerous,
    /// Uses shell syntax that cannot be analyzed lexically
    Inscrutable,
}

impl fmt::Display for CommandCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Safe => "safe",
            Self::Blocked => "blocked",
            Self::Dangerous => "dangerous",
            Self::Inscrutable => "inscrutable",
        };
        f.write_str(name)
    }
}

const SHELL_WRAPPERS: &[&str] = &["bash", "sh", "zsh"];
const LOGIN_FLAGS: &[&str] = &["-l", "--login"];
const COMMAND_FLAGS: &[&str] = &["-c", "-lc", "-cl"];
const CONTROL_TOKENS: &[&str] = &["|", "||", "&&", ";", "&"];
const SUBSTITUTIONS: &[&str] = &["$(", "`", "<(", ">("];

/// Quoting characters that make a wrapped command string unsafe to split on
/// whitespace. Operators and substitutions survive the split as tokens and
/// are caught when the inner argv is classified.
const UNSPLITTABLE: &[char] = &['\'', '"', '`', '\\'];

enum Unwrapped {
    /// argv is not a `<shell> -c <string>` invocation
    NotWrapped,
    Inner(Vec<String>),
    Inscrutable,
}

/// Classify `argv` against `commands`.
pub fn check(commands: &ShellAllowedCommands, argv: &[String]) -> Result<CommandCheckResult> {
    if argv.is_empty() {
        return Err(AuthError::EmptyCommand);
    }

    match unwrap_shell(argv) {
        Unwrapped::Inner(inner) => return check(commands, &inner),
        Unwrapped::Inscrutable => return Ok(CommandCheckResult::Inscrutable),
        Unwrapped::NotWrapped => {}
    }

    if argv.iter().any(|token| is_inscrutable_token(token)) {
        return Ok(CommandCheckResult::Inscrutable);
    }

    if let Some(result) = commands.match_argv(argv) {
        return Ok(result);
    }

    if is_path_qualified(&argv[0]) {
        return Ok(CommandCheckResult::Dangerous);
    }

    Ok(CommandCheckResult::None)
}

impl ShellAllowedCommands {
    /// Classify `argv` against this registry.
    pub fn check(&self, argv: &[String]) -> Result<CommandCheckResult> {
        check(self, argv)
    }
}

fn unwrap_shell(argv: &[String]) -> Unwrapped {
    if !SHELL_WRAPPERS.contains(&argv[0].as_str()) {
        return Unwrapped::NotWrapped;
    }

    let mut rest = &argv[1..];
    if let Some(first) = rest.first()
        && LOGIN_FLAGS.contains(&first.as_str())
    {
        rest = &rest[1..];
    }
    let Some((flag, trailing)) = rest.split_first() else {
        return Unwrapped::NotWrapped;
    };
    if !COMMAND_FLAGS.contains(&flag.as_str()) {
        return Unwrapped::NotWrapped;
    }

    let [script] = trailing else {
        return Unwrapped::Inscrutable;
    };
    if script.starts_with('-') || !is_splittable(script) {
        return Unwrapped::Inscrutable;
    }

    Unwrapped::Inner(
        script
            .split([' ', '\t'])
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn is_splittable(script: &str) -> bool {
    script.chars().all(|c| {
        if c == ' ' || c == '\t' {
            return true;
        }
        !(c.is_whitespace() || c.is_control() || UNSPLITTABLE.contains(&c))
    })
}

fn is_inscrutable_token(token: &str) -> bool {
    CONTROL_TOKENS.contains(&token)
        || token == "xargs"
        || SUBSTITUTIONS.iter().any(|s| token.contains(s))
}

fn is_path_qualified(executable: &str) -> bool {
    executable.starts_with('/') || executable.starts_with("..")
}
