//! Command signature registry used by the shell classifier.
//!
//! Three independent sets (safe, blocked, dangerous) of `CommandMatcher`s.
//! Each new registry is seeded with its own copy of the built-in tables, so
//! mutating one registry never affects another.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::classifier::CommandCheckResult;

/// Signature of a shell invocation: executable, exact leading arguments and
/// flags that must all be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMatcher {
    /// Executable name, compared exactly against `argv[0]`
    pub command: String,

    /// Arguments that must immediately follow the executable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args_prefix: Vec<String>,

    /// Flags that must appear somewhere after the executable, either as a
    /// bare token or as `flag=value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

impl CommandMatcher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args_prefix: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args_prefix = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Content key. Flag order is irrelevant because every flag is required.
    pub fn key(&self) -> String {
        let mut flags = self.flags.clone();
        flags.sort();
        flags.dedup();
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.command,
            self.args_prefix.join("\u{1e}"),
            flags.join("\u{1e}")
        )
    }

    pub fn matches(&self, argv: &[String]) -> bool {
        let Some((executable, args)) = argv.split_first() else {
            return false;
        };
        if *executable != self.command {
            return false;
        }
        if args.len() < self.args_prefix.len()
            || args[..self.args_prefix.len()] != self.args_prefix[..]
        {
            return false;
        }
        self.flags.iter().all(|flag| has_flag(args, flag))
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| {
        arg == flag
            || arg
                .strip_prefix(flag)
                .is_some_and(|rest| rest.starts_with('='))
    })
}

type Signature = (&'static str, &'static [&'static str], &'static [&'static str]);

/// Read-only inspection commands.
const DEFAULT_SAFE: &[Signature] = &[
    ("ls", &[], &[]),
    ("pwd", &[], &[]),
    ("cat", &[], &[]),
    ("head", &[], &[]),
    ("tail", &[], &[]),
    ("wc", &[], &[]),
    ("echo", &[], &[]),
    ("which", &[], &[]),
    ("whoami", &[], &[]),
    ("date", &[], &[]),
    ("tree", &[], &[]),
    ("file", &[], &[]),
    ("stat", &[], &[]),
    ("du", &[], &[]),
    ("diff", &[], &[]),
    ("grep", &[], &[]),
    ("git", &["status"], &[]),
    ("git", &["log"], &[]),
    ("git", &["diff"], &[]),
    ("git", &["show"], &[]),
    ("git", &["blame"], &[]),
    ("git", &["rev-parse"], &[]),
    ("go", &["version"], &[]),
    ("go", &["env"], &[]),
    ("go", &["doc"], &[]),
    ("go", &["list"], &[]),
    ("go", &["vet"], &[]),
    ("gofmt", &["-l"], &[]),
    ("cargo", &["check"], &[]),
    ("cargo", &["tree"], &[]),
    ("cargo", &["metadata"], &[]),
];

/// Network and administrative commands.
const DEFAULT_BLOCKED: &[Signature] = &[
    ("sudo", &[], &[]),
    ("su", &[], &[]),
    ("doas", &[], &[]),
    ("curl", &[], &[]),
    ("wget", &[], &[]),
    ("nc", &[], &[]),
    ("ncat", &[], &[]),
    ("netcat", &[], &[]),
    ("telnet", &[], &[]),
    ("ssh", &[], &[]),
    ("scp", &[], &[]),
    ("sftp", &[], &[]),
    ("rsync", &[], &[]),
    ("ftp", &[], &[]),
    ("shutdown", &[], &[]),
    ("reboot", &[], &[]),
    ("halt", &[], &[]),
    ("poweroff", &[], &[]),
    ("mkfs", &[], &[]),
    ("fdisk", &[], &[]),
    ("mount", &[], &[]),
    ("umount", &[], &[]),
    ("chown", &[], &[]),
    ("useradd", &[], &[]),
    ("userdel", &[], &[]),
    ("passwd", &[], &[]),
    ("crontab", &[], &[]),
    ("systemctl", &[], &[]),
    ("launchctl", &[], &[]),
];

/// Destructive installs, history rewrites and cluster/container control.
const DEFAULT_DANGEROUS: &[Signature] = &[
    ("rm", &[], &[]),
    ("rmdir", &[], &[]),
    ("mv", &[], &[]),
    ("chmod", &[], &[]),
    ("dd", &[], &[]),
    ("git", &["push"], &[]),
    ("git", &["reset"], &[]),
    ("git", &["clean"], &[]),
    ("git", &["checkout"], &[]),
    ("git", &["rebase"], &[]),
    ("git", &["commit"], &["--amend"]),
    ("git", &["branch"], &["-D"]),
    ("git", &["stash"], &["drop"]),
    ("go", &["install"], &[]),
    ("go", &["get"], &[]),
    ("cargo", &["install"], &[]),
    ("cargo", &["publish"], &[]),
    ("npm", &["install"], &[]),
    ("npm", &["publish"], &[]),
    ("pip", &["install"], &[]),
    ("pip3", &["install"], &[]),
    ("brew", &["install"], &[]),
    ("apt", &["install"], &[]),
    ("apt-get", &["install"], &[]),
    ("docker", &[], &[]),
    ("kubectl", &[], &[]),
    ("helm", &[], &[]),
];

fn seed(table: &[Signature]) -> BTreeMap<String, CommandMatcher> {
    table
        .iter()
        .map(|(command, args, flags)| {
            let matcher = CommandMatcher::new(*command)
                .with_args(args.iter().copied())
                .with_flags(flags.iter().copied());
            (matcher.key(), matcher)
        })
        .collect()
}

#[derive(Debug, Default)]
struct CommandTables {
    safe: BTreeMap<String, CommandMatcher>,
    blocked: BTreeMap<String, CommandMatcher>,
    dangerous: BTreeMap<String, CommandMatcher>,
}

/// Matcher sets declared in configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default)]
    pub safe: Vec<CommandMatcher>,
    #[serde(default)]
    pub blocked: Vec<CommandMatcher>,
    #[serde(default)]
    pub dangerous: Vec<CommandMatcher>,
}

/// Concurrency-safe registry of safe, blocked and dangerous command
/// signatures. May be shared between authorizers and mutated while checks run.
#[derive(Debug)]
pub struct ShellAllowedCommands {
    tables: RwLock<CommandTables>,
}

impl ShellAllowedCommands {
    /// Registry seeded with the built-in tables.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(CommandTables {
                safe: seed(DEFAULT_SAFE),
                blocked: seed(DEFAULT_BLOCKED),
                dangerous: seed(DEFAULT_DANGEROUS),
            }),
        }
    }

    /// Registry with no matchers at all.
    pub fn empty() -> Self {
        Self {
            tables: RwLock::new(CommandTables::default()),
        }
    }

    /// Registry built from configuration, optionally on top of the built-in
    /// tables.
    pub fn from_config(config: &CommandsConfig, include_defaults: bool) -> Self {
        let commands = if include_defaults {
            Self::new()
        } else {
            Self::empty()
        };
        for matcher in &config.safe {
            commands.add_safe(matcher.clone());
        }
        for matcher in &config.blocked {
            commands.add_blocked(matcher.clone());
        }
        for matcher in &config.dangerous {
            commands.add_dangerous(matcher.clone());
        }
        commands
    }

    pub fn add_safe(&self, matcher: CommandMatcher) {
        self.tables.write().safe.insert(matcher.key(), matcher);
    }

    pub fn add_blocked(&self, matcher: CommandMatcher) {
        self.tables.write().blocked.insert(matcher.key(), matcher);
    }

    pub fn add_dangerous(&self, matcher: CommandMatcher) {
        self.tables.write().dangerous.insert(matcher.key(), matcher);
    }

    /// Returns true if the matcher was present.
    pub fn remove_safe(&self, matcher: &CommandMatcher) -> bool {
        self.tables.write().safe.remove(&matcher.key()).is_some()
    }

    pub fn remove_blocked(&self, matcher: &CommandMatcher) -> bool {
        self.tables.write().blocked.remove(&matcher.key()).is_some()
    }

    pub fn remove_dangerous(&self, matcher: &CommandMatcher) -> bool {
        self.tables.write().dangerous.remove(&matcher.key()).is_some()
    }

    pub fn safe_matchers(&self) -> Vec<CommandMatcher> {
        self.tables.read().safe.values().cloned().collect()
    }

    pub fn blocked_matchers(&self) -> Vec<CommandMatcher> {
        self.tables.read().blocked.values().cloned().collect()
    }

    pub fn dangerous_matchers(&self) -> Vec<CommandMatcher> {
        self.tables.read().dangerous.values().cloned().collect()
    }

    /// Match `argv` against the three sets. Safe wins over blocked, blocked
    /// over dangerous.
    pub(crate) fn match_argv(&self, argv: &[String]) -> Option<CommandCheckResult> {
        let tables = self.tables.read();
        if tables.safe.values().any(|m| m.matches(argv)) {
            Some(CommandCheckResult::Safe)
        } else if tables.blocked.values().any(|m| m.matches(argv)) {
            Some(CommandCheckResult::Blocked)
        } else if tables.dangerous.values().any(|m| m.matches(argv)) {
            Some(CommandCheckResult::Dangerous)
        } else {
            None
        }
    }
}

impl Default for ShellAllowedCommands {
    fn default() -> Self {
        Self::new()
    }
}
