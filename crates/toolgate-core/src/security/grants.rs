//! Read grants derived from user messages.
//!
//! A user message such as `"look at @docs and @src/*.rs"` grants read access
//! to what its `@` mentions name. The store keeps the raw messages; grants are
//! derived on every query and never cached, so an exact grant follows the
//! filesystem (a mention that is a directory today covers its descendants).
//!
//! - Exact grant (`@docs`, `@"My Notes/a.md"`): a directory covers every
//!   descendant, a file covers only itself.
//! - Glob grant (`@docs/*.md`): matched against the path relative to the
//!   sandbox, or against the absolute path when the glob is absolute. `*`
//!   does not cross directory separators.
//!
//! No grant ever covers the filesystem root.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;
use toolgate_traits::{Authorizer, Result, same_authorizer};
use tracing::debug;

use crate::paths::{is_within, normalize_path};

/// Tools whose reads may be satisfied by a grant.
pub const READ_GRANTABLE_TOOLS: &[&str] = &["read_file", "ls"];

pub fn is_read_grantable(tool_name: &str) -> bool {
    READ_GRANTABLE_TOOLS.contains(&tool_name)
}

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[\s(\[{<,;:])@(?:"([^"]*)"|'([^']*)'|`([^`]*)`|([^\s"'`]+))"#)
        .expect("Invalid regex")
});

const GLOB_CHARS: &[char] = &['*', '?', '['];

/// Extract the `@` mention tokens from a message, in order.
pub fn extract_mentions(message: &str) -> Vec<String> {
    MENTION
        .captures_iter(message)
        .filter_map(|caps| {
            if let Some(bare) = caps.get(4) {
                return Some(trim_mention(bare.as_str()).to_string());
            }
            (1..=3)
                .find_map(|i| caps.get(i))
                .map(|quoted| quoted.as_str().trim().to_string())
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Strip sentence punctuation that follows a bare mention. A closing bracket
/// is only stripped when the token does not contain its opener.
fn trim_mention(token: &str) -> &str {
    let mut token = token;
    loop {
        let Some(last) = token.chars().last() else {
            return token;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => !token.contains('('),
            ']' => !token.contains('['),
            '}' => !token.contains('{'),
            '>' => !token.contains('<'),
            _ => false,
        };
        if !strip {
            return token;
        }
        token = &token[..token.len() - last.len_utf8()];
    }
}

enum Grant {
    Exact(PathBuf),
    Glob { pattern: String, absolute: bool },
}

impl Grant {
    fn parse(sandbox_dir: &Path, token: &str) -> Self {
        if token.contains(GLOB_CHARS) {
            let absolute = Path::new(token).is_absolute();
            let pattern = if absolute {
                token.to_string()
            } else {
                token.trim_start_matches("./").to_string()
            };
            return Self::Glob { pattern, absolute };
        }
        let path = Path::new(token);
        if path.is_absolute() {
            Self::Exact(normalize_path(path))
        } else {
            Self::Exact(normalize_path(&sandbox_dir.join(path)))
        }
    }

    fn covers(&self, sandbox_dir: &Path, path: &Path) -> bool {
        match self {
            Self::Exact(granted) => {
                if granted.parent().is_none() {
                    return false;
                }
                match fs::metadata(granted) {
                    Ok(meta) if meta.is_dir() => is_within(path, granted),
                    Ok(_) => path == granted,
                    Err(_) => false,
                }
            }
            Self::Glob { pattern, absolute } => {
                if *absolute {
                    return path
                        .to_str()
                        .is_some_and(|p| glob_match::glob_match(pattern, p));
                }
                path.strip_prefix(sandbox_dir)
                    .ok()
                    .and_then(Path::to_str)
                    .filter(|rel| !rel.is_empty())
                    .is_some_and(|rel| glob_match::glob_match(pattern, rel))
            }
        }
    }
}

/// Raw user messages from which grants are derived.
#[derive(Debug, Default)]
pub struct GrantStore {
    messages: RwLock<Vec<String>>,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&self, message: impl Into<String>) {
        self.messages.write().push(message.into());
    }

    /// Snapshot of every recorded message.
    pub fn messages(&self) -> Vec<String> {
        self.messages.read().clone()
    }

    /// Whether `path` (absolute, normalized) is covered by any grant.
    pub fn is_granted(&self, sandbox_dir: &Path, path: &Path) -> bool {
        if path.parent().is_none() {
            return false;
        }
        let messages = self.messages();
        let granted = messages
            .iter()
            .flat_map(|message| extract_mentions(message))
            .any(|token| Grant::parse(sandbox_dir, &token).covers(sandbox_dir, path));
        if granted {
            debug!(path = %path.display(), "Read covered by user grant");
        }
        granted
    }

    /// Whether every path is granted. False for an empty list.
    pub fn all_granted(&self, sandbox_dir: &Path, paths: &[PathBuf]) -> bool {
        !paths.is_empty() && paths.iter().all(|p| self.is_granted(sandbox_dir, p))
    }
}

/// Record `message` as a grant source on `authorizer` and, when it is
/// code-unit scoped, on its fallback as well.
pub fn add_grants_from_user_message(authorizer: &Arc<dyn Authorizer>, message: &str) -> Result<()> {
    let fallback = Arc::clone(authorizer).without_code_unit();
    // The fallback goes first so a refusal leaves the wrapper untouched.
    if !same_authorizer(authorizer, &fallback) {
        fallback.accept_grants(message)?;
    }
    authorizer.accept_grants(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mentions() {
        assert_eq!(
            extract_mentions("read @docs, then @src/lib.rs."),
            vec!["docs", "src/lib.rs"]
        );
        assert_eq!(
            extract_mentions(r#"see @"My Notes/a.md" and (@'b c')"#),
            vec!["My Notes/a.md", "b c"]
        );
        assert_eq!(extract_mentions("mail me at user@example.com"), Vec::<String>::new());
    }

    #[test]
    fn test_trim_keeps_balanced_brackets() {
        assert_eq!(extract_mentions("(see @docs)"), vec!["docs"]);
        assert_eq!(extract_mentions("@file[1].txt"), vec!["file[1].txt"]);
        assert_eq!(extract_mentions("@dir/(a)"), vec!["dir/(a)"]);
        assert_eq!(extract_mentions("@ alone"), Vec::<String>::new());
    }

    #[test]
    fn test_directory_grant_is_recursive() {
        let temp = tempfile::tempdir().unwrap();
        let sandbox = temp.path().to_path_buf();
        fs::create_dir_all(sandbox.join("docs/a/b")).unwrap();
        fs::create_dir_all(sandbox.join("docs2")).unwrap();

        let store = GrantStore::new();
        store.add_message("read @docs");

        assert!(store.is_granted(&sandbox, &sandbox.join("docs/a/b/c.md")));
        assert!(store.is_granted(&sandbox, &sandbox.join("docs")));
        assert!(!store.is_granted(&sandbox, &sandbox.join("docs2/x")));
    }

    #[test]
    fn test_file_grant_covers_only_itself() {
        let temp = tempfile::tempdir().unwrap();
        let sandbox = temp.path().to_path_buf();
        fs::write(sandbox.join("notes.md"), "x").unwrap();

        let store = GrantStore::new();
        store.add_message("@notes.md");

        assert!(store.is_granted(&sandbox, &sandbox.join("notes.md")));
        assert!(!store.is_granted(&sandbox, &sandbox.join("notes.md/child")));
    }

    #[test]
    fn test_missing_exact_grant_covers_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let sandbox = temp.path().to_path_buf();
        let store = GrantStore::new();
        store.add_message("@later");
        assert!(!store.is_granted(&sandbox, &sandbox.join("later/x")));

        fs::create_dir(sandbox.join("later")).unwrap();
        assert!(store.is_granted(&sandbox, &sandbox.join("later/x")));
    }

    #[test]
    fn test_glob_grant_is_not_recursive() {
        let sandbox = PathBuf::from("/work");
        let store = GrantStore::new();
        store.add_message("read @docs/*.md");

        assert!(store.is_granted(&sandbox, Path::new("/work/docs/top.md")));
        assert!(!store.is_granted(&sandbox, Path::new("/work/docs/nested/child.md")));
        assert!(!store.is_granted(&sandbox, Path::new("/elsewhere/docs/top.md")));
    }

    #[test]
    fn test_absolute_glob_grant() {
        let store = GrantStore::new();
        store.add_message("@/etc/*.conf");
        assert!(store.is_granted(Path::new("/work"), Path::new("/etc/host.conf")));
        assert!(!store.is_granted(Path::new("/work"), Path::new("/etc/ssl/x.conf")));
    }

    #[test]
    fn test_root_is_never_granted() {
        let store = GrantStore::new();
        store.add_message("@/ and @/*");
        assert!(!store.is_granted(Path::new("/work"), Path::new("/")));
        assert!(!store.is_granted(Path::new("/work"), Path::new("/etc/passwd")));
    }

    #[test]
    fn test_all_granted_requires_every_path() {
        let store = GrantStore::new();
        store.add_message("@*.md");
        let sandbox = Path::new("/work");
        assert!(store.all_granted(sandbox, &[PathBuf::from("/work/a.md")]));
        assert!(!store.all_granted(
            sandbox,
            &[PathBuf::from("/work/a.md"), PathBuf::from("/work/b.rs")]
        ));
        assert!(!store.all_granted(sandbox, &[]));
    }

    #[test]
    fn test_read_grantable_tools() {
        assert!(is_read_grantable("read_file"));
        assert!(is_read_grantable("ls"));
        assert!(!is_read_grantable("grep"));
        assert!(!is_read_grantable("write_file"));
    }
}
