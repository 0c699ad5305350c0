//! Authorization policy over paths and command lines.
//!
//! Pure decisions: no I/O, no state beyond the immutable configuration
//! compiled at startup. The same `Arc<Policy>` is shared by every worker;
//! it never mutates after construction, so no locking is needed.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::config::PolicyConfig;
use crate::error::GatewayError;

/// Compiled allow/deny rules.
///
/// Path rules are prefix lists matched component-wise after lexical
/// normalization. Command rules match only the executable basename of the
/// first whitespace-separated token — arguments, pipes, and redirections are
/// never inspected. That first-token check is a documented limitation of the
/// protocol, not a guarantee that the rest of the command line is safe; the
/// executor closes the worst of the gap by spawning argument vectors without
/// a shell.
#[derive(Debug, Clone)]
pub struct Policy {
    allowed_paths: Vec<PathBuf>,
    denied_paths: Vec<PathBuf>,
    allowed_commands: HashSet<String>,
}

impl Policy {
    /// Compile the policy from configuration. Tilde prefixes in path rules
    /// are expanded; every rule is normalized to an absolute path.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let compile = |rules: &[String]| -> Vec<PathBuf> {
            rules
                .iter()
                .map(|p| normalize(Path::new(shellexpand::tilde(p).as_ref())))
                .collect()
        };

        Self {
            allowed_paths: compile(&config.allowed_paths),
            denied_paths: compile(&config.denied_paths),
            allowed_commands: config.allowed_commands.iter().cloned().collect(),
        }
    }

    /// Decide whether `path` may be touched.
    ///
    /// Deny prefixes short-circuit: a path under both an allowed and a
    /// denied prefix is denied. Paths under neither list are denied by
    /// default.
    pub fn is_path_allowed(&self, path: &Path) -> bool {
        let normalized = normalize(path);

        if self.denied_paths.iter().any(|d| normalized.starts_with(d)) {
            return false;
        }
        self.allowed_paths.iter().any(|a| normalized.starts_with(a))
    }

    /// Decide whether a command line may be executed. Empty and
    /// whitespace-only lines are never allowed.
    pub fn is_command_allowed(&self, command_line: &str) -> bool {
        match command_line.split_whitespace().next() {
            Some(first) => self.is_executable_allowed(first),
            None => false,
        }
    }

    /// Check a single executable token (basename comparison, so `/bin/ls`
    /// matches an allow-list entry of `ls`).
    pub fn is_executable_allowed(&self, token: &str) -> bool {
        let base = Path::new(token)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(token);
        self.allowed_commands.contains(base)
    }

    /// Policy-check a path, returning its normalized absolute form.
    pub fn check_path(&self, path: &Path) -> Result<PathBuf, GatewayError> {
        let normalized = normalize(path);
        if self.is_path_allowed(&normalized) {
            Ok(normalized)
        } else {
            Err(GatewayError::PolicyDenied(format!(
                "path not allowed: {}",
                path.display()
            )))
        }
    }

    /// Policy-check a command line.
    pub fn check_command(&self, command_line: &str) -> Result<(), GatewayError> {
        if self.is_command_allowed(command_line) {
            Ok(())
        } else {
            Err(GatewayError::PolicyDenied(format!(
                "command not allowed: {}",
                truncate(command_line, 120)
            )))
        }
    }
}

/// Lexically normalize a path to absolute form.
///
/// Relative input is joined against the process working directory; `.` and
/// `..` components are squashed without touching the filesystem, so the
/// decision is the same whether or not the path exists yet.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| Path::new("/").join(path))
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(allowed: &[&str], denied: &[&str], commands: &[&str]) -> Policy {
        Policy::from_config(&PolicyConfig {
            allowed_paths: allowed.iter().map(|s| s.to_string()).collect(),
            denied_paths: denied.iter().map(|s| s.to_string()).collect(),
            allowed_commands: commands.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_deny_overrides_allow() {
        let p = policy(&["/srv/app"], &["/srv/app/secrets"], &[]);
        assert!(p.is_path_allowed(Path::new("/srv/app/config.json")));
        assert!(!p.is_path_allowed(Path::new("/srv/app/secrets/key")));
        assert!(!p.is_path_allowed(Path::new("/srv/app/secrets")));
    }

    #[test]
    fn test_default_deny() {
        let p = policy(&["/srv/app"], &[], &[]);
        assert!(!p.is_path_allowed(Path::new("/etc/passwd")));
        assert!(!p.is_path_allowed(Path::new("/")));
    }

    #[test]
    fn test_prefix_match_is_component_wise() {
        let p = policy(&["/srv/app"], &[], &[]);
        assert!(p.is_path_allowed(Path::new("/srv/app")));
        assert!(p.is_path_allowed(Path::new("/srv/app/nested/file")));
        assert!(!p.is_path_allowed(Path::new("/srv/appendix")));
    }

    #[test]
    fn test_dot_dot_cannot_escape() {
        let p = policy(&["/srv/app"], &["/srv/app/secrets"], &[]);
        assert!(!p.is_path_allowed(Path::new("/srv/app/../other")));
        assert!(!p.is_path_allowed(Path::new("/srv/app/x/../secrets/key")));
        assert!(p.is_path_allowed(Path::new("/srv/app/x/../y")));
    }

    #[test]
    fn test_empty_command_denied() {
        let p = policy(&[], &[], &["ls", "echo"]);
        assert!(!p.is_command_allowed(""));
        assert!(!p.is_command_allowed("   \t  "));
    }

    #[test]
    fn test_first_token_only() {
        let p = policy(&[], &[], &["ls", "echo"]);
        assert!(p.is_command_allowed("ls -la /srv"));
        assert!(p.is_command_allowed("echo rm -rf /"));
        assert!(!p.is_command_allowed("rm -rf /"));
    }

    #[test]
    fn test_basename_comparison() {
        let p = policy(&[], &[], &["ls"]);
        assert!(p.is_command_allowed("/bin/ls -l"));
        assert!(p.is_command_allowed("/usr/bin/ls"));
        assert!(!p.is_command_allowed("/bin/rm"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(normalize(Path::new("/../..")), PathBuf::from("/"));
        assert!(normalize(Path::new("relative/x")).is_absolute());
    }

    #[test]
    fn test_check_path_returns_normalized() {
        let p = policy(&["/srv/app"], &[], &[]);
        let ok = p.check_path(Path::new("/srv/app/./deploy/../config.json"));
        assert_eq!(ok.unwrap(), PathBuf::from("/srv/app/config.json"));
        assert!(matches!(
            p.check_path(Path::new("/etc/shadow")),
            Err(GatewayError::PolicyDenied(_))
        ));
    }
}
