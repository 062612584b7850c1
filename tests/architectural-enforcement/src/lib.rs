//! Architectural Enforcement Integration Tests
//!
//! Static checks over the workspace sources:
//! - No sleep() calls in production code
//! - The hexagram codec does no I/O and never suspends
//! - No unwrap()/expect() in library production code
//!
//! Helpers here locate source files and strip test modules and comments so
//! each check only sees production code.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, two levels above this crate
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Every `.rs` file under `dir` (relative to the workspace root)
///
/// # Panics
///
/// Panics if `dir` does not exist, so a moved directory cannot turn a check
/// into a silent pass.
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    assert!(root.is_dir(), "source directory {} not found", root.display());

    walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Production code lines of a file as `(line_number, code)`
///
/// Comments are stripped. Everything from the first `#[cfg(test)]` on is
/// treated as test code; test modules sit at the end of each file.
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect()
}

/// Find production lines in `dirs` for which `is_violation` holds
#[must_use]
pub fn scan<F>(dirs: &[&str], is_violation: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut violations = Vec::new();
    for dir in dirs {
        for path in rust_sources(dir) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (line_number, code) in production_lines(&content) {
                if is_violation(code) {
                    violations.push(format!("{}:{} - {}", path.display(), line_number, code.trim()));
                }
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// note\nlet x = 1; // trailing\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "let x = 1; ")]);
    }

    #[test]
    fn test_workspace_layout() {
        assert!(workspace_root().join("Cargo.toml").is_file());
        assert!(!rust_sources("oracle/core/src").is_empty());
    }
}
