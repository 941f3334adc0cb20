//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the tests in `tests/`. They enforce:
//! - No sleeping in production code outside the provider retry backoff
//! - No blocking I/O inside async functions
//!
//! The scanners are line-based. They read production sources of the
//! `switchboard` crates, stop at the first inline test module, and skip
//! test-only files.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["switchboard/core/src", "switchboard/cli/src"];

/// Files that only exist for tests
const TEST_ONLY_FILES: &[&str] = &["test_utils.rs"];

/// A production source file, truncated before its inline test module
#[derive(Debug)]
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,
    /// Production lines only
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Load `path`, dropping everything from the inline test module onwards
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        Some(Self::from_source(path.to_path_buf(), &content))
    }

    /// Build from in-memory source text
    pub fn from_source(path: PathBuf, content: &str) -> Self {
        let all: Vec<&str> = content.lines().collect();
        let end = test_module_start(&all).unwrap_or(all.len());
        Self {
            path,
            lines: all[..end].iter().map(ToString::to_string).collect(),
        }
    }

    /// Whether the path ends with `suffix` (e.g. `provider/http.rs`)
    pub fn is(&self, suffix: &str) -> bool {
        self.path.ends_with(suffix)
    }

    /// Format a violation at 0-indexed line `idx`
    pub fn violation(&self, idx: usize, what: &str) -> String {
        format!(
            "{}:{} - {what}: {}",
            self.path.display(),
            idx + 1,
            self.lines[idx].trim()
        )
    }
}

/// Workspace root, derived from this crate's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../.."))
}

/// All production sources under [`PRODUCTION_DIRS`]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    PRODUCTION_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|dir| dir.exists())
        .flat_map(|dir| walkdir::WalkDir::new(dir).into_iter().filter_map(Result::ok))
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            !TEST_ONLY_FILES.contains(&name.as_ref())
        })
        .filter_map(|entry| SourceFile::load(entry.path()))
        .collect()
}

/// Line with any trailing `//` comment removed
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Index of the `#[cfg(test)]` attribute that opens an inline test module
pub fn test_module_start(lines: &[&str]) -> Option<usize> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        if line.trim() != "#[cfg(test)]" {
            return None;
        }
        let next = lines.get(idx + 1)?.trim();
        (next.starts_with("mod ") && next.ends_with('{')).then_some(idx)
    })
}

/// Signature line of the function enclosing line `idx`, if any
pub fn enclosing_fn<S: AsRef<str>>(lines: &[S], idx: usize) -> Option<&str> {
    for line in lines[..idx].iter().rev() {
        let trimmed = line.as_ref().trim();
        if is_fn_signature(trimmed) {
            return Some(trimmed);
        }
        // Stop at item boundaries
        if trimmed.starts_with("impl ") || trimmed.starts_with("mod ") {
            return None;
        }
    }
    None
}

/// Whether line `idx` sits inside an `async fn`
pub fn is_in_async_fn<S: AsRef<str>>(lines: &[S], idx: usize) -> bool {
    enclosing_fn(lines, idx).is_some_and(|sig| sig.contains("async fn "))
}

fn is_fn_signature(trimmed: &str) -> bool {
    let rest = trimmed
        .trim_start_matches("pub(crate) ")
        .trim_start_matches("pub ")
        .trim_start_matches("async ");
    rest.starts_with("fn ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_module_is_cut_off() {
        let source = "fn run() {}\n\n#[cfg(test)]\nmod tests {\n    fn helper() {}\n}\n";
        let file = SourceFile::from_source(PathBuf::from("lib.rs"), source);
        assert_eq!(file.lines.len(), 2);
    }

    #[test]
    fn test_cfg_test_submodule_declaration_is_kept() {
        let lines = ["#[cfg(test)]", "pub mod test_utils;", "pub use a::B;"];
        assert_eq!(test_module_start(&lines), None);
    }

    #[test]
    fn test_async_detection() {
        let lines = [
            "pub async fn fetch(&self) {",
            "    let body = std::fs::read(\"x\");",
            "}",
            "fn load() {",
            "    let body = std::fs::read(\"x\");",
            "}",
        ];
        assert!(is_in_async_fn(&lines, 1));
        assert!(!is_in_async_fn(&lines, 4));
        assert_eq!(enclosing_fn(&lines, 4), Some("fn load() {"));
    }

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // sleep(10)"), "let x = 1; ");
    }

    #[test]
    fn test_production_sources_found() {
        let sources = production_sources();
        assert!(sources.iter().any(|f| f.is("provider/http.rs")));
        assert!(!sources.iter().any(|f| f.is("routing/test_utils.rs")));
    }
}
