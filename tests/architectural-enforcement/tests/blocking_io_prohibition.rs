//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions MUST NOT use blocking I/O. Provider calls go
//! through the async `reqwest` client.
//! **Acceptable**: blocking reads in synchronous functions that run before
//! the router starts serving, such as configuration loading.

use architectural_enforcement::{code_part, is_in_async_fn, production_sources, SourceFile};

/// Blocking APIs and the label used when reporting them
const BLOCKING_APIS: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::io::stdin()", "Blocking stdin"),
];

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(blocking_io_violations)
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O calls found in async code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED: reqwest async client, tokio::fs, tokio::net");
        eprintln!("✅ ACCEPTABLE: blocking reads in sync functions (config loading)");

        panic!(
            "\nFound {} blocking I/O violation(s) in async code.",
            violations.len()
        );
    }
}

#[test]
fn test_no_blocking_http_client_anywhere() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(|file| {
            file.lines
                .iter()
                .enumerate()
                .filter(|(_, line)| code_part(line).contains("reqwest::blocking"))
                .map(|(idx, _)| file.violation(idx, "Blocking HTTP client"))
                .collect::<Vec<_>>()
        })
        .collect();

    assert!(violations.is_empty(), "{violations:#?}");
}

fn blocking_io_violations(file: &SourceFile) -> Vec<String> {
    let mut violations = Vec::new();
    for (idx, line) in file.lines.iter().enumerate() {
        let code = code_part(line);
        for (api, label) in BLOCKING_APIS {
            if code.contains(api) && is_in_async_fn(&file.lines, idx) {
                violations.push(file.violation(idx, label));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(source: &str) -> SourceFile {
        SourceFile::from_source(PathBuf::from("core/src/example.rs"), source)
    }

    #[test]
    fn test_blocking_read_in_async_fn_detected() {
        let source = "async fn load() {\n    let s = std::fs::read_to_string(\"a\");\n}\n";
        assert_eq!(blocking_io_violations(&file(source)).len(), 1);
    }

    #[test]
    fn test_blocking_read_in_sync_fn_allowed() {
        let source = "pub fn load_config_from_path() {\n    let s = std::fs::read_to_string(\"a\");\n}\n";
        assert!(blocking_io_violations(&file(source)).is_empty());
    }

    #[test]
    fn test_blocking_read_in_test_module_ignored() {
        let source = "fn ok() {}\n#[cfg(test)]\nmod tests {\n    async fn t() { std::fs::read(\"a\"); }\n}\n";
        assert!(blocking_io_violations(&file(source)).is_empty());
    }
}
