//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Circuit cooldowns are computed
//! lazily on read, and request deadlines use `tokio::time::timeout`.
//! **Exception**: the fixed backoff before the single provider retry in
//! `provider/http.rs::send_with_retry`.

use architectural_enforcement::{code_part, enclosing_fn, production_sources, SourceFile};

/// The only function allowed to sleep
const BACKOFF_FILE: &str = "provider/http.rs";
const BACKOFF_FN: &str = "fn send_with_retry";

#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(sleep_violations)
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE: retry backoff in {BACKOFF_FILE} ({BACKOFF_FN})");
        eprintln!("❌ FORBIDDEN: polling loops, timers for circuit cooldown, sleep as synchronization");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_no_blocking_thread_sleep_anywhere() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(|file| {
            file.lines
                .iter()
                .enumerate()
                .filter(|(_, line)| code_part(line).contains("thread::sleep"))
                .map(|(idx, _)| file.violation(idx, "Blocking thread sleep"))
                .collect::<Vec<_>>()
        })
        .collect();

    assert!(violations.is_empty(), "{violations:#?}");
}

fn sleep_violations(file: &SourceFile) -> Vec<String> {
    file.lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            let code = code_part(line);
            code.contains("::sleep(") || code.contains(".sleep(")
        })
        .filter(|(idx, _)| !is_retry_backoff(file, *idx))
        .map(|(idx, _)| file.violation(idx, "Sleep call"))
        .collect()
}

fn is_retry_backoff(file: &SourceFile, idx: usize) -> bool {
    file.is(BACKOFF_FILE) && enclosing_fn(&file.lines, idx).is_some_and(|sig| sig.contains(BACKOFF_FN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sleep_in_polling_loop_detected() {
        let source = "async fn wait_for_circuit() {\n    loop {\n        tokio::time::sleep(d).await;\n    }\n}\n";
        let file = SourceFile::from_source(PathBuf::from("core/src/routing/circuit.rs"), source);
        assert_eq!(sleep_violations(&file).len(), 1);
    }

    #[test]
    fn test_retry_backoff_allowed() {
        let source = "pub(crate) async fn send_with_retry<F>(\n    provider: ProviderId,\n) {\n    tokio::time::sleep(retry.backoff).await;\n}\n";
        let file = SourceFile::from_source(PathBuf::from("core/src/provider/http.rs"), source);
        assert!(sleep_violations(&file).is_empty());
    }

    #[test]
    fn test_backoff_elsewhere_rejected() {
        let source = "async fn send_with_retry() {\n    tokio::time::sleep(d).await;\n}\n";
        let file = SourceFile::from_source(PathBuf::from("core/src/provider/ollama.rs"), source);
        assert_eq!(sleep_violations(&file).len(), 1);
    }
}
