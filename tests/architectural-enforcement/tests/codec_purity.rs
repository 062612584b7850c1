//! Integration Test: Codec Purity
//!
//! **Policy**: The hexagram codec is pure and synchronous. It performs no
//! I/O, never suspends, and depends on neither the runtime nor the HTTP
//! client, so any surface can call it from any context.

use architectural_enforcement::scan;

const CODEC_DIR: &str = "oracle/core/src/hexagram";

const FORBIDDEN: [&str; 9] = [
    "tokio",
    "reqwest",
    "futures",
    "std::fs",
    "std::net",
    "std::io",
    "async ",
    ".await",
    "tracing::",
];

fn forbidden_in_codec(code: &str) -> bool {
    FORBIDDEN.iter().any(|pattern| code.contains(pattern))
}

#[test]
fn test_codec_has_no_io_or_async() {
    let violations = scan(&[CODEC_DIR], forbidden_in_codec);

    if !violations.is_empty() {
        eprintln!("\n❌ I/O or async code found in the hexagram codec!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!("\nFound {} codec purity violation(s).", violations.len());
    }
}

#[test]
fn test_codec_detection() {
    assert!(forbidden_in_codec("use tokio::sync::mpsc;"));
    assert!(forbidden_in_codec("pub async fn lookup() {}"));
    assert!(!forbidden_in_codec("pub fn structure_for_name(name: &str) {}"));
}
