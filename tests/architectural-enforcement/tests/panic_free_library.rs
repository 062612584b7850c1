//! Integration Test: No Panicking Shortcuts in the Library
//!
//! **Policy**: `oracle-core` production code propagates errors. `unwrap()`
//! and `expect()` are allowed only in tests.

use architectural_enforcement::scan;

fn is_panicking_shortcut(code: &str) -> bool {
    code.contains(".unwrap()") || code.contains(".expect(")
}

#[test]
fn test_no_unwrap_in_library_code() {
    let violations = scan(&["oracle/core/src"], is_panicking_shortcut);

    if !violations.is_empty() {
        eprintln!("\n❌ unwrap()/expect() found in library code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!("\nFound {} violation(s). Return a typed error instead.", violations.len());
    }
}

#[test]
fn test_shortcut_detection() {
    assert!(is_panicking_shortcut("let x = parse().unwrap();"));
    assert!(is_panicking_shortcut("client.build().expect(\"client\")"));
    assert!(!is_panicking_shortcut("value.unwrap_or_default()"));
}
