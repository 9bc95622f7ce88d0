//! Tests for stdin command parsing

use super::*;

#[test]
fn test_blank_line() {
    assert_eq!(Command::parse("").unwrap(), None);
    assert_eq!(Command::parse("   \t").unwrap(), None);
}

#[test]
fn test_switch_one_node() {
    assert_eq!(
        Command::parse("on tpc-clusterer").unwrap(),
        Some(Command::Inspect {
            node: "tpc-clusterer".into(),
            on: true
        })
    );
    assert_eq!(
        Command::parse("  OFF  A ").unwrap(),
        Some(Command::Inspect {
            node: "A".into(),
            on: false
        })
    );
}

#[test]
fn test_switch_all() {
    assert_eq!(Command::parse("on all").unwrap(), Some(Command::InspectAll { on: true }));
    assert_eq!(Command::parse("off all").unwrap(), Some(Command::InspectAll { on: false }));
}

#[test]
fn test_list() {
    assert_eq!(Command::parse("list").unwrap(), Some(Command::List));
    assert_eq!(Command::parse("ls").unwrap(), Some(Command::List));
}

#[test]
fn test_rejected_lines() {
    assert!(Command::parse("on").is_err());
    assert!(Command::parse("on A B").is_err());
    assert!(Command::parse("list A").is_err());
    assert!(Command::parse("toggle A").is_err());
}

#[test]
fn test_error_message() {
    let err = Command::parse("toggle A").unwrap_err();
    assert_eq!(err.to_string(), "unknown command 'toggle A'");
}
