// Unit tests for the input delta codec

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_typing_yields_insertion_of_suffix() {
    for (previous, current, suffix) in [("", "h", "h"), ("h", "hi", "i"), ("foo", "foo bar", " bar")] {
        let delta = diff(previous, current);
        assert_eq!(delta, Delta::Insertion(suffix.to_string()));
        assert_eq!(apply(previous, &delta), current);
    }
}

#[test]
fn test_trailing_removal_yields_backspace_count() {
    let delta = diff("hello", "hel");
    assert_eq!(delta, Delta::BackspaceFromEnd(2));
    assert_eq!(apply("hello", &delta), "hel");

    assert_eq!(diff("x", ""), Delta::BackspaceFromEnd(1));
}

#[test]
fn test_mid_string_deletion_keeps_previous_value() {
    let delta = diff("hello world", "hello");
    assert_eq!(delta, Delta::BackspaceFromEnd(6));

    let delta = diff("hello world", "hlo world");
    match &delta {
        Delta::Deletion { previous, current } => {
            assert_eq!(previous, "hello world");
            assert_eq!(current, "hlo world");
        }
        other => panic!("expected deletion, got {:?}", other),
    }
    assert_eq!(apply("hello world", &delta), "hlo world");
}

#[test]
fn test_same_length_change_is_replace() {
    let delta = diff("cat", "cot");
    assert_eq!(delta, Delta::Replace("cot".to_string()));
    assert_eq!(apply("cat", &delta), "cot");
}

#[test]
fn test_non_append_insertion_is_replace() {
    let delta = diff("world", "hello world");
    assert_eq!(delta, Delta::Replace("hello world".to_string()));
}

#[test]
fn test_identical_values_replace_idempotently() {
    let delta = diff("same", "same");
    assert_eq!(apply("same", &delta), "same");
}

#[test]
fn test_counts_are_in_characters() {
    let delta = diff("naïve café", "naïve ca");
    assert_eq!(delta, Delta::BackspaceFromEnd(2));
    assert_eq!(apply("naïve café", &delta), "naïve ca");

    let delta = diff("日本", "日本語");
    assert_eq!(delta, Delta::Insertion("語".to_string()));
}

#[test]
fn test_backspace_past_start_empties_value() {
    assert_eq!(apply("ab", &Delta::BackspaceFromEnd(5)), "");
}

#[test]
fn test_wire_shape() {
    let json = serde_json::to_value(Delta::Insertion("hi".into())).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"deltaKind": "insertion", "deltaPayload": "hi"})
    );

    let json = serde_json::to_value(Delta::BackspaceFromEnd(3)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"deltaKind": "backspaceFromEnd", "deltaPayload": 3})
    );
    assert_eq!(Delta::BackspaceFromEnd(3).kind_name(), "backspaceFromEnd");
}
