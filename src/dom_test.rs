// Unit tests for the in-memory page model

use super::*;

#[test]
fn test_new_document_has_html_head_body() {
    let doc = Document::new("https://example.com/");
    assert_eq!(doc.tag_name(doc.html()), "html");
    assert_eq!(doc.tag_name(doc.body()), "body");
    assert_eq!(doc.parent_element(doc.html()), None);
    assert_eq!(doc.ready_state(), ReadyState::Complete);
}

#[test]
fn test_same_tag_index_counts_only_matching_siblings() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let first_div = doc.append(body, "div");
    doc.append(body, "span");
    let second_div = doc.append(body, "DIV");

    assert_eq!(doc.same_tag_index(first_div), 0);
    assert_eq!(doc.same_tag_index(second_div), 1);
    assert_eq!(doc.child_by_tag(body, "div", 1), Some(second_div));
    assert_eq!(doc.child_by_tag(body, "div", 2), None);
}

#[test]
fn test_id_index_follows_attribute_changes() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let button = doc.append_with(body, "button", &[("id", "save")]);
    assert_eq!(doc.by_id("save"), Some(button));

    doc.set_attr(button, "id", "submit");
    assert_eq!(doc.by_id("save"), None);
    assert_eq!(doc.by_id("submit"), Some(button));
}

#[test]
fn test_by_class_requires_every_token() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let both = doc.append_with(body, "a", &[("class", "btn primary")]);
    doc.append_with(body, "a", &[("class", "btn")]);

    assert_eq!(doc.by_class("primary btn"), vec![both]);
    assert_eq!(doc.by_class("btn").len(), 2);
    assert!(doc.by_class("  ").is_empty());
}

#[test]
fn test_elements_are_in_document_order() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let list = doc.append(body, "ul");
    let first = doc.append(list, "li");
    let after = doc.append(body, "p");

    let order = doc.elements();
    let pos = |n: NodeId| order.iter().position(|x| *x == n).unwrap();
    assert!(pos(list) < pos(first));
    assert!(pos(first) < pos(after));
}

#[test]
fn test_selection_is_clamped_to_value_length() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let input = doc.append_with(body, "input", &[("value", "héllo")]);
    doc.set_selection(input, 99);
    assert_eq!(doc.selection(input), 5);
}
