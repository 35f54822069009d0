// Unit tests for the action model

use super::*;
use crate::locator::PathStep;
use pretty_assertions::assert_eq;
use serde_json::json;

fn session() -> Vec<Action> {
    let page = "https://mail.test/compose";
    vec![
        Action::new(
            ActionKind::Click {
                tag_name: "button".into(),
                element_type: Some("button".into()),
                element_id: None,
                class_name: Some("compose primary".into()),
                parent_context: vec![ParentContext {
                    tag_name: "nav".into(),
                    id: None,
                    class_name: None,
                    index: 0,
                    list_context: None,
                    table_context: None,
                }],
            },
            Some(Locator::ByStructuralPath {
                steps: vec![
                    PathStep {
                        tag_name: "html".into(),
                        index: 0,
                    },
                    PathStep {
                        tag_name: "body".into(),
                        index: 0,
                    },
                    PathStep {
                        tag_name: "button".into(),
                        index: 2,
                    },
                ],
            }),
            12.5,
            page,
        ),
        Action::new(
            ActionKind::Input {
                tag_name: "textarea".into(),
                element_id: Some("body".into()),
                class_name: None,
                delta: Delta::Deletion {
                    previous: "Hello there".into(),
                    current: "Hello".into(),
                },
                cursor_position: 5,
            },
            Some(Locator::by_id("body")),
            80.25,
            page,
        ),
        Action::new(
            ActionKind::Change {
                tag_name: "input".into(),
                element_type: Some("checkbox".into()),
                value: ChangeValue::Checked(true),
            },
            Some(Locator::by_id("receipt")),
            95.0,
            page,
        ),
        Action::new(
            ActionKind::Change {
                tag_name: "select".into(),
                element_type: None,
                value: ChangeValue::Text("high".into()),
            },
            Some(Locator::by_id("priority")),
            99.0,
            page,
        ),
        Action::new(ActionKind::FormSubmit, Some(Locator::by_id("compose")), 120.0, page),
        Action::new(
            ActionKind::TabCreate {
                url: Some("https://mail.test/sent".into()),
                tab_ref: Some(TabId::from("8")),
                opener_tab_ref: Some(TabId::from("7")),
            },
            None,
            130.0,
            page,
        ),
    ]
}

#[test]
fn test_sequence_round_trips_through_json() {
    let actions = session();
    let json = serde_json::to_string(&actions).unwrap();
    let decoded: Vec<Action> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, actions);
}

#[test]
fn test_action_serializes_flat_with_kind_tag() {
    let actions = session();
    let click = serde_json::to_value(&actions[0]).unwrap();
    assert_eq!(click["kind"], "click");
    assert_eq!(click["tagName"], "button");
    assert_eq!(click["className"], "compose primary");
    assert_eq!(click["capturedAtMs"], 12.5);
    assert_eq!(click["pageUrl"], "https://mail.test/compose");
    assert_eq!(click["locator"]["strategy"], "byStructuralPath");
    assert!(click.get("elementId").is_none());

    let input = serde_json::to_value(&actions[1]).unwrap();
    assert_eq!(input["kind"], "input");
    assert_eq!(input["deltaKind"], "deletion");
    assert_eq!(input["cursorPosition"], 5);
}

#[test]
fn test_change_value_is_bool_or_string() {
    let actions = session();
    assert_eq!(serde_json::to_value(&actions[2]).unwrap()["value"], json!(true));
    assert_eq!(serde_json::to_value(&actions[3]).unwrap()["value"], json!("high"));

    assert!(ChangeValue::Text("on".into()).as_checked());
    assert!(!ChangeValue::Text("off".into()).as_checked());
    assert_eq!(ChangeValue::Checked(false).as_text(), "false");
}

#[test]
fn test_parses_minimal_actions() {
    let submit: Action = serde_json::from_value(json!({
        "kind": "formSubmit",
        "locator": {"strategy": "byId", "id": "signup"},
        "capturedAtMs": 4.0,
        "pageUrl": "https://a.test/"
    }))
    .unwrap();
    assert_eq!(submit.kind, ActionKind::FormSubmit);
    assert_eq!(submit.hints().tag_name, Some("form"));

    let focus: Action = serde_json::from_value(json!({
        "kind": "tabFocus",
        "tabRef": "12",
        "capturedAtMs": 9.0,
        "pageUrl": ""
    }))
    .unwrap();
    assert_eq!(focus.locator, None);
    assert!(focus.is_tab_action());
    assert_eq!(
        focus.kind,
        ActionKind::TabFocus {
            tab_ref: TabId::from("12"),
            from_tab_ref: None
        }
    );

    let click: Action = serde_json::from_value(json!({
        "kind": "click",
        "tagName": "a",
        "capturedAtMs": 1.0,
        "pageUrl": "https://a.test/"
    }))
    .unwrap();
    assert!(click.hints().parent_context.is_empty());
}

#[test]
fn test_kind_predicates() {
    let actions = session();
    let kinds: Vec<&str> = actions.iter().map(Action::kind_name).collect();
    assert_eq!(
        kinds,
        vec!["click", "input", "change", "change", "formSubmit", "tabCreate"]
    );
    assert!(actions[4].starts_navigation());
    assert!(!actions[0].starts_navigation());
    assert!(actions[5].is_tab_action());
}

#[test]
fn test_destination_of_navigation_is_target_url() {
    let navigation = Action::new(
        ActionKind::Navigation {
            url: "https://a.test/next".into(),
            from_url: Some("https://a.test/".into()),
        },
        None,
        3.0,
        "https://a.test/",
    );
    assert_eq!(navigation.destination(), "https://a.test/next");
    assert_eq!(session()[0].destination(), "https://mail.test/compose");
}

#[test]
fn test_hints_carry_element_fields() {
    let actions = session();
    let hints = actions[0].hints();
    assert_eq!(hints.tag_name, Some("button"));
    assert_eq!(hints.class_name, Some("compose primary"));
    assert_eq!(hints.element_type, Some("button"));
    assert_eq!(hints.parent_context.len(), 1);

    let change = actions[2].hints();
    assert_eq!(change.element_type, Some("checkbox"));
    assert_eq!(ActionKind::Scroll { x: 0.0, y: 1.0 }.clone(), ActionKind::Scroll { x: 0.0, y: 1.0 });
}

#[test]
fn test_summary_names_kind_and_target() {
    let actions = session();
    assert_eq!(actions[2].summary(), "      95.0ms  change     #receipt");
    assert!(actions[0].summary().ends_with("click      /html[1]/body[1]/button[3]"));
    assert!(actions[5].summary().ends_with("https://mail.test/sent"));
}

#[test]
fn test_output_format_serialization() {
    assert_eq!(serde_json::to_value(OutputFormat::Simple).unwrap(), json!("simple"));
    assert_eq!(OutputFormat::default(), OutputFormat::Json);
}
