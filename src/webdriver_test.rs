#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::locator::Locator;
    use serde_json::json;

    #[test]
    fn test_browser_type_from_str() {
        assert_eq!("firefox".parse::<BrowserType>().unwrap(), BrowserType::Firefox);
        assert_eq!("Chrome".parse::<BrowserType>().unwrap(), BrowserType::Chrome);
        assert_eq!("chromium".parse::<BrowserType>().unwrap(), BrowserType::Chrome);
        assert!("safari".parse::<BrowserType>().is_err());
    }

    #[test]
    fn test_drained_batch_parses_page_events() {
        let batch: PageBatch = serde_json::from_value(json!({
            "installed": true,
            "url": "https://shop.test/cart",
            "events": [
                {
                    "type": "click",
                    "pageUrl": "https://shop.test/cart",
                    "target": {
                        "locator": {"strategy": "byId", "id": "checkout"},
                        "tagName": "button",
                        "elementId": "checkout",
                        "parentContext": [
                            {"tagName": "ul", "index": 0, "listContext": {"itemCount": 3, "listType": "UL"}}
                        ]
                    }
                },
                {"type": "scroll", "x": 0, "y": 640, "pageUrl": "https://shop.test/cart"}
            ]
        }))
        .unwrap();

        assert!(batch.installed);
        assert_eq!(batch.events.len(), 2);
        match &batch.events[0].event {
            RawEvent::Click { target } => {
                assert_eq!(target.locator, Locator::by_id("checkout"));
                assert_eq!(target.parent_context[0].list_context.as_ref().unwrap().item_count, 3);
            }
            other => panic!("expected click, got {:?}", other),
        }
        assert_eq!(batch.events[1].page_url, "https://shop.test/cart");
        assert_eq!(batch.events[1].event, RawEvent::Scroll { x: 0.0, y: 640.0 });
    }

    #[test]
    fn test_input_snapshot_carries_caret() {
        let event: PageEvent = serde_json::from_value(json!({
            "type": "input",
            "pageUrl": "https://a.test/",
            "target": {
                "locator": {"strategy": "byStructuralPath", "steps": [
                    {"tagName": "html", "index": 0},
                    {"tagName": "body", "index": 0},
                    {"tagName": "input", "index": 1}
                ]},
                "tagName": "input",
                "elementType": "text",
                "value": "héllo",
                "previousValue": "hé",
                "cursorPosition": 5
            }
        }))
        .unwrap();

        let RawEvent::Input { target } = event.event else {
            panic!("expected input event");
        };
        assert_eq!(target.value.as_deref(), Some("héllo"));
        assert_eq!(target.previous_value.as_deref(), Some("hé"));
        assert_eq!(target.cursor_position, Some(5));
        assert_eq!(target.locator.to_xpath(), "/html[1]/body[1]/input[2]");
    }

    #[test]
    fn test_recorder_script_is_idempotent() {
        assert!(RECORDER_SCRIPT.contains("if (window.__webreplay_recorder) return true;"));
        for event in ["'click'", "'input'", "'change'", "'submit'", "'scroll'"] {
            assert!(RECORDER_SCRIPT.contains(event), "missing listener {}", event);
        }
    }

    #[test]
    fn test_recorder_script_reports_url_changes() {
        for hook in ["MutationObserver", "'pushState'", "'replaceState'", "'popstate'", "'hashchange'"] {
            assert!(RECORDER_SCRIPT.contains(hook), "missing {}", hook);
        }
        assert!(RECORDER_SCRIPT.contains("type: 'urlChanged'"));
        assert!(RECORDER_SCRIPT.contains("s.previousValue"));

        let event: PageEvent = serde_json::from_value(json!({
            "type": "urlChanged",
            "url": "https://shop.test/cart#step-2",
            "pageUrl": "https://shop.test/cart#step-2"
        }))
        .unwrap();
        assert_eq!(
            event.event,
            RawEvent::UrlChanged {
                url: "https://shop.test/cart#step-2".into()
            }
        );
    }
}
