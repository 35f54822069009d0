#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    #[cfg(unix)]
    fn test_command_exists() {
        assert!(DriverManager::command_exists("ls"));
        assert!(!DriverManager::command_exists("nonexistent_command_12345"));
    }

    #[test]
    fn test_find_free_port_prefers_standard_range() {
        let port = DriverManager::find_free_port(BrowserType::Chrome).unwrap();
        assert!(port > 0);
        if !DriverManager::is_port_in_use(9515) {
            assert_eq!(port, 9515);
        }
    }

    #[test]
    fn test_is_port_in_use() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(DriverManager::is_port_in_use(port));
    }

    #[tokio::test]
    async fn test_unreachable_driver_is_not_ready() {
        assert!(DriverManager::status("http://localhost:65432").await.is_none());
        assert!(!DriverManager::is_ready("http://localhost:65432").await);
    }

    #[test]
    fn test_status_reply_parses() {
        let status: DriverStatus = serde_json::from_str(
            r#"{"value":{"ready":false,"message":"Session already started"}}"#,
        )
        .unwrap();
        assert!(!status.value.ready);
        assert_eq!(status.value.message, "Session already started");
    }

    #[test]
    fn test_driver_commands() {
        assert_eq!(BrowserType::Firefox.driver_command(), "geckodriver");
        assert_eq!(BrowserType::Chrome.port_args(9515), vec!["--port=9515".to_string()]);
    }

    #[test]
    fn test_stop_all_without_processes() {
        DriverManager::new().stop_all();
    }
}
