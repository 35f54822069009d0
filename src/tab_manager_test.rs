#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::dom::{Document, ReadyState};
    use crate::simulated::{HostCall, SimulatedBrowser};

    const HOME: &str = "https://shop.test/";
    const CART: &str = "https://shop.test/cart";

    fn coordinator(browser: Arc<SimulatedBrowser>) -> TabCoordinator<SimulatedBrowser> {
        TabCoordinator::new(browser, TabTimings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_creates_then_updates_in_place() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser.clone());

        let first = tabs.ensure(HOME).await.unwrap();
        let second = tabs.ensure(CART).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.url, CART);
        assert_eq!(
            browser.calls(),
            vec![
                HostCall::Create { url: HOME.into() },
                HostCall::Update {
                    tab: first.id.clone(),
                    url: CART.into()
                },
            ]
        );
        assert!(!tabs.is_navigating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_update_falls_back_to_new_tab() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser.clone());

        let first = tabs.ensure(HOME).await.unwrap();
        browser.reject_updates(true);
        let second = tabs.ensure(CART).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(tabs.playback_tab().map(|t| t.id.clone()), Some(second.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_tab_is_replaced() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser.clone());

        let first = tabs.ensure(HOME).await.unwrap();
        assert!(browser.close_tab(&first.id));

        let second = tabs.ensure(CART).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(browser.tab_ids(), vec![second.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_creation_is_a_provisioning_error() {
        let browser = Arc::new(SimulatedBrowser::new());
        browser.reject_creates(true);
        let mut tabs = coordinator(browser);

        let err = tabs.ensure(HOME).await.unwrap_err();
        assert!(matches!(err, ReplayError::TabProvisioning(_)));
        assert!(tabs.playback_tab().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_that_never_loads_fails_provisioning() {
        let browser = Arc::new(SimulatedBrowser::new().with_page(HOME, |url| {
            let mut doc = Document::new(url);
            doc.set_ready_state(ReadyState::Loading);
            doc
        }));
        let mut tabs = coordinator(browser);

        let err = tabs.ensure(HOME).await.unwrap_err();
        assert!(err.to_string().contains("did not finish loading"), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_navigation_clears_flag() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser);
        tabs.ensure(HOME).await.unwrap();

        tabs.mark_navigating();
        assert!(tabs.is_navigating());
        tabs.settle_navigation().await.unwrap();
        assert!(!tabs.is_navigating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorded_tab_refs_map_to_playback_tabs() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser.clone());
        let home = tabs.ensure(HOME).await.unwrap();

        let opened = tabs
            .open_tab(Some(CART), Some(&TabId::from("rec-7")))
            .await
            .unwrap();
        assert_eq!(tabs.playback_tab().map(|t| t.id.clone()), Some(opened.id.clone()));

        // Unmapped refs are taken as live tab ids
        let back = tabs.focus(&home.id).await.unwrap();
        assert_eq!(back.id, home.id);

        let again = tabs.focus(&TabId::from("rec-7")).await.unwrap();
        assert_eq!(again.id, opened.id);
        assert_eq!(again.url, CART);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_returns_to_existing_tab() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser.clone());
        tabs.ensure(HOME).await.unwrap();

        let opened = tabs
            .create_recorded(Some(CART), Some(&TabId::from("rec-3")))
            .await
            .unwrap();
        assert!(tabs.is_navigating());
        tabs.await_opened(&opened.id).await.unwrap();

        let again = tabs.reopen(&opened.id).await.unwrap();
        assert_eq!(again.id, opened.id);
        assert_eq!(browser.tab_ids().len(), 2);
        assert!(browser.calls().contains(&HostCall::Activate { tab: opened.id.clone() }));
        assert!(!tabs.is_navigating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_unknown_tab_is_a_tab_action_error() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser);
        tabs.ensure(HOME).await.unwrap();

        let err = tabs.focus(&TabId::from("nope")).await.unwrap_err();
        assert!(matches!(err, ReplayError::TabAction(_)));
        assert!(err.is_step_local());
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_navigate() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser);

        assert!(tabs.should_navigate(HOME));
        tabs.ensure(HOME).await.unwrap();

        assert!(!tabs.should_navigate(HOME));
        assert!(!tabs.should_navigate("https://shop.test"));
        assert!(!tabs.should_navigate(""));
        assert!(tabs.should_navigate(CART));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_forgets_tab() {
        let browser = Arc::new(SimulatedBrowser::new());
        let mut tabs = coordinator(browser);
        let tab = tabs.ensure(HOME).await.unwrap();

        assert_eq!(tabs.release().map(|t| t.id), Some(tab.id));
        assert!(tabs.playback_tab().is_none());
        assert!(tabs.should_navigate(HOME));
    }

    #[test]
    fn test_same_url_normalizes() {
        assert!(same_url("https://a.test", "https://a.test/"));
        assert!(same_url("HTTPS://A.test/x", "https://a.test/x"));
        assert!(!same_url("https://a.test/x", "https://a.test/y"));
        assert!(same_url("not a url", "not a url"));
        assert!(!same_url("not a url", "https://a.test/"));
    }
}
