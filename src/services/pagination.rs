use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ApiError;
use crate::models::PageEnvelope;
use crate::services::gateway::{ApiRequest, Gateway};

pub const DISABLED_CLASS: &str = "disabled";

/// How `current_page` is derived when the envelope has no `next` link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRule {
    #[default]
    FirstPage,
    /// Used by the host "all submissions" list: last page is `ceil(count / page_size)`.
    CountOverPageSize { page_size: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub is_next: bool,
    pub is_prev: bool,
    pub current_page: u64,
    pub count: u64,
    pub next_url: Option<String>,
    pub previous_url: Option<String>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            is_next: false,
            is_prev: false,
            current_page: 1,
            count: 0,
            next_url: None,
            previous_url: None,
        }
    }
}

impl PageState {
    pub fn from_envelope<T>(page: &PageEnvelope<T>, rule: PageRule) -> Self {
        let current_page = match &page.next {
            Some(next) => match page_number_from_url(next) {
                // A `page=1` next link would give page 0; it is clamped to the first page.
                Some(number) => number.saturating_sub(1).max(1),
                None => {
                    warn!(next = %next, "next link has no page number");
                    1
                }
            },
            None => match rule {
                PageRule::FirstPage => 1,
                PageRule::CountOverPageSize { page_size } => last_page(page.count, page_size),
            },
        };

        Self {
            is_next: !page.is_last_page(),
            is_prev: !page.is_first_page(),
            current_page,
            count: page.count,
            next_url: page.next.clone(),
            previous_url: page.previous.clone(),
        }
    }

    pub fn is_next_class(&self) -> &'static str {
        if self.is_next { "" } else { DISABLED_CLASS }
    }

    pub fn is_prev_class(&self) -> &'static str {
        if self.is_prev { "" } else { DISABLED_CLASS }
    }
}

/// Extracts `N` from the first `page=N` query parameter of a pagination link.
pub fn page_number_from_url(url: &str) -> Option<u64> {
    let (_, tail) = url.split_once("page=")?;
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn last_page(count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 1;
    }
    count.div_ceil(page_size).max(1)
}

/// One list screen's items plus the state derived from the last successful fetch.
#[derive(Debug, Clone)]
pub struct Paginator<T> {
    pub rule: PageRule,
    pub items: Vec<T>,
    pub state: PageState,
    /// Path or link of the page currently shown.
    pub current_url: Option<String>,
}

impl<T> Default for Paginator<T> {
    fn default() -> Self {
        Self::new(PageRule::FirstPage)
    }
}

impl<T> Paginator<T> {
    pub fn new(rule: PageRule) -> Self {
        Self {
            rule,
            items: Vec::new(),
            state: PageState::default(),
            current_url: None,
        }
    }

    pub fn apply(&mut self, page: PageEnvelope<T>) {
        self.state = PageState::from_envelope(&page, self.rule);
        self.items = page.results;
    }
}

impl<T> Paginator<T>
where
    T: DeserializeOwned,
{
    /// Fetches one page; state is only recomputed when the fetch succeeds.
    pub async fn load(
        &mut self,
        gateway: &Gateway,
        path: &str,
        token: Option<String>,
    ) -> Result<(), ApiError> {
        let page: PageEnvelope<T> = gateway
            .fetch(ApiRequest::get(path).with_token(token))
            .await?;
        self.apply(page);
        self.current_url = Some(path.to_string());
        Ok(())
    }

    /// Re-fetches the page currently shown, or `first_path` when nothing is loaded yet.
    pub async fn reload(
        &mut self,
        gateway: &Gateway,
        first_path: &str,
        token: Option<String>,
    ) -> Result<(), ApiError> {
        let path = self
            .current_url
            .clone()
            .unwrap_or_else(|| first_path.to_string());
        self.load(gateway, &path, token).await
    }

    /// Returns `Ok(false)` without a request when already on the last page.
    pub async fn next(&mut self, gateway: &Gateway, token: Option<String>) -> Result<bool, ApiError> {
        let Some(url) = self.state.next_url.clone() else {
            return Ok(false);
        };
        self.load(gateway, &url, token).await?;
        Ok(true)
    }

    pub async fn previous(
        &mut self,
        gateway: &Gateway,
        token: Option<String>,
    ) -> Result<bool, ApiError> {
        let Some(url) = self.state.previous_url.clone() else {
            return Ok(false);
        };
        self.load(gateway, &url, token).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::test_support::StubTransport;
    use serde_json::json;

    fn envelope(count: u64, next: Option<&str>, previous: Option<&str>) -> PageEnvelope<u64> {
        PageEnvelope {
            count,
            next: next.map(str::to_string),
            previous: previous.map(str::to_string),
            results: vec![],
        }
    }

    #[test]
    fn test_last_page_defaults_to_one() {
        let state = PageState::from_envelope(
            &envelope(57, None, Some("http://h/api/x/?page=5")),
            PageRule::FirstPage,
        );
        assert!(!state.is_next);
        assert_eq!(state.is_next_class(), "disabled");
        assert_eq!(state.is_prev_class(), "");
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn test_next_link_gives_page_minus_one() {
        let state = PageState::from_envelope(
            &envelope(57, Some("http://h/api/x/?page=4"), Some("http://h/api/x/?page=2")),
            PageRule::FirstPage,
        );
        assert!(state.is_next);
        assert_eq!(state.is_next_class(), "");
        assert_eq!(state.current_page, 3);
    }

    #[test]
    fn test_next_link_to_page_one_stays_on_first_page() {
        let state = PageState::from_envelope(
            &envelope(5, Some("http://h/api/x/?page=1"), None),
            PageRule::FirstPage,
        );
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn test_first_page_flags() {
        let state = PageState::from_envelope(
            &envelope(30, Some("http://h/api/x/?page=2"), None),
            PageRule::FirstPage,
        );
        assert_eq!(state.current_page, 1);
        assert_eq!(state.is_prev_class(), "disabled");
    }

    #[test]
    fn test_count_over_page_size_rule() {
        let rule = PageRule::CountOverPageSize { page_size: 100 };
        assert_eq!(
            PageState::from_envelope(&envelope(300, None, Some("p")), rule).current_page,
            3
        );
        assert_eq!(
            PageState::from_envelope(&envelope(250, None, Some("p")), rule).current_page,
            3
        );
        assert_eq!(
            PageState::from_envelope(&envelope(0, None, None), rule).current_page,
            1
        );
    }

    #[test]
    fn test_page_number_parsing() {
        assert_eq!(page_number_from_url("http://h/api/x/?page=12"), Some(12));
        assert_eq!(
            page_number_from_url("http://h/api/x/?page=7&page_size=10"),
            Some(7)
        );
        assert_eq!(page_number_from_url("http://h/api/x/"), None);
    }

    #[tokio::test]
    async fn test_paginator_follows_links() {
        let stub = StubTransport::new();
        stub.push_ok(json!({
            "count": 3,
            "next": "http://h/api/teams/?page=2",
            "previous": null,
            "results": [1, 2]
        }));
        stub.push_ok(json!({
            "count": 3,
            "next": null,
            "previous": "http://h/api/teams/",
            "results": [3]
        }));
        let gateway = Gateway::new(stub.clone());
        let mut paginator: Paginator<u64> = Paginator::default();

        paginator.load(&gateway, "teams/", None).await.unwrap();
        assert_eq!(paginator.items, vec![1, 2]);
        assert!(paginator.next(&gateway, None).await.unwrap());
        assert_eq!(paginator.items, vec![3]);
        assert_eq!(paginator.state.is_next_class(), "disabled");
        assert!(!paginator.next(&gateway, None).await.unwrap());
        assert_eq!(stub.requests()[1].path, "http://h/api/teams/?page=2");
        assert_eq!(stub.request_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_state() {
        let stub = StubTransport::new();
        stub.push_ok(json!({
            "count": 4,
            "next": "http://h/api/teams/?page=2",
            "previous": null,
            "results": [1, 2]
        }));
        stub.push_status(500, json!({ "error": "boom" }));
        let gateway = Gateway::new(stub.clone());
        let mut paginator: Paginator<u64> = Paginator::default();

        paginator.load(&gateway, "teams/", None).await.unwrap();
        assert!(paginator.next(&gateway, None).await.is_err());
        assert_eq!(paginator.items, vec![1, 2]);
        assert!(paginator.state.is_next);
        assert_eq!(paginator.current_url.as_deref(), Some("teams/"));
    }

    #[tokio::test]
    async fn test_reload_fetches_the_page_shown() {
        let stub = StubTransport::new();
        stub.push_ok(json!({
            "count": 25,
            "next": "http://h/api/teams/?page=3",
            "previous": "http://h/api/teams/",
            "results": [11]
        }));
        stub.push_ok(json!({
            "count": 25,
            "next": null,
            "previous": "http://h/api/teams/?page=2",
            "results": [21]
        }));
        stub.push_ok(json!({
            "count": 25,
            "next": null,
            "previous": "http://h/api/teams/?page=2",
            "results": [21, 22]
        }));
        let gateway = Gateway::new(stub.clone());
        let mut paginator: Paginator<u64> = Paginator::default();

        paginator
            .load(&gateway, "http://h/api/teams/?page=2", None)
            .await
            .unwrap();
        paginator.next(&gateway, None).await.unwrap();
        assert_eq!(paginator.state.current_page, 1);

        paginator.reload(&gateway, "teams/", None).await.unwrap();
        assert_eq!(stub.requests()[2].path, "http://h/api/teams/?page=3");
        assert_eq!(paginator.items, vec![21, 22]);
    }

    #[tokio::test]
    async fn test_reload_before_load_uses_first_path() {
        let stub = StubTransport::new();
        stub.push_ok(json!({ "count": 0, "next": null, "previous": null, "results": [] }));
        let gateway = Gateway::new(stub.clone());
        let mut paginator: Paginator<u64> = Paginator::default();

        paginator.reload(&gateway, "teams/", None).await.unwrap();
        assert_eq!(stub.requests()[0].path, "teams/");
    }
}
