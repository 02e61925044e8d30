//! Tests for the page fetcher

use super::*;
use crate::auth::Credential;
use crate::error::ErrorKind;
use crate::http::{HttpClient, HttpClientConfig};
use crate::types::parse_params;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_for(server: &MockServer) -> HttpPageFetcher {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .no_rate_limit()
        .build();
    HttpPageFetcher::new(Arc::new(HttpClient::with_config(config).unwrap()))
}

fn listing(ids: &[&str], after: Option<&str>) -> serde_json::Value {
    let children: Vec<_> = ids
        .iter()
        .map(|id| json!({"kind": "t3", "data": {"id": id}}))
        .collect();
    json!({"kind": "Listing", "data": {"children": children, "after": after}})
}

#[test]
fn test_page_request_defaults() {
    let req = PageRequest::new("user/alice/saved");
    assert_eq!(req.limit, DEFAULT_PAGE_SIZE);
    assert!(req.after.is_none());
    assert_eq!(
        req.query_pairs(),
        vec![("limit".to_string(), "100".to_string())]
    );
}

#[test]
fn test_page_request_limit_is_clamped() {
    assert_eq!(PageRequest::new("x").limit(0).limit, 1);
    assert_eq!(PageRequest::new("x").limit(500).limit, MAX_PAGE_SIZE);
    assert_eq!(PageRequest::new("x").limit(25).limit, 25);
}

#[test]
fn test_page_request_cursor_overrides_param() {
    let params = parse_params(["after=stale", "t=all"]).unwrap();
    let req = PageRequest::new("x")
        .with_params(params)
        .after(Some("fresh".to_string()));

    let pairs = req.query_pairs();
    assert!(pairs.contains(&("after".to_string(), "fresh".to_string())));
    assert!(!pairs.contains(&("after".to_string(), "stale".to_string())));
    assert!(pairs.contains(&("t".to_string(), "all".to_string())));
}

#[test]
fn test_page_request_param_cursor_used_without_explicit() {
    let params = parse_params(["after=from_params", "limit=10"]).unwrap();
    let pairs = PageRequest::new("x").with_params(params).query_pairs();
    assert!(pairs.contains(&("after".to_string(), "from_params".to_string())));
    assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
    assert_eq!(pairs.iter().filter(|(k, _)| k == "limit").count(), 1);
}

#[tokio::test]
async fn test_fetch_first_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/alice/saved"))
        .and(header("Authorization", "Bearer tok"))
        .and(query_param("limit", "100"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["a", "b"], Some("X"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let cred = Credential::bearer("tok").unwrap();
    let page = fetcher
        .fetch_page(&PageRequest::new("user/alice/saved"), Some(&cred))
        .await
        .unwrap();

    let ids: Vec<_> = page.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(page.next_cursor.as_deref(), Some("X"));
}

#[tokio::test]
async fn test_fetch_with_cursor() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/alice/saved"))
        .and(query_param("after", "X"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["c"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let cred = Credential::bearer("tok").unwrap();
    let req = PageRequest::new("user/alice/saved").after(Some("X".to_string()));
    let page = fetcher.fetch_page(&req, Some(&cred)).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_missing_credential_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&[], None)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let err = fetcher
        .fetch_page(&PageRequest::new("user/alice/saved"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingCredential);
}

#[tokio::test]
async fn test_wrong_shape_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let cred = Credential::bearer("tok").unwrap();
    let err = fetcher
        .fetch_page(&PageRequest::new("x"), Some(&cred))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_forbidden_is_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let cred = Credential::bearer("tok").unwrap();
    let err = fetcher
        .fetch_page(&PageRequest::new("x"), Some(&cred))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}
