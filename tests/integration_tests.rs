//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: upstream listing API → fetcher →
//! pagination controller → collections, and the relay server in front of it.

use futures::StreamExt;
use listing_relay::cli::{serve_on, AppState};
use listing_relay::http::{HttpClient, HttpClientConfig};
use listing_relay::notify::NotificationQueue;
use listing_relay::pagination::{ControllerConfig, DrainEvent, LoadOutcome, Phase, RetryPolicy};
use listing_relay::{Credential, ErrorKind, HttpPageFetcher, PaginationController, Resource};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Arc<HttpClient> {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .no_rate_limit()
        .build();
    Arc::new(HttpClient::with_config(config).unwrap())
}

fn controller_for(server: &MockServer) -> PaginationController<HttpPageFetcher> {
    PaginationController::with_config(
        HttpPageFetcher::new(client_for(server)),
        ControllerConfig {
            retry: RetryPolicy::none(),
            ..ControllerConfig::default()
        },
    )
}

fn token() -> Credential {
    Credential::bearer("test-token").unwrap()
}

fn listing(children: &[Value], after: Option<&str>) -> Value {
    json!({"kind": "Listing", "data": {"children": children, "after": after}})
}

fn post(id: &str, community: &str, score: i64) -> Value {
    json!({"kind": "t3", "data": {"id": id, "subreddit": community, "score": score}})
}

fn comment(id: &str, community: &str, score: i64) -> Value {
    json!({"kind": "t1", "data": {"id": id, "subreddit": community, "score": score}})
}

async fn mount_page(server: &MockServer, route: &str, after: Option<&str>, body: Value) {
    let mock = Mock::given(method("GET")).and(path(route));
    let mock = match after {
        Some(cursor) => mock.and(query_param("after", cursor)),
        None => mock.and(query_param_is_missing("after")),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ============================================================================
// Controller over HTTP
// ============================================================================

#[tokio::test]
async fn test_drain_over_http_dedups_across_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/user/alice/saved",
        None,
        listing(&[post("a", "rust", 1), post("b", "rust", 2)], Some("X")),
    )
    .await;
    mount_page(
        &server,
        "/user/alice/saved",
        Some("X"),
        listing(&[post("b", "rust", 2), post("c", "golang", 3)], None),
    )
    .await;

    let controller = Arc::new(controller_for(&server));
    let snapshot = controller
        .drain_all(Resource::saved("alice").key(), Some(token()))
        .await
        .unwrap();

    assert_eq!(snapshot.ids(), vec!["a", "b", "c"]);
    assert_eq!(snapshot.state.phase, Phase::Exhausted);
    assert_eq!(snapshot.items[2].kind.as_deref(), Some("t3"));
    assert_eq!(snapshot.items[2].str_field("subreddit"), Some("golang"));
}

#[tokio::test]
async fn test_incremental_load_over_http() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/user/alice/comments",
        None,
        listing(&[comment("c1", "rust", 1)], Some("t1_c1")),
    )
    .await;
    mount_page(
        &server,
        "/user/alice/comments",
        Some("t1_c1"),
        listing(&[comment("c2", "rust", 1)], None),
    )
    .await;

    let controller = controller_for(&server);
    let key = Resource::comments("alice").key();

    let first = controller.load_next_page(&key, Some(&token())).await;
    assert!(matches!(&first, LoadOutcome::Snapshot(s) if s.ids() == vec!["c1"]));

    let second = controller.load_next_page(&key, Some(&token())).await;
    assert!(matches!(&second, LoadOutcome::Exhausted(s) if s.ids() == vec!["c1", "c2"]));
}

#[tokio::test]
async fn test_drain_escalates_expired_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/alice/saved"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let sign_outs = Arc::new(AtomicUsize::new(0));
    let counter = sign_outs.clone();
    let queue = Arc::new(NotificationQueue::new());
    let controller = Arc::new(
        PaginationController::with_config(
            HttpPageFetcher::new(client_for(&server)),
            ControllerConfig::default(),
        )
        .with_sign_out(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .with_notifications(queue.clone()),
    );

    let events: Vec<DrainEvent> = controller
        .start_drain(Resource::saved("alice").key(), Some(token()))
        .collect()
        .await;

    assert!(matches!(events.as_slice(), [DrainEvent::AuthExpired(_)]));
    assert_eq!(sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/alice/saved"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    // Default policy retries transport errors only
    let controller = PaginationController::with_config(
        HttpPageFetcher::new(client_for(&server)),
        ControllerConfig::default(),
    );
    let outcome = controller
        .load_next_page(&Resource::saved("alice").key(), Some(&token()))
        .await;

    assert!(matches!(outcome, LoadOutcome::Failed(info) if info.kind == ErrorKind::ServerError));
}

// ============================================================================
// Relay server
// ============================================================================

struct Relay {
    base: String,
    http: reqwest::Client,
    shutdown: CancellationToken,
}

impl Relay {
    async fn start(upstream: &MockServer) -> Self {
        let state = AppState::new(
            client_for(upstream),
            ControllerConfig {
                retry: RetryPolicy::none(),
                ..ControllerConfig::default()
            },
            Arc::new(NotificationQueue::new()),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(serve_on(listener, state, shutdown.clone()));

        Self {
            base: format!("http://{addr}"),
            http: reqwest::Client::new(),
            shutdown,
        }
    }

    async fn get(&self, route: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.http.get(format!("{}{route}", self.base));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[tokio::test]
async fn test_relay_health() {
    let upstream = MockServer::start().await;
    let relay = Relay::start(&upstream).await;

    let (status, body) = relay.get("/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_relay_forwards_bearer_and_cursor() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/alice/saved"))
        .and(header("Authorization", "Bearer browser-token"))
        .and(query_param("after", "t3_x"))
        .and(query_param("limit", "25"))
        .and(query_param("sort", "new"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(listing(&[post("y", "rust", 5)], Some("t3_y"))),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = Relay::start(&upstream).await;
    let (status, body) = relay
        .get(
            "/api/listing/saved:alice?after=t3_x&limit=25&sort=new",
            Some("browser-token"),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["after"], "t3_y");
    assert_eq!(body["data"]["items"][0]["id"], "y");
}

#[tokio::test]
async fn test_relay_requires_credential() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let relay = Relay::start(&upstream).await;
    let (status, body) = relay.get("/api/listing/saved:alice", None).await;

    assert_eq!(status, 401);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "missing_credential");
}

#[tokio::test]
async fn test_relay_maps_upstream_failures() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/alice/saved"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/alice/submitted"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/alice/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&upstream)
        .await;

    let relay = Relay::start(&upstream).await;

    let (status, body) = relay.get("/api/listing/saved:alice", Some("t")).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "auth_expired");

    let (status, body) = relay.get("/api/listing/submitted:alice", Some("t")).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "server_error");

    let (status, body) = relay.get("/api/listing/comments:alice", Some("t")).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "malformed_response");

    let (status, body) = relay.get("/api/listing/likes:alice", Some("t")).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_relay_summary_drains_all_activity() {
    let upstream = MockServer::start().await;
    mount_page(
        &upstream,
        "/user/alice/saved",
        None,
        listing(&[post("s1", "golang", 40)], None),
    )
    .await;
    mount_page(
        &upstream,
        "/user/alice/submitted",
        None,
        listing(&[post("p1", "rust", 10), post("p2", "rust", 6)], Some("t3_p2")),
    )
    .await;
    mount_page(
        &upstream,
        "/user/alice/submitted",
        Some("t3_p2"),
        listing(&[post("p3", "zig", 2)], None),
    )
    .await;
    mount_page(
        &upstream,
        "/user/alice/comments",
        None,
        listing(&[comment("c1", "rust", 3), post("p1", "rust", 10)], None),
    )
    .await;

    let relay = Relay::start(&upstream).await;
    let (status, body) = relay.get("/api/summary/alice?top=2", Some("t")).await;

    assert_eq!(status, 200, "{body}");
    let report = &body["data"];
    assert_eq!(report["user"], "alice");
    assert_eq!(report["listings"]["submitted:alice"], 3);
    assert_eq!(report["listings"]["comments:alice"], 2);
    // p1 appears twice upstream but counts once
    assert_eq!(report["summary"]["total_items"], 5);
    assert_eq!(report["summary"]["posts"], 4);
    assert_eq!(report["summary"]["comments"], 1);
    assert_eq!(report["summary"]["total_score"], 61);
    assert_eq!(report["communities"][0]["community"], "golang");
    assert_eq!(report["communities"][1]["community"], "rust");
    assert_eq!(report["communities"][1]["items"], 3);
    assert_eq!(report["top_items"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["top_items"][0]["id"], "s1");
}

#[tokio::test]
async fn test_relay_summary_failure_posts_notification() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/alice/saved"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&upstream)
        .await;

    let relay = Relay::start(&upstream).await;
    let (status, body) = relay.get("/api/summary/alice", Some("t")).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "server_error");

    let (status, body) = relay.get("/api/notifications", None).await;
    assert_eq!(status, 200);
    let live = body["data"].as_array().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0]["position"], 0);
    assert_eq!(live[0]["kind"], "error");
    assert_eq!(live[0]["title"], "Failed to load user/alice/saved");

    let id = live[0]["id"].as_u64().unwrap();
    let response = relay
        .http
        .delete(format!("{}/api/notifications/{id}", relay.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let (_, body) = relay.get("/api/notifications", None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_relay_karma() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/me/karma"))
        .and(header("Authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "KarmaList",
            "data": [
                {"sr": "rust", "link_karma": 100, "comment_karma": 20},
                {"sr": "golang", "link_karma": 1, "comment_karma": 2}
            ]
        })))
        .mount(&upstream)
        .await;

    let relay = Relay::start(&upstream).await;
    let (status, body) = relay.get("/api/karma", Some("t")).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["link_karma"], 101);
    assert_eq!(body["data"]["comment_karma"], 22);
    assert_eq!(body["data"]["communities"][0]["community"], "rust");
}
