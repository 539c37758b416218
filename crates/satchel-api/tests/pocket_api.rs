use httpmock::Method::POST;
use httpmock::MockServer;
use satchel_api::{Action, FetchRequest, ItemStatus, PocketApi};
use satchel_core::{ErrorKind, Event, RecordingSink};
use serde_json::json;
use std::sync::Arc;

#[test]
fn fetch_sends_credentials_and_parses_item_map() {
    let server = MockServer::start();

    let get = server.mock(|when, then| {
        when.method(POST).path("/v3/get").json_body_partial(
            json!({
                "consumer_key": "ck-1",
                "access_token": "token-1",
                "detailType": "complete",
                "state": "unread",
                "sort": "oldest",
                "offset": 0,
                "count": 50
            })
            .to_string(),
        );
        then.status(200).json_body(json!({
            "status": 1,
            "since": 1700000500,
            "list": {
                "11": {
                    "item_id": "11",
                    "given_url": "https://a.com/post",
                    "given_title": "A post",
                    "favorite": "0",
                    "status": "0",
                    "time_added": "1700000000",
                    "sort_id": 0
                },
                "12": {
                    "item_id": "12",
                    "resolved_url": "https://b.com/",
                    "resolved_title": "B",
                    "favorite": "1",
                    "status": "1",
                    "time_added": "1700000100",
                    "sort_id": 1
                }
            }
        }));
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");
    let response = api
        .fetch("token-1", &FetchRequest::unread_page(0, 50))
        .expect("fetch");

    get.assert_hits(1);
    assert_eq!(response.since, Some(1_700_000_500));
    assert_eq!(response.list.len(), 2);
    assert_eq!(response.list[0].item_id, "11");
    assert_eq!(response.list[1].status(), ItemStatus::Archived);
}

#[test]
fn add_accepts_wrapped_item_response() {
    let server = MockServer::start();

    let add = server.mock(|when, then| {
        when.method(POST).path("/v3/add").json_body_partial(
            json!({"url": "https://a.com", "title": "A", "access_token": "token-1"}).to_string(),
        );
        then.status(200).json_body(json!({
            "item": {"item_id": "99", "normal_url": "http://a.com", "title": "A (resolved)"},
            "status": 1
        }));
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");
    let item = api
        .add("token-1", "https://a.com", Some("A"))
        .expect("add item");

    add.assert_hits(1);
    assert_eq!(item.item_id, "99");
    assert_eq!(item.title.as_deref(), Some("A (resolved)"));
}

#[test]
fn archive_posts_send_action() {
    let server = MockServer::start();

    let send = server.mock(|when, then| {
        when.method(POST).path("/v3/send").json_body_partial(
            json!({"actions": [{"action": "archive", "item_id": "42"}]}).to_string(),
        );
        then.status(200)
            .json_body(json!({"action_results": [true], "status": 1}));
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");
    let response = api.archive("token-1", "42").expect("archive");

    send.assert_hits(1);
    assert!(response.all_succeeded());
    assert_eq!(response.items(), vec![None]);
}

#[test]
fn update_metadata_sends_title_and_tags_actions() {
    let server = MockServer::start();

    let send = server.mock(|when, then| {
        when.method(POST).path("/v3/send").json_body_partial(
            json!({"actions": [
                {"action": "add", "item_id": "42", "title": "Renamed"},
                {"action": "tags_replace", "item_id": "42", "tags": "rust,sync"}
            ]})
            .to_string(),
        );
        then.status(200)
            .json_body(json!({"action_results": [true, true], "status": 1}));
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");
    api.update_metadata(
        "token-1",
        "42",
        "Renamed",
        &["rust".to_string(), "sync".to_string()],
    )
    .expect("update metadata");

    send.assert_hits(1);
}

#[test]
fn rate_limited_failure_is_classified_and_broadcast() {
    let server = MockServer::start();

    let add = server.mock(|when, then| {
        when.method(POST).path("/v3/add");
        then.status(403)
            .header("X-Limit-User-Remaining", "0")
            .header("X-Limit-User-Reset", "1800")
            .header("X-Error", "User rate limit exceeded");
    });

    let sink = Arc::new(RecordingSink::new());
    let api = PocketApi::new(&server.base_url(), "ck-1")
        .expect("api client")
        .with_event_sink(sink.clone());

    let error = api
        .add("token-1", "https://a.com", None)
        .expect_err("rate limited");

    add.assert_hits(1);
    assert_eq!(error.kind, ErrorKind::RateLimited);
    assert_eq!(error.reset_delay, Some(1800));
    assert_eq!(error.http_code, Some(403));
    assert!(error.message.contains("User rate limit exceeded"));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        Event::Error {
            error: ErrorKind::RateLimited,
            message: error.message.clone(),
            http_code: Some(403),
            reset_delay: Some(1800),
        }
    );
}

#[test]
fn unauthorized_and_missing_permissions_are_distinct() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/v3/get");
        then.status(401).header("X-Error", "Invalid access token");
    });
    server.mock(|when, then| {
        when.method(POST).path("/v3/send");
        then.status(403).header("X-Limit-User-Remaining", "300");
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");

    let fetch_error = api
        .fetch("token-1", &FetchRequest::changes_since(1))
        .expect_err("unauthorized");
    assert_eq!(fetch_error.kind, ErrorKind::Unauthorized);
    assert_eq!(fetch_error.http_code, Some(401));

    let send_error = api
        .send_actions("token-1", &[Action::favorite("1")])
        .expect_err("forbidden");
    assert_eq!(send_error.kind, ErrorKind::MissingPermissions);
}

#[test]
fn network_failure_is_unreachable_without_http_code() {
    let api = PocketApi::new("http://127.0.0.1:9", "ck-1").expect("api client");

    let error = api
        .fetch("token-1", &FetchRequest::changes_since(1))
        .expect_err("connection refused");

    assert_eq!(error.kind, ErrorKind::Unreachable);
    assert!(error.http_code.is_none());
}

#[test]
fn missing_access_token_fails_before_any_request() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(POST).path("/v3/get");
        then.status(200).json_body(json!({"list": []}));
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");
    let error = api
        .fetch("", &FetchRequest::changes_since(1))
        .expect_err("no token");

    assert_eq!(error.kind, ErrorKind::Unauthorized);
    get.assert_hits(0);
}

#[test]
fn oauth_handshake_exchanges_code_for_token() {
    let server = MockServer::start();

    let request = server.mock(|when, then| {
        when.method(POST).path("/v3/oauth/request").json_body_partial(
            json!({"consumer_key": "ck-1", "redirect_uri": "satchel:done"}).to_string(),
        );
        then.status(200).json_body(json!({"code": "req-code"}));
    });
    let authorize = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/oauth/authorize")
            .json_body_partial(json!({"consumer_key": "ck-1", "code": "req-code"}).to_string());
        then.status(200)
            .json_body(json!({"access_token": "token-9", "username": "reader"}));
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");
    let code = api.request_token("satchel:done").expect("request token");
    assert_eq!(code, "req-code");
    assert!(api.authorize_url(&code, "satchel:done").contains("request_token=req-code"));

    let authorization = api.authorize(&code).expect("authorize");
    assert_eq!(authorization.access_token, "token-9");
    assert_eq!(authorization.username.as_deref(), Some("reader"));

    request.assert_hits(1);
    authorize.assert_hits(1);
}

#[test]
fn raw_send_returns_body_and_classifies_failures() {
    let server = MockServer::start();
    let ok = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/get")
            .header("x-accept", "application/json")
            .json_body_partial(json!({"count": 1}).to_string());
        then.status(200).json_body(json!({"status": 1, "list": []}));
    });
    let denied = server.mock(|when, then| {
        when.method(POST).path("/v3/send");
        then.status(401).header("X-Error", "Invalid access token");
    });

    let api = PocketApi::new(&server.base_url(), "ck-1").expect("api client");
    let body = api
        .send(reqwest::Method::POST, "/v3/get", json!({"count": 1}))
        .expect("raw send");
    let error = api
        .send(reqwest::Method::POST, "/v3/send", json!({"actions": []}))
        .expect_err("unauthorized");

    ok.assert_hits(1);
    denied.assert_hits(1);
    assert_eq!(body["status"], 1);
    assert_eq!(error.kind, ErrorKind::Unauthorized);
    assert_eq!(error.http_code, Some(401));
}
