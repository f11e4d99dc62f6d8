use std::time::Duration;

use jsontable_core::error::AppError;
use jsontable_core::models::FetchRequest;
use jsontable_core::traits::Fetcher;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{fetcher, mount_json, mount_redirect, request};

// =============================================================================
// SUCCESS
// =============================================================================

#[tokio::test]
async fn fetches_json_document() {
    let server = MockServer::start().await;
    mount_json(&server, "/data.json", json!({"items": [{"a": 1}]})).await;

    let doc = fetcher()
        .fetch(&request(&server, "/data.json"))
        .await
        .unwrap();

    assert_eq!(doc.data, json!({"items": [{"a": 1}]}));
    assert!(doc.redirects.is_empty());
    assert_eq!(doc.final_url, format!("{}/data.json", server.uri()));
}

#[tokio::test]
async fn forwards_configured_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("X-Api-Key", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1])))
        .expect(1)
        .mount(&server)
        .await;

    let req = request(&server, "/secure").with_header("X-Api-Key", "abc123");
    let doc = fetcher().fetch(&req).await.unwrap();

    assert_eq!(doc.data, json!([1]));
}

#[tokio::test]
async fn tls_insecure_has_no_effect_on_plain_http() {
    let server = MockServer::start().await;
    mount_json(&server, "/plain", json!([])).await;

    let req = request(&server, "/plain").with_tls_insecure(true);
    assert!(fetcher().fetch(&req).await.is_ok());
}

// =============================================================================
// REDIRECTS
// =============================================================================

async fn mount_two_hop_chain(server: &MockServer) {
    mount_redirect(server, 301, "/start", "/middle").await;
    mount_redirect(server, 301, "/middle", "/end").await;
    mount_json(server, "/end", json!({"ok": true})).await;
}

#[tokio::test]
async fn follows_redirect_chain_within_budget() {
    let server = MockServer::start().await;
    mount_two_hop_chain(&server).await;

    let req = request(&server, "/start").with_max_redirects(2);
    let doc = fetcher().fetch(&req).await.unwrap();

    assert_eq!(doc.data, json!({"ok": true}));
    assert_eq!(
        doc.redirects,
        vec![
            format!("{}/start", server.uri()),
            format!("{}/middle", server.uri()),
        ]
    );
    assert_eq!(doc.final_url, format!("{}/end", server.uri()));
}

#[tokio::test]
async fn redirect_budget_exhausted() {
    let server = MockServer::start().await;
    mount_two_hop_chain(&server).await;

    let req = request(&server, "/start").with_max_redirects(1);
    let err = fetcher().fetch(&req).await.unwrap_err();

    match err {
        AppError::TooManyRedirects { last_url } => {
            assert_eq!(last_url, format!("{}/middle", server.uri()));
        }
        other => panic!("expected TooManyRedirects, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_budget_rejects_first_redirect() {
    let server = MockServer::start().await;
    mount_redirect(&server, 302, "/moved", "/target").await;
    Mock::given(method("GET"))
        .and(path("/target"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let req = request(&server, "/moved").with_max_redirects(0);
    let err = fetcher().fetch(&req).await.unwrap_err();

    assert!(matches!(err, AppError::TooManyRedirects { .. }));
}

#[tokio::test]
async fn redirect_cycle_terminates() {
    let server = MockServer::start().await;
    mount_redirect(&server, 302, "/a", "/b").await;
    mount_redirect(&server, 302, "/b", "/a").await;

    let req = request(&server, "/a").with_max_redirects(5);
    let err = fetcher().fetch(&req).await.unwrap_err();

    assert!(matches!(err, AppError::TooManyRedirects { .. }));
}

#[tokio::test]
async fn absolute_location_across_servers() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_redirect(&first, 307, "/go", &format!("{}/landing", second.uri())).await;
    mount_json(&second, "/landing", json!(["there"])).await;

    let doc = fetcher().fetch(&request(&first, "/go")).await.unwrap();

    assert_eq!(doc.data, json!(["there"]));
    assert_eq!(doc.redirects.len(), 1);
}

#[tokio::test]
async fn redirect_without_location_is_terminal_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nowhere"))
        .respond_with(ResponseTemplate::new(302).set_body_string("moved somewhere"))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&request(&server, "/nowhere"))
        .await
        .unwrap_err();

    match err {
        AppError::HttpStatus { status, snippet } => {
            assert_eq!(status, 302);
            assert_eq!(snippet, "moved somewhere");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_location_is_terminal_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "")
                .set_body_string("no target"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let req = request(&server, "/empty").with_max_redirects(3);
    let err = fetcher().fetch(&req).await.unwrap_err();

    match err {
        AppError::HttpStatus { status, snippet } => {
            assert_eq!(status, 302);
            assert_eq!(snippet, "no target");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn not_found_carries_body_snippet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&request(&server, "/missing"))
        .await
        .unwrap_err();

    match &err {
        AppError::HttpStatus { status, snippet } => {
            assert_eq!(*status, 404);
            assert_eq!(snippet, "not found");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
    assert_eq!(err.to_string(), "HTTP 404: not found");
}

#[tokio::test]
async fn server_error_snippet_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(500).set_body_string("e".repeat(5000)))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&request(&server, "/boom"))
        .await
        .unwrap_err();

    match err {
        AppError::HttpStatus { status, snippet } => {
            assert_eq!(status, 500);
            assert_eq!(snippet.len(), 300);
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"items\": [1, 2"))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&request(&server, "/broken"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidJson(_)));
    assert!(err.to_string().starts_with("Failed to parse JSON:"));
}

#[tokio::test]
async fn timeout_stops_the_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", "/after")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let req = request(&server, "/slow").with_timeout(Duration::from_millis(100));
    let err = fetcher().fetch(&req).await.unwrap_err();

    assert!(matches!(err, AppError::Timeout(100)));
    assert_eq!(err.to_string(), "Request timeout after 100ms");
}

#[tokio::test]
async fn timeout_is_armed_per_hop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/first"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/second")
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([1]))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;

    // Each hop fits the budget, the whole chain does not.
    let req = request(&server, "/first").with_timeout(Duration::from_millis(250));
    let doc = fetcher().fetch(&req).await.unwrap();

    assert_eq!(doc.data, json!([1]));
}

#[tokio::test]
async fn body_over_limit_is_rejected() {
    let server = MockServer::start().await;
    mount_json(&server, "/big", json!({"blob": "x".repeat(4096)})).await;

    let req = request(&server, "/big").with_max_body_bytes(1024);
    let err = fetcher().fetch(&req).await.unwrap_err();

    assert!(matches!(err, AppError::ResponseTooLarge { limit: 1024 }));
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    // Bind and release a port so nothing is listening on it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let req = FetchRequest::new(format!("http://127.0.0.1:{port}/data"))
        .with_timeout(Duration::from_secs(5));
    let err = fetcher().fetch(&req).await.unwrap_err();

    assert!(matches!(err, AppError::Transport(_)));
    assert!(err.is_network());
}
