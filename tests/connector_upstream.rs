//! Connector tests against a live mock upstream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use upstream_connector::{
    Connector, ConnectorError, MemoryCache, Rendered, Representation, RequestSpec,
    ReqwestTransport,
};

mod common;

fn connector(base_uri: &str) -> Connector {
    Connector::new(Arc::new(ReqwestTransport::new()))
        .with_base_uri(base_uri)
        .with_cache_store(Arc::new(MemoryCache::new()))
}

fn proxy_connector(base_uri: &str) -> Connector {
    Connector::for_proxy(Arc::new(ReqwestTransport::new())).with_base_uri(base_uri)
}

#[tokio::test]
async fn test_get_then_cache_hit() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri());

    let mut first = connector.execute(RequestSpec::get("/users")).await.unwrap();
    assert_eq!(first.status(), 200);
    assert!(!first.cache_hit());
    assert_eq!(first.header_line("content-type"), "application/json");
    assert_eq!(
        first.get_response(Representation::Json).unwrap(),
        Some(Rendered::Json(json!({"id": 1, "name": "ada"})))
    );

    let mut second = connector.execute(RequestSpec::get("/users")).await.unwrap();
    assert!(second.cache_hit());
    assert_eq!(
        second.get_response(Representation::Json).unwrap(),
        Some(Rendered::Json(json!({"id": 1, "name": "ada"})))
    );
    assert_eq!(upstream.hits(), 1);

    let stats = connector.cache().stats();
    assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
}

#[tokio::test]
async fn test_fully_qualified_url_is_not_duplicated() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri());

    let url = format!("{}/users", upstream.base_uri());
    connector.execute(RequestSpec::get(url)).await.unwrap();
    assert_eq!(upstream.last_request().unwrap().path, "/users");
}

#[tokio::test]
async fn test_json_body_when_content_type_is_json() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri());

    let mut envelope = connector
        .execute(
            RequestSpec::post("/echo")
                .with_field("name", "ada")
                .with_field("roles", json!(["admin"]))
                .with_header("content-type", vec!["application/json"]),
        )
        .await
        .unwrap();

    let Some(Rendered::Json(echo)) = envelope.get_response(Representation::Json).unwrap() else {
        panic!("expected a JSON echo");
    };
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["headers"]["content-type"], "application/json");
    let sent: serde_json::Value = serde_json::from_str(echo["body"].as_str().unwrap()).unwrap();
    assert_eq!(sent, json!({"name": "ada", "roles": ["admin"]}));
}

#[tokio::test]
async fn test_form_body_by_default() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri());

    connector
        .execute(
            RequestSpec::post("/echo")
                .with_field("name", "ada")
                .with_field("active", true),
        )
        .await
        .unwrap();

    let request = upstream.last_request().unwrap();
    assert_eq!(
        request.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    assert!(request.body.contains("name=ada"));
    assert!(request.body.contains("active=1"));
}

#[tokio::test]
async fn test_get_never_sends_a_body() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri());

    connector
        .execute(RequestSpec::get("/echo").with_field("ignored", "yes"))
        .await
        .unwrap();
    assert!(upstream.last_request().unwrap().body.is_empty());
}

#[tokio::test]
async fn test_status_outside_allow_list_is_fatal() {
    let upstream = common::start_upstream().await;
    let mut connector = connector(&upstream.base_uri());
    connector.set_valid_status_codes([200, 201]).unwrap();

    let err = connector
        .execute(RequestSpec::post("/missing").with_field("id", 7))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("(200,201)"));
    let mut envelope = err.into_response().unwrap();
    assert_eq!(envelope.status(), 404);
    assert_eq!(
        envelope.get_response(Representation::Json).unwrap(),
        Some(Rendered::Json(json!({"error": "missing"})))
    );
}

#[tokio::test]
async fn test_proxy_allow_list_tolerates_404() {
    let upstream = common::start_upstream().await;
    let connector = proxy_connector(&upstream.base_uri());

    let mut envelope = connector.execute(RequestSpec::get("/missing")).await.unwrap();
    assert_eq!(envelope.status(), 404);
    assert_eq!(envelope.reason_phrase(), "Not Found");
    assert_eq!(
        envelope.get_response(Representation::Json).unwrap(),
        Some(Rendered::Json(json!({"error": "missing"})))
    );
}

#[tokio::test]
async fn test_server_error_is_fatal_for_proxy() {
    let upstream = common::start_upstream().await;
    let connector = proxy_connector(&upstream.base_uri());

    let err = connector.execute(RequestSpec::get("/broken")).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_empty_body_renders_nothing() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri());

    let mut envelope = connector.execute(RequestSpec::get("/empty")).await.unwrap();
    assert_eq!(envelope.status(), 204);
    assert_eq!(envelope.get_response(Representation::Json).unwrap(), None);
    assert!(matches!(
        envelope.get_response(Representation::Json),
        Err(ConnectorError::AlreadyConsumed)
    ));
}

#[tokio::test]
async fn test_xml_as_text() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri());

    let mut envelope = connector.execute(RequestSpec::get("/page.xml")).await.unwrap();
    assert_eq!(
        envelope.get_response(Representation::Xml).unwrap(),
        Some(Rendered::Text("<page>1</page>".into()))
    );
}

#[tokio::test]
async fn test_timeout_is_fatal_without_status() {
    let upstream = common::start_upstream().await;
    let connector = connector(&upstream.base_uri()).with_timeout(Duration::from_millis(100));

    let err = connector.execute(RequestSpec::get("/slow")).await.unwrap_err();
    assert_eq!(err.status(), None);
    assert!(err.to_string().contains("timed out"));
    assert_eq!(connector.cache().stats().writes, 0);
}

#[tokio::test]
async fn test_connection_refused_is_fatal() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = connector(&format!("http://{addr}"));
    let err = connector.execute(RequestSpec::get("/users")).await.unwrap_err();
    assert!(matches!(err, ConnectorError::HttpExecution { status: None, .. }));
}
