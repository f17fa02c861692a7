//! End-to-end request handling through a node's own listener.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::Next;
use reqwest::StatusCode;
use serde_json::{json, Value};

use http_in_node::config::CorsConfig;
use http_in_node::http::middleware::cookies::Cookies;
use http_in_node::http::middleware::host::HttpNodeMiddleware;
use http_in_node::http::RequestFacade;
use http_in_node::{HttpMethod, NodeConfig, NodeHost, Payload};

mod common;

use common::{route, settings, spawn_echo_responder, spawn_responder, start_node};

async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

#[tokio::test]
async fn get_emits_the_query_as_payload() {
    let (node, rx) = start_node(route(HttpMethod::Get, "/items/:id"), settings()).await;
    spawn_echo_responder(rx);

    let response = reqwest::get(format!("{}/items/42?a=1&tag=x&tag=y", node.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["payload"], json!({"a": "1", "tag": ["x", "y"]}));
    assert_eq!(body["params"], json!({"id": "42"}));
    assert_eq!(body["msgid"].as_str().unwrap().len(), 16);
    node.node.close().await;
}

#[tokio::test]
async fn trailing_star_matches_the_rest_of_the_path() {
    let settings = http_in_node::HostSettings {
        cors: Some(CorsConfig::default()),
        ..settings()
    };
    let (node, rx) = start_node(route(HttpMethod::Get, "/files/*"), settings).await;
    spawn_echo_responder(rx);

    let response = reqwest::get(format!("{}/files/a/b%20c.txt", node.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["params"], json!({"0": "a/b c.txt"}));

    let outside = reqwest::get(format!("{}/other", node.base_url)).await.unwrap();
    assert_eq!(outside.status(), StatusCode::NOT_FOUND);
    node.node.close().await;
}

#[tokio::test]
async fn post_json_is_parsed() {
    let (node, rx) = start_node(route(HttpMethod::Post, "/hook"), settings()).await;
    spawn_echo_responder(rx);

    let response = reqwest::Client::new()
        .post(format!("{}/hook", node.base_url))
        .json(&json!({"x": 1}))
        .send()
        .await
        .unwrap();

    assert_eq!(json_body(response).await["payload"], json!({"x": 1}));
    node.node.close().await;
}

#[tokio::test]
async fn post_form_is_nested() {
    let (node, rx) = start_node(route(HttpMethod::Post, "/form"), settings()).await;
    spawn_echo_responder(rx);

    let response = reqwest::Client::new()
        .post(format!("{}/form", node.base_url))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("user%5Bname%5D=ann&user%5Brole%5D=admin&n=1")
        .send()
        .await
        .unwrap();

    assert_eq!(
        json_body(response).await["payload"],
        json!({"user": {"name": "ann", "role": "admin"}, "n": "1"})
    );
    node.node.close().await;
}

#[tokio::test]
async fn raw_json_keeps_the_body_as_text() {
    let config = NodeConfig {
        raw_json: true,
        ..route(HttpMethod::Post, "/raw")
    };
    let (node, rx) = start_node(config, settings()).await;
    spawn_echo_responder(rx);

    let response = reqwest::Client::new()
        .post(format!("{}/raw", node.base_url))
        .header("content-type", "application/json")
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(json_body(response).await["payload"], "hello");
    node.node.close().await;
}

#[tokio::test]
async fn raw_json_bodies_are_capped_separately() {
    let settings = http_in_node::HostSettings {
        text_body_max_size: "8b".into(),
        ..settings()
    };
    let config = NodeConfig {
        raw_json: true,
        ..route(HttpMethod::Put, "/raw")
    };
    let (node, mut rx) = start_node(config, settings).await;

    let response = reqwest::Client::new()
        .put(format!("{}/raw", node.base_url))
        .body("longer than eight bytes")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(rx.try_recv().is_err());
    node.node.close().await;
}

#[tokio::test]
async fn text_and_binary_bodies() {
    let (node, rx) = start_node(route(HttpMethod::Put, "/blob"), settings()).await;
    spawn_responder(rx, |mut msg| async move {
        let kind = match &msg.payload {
            Some(Payload::Text(text)) => format!("text:{text}"),
            Some(Payload::Binary(bytes)) => format!("binary:{}", bytes.len()),
            other => format!("other:{other:?}"),
        };
        msg.res.native_mut().send(kind);
    });
    let client = reqwest::Client::new();

    let text = client
        .put(format!("{}/blob", node.base_url))
        .header("content-type", "text/plain")
        .body("plain words")
        .send()
        .await
        .unwrap();
    assert_eq!(text.text().await.unwrap(), "text:plain words");

    let binary = client
        .put(format!("{}/blob", node.base_url))
        .header("content-type", "application/octet-stream")
        .body(vec![0xffu8, 0xfe, 0x00])
        .send()
        .await
        .unwrap();
    assert_eq!(binary.text().await.unwrap(), "binary:3");
    node.node.close().await;
}

#[tokio::test]
async fn raw_bodies_ignore_the_parser_size_cap() {
    let settings = http_in_node::HostSettings {
        max_body_size: "16b".into(),
        ..settings()
    };
    let (node, rx) = start_node(route(HttpMethod::Post, "/image"), settings).await;
    spawn_responder(rx, |mut msg| async move {
        let size = match &msg.payload {
            Some(Payload::Binary(bytes)) => bytes.len(),
            _ => 0,
        };
        msg.res.native_mut().send(size.to_string());
    });

    let image = vec![0x89u8; 64 * 1024];
    let response = reqwest::Client::new()
        .post(format!("{}/image", node.base_url))
        .header("content-type", "image/png")
        .body(image)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "65536");
    assert!(node.host.warnings().is_empty());
    node.node.close().await;
}

#[tokio::test]
async fn multipart_upload_collects_files() {
    let config = NodeConfig {
        upload: true,
        ..route(HttpMethod::Post, "/upload")
    };
    let (node, rx) = start_node(config, settings()).await;
    spawn_echo_responder(rx);

    let form = reqwest::multipart::Form::new().text("title", "report").part(
        "doc",
        reqwest::multipart::Part::bytes(b"a,b\n1,2\n".to_vec())
            .file_name("r.csv")
            .mime_str("text/csv")
            .unwrap(),
    );
    let response = reqwest::Client::new()
        .post(format!("{}/upload", node.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["payload"], json!({"title": "report"}));
    assert_eq!(
        body["files"],
        json!([{"field": "doc", "name": "r.csv", "type": "text/csv", "size": 8}])
    );
    node.node.close().await;
}

#[tokio::test]
async fn malformed_json_fails_without_emitting() {
    let (node, mut rx) = start_node(route(HttpMethod::Post, "/hook"), settings()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/hook", node.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "Internal Server Error");
    assert!(rx.try_recv().is_err());
    assert!(node.host.warnings()[0].starts_with("Request failed: invalid JSON body"));
    node.node.close().await;
}

#[tokio::test]
async fn oversized_json_fails() {
    let settings = http_in_node::HostSettings {
        max_body_size: "16b".into(),
        ..settings()
    };
    let (node, mut rx) = start_node(route(HttpMethod::Post, "/hook"), settings).await;

    let response = reqwest::Client::new()
        .post(format!("{}/hook", node.base_url))
        .json(&json!({"long": "abcdefghijklmnopqrstuvwxyz"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(rx.try_recv().is_err());
    node.node.close().await;
}

#[tokio::test]
async fn cookies_are_parsed() {
    let (node, rx) = start_node(route(HttpMethod::Get, "/c"), settings()).await;
    spawn_echo_responder(rx);

    let response = reqwest::Client::new()
        .get(format!("{}/c", node.base_url))
        .header("cookie", "session=abc; prefs=j%3A%7B%22dark%22%3Atrue%7D")
        .send()
        .await
        .unwrap();

    assert_eq!(
        json_body(response).await["cookies"],
        json!({"session": "abc", "prefs": {"dark": true}})
    );
    node.node.close().await;
}

#[tokio::test]
async fn cors_preflight_never_reaches_the_flow() {
    let settings = http_in_node::HostSettings {
        cors: Some(CorsConfig::default()),
        ..settings()
    };
    let (node, mut rx) = start_node(route(HttpMethod::Post, "/hook"), settings).await;
    let client = reqwest::Client::new();

    for path in ["/hook", "/anything/else", "/"] {
        let response = client
            .request(reqwest::Method::OPTIONS, format!("{}{}", node.base_url, path))
            .header("origin", "http://app.example")
            .header("access-control-request-method", "POST")
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success(), "{path}");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
    assert!(rx.try_recv().is_err());
    node.node.close().await;
}

#[tokio::test]
async fn cors_headers_on_normal_and_failed_requests() {
    let settings = http_in_node::HostSettings {
        cors: Some(CorsConfig::default()),
        ..settings()
    };
    let (node, rx) = start_node(route(HttpMethod::Post, "/hook"), settings).await;
    spawn_echo_responder(rx);
    let client = reqwest::Client::new();

    let ok = client
        .post(format!("{}/hook", node.base_url))
        .header("origin", "http://app.example")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.headers()["access-control-allow-origin"], "*");

    let failed = client
        .post(format!("{}/hook", node.base_url))
        .header("origin", "http://app.example")
        .header("content-type", "application/json")
        .body("[")
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.headers()["access-control-allow-origin"], "*");
    node.node.close().await;
}

#[tokio::test]
async fn host_middleware_runs_in_order_after_cookies() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let tag = |name: &'static str, seen: Arc<Mutex<Vec<String>>>| {
        HttpNodeMiddleware::new(move |req: Request, next: Next| {
            let seen = seen.clone();
            async move {
                let has_cookies = req.extensions().get::<Cookies>().is_some();
                seen.lock().unwrap().push(format!("{name}:{has_cookies}"));
                next.run(req).await
            }
        })
    };
    let settings = http_in_node::HostSettings {
        middleware: vec![tag("first", seen.clone()), tag("second", seen.clone())],
        ..settings()
    };
    let (node, rx) = start_node(route(HttpMethod::Get, "/m"), settings).await;
    spawn_echo_responder(rx);

    let response = reqwest::get(format!("{}/m", node.base_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["first:true".to_string(), "second:true".to_string()]
    );
    node.node.close().await;
}

#[tokio::test]
async fn metrics_are_reported_once_per_message() {
    let settings = http_in_node::HostSettings {
        metrics_enabled: true,
        ..settings()
    };
    let (node, rx) = start_node(route(HttpMethod::Get, "/m"), settings).await;
    spawn_responder(rx, |mut msg| async move {
        msg.res.native_mut().send("12345");
    });

    let response = reqwest::get(format!("{}/m", node.base_url)).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "12345");

    let metrics = node.host.metrics();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].name, "response.time.millis");
    assert_eq!(metrics[1].name, "response.content-length.bytes");
    assert_eq!(metrics[1].value, 5.0);
    assert_eq!(metrics[0].msgid, metrics[1].msgid);
    node.node.close().await;
}

#[tokio::test]
async fn metrics_disabled_reports_nothing() {
    let (node, rx) = start_node(route(HttpMethod::Get, "/m"), settings()).await;
    spawn_echo_responder(rx);

    reqwest::get(format!("{}/m", node.base_url)).await.unwrap();
    assert!(node.host.metrics().is_empty());
    node.node.close().await;
}

#[tokio::test]
async fn dropped_response_is_a_server_error() {
    let (node, rx) = start_node(route(HttpMethod::Get, "/drop"), settings()).await;
    spawn_responder(rx, |msg| async move { drop(msg) });

    let response = reqwest::get(format!("{}/drop", node.base_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(node.host.warnings()[0].starts_with("No response sent for message"));
    node.node.close().await;
}

#[tokio::test]
async fn facade_calls_warn_and_still_work() {
    let (node, rx) = start_node(route(HttpMethod::Get, "/f"), settings()).await;
    let host = node.host.clone();
    spawn_responder(rx, move |mut msg| {
        let host = host.clone();
        async move {
            let req = RequestFacade::new(msg.req.clone(), host as Arc<dyn NodeHost>);
            let agent = req.get("x-agent").unwrap_or_default();
            msg.res.status(201).set("x-agent", &agent).send(Payload::from("made"));
        }
    });

    let response = reqwest::Client::new()
        .get(format!("{}/f", node.base_url))
        .header("x-agent", "probe")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-agent"], "probe");
    assert_eq!(response.text().await.unwrap(), "made");
    assert_eq!(
        node.host.warnings(),
        vec![
            "Deprecated call to msg.req.get".to_string(),
            "Deprecated call to msg.res.status".to_string(),
            "Deprecated call to msg.res.set".to_string(),
            "Deprecated call to msg.res.send".to_string(),
        ]
    );
    node.node.close().await;
}

#[tokio::test]
async fn other_methods_are_not_routed() {
    let (node, mut rx) = start_node(route(HttpMethod::Post, "/only-post"), settings()).await;

    let response = reqwest::get(format!("{}/only-post", node.base_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let missing = reqwest::get(format!("{}/nope", node.base_url)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
    node.node.close().await;
}
