//! End-to-end request dispatch tests against a mock API.

use std::sync::Arc;
use std::time::Duration;

use api_testkit::assertions::{
    assert_content_type, assert_header_value, assert_json_array_length, assert_json_key_exists,
    assert_json_key_value, assert_json_schema, assert_response_time, assert_status_code,
};
use api_testkit::harness::performance_sample;
use api_testkit::{ApiClient, Config, RecordingClient, RequestOptions, Settings};
use reqwest::Method;
use serde_json::json;

mod common;

use common::{start_echo_backend, start_programmable_backend, MockResponse};

fn settings(base_url: &str) -> Arc<Settings> {
    let mut settings = Settings::default().with_base_url(base_url);
    settings.retry_delay = Duration::ZERO;
    settings.timeout = Duration::from_secs(5);
    Arc::new(settings)
}

fn user_backend_response(path: &str) -> MockResponse {
    match path {
        "/users/1" => MockResponse::json(
            200,
            &json!({
                "id": 1,
                "name": "Leanne Graham",
                "address": { "city": "Gwenborough" }
            }),
        )
        .header("X-Request-Source", "mock"),
        "/users" => MockResponse::json(200, &json!([{ "id": 1 }, { "id": 2 }])),
        _ => MockResponse::json(404, &json!({})),
    }
}

#[tokio::test]
async fn test_get_and_assert() {
    let backend = start_programmable_backend(|req| user_backend_response(req.path())).await;
    let client = ApiClient::new(settings(&backend.url())).unwrap();

    let response = client.get("users/1").await.unwrap();
    assert_status_code(&response, 200).unwrap();
    assert_content_type(&response, "application/json").unwrap();
    assert_header_value(&response, "x-request-source", "mock").unwrap();
    assert_response_time(&response, Duration::from_secs(5)).unwrap();
    assert_json_key_value(&response, "address.city", &json!("Gwenborough")).unwrap();
    assert_eq!(
        assert_json_key_exists(&response, "name").unwrap(),
        json!("Leanne Graham")
    );

    let response = client.get("/users").await.unwrap();
    assert_json_array_length(&response, "@", 2).unwrap();
    assert_json_key_value(&response, "[-1].id", &json!(2)).unwrap();
}

#[tokio::test]
async fn test_default_headers_and_per_call_override() {
    let backend = start_programmable_backend(|_| MockResponse::new(204)).await;
    let client = ApiClient::new(settings(&backend.url())).unwrap();

    client.get("/a").await.unwrap();
    let options = RequestOptions::new()
        .header("Accept", "text/plain")
        .header("X-Suite", "smoke")
        .query("page", 2)
        .query("q", "a b");
    client.request(Method::GET, "/b", options).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests[0].header("accept"), Some("application/json"));
    assert_eq!(requests[0].header("x-suite"), None);
    assert_eq!(requests[1].header("accept"), Some("text/plain"));
    assert_eq!(requests[1].header("x-suite"), Some("smoke"));
    assert_eq!(requests[1].path(), "/b");
    assert_eq!(requests[1].query(), Some("page=2&q=a+b"));
}

#[tokio::test]
async fn test_auth_header_set_then_removed() {
    let backend = start_programmable_backend(|_| MockResponse::new(200)).await;
    let mut client = ApiClient::new(settings(&backend.url())).unwrap();

    client.set_bearer_token("abc").unwrap();
    client.get("/me").await.unwrap();
    client.get("/me").await.unwrap();
    assert!(client.remove_header("Authorization"));
    client.get("/me").await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests[0].header("authorization"), Some("Bearer abc"));
    assert_eq!(requests[1].header("authorization"), Some("Bearer abc"));
    assert_eq!(requests[2].header("authorization"), None);
}

#[tokio::test]
async fn test_absolute_endpoint_ignores_base_url() {
    let backend = start_programmable_backend(|_| MockResponse::new(200)).await;
    let client = ApiClient::new(settings("http://127.0.0.1:9/api")).unwrap();

    let response = client
        .get(&format!("{}/status/200", backend.url()))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(backend.requests()[0].path(), "/status/200");
}

#[tokio::test]
async fn test_json_echo_round_trip() {
    let backend = start_echo_backend(201).await;
    let client = ApiClient::new(settings(&backend.url())).unwrap();
    let payload = json!({
        "title": "foo",
        "body": "bar",
        "userId": 1,
        "tags": ["x", "y"],
        "meta": { "draft": false }
    });

    let response = client.post("/posts", &payload).await.unwrap();
    assert_status_code(&response, 201).unwrap();
    for (key, value) in payload.as_object().unwrap() {
        assert_json_key_value(&response, key, value).unwrap();
    }

    let sent = &backend.requests()[0];
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_each_method_is_sent() {
    let backend = start_programmable_backend(|_| MockResponse::new(200)).await;
    let client = ApiClient::new(settings(&backend.url())).unwrap();

    client.get("/r").await.unwrap();
    client.post("/r", &json!({})).await.unwrap();
    client.put("/r", &json!({})).await.unwrap();
    client.patch("/r", &json!({})).await.unwrap();
    client.delete("/r").await.unwrap();
    client.head("/r").await.unwrap();
    client.options("/r").await.unwrap();

    let methods: Vec<String> = backend.requests().into_iter().map(|r| r.method).collect();
    assert_eq!(
        methods,
        ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"]
    );
}

#[tokio::test]
async fn test_schema_failure_names_missing_field() {
    let backend = start_programmable_backend(|_| {
        MockResponse::json(200, &json!({ "id": 1, "name": "Leanne Graham" }))
    })
    .await;
    let client = ApiClient::new(settings(&backend.url())).unwrap();
    let response = client.get("/users/1").await.unwrap();

    let schema = json!({
        "type": "object",
        "required": ["id", "name", "email"],
        "properties": {
            "id": { "type": "integer" },
            "name": { "type": "string" },
            "email": { "type": "string" }
        }
    });
    let failure = assert_json_schema(&response, &schema).unwrap_err();
    assert!(failure.message().contains("email"), "{}", failure.message());
}

#[tokio::test]
async fn test_recording_client_keeps_last_response() {
    let backend = start_programmable_backend(|req| user_backend_response(req.path())).await;
    let client = ApiClient::new(settings(&backend.url())).unwrap();
    let mut recording = RecordingClient::new(client);

    let status = recording.get("/users/1").await.unwrap().status();
    assert_eq!(status, 200);
    assert_eq!(recording.status_code(), Some(200));
    assert_eq!(recording.response_json().unwrap()["id"], 1);
    assert!(recording.response_time().is_some());
    assert!(recording.response_text().unwrap().contains("Leanne"));

    let status = recording.options("/users/1").await.unwrap().status();
    assert_eq!(status, 200);

    recording.get("/missing").await.unwrap();
    assert_eq!(recording.status_code(), Some(404));
    assert!(recording
        .response_headers()
        .unwrap()
        .contains_key("content-type"));
}

#[tokio::test]
async fn test_shared_client_across_tasks() {
    let backend = start_programmable_backend(|_| MockResponse::new(200)).await;
    let client = Arc::new(ApiClient::new(settings(&backend.url())).unwrap());

    let mut tasks = Vec::new();
    for i in 0..10 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.get(&format!("/items/{i}")).await.map(|r| r.status())
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 200);
    }
    assert_eq!(backend.hits(), 10);
}

#[tokio::test]
async fn test_performance_sample_against_backend() {
    let backend = start_programmable_backend(|_| MockResponse::new(200)).await;
    let client = ApiClient::new(settings(&backend.url())).unwrap();
    let client = &client;

    let report = performance_sample(10, 95, Duration::from_secs(5), move || client.get("/ping"))
        .await
        .unwrap();
    assert_eq!(report.samples.len(), 10);
    assert!(report.min <= report.percentile_time);
    assert_eq!(backend.hits(), 10);
}

#[tokio::test]
async fn test_client_from_config_file() {
    let backend = start_programmable_backend(|_| MockResponse::new(200)).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("environments.json");
    std::fs::write(
        &path,
        json!({
            "staging": {
                "base_url": backend.url(),
                "timeout": 5,
                "retry_count": 0,
                "retry_delay": 0,
                "headers": { "X-Env": "staging" }
            }
        })
        .to_string(),
    )
    .unwrap();

    let env = std::collections::HashMap::from([(
        "AUTH_TOKEN".to_string(),
        "secret-token".to_string(),
    )]);
    let config = Config::load_from(&path, Some("staging"), &env);
    let mut client = ApiClient::from_config(&config).unwrap();
    assert!(client.apply_configured_token().unwrap());

    client.get("/whoami").await.unwrap();
    let sent = &backend.requests()[0];
    assert_eq!(sent.header("x-env"), Some("staging"));
    assert_eq!(sent.header("authorization"), Some("Bearer secret-token"));
}
