use besthit::llm::{CompletionRequest, LlmCallError, MockLlmClient};
use besthit::server::{routes, AppState, MAX_BODY_BYTES};
use besthit::{LlmClient, SummarizerSettings, TemplateRenderer};
use serde_json::{json, Value};
use std::sync::Arc;

fn state(client: Arc<dyn LlmClient>) -> AppState {
    AppState {
        client,
        renderer: Arc::new(TemplateRenderer::new()),
        settings: SummarizerSettings::default(),
    }
}

/// Three paragraphs, 210 words
fn good_report() -> String {
    let paragraph = vec!["university"; 70].join(" ");
    json!({
        "title": "A proper title",
        "content": ([paragraph.as_str(); 3].join("\n\n")),
    })
    .to_string()
}

/// 1000-word request body; at rate 0.2 the summary needs 150..=250 words
fn request_body() -> Value {
    json!({
        "text": "UCLA is a public university. ".repeat(200),
        "include_title": true,
        "num_paragraph": 3,
        "compression_rate": 0.2,
    })
}

#[tokio::test]
async fn summarize_returns_selected_report() {
    let client = Arc::new(MockLlmClient::new(|_: &CompletionRequest| Ok(good_report())));
    let filter = routes(state(client));

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .json(&request_body())
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 200);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["title"], "A proper title");
    assert_eq!(body["content"].as_str().unwrap().split("\n\n").count(), 3);
}

#[tokio::test]
async fn missing_fields_are_bad_request() {
    let filter = routes(state(Arc::new(MockLlmClient::scripted(vec![]))));

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .json(&json!({"text": "only text"}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), 400);

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&filter)
        .await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn non_json_content_type_is_unsupported() {
    let filter = routes(state(Arc::new(MockLlmClient::scripted(vec![]))));

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .header("content-type", "text/plain")
        .body("hello")
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 415);
}

#[tokio::test]
async fn pipeline_failures_are_internal_errors() {
    let down = Arc::new(MockLlmClient::new(|_: &CompletionRequest| {
        Err(LlmCallError::RequestFailed("down".to_string()))
    }));
    let filter = routes(state(down));

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .json(&request_body())
        .reply(&filter)
        .await;
    assert_eq!(res.status(), 500);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["error"], "Internal server error");

    // a report that never meets the paragraph bounds
    let one_paragraph = Arc::new(MockLlmClient::new(|_: &CompletionRequest| {
        Ok(json!({"title": "A proper title", "content": "too short"}).to_string())
    }));
    let filter = routes(state(one_paragraph));

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .json(&request_body())
        .reply(&filter)
        .await;
    assert_eq!(res.status(), 500);
}

#[tokio::test]
async fn out_of_range_compression_rate_is_bad_request() {
    let client = Arc::new(MockLlmClient::scripted(vec![]));
    let filter = routes(state(client.clone()));

    let mut body = request_body();
    body["compression_rate"] = json!(1.5);

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .json(&body)
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 400);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn huge_paragraph_count_is_answered_not_dropped() {
    let client = Arc::new(MockLlmClient::new(|_: &CompletionRequest| Ok(good_report())));
    let filter = routes(state(client));

    let mut body = request_body();
    body["num_paragraph"] = json!(u64::MAX);

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .json(&body)
        .reply(&filter)
        .await;

    // no three-paragraph report reaches the lower bound
    assert_eq!(res.status(), 500);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn oversized_body_is_rejected_before_summarizing() {
    let client = Arc::new(MockLlmClient::scripted(vec![]));
    let filter = routes(state(client.clone()));

    let text = "a".repeat(MAX_BODY_BYTES as usize);
    let body = json!({
        "text": text,
        "include_title": true,
        "num_paragraph": 3,
        "compression_rate": 0.2,
    });

    let res = warp::test::request()
        .method("POST")
        .path("/summarize")
        .json(&body)
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 413);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn health_check() {
    let filter = routes(state(Arc::new(MockLlmClient::scripted(vec![]))));

    let res = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 200);
    assert_eq!(&res.body()[..], br#"{"status":"healthy"}"#);
}
