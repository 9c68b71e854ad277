use futures::StreamExt;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::protocol::content::Content;
use parley::services::genai::sse::SseDecoder;
use parley::services::genai::GenAiClient;

fn reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 3, "totalTokenCount": 7}
    })
}

fn client(server: &MockServer) -> GenAiClient {
    GenAiClient::new(server.uri(), Some("test-key".to_string()), "test-model")
}

#[tokio::test]
async fn test_generate_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("A cat on a mat.")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .generate_content(&[Content::text("What is in the picture?").with_role("user")])
        .await
        .unwrap();

    assert_eq!(response.text(), "A cat on a mat.");
    assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("STOP"));
    assert!(response.usage_metadata.is_some());

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body, json!({"contents": [{"role": "user", "parts": [{"text": "What is in the picture?"}]}]}));
}

#[tokio::test]
async fn test_generate_content_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate_content(&[Content::text("hi")])
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("429"), "{}", message);
    assert!(message.contains("quota exceeded"), "{}", message);
}

#[tokio::test]
async fn test_stream_yields_partials_in_order() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\r\n\r\n: keep-alive\n\ndata: {}\n\ndata: {}",
        reply("Once"),
        reply(" upon"),
        reply(" a time")
    );
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let partials: Vec<String> = client(&server)
        .generate_content_stream(&[Content::text("Tell me a story")])
        .await
        .unwrap()
        .map(|partial| partial.unwrap().text())
        .collect()
        .await;

    assert_eq!(partials, vec!["Once", " upon", " a time"]);
}

#[tokio::test]
async fn test_stream_reports_bad_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("data: {broken\n\n", "text/event-stream"))
        .mount(&server)
        .await;

    let results: Vec<_> = client(&server)
        .generate_content_stream(&[Content::text("hi")])
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
}

#[tokio::test]
async fn test_chat_carries_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Noted.")))
        .mount(&server)
        .await;

    let mut chat = client(&server).start_chat();
    chat.send_message("My name is Sam.").await.unwrap();
    let response = chat.send_message("What is my name?").await.unwrap();
    assert_eq!(response.text(), "Noted.");

    let roles: Vec<_> = chat.history().iter().map(|c| c.role.as_deref().unwrap()).collect();
    assert_eq!(roles, vec!["user", "model", "user", "model"]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = requests[1].body_json().unwrap();
    let contents = second["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["parts"][0]["text"], "My name is Sam.");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["parts"][0]["text"], "What is my name?");
}

#[tokio::test]
async fn test_failed_chat_turn_leaves_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut chat = client(&server).start_chat();
    assert!(chat.send_message("hello").await.is_err());
    assert!(chat.history().is_empty());
}

#[test]
fn test_sse_decoder_handles_split_chunks() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.push(b"da").is_empty());
    assert!(decoder.push(b"ta: {\"a\":").is_empty());
    assert!(decoder.push(b"1}\n").is_empty());
    assert_eq!(decoder.push(b"\n"), vec!["{\"a\":1}".to_string()]);
}

#[test]
fn test_sse_decoder_joins_multiline_data() {
    let mut decoder = SseDecoder::default();
    let events = decoder.push(b"event: message\nid: 7\ndata: first\ndata: second\n\n");
    assert_eq!(events, vec!["first\nsecond".to_string()]);
}

#[test]
fn test_sse_decoder_flushes_unterminated_event() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.push(b"data: tail").is_empty());
    assert_eq!(decoder.finish(), Some("tail".to_string()));
    assert_eq!(decoder.finish(), None);
}

fn sse(parts: &[&str]) -> String {
    parts.iter().map(|p| format!("data: {}\n\n", reply(p))).collect()
}

async fn drain_turn(chat: &mut parley::services::genai::ChatSession, text: &str) -> Vec<String> {
    let mut partials = chat.send_message_stream(text).await.unwrap();
    let mut texts = Vec::new();
    while let Some(partial) = partials.next().await {
        texts.push(partial.unwrap().text());
    }
    texts
}

#[tokio::test]
async fn test_streamed_chat_carries_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&["Hello", ", Sam."]), "text/event-stream"))
        .mount(&server)
        .await;

    let mut chat = client(&server).start_chat();
    assert_eq!(drain_turn(&mut chat, "My name is Sam.").await, vec!["Hello", ", Sam."]);
    assert_eq!(chat.history().len(), 2);
    assert_eq!(chat.history()[1].role.as_deref(), Some("model"));
    assert_eq!(chat.history()[1].joined_text(), "Hello, Sam.");

    drain_turn(&mut chat, "What is my name?").await;
    let roles: Vec<_> = chat.history().iter().map(|c| c.role.as_deref().unwrap()).collect();
    assert_eq!(roles, vec!["user", "model", "user", "model"]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = requests[1].body_json().unwrap();
    let contents = second["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["parts"][0]["text"], "My name is Sam.");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["text"], "Hello, Sam.");
    assert_eq!(contents[2]["parts"][0]["text"], "What is my name?");
}

#[tokio::test]
async fn test_streamed_chat_keeps_history_on_bad_stream() {
    let server = MockServer::start().await;
    let body = format!("data: {}\n\ndata: {{broken\n\n", reply("partial"));
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut chat = client(&server).start_chat();
    {
        let results: Vec<_> = chat.send_message_stream("hello").await.unwrap().collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }
    assert!(chat.history().is_empty());
}

#[tokio::test]
async fn test_abandoned_stream_leaves_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&["one", "two"]), "text/event-stream"))
        .mount(&server)
        .await;

    let mut chat = client(&server).start_chat();
    {
        let mut partials = chat.send_message_stream("count").await.unwrap();
        assert_eq!(partials.next().await.unwrap().unwrap().text(), "one");
    }
    assert!(chat.history().is_empty());
}
