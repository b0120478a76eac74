use chatpilot_core::constants::context::DEFAULT_SYSTEM_PROMPT;
use chatpilot_core::{ChatError, ChatMessage, ChatRequest, OpenAIClient, StreamEvent};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "sk-test";

fn client_for(server: &MockServer) -> OpenAIClient {
    OpenAIClient::new().unwrap().with_base_url(server.uri())
}

fn request() -> ChatRequest {
    ChatRequest::new(
        API_KEY,
        "gpt-4o-mini",
        vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
        0.7,
    )
}

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": delta}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

// ========================================================================
// Non-streaming completions
// ========================================================================

#[tokio::test]
async fn test_complete_returns_first_choice_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Olá!"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server).complete(&request()).await.unwrap();
    assert_eq!(text, "Olá!");
}

#[tokio::test]
async fn test_complete_with_no_choices_is_empty_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let text = client_for(&server).complete(&request()).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_complete_with_missing_content_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"index": 0, "finish_reason": "length"}]
        })))
        .mount(&server)
        .await;

    let text = client_for(&server).complete(&request()).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_complete_non_2xx_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"bad key"}"#))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert!(matches!(err, ChatError::Transport { status: 401, .. }));
    let msg = err.to_string();
    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains(r#"{"error":"bad key"}"#), "{msg}");
}

#[tokio::test]
async fn test_complete_unparseable_body_is_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert!(matches!(err, ChatError::Json(_)));
}

#[tokio::test]
async fn test_blank_key_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut req = request();
    req.api_key = String::new();
    let err = client_for(&server).complete(&req).await.unwrap_err();
    assert!(matches!(err, ChatError::Config(_)));

    let err = client_for(&server)
        .stream(&req, |_| {}, || {})
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Config(_)));
}

#[tokio::test]
async fn test_connection_failure_is_http_error() {
    let client = OpenAIClient::new().unwrap().with_base_url("http://127.0.0.1:1");
    let err = client.complete(&request()).await.unwrap_err();
    assert!(matches!(err, ChatError::Http(_)));
}

// ========================================================================
// Streaming
// ========================================================================

#[tokio::test]
async fn test_stream_delivers_deltas_then_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["Hel", "lo", "!"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let deltas = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Mutex::new(0usize));
    let d = deltas.clone();
    let n = done.clone();

    client_for(&server)
        .stream(
            &request(),
            move |delta| d.lock().unwrap().push(delta.to_string()),
            move || *n.lock().unwrap() += 1,
        )
        .await
        .unwrap();

    assert_eq!(*deltas.lock().unwrap(), vec!["Hel", "lo", "!"]);
    assert_eq!(*done.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_stream_handshake_failure_is_returned_without_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"bad key"}"#))
        .mount(&server)
        .await;

    let mut done = 0;
    let err = client_for(&server)
        .stream(&request(), |_| {}, || done += 1)
        .await
        .unwrap_err();

    assert_eq!(done, 0);
    let msg = err.to_string();
    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains(r#"{"error":"bad key"}"#), "{msg}");
}

#[tokio::test]
async fn test_stream_events_channel_ends_with_single_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["a", "b"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let rx = client_for(&server).stream_events(&request()).await.unwrap();
    let events: Vec<StreamEvent> = rx.collect().await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("a".into()),
            StreamEvent::Delta("b".into()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn test_stream_events_handshake_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client_for(&server).stream_events(&request()).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("upstream down"));
}

/// Serves one streamed response that never ends. Resolves with the number of
/// frames written once a write fails.
async fn endless_sse_server() -> (String, tokio::task::JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 4096];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return 0;
            }
            head.extend_from_slice(&buf[..n]);
        }

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();

        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"tick\"}}]}\n\n";
        let chunk = format!("{:x}\r\n{}\r\n", frame.len(), frame);
        let mut written = 0;
        loop {
            if socket.write_all(chunk.as_bytes()).await.is_err() {
                return written;
            }
            written += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn test_dropping_stream_receiver_closes_connection() {
    let (url, server) = endless_sse_server().await;
    let client = OpenAIClient::new().unwrap().with_base_url(url);

    let mut rx = client.stream_events(&request()).await.unwrap();
    assert_eq!(rx.next().await, Some(StreamEvent::Delta("tick".into())));
    drop(rx);

    let written = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server was still writing 5s after the receiver was dropped")
        .unwrap();
    assert!(written >= 1);
}

// ========================================================================
// Convenience entry points
// ========================================================================

#[tokio::test]
async fn test_chat_with_history_sends_budgeted_context() {
    use chatpilot_core::HistoryEntry;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "earlier"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "now"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![HistoryEntry::user("earlier"), HistoryEntry::assistant("reply")];
    let text = client_for(&server)
        .chat_with_history(API_KEY, "gpt-4o-mini", &history, "now", 0.2, "sys", 8000)
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_chat_sends_default_system_prompt_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": DEFAULT_SYSTEM_PROMPT},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "olá"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .chat(API_KEY, "gpt-4o-mini", "hello", 0.7)
        .await
        .unwrap();
    assert_eq!(text, "olá");
}

#[tokio::test]
async fn test_chat_stream_sends_default_system_prompt_and_streams() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "stream": true,
            "messages": [
                {"role": "system", "content": DEFAULT_SYSTEM_PROMPT},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["o", "lá"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut text = String::new();
    let mut done = 0;
    client_for(&server)
        .chat_stream(
            API_KEY,
            "gpt-4o-mini",
            "hello",
            0.7,
            |delta| text.push_str(delta),
            || done += 1,
        )
        .await
        .unwrap();

    assert_eq!(text, "olá");
    assert_eq!(done, 1);
}

#[tokio::test]
async fn test_chat_stream_with_history_sends_budgeted_context() {
    use chatpilot_core::HistoryEntry;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "stream": true,
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "earlier"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "now"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["fine"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![HistoryEntry::user("earlier"), HistoryEntry::assistant("reply")];
    let mut deltas = Vec::new();
    let mut done = 0;
    client_for(&server)
        .chat_stream_with_history(
            API_KEY,
            "gpt-4o-mini",
            &history,
            "now",
            0.2,
            "sys",
            8000,
            |delta| deltas.push(delta.to_string()),
            || done += 1,
        )
        .await
        .unwrap();

    assert_eq!(deltas, vec!["fine"]);
    assert_eq!(done, 1);
}
