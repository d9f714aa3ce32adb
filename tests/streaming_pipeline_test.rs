//! End-to-end streaming tests against a mock HTTP backend.

use polychat::prelude::*;
use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sse_body(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|l| format!("data: {l}\n\n"))
        .collect::<String>()
}

fn openai_orchestrator(server: &MockServer) -> ChatOrchestrator {
    ChatOrchestrator::builder()
        .openai_with_base_url(server.uri(), SecretString::from("sk-test".to_string()))
        .build()
}

async fn collect_events(
    orchestrator: &ChatOrchestrator,
    history: &[ChatMessage],
    model: &Model,
) -> Vec<StreamEvent> {
    let mut sink = CollectingSink::new();
    orchestrator
        .send(
            history,
            model,
            &SendFlags::default(),
            &mut sink,
            &CancelHandle::new(),
        )
        .await;
    sink.events
}

#[tokio::test]
async fn openai_stream_normalizes_content_deltas() {
    init_tracing();
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
        r#"{"choices":[{"delta":{"content":"lo!"}}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = openai_orchestrator(&server);
    let model = Model::find("gpt-4o").unwrap();
    let events = collect_events(&orchestrator, &[ChatMessage::user("hi")], model).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta { delta: "Hel".into() },
            StreamEvent::ContentDelta { delta: "lo!".into() },
            StreamEvent::Complete {
                content: "Hello!".into(),
                thinking: String::new(),
            },
        ]
    );
}

#[tokio::test]
async fn thinking_tags_split_across_events_are_partitioned() {
    init_tracing();
    let server = MockServer::start().await;
    // The opening tag is split mid-tag across two deltas.
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"content":"A<thi"}}]}"#,
        r#"{"choices":[{"delta":{"content":"nking>B</thinking>"}}]}"#,
        r#"{"choices":[{"delta":{"content":"C"}}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let orchestrator = openai_orchestrator(&server);
    let model = Model::find("gpt-4o").unwrap();
    let events = collect_events(&orchestrator, &[ChatMessage::user("hi")], model).await;

    let Some(StreamEvent::Complete { content, thinking }) = events.last() else {
        panic!("expected Complete terminal, got {:?}", events.last());
    };
    assert_eq!(content, "AC");
    assert_eq!(thinking, "B");
}

#[tokio::test]
async fn openai_native_reasoning_bypasses_tag_machine() {
    init_tracing();
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"reasoning_content":"planning"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Answer"}}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let orchestrator = openai_orchestrator(&server);
    let model = Model::find("o1").unwrap();
    let events = collect_events(&orchestrator, &[ChatMessage::user("hi")], model).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ThinkingDelta { delta: "planning".into() },
            StreamEvent::ContentDelta { delta: "Answer".into() },
            StreamEvent::Complete {
                content: "Answer".into(),
                thinking: "planning".into(),
            },
        ]
    );
}

#[tokio::test]
async fn malformed_lines_are_skipped_without_aborting() {
    init_tracing();
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"content":"keep "}}]}"#,
        "{not json",
        r#"{"choices":[{"delta":{"content":"going"}}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let orchestrator = openai_orchestrator(&server);
    let model = Model::find("gpt-4o").unwrap();
    let events = collect_events(&orchestrator, &[ChatMessage::user("hi")], model).await;

    let Some(StreamEvent::Complete { content, .. }) = events.last() else {
        panic!("expected Complete terminal");
    };
    assert_eq!(content, "keep going");
}

#[tokio::test]
async fn anthropic_reasoning_scenario_emits_thinking_then_content() {
    init_tracing();
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-sonnet-4-20250514"}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"considering..."}}"#,
        r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Hello!"}}"#,
        r#"{"type":"message_stop"}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_string_contains("\"thinking\""))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = ChatOrchestrator::builder()
        .anthropic_with_base_url(server.uri(), SecretString::from("sk-ant-test".to_string()))
        .build();
    let model = Model::find("claude-sonnet-4-20250514").unwrap();
    let events = collect_events(&orchestrator, &[ChatMessage::user("Hi")], model).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ThinkingDelta { delta: "considering...".into() },
            StreamEvent::ContentDelta { delta: "Hello!".into() },
            StreamEvent::Complete {
                content: "Hello!".into(),
                thinking: "considering...".into(),
            },
        ]
    );
}

#[tokio::test]
async fn provider_http_error_preserves_status_and_emits_single_terminal() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let orchestrator = openai_orchestrator(&server);
    let model = Model::find("gpt-4o").unwrap();
    let events = collect_events(&orchestrator, &[ChatMessage::user("hi")], model).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error { kind, message } => {
            assert_eq!(*kind, ErrorKind::Provider { status: 429 });
            assert!(message.contains("rate limited"));
        }
        other => panic!("expected Error terminal, got {other:?}"),
    }
}

#[tokio::test]
async fn xai_uses_the_openai_wire_shape() {
    init_tracing();
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"content":"grok says hi"}}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("grok-2-latest"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = ChatOrchestrator::builder()
        .xai_with_base_url(server.uri(), SecretString::from("xai-test".to_string()))
        .build();
    let model = Model::find("grok-2-latest").unwrap();
    let events = collect_events(&orchestrator, &[ChatMessage::user("hi")], model).await;

    let Some(StreamEvent::Complete { content, .. }) = events.last() else {
        panic!("expected Complete terminal");
    };
    assert_eq!(content, "grok says hi");
}

#[tokio::test]
async fn send_once_returns_message_content() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "short answer" } }]
        })))
        .mount(&server)
        .await;

    let orchestrator = openai_orchestrator(&server);
    let model = Model::find("gpt-4o").unwrap();
    let answer = orchestrator
        .send_once(&[ChatMessage::user("hi")], model)
        .await
        .unwrap();
    assert_eq!(answer, "short answer");
}

#[tokio::test]
async fn send_once_anthropic_joins_text_blocks() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [
                { "type": "text", "text": "part one, " },
                { "type": "text", "text": "part two" }
            ]
        })))
        .mount(&server)
        .await;

    let orchestrator = ChatOrchestrator::builder()
        .anthropic_with_base_url(server.uri(), SecretString::from("sk-ant-test".to_string()))
        .build();
    let model = Model::find("claude-3-5-haiku-20241022").unwrap();
    let answer = orchestrator
        .send_once(&[ChatMessage::user("hi")], model)
        .await
        .unwrap();
    assert_eq!(answer, "part one, part two");
}
