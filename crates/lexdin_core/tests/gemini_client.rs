use futures::StreamExt;
use lexdin_core::textgen::{GeminiClient, GeminiConfig};
use lexdin_core::{
    ChatMessage, ChatOutcome, ChatSession, ServiceError, TextGenerator, CHAT_FALLBACK_REPLY,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig::new(server.uri(), KEY)).unwrap()
}

fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }]
    })
}

#[tokio::test]
async fn summary_posts_prompt_with_both_texts_to_summary_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
        .and(header("x-goog-api-key", KEY))
        .and(body_string_contains("NORMA BASE"))
        .and(body_string_contains("nota mínima de 70"))
        .and(body_string_contains("nota mínima de 75"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Resumen.")))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client(&server)
        .generate_summary("nota mínima de 70", "nota mínima de 75")
        .await
        .unwrap();
    assert_eq!(summary, "Resumen.");
}

#[tokio::test]
async fn error_status_and_empty_text_map_to_service_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.generate_summary("a", "b").await.unwrap_err();
    assert_eq!(
        err,
        ServiceError::Status {
            status: 429,
            body: "quota exceeded".to_string()
        }
    );
    assert!(!err.to_string().contains(KEY));

    let err = client.generate_summary("a", "b").await.unwrap_err();
    assert_eq!(err, ServiceError::EmptyResponse);
}

#[tokio::test]
async fn chat_reply_streams_sse_chunks_from_chat_model() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\r\n\r\ndata: {}\r\n\r\n",
        text_response("Hola, "),
        text_response("soy el asistente.")
    );
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(body_string_contains("\"role\":\"model\""))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![ChatMessage::user("hola"), ChatMessage::model("buenas")];
    let chunks: Vec<_> = client(&server)
        .stream_chat_reply(&history, "¿quién eres?")
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(
        chunks,
        vec![
            Ok("Hola, ".to_string()),
            Ok("soy el asistente.".to_string())
        ]
    );
}

#[tokio::test]
async fn grounded_search_returns_answer_and_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(body_string_contains("googleSearch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "La ley dice X." }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://example.org/ley", "title": "Ley" } },
                        { "web": { "title": "sin uri" } }
                    ]
                }
            }]
        })))
        .mount(&server)
        .await;

    let answer = client(&server).grounded_search("¿qué dice la ley?").await.unwrap();
    assert_eq!(answer.text, "La ley dice X.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].uri, "https://example.org/ley");
    assert_eq!(answer.sources[0].title.as_deref(), Some("Ley"));
}

#[tokio::test]
async fn stalled_chat_stream_times_out_into_fallback_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("data: {}\r\n\r\n", text_response("tarde")))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let mut config = GeminiConfig::new(server.uri(), KEY);
    config.request_timeout = Duration::from_millis(500);
    let client = GeminiClient::new(config).unwrap();

    let started = tokio::time::timeout(
        Duration::from_secs(5),
        client.stream_chat_reply(&[], "hola"),
    )
    .await
    .expect("request must honour the configured timeout");
    assert!(matches!(started, Err(ServiceError::Transport(_))));

    let mut session = ChatSession::new();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        session.send(&client, "hola", |_| {}),
    )
    .await
    .expect("send must honour the configured timeout")
    .unwrap();
    assert!(matches!(
        outcome,
        ChatOutcome::Failed {
            error: ServiceError::Transport(_),
            ..
        }
    ));
    assert_eq!(outcome.reply(), CHAT_FALLBACK_REPLY);
    assert_eq!(session.history().len(), 2);
}
