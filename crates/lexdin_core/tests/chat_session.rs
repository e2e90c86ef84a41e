mod common;

use common::ScriptedGenerator;
use lexdin_core::{ChatError, ChatMessage, ChatOutcome, ChatSession, ServiceError, CHAT_FALLBACK_REPLY};

#[tokio::test]
async fn streamed_reply_is_committed_with_user_message() {
    let generator = ScriptedGenerator::chatting(&["Hola, ", "¿en qué ", "ayudo?"]);
    let mut session = ChatSession::new();
    let mut seen = Vec::new();

    let outcome = session
        .send(&generator, "  Hola  ", |partial| seen.push(partial.to_string()))
        .await
        .unwrap();

    assert_eq!(outcome, ChatOutcome::Replied("Hola, ¿en qué ayudo?".to_string()));
    assert_eq!(seen, vec!["Hola, ", "Hola, ¿en qué ", "Hola, ¿en qué ayudo?"]);
    assert_eq!(
        session.history(),
        &[
            ChatMessage::user("Hola"),
            ChatMessage::model("Hola, ¿en qué ayudo?"),
        ]
    );
}

#[tokio::test]
async fn history_is_sent_with_following_messages() {
    let generator = ScriptedGenerator::chatting(&["ok"]);
    let mut session = ChatSession::new();

    session.send(&generator, "uno", |_| {}).await.unwrap();
    session.send(&generator, "dos", |_| {}).await.unwrap();

    let calls = generator.chat_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].0.is_empty());
    assert_eq!(
        calls[1].0,
        vec![ChatMessage::user("uno"), ChatMessage::model("ok")]
    );
    assert_eq!(calls[1].1, "dos");
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn service_failures_record_the_fallback_reply() {
    let mid_stream = ScriptedGenerator {
        chat_chunks: vec![
            Ok("parcial".to_string()),
            Err(ServiceError::Transport("reset".to_string())),
        ],
        ..ScriptedGenerator::default()
    };
    let mut session = ChatSession::new();

    let outcome = session.send(&mid_stream, "pregunta", |_| {}).await.unwrap();
    assert!(matches!(
        outcome,
        ChatOutcome::Failed {
            error: ServiceError::Transport(_),
            ..
        }
    ));
    assert_eq!(outcome.reply(), CHAT_FALLBACK_REPLY);
    assert_eq!(session.history()[1], ChatMessage::model(CHAT_FALLBACK_REPLY));

    let at_start = ScriptedGenerator {
        chat_start_error: Some(ServiceError::EmptyResponse),
        ..ScriptedGenerator::default()
    };
    let outcome = session.send(&at_start, "otra", |_| {}).await.unwrap();
    assert_eq!(outcome.reply(), CHAT_FALLBACK_REPLY);
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn blank_messages_are_rejected_without_touching_history() {
    let generator = ScriptedGenerator::chatting(&["ok"]);
    let mut session = ChatSession::new();

    let err = session.send(&generator, " \n ", |_| {}).await.unwrap_err();
    assert_eq!(err, ChatError::EmptyMessage);
    assert!(session.history().is_empty());
    assert!(generator.chat_calls().is_empty());
}
