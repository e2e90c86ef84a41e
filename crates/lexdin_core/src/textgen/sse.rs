//! Incremental decoder for `alt=sse` streamed generation responses.

use super::gemini::GenerateContentResponse;
use super::{ServiceError, TextChunkStream};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;

/// Splits a byte stream into `data:` events and extracts their text.
///
/// Lines may arrive split across chunks; only complete lines are decoded.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feeds one body chunk and returns the text of every completed event.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, ServiceError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = decode_line(&line) {
                out.push(item);
            }
        }
        out
    }

    /// Decodes a trailing line left without a final newline.
    pub(crate) fn finish(&mut self) -> Option<Result<String, ServiceError>> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn decode_line(raw: &[u8]) -> Option<Result<String, ServiceError>> {
    let line = String::from_utf8_lossy(raw);
    let data = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(response) => {
            let text = response.text();
            (!text.is_empty()).then_some(Ok(text))
        }
        Err(err) => Some(Err(ServiceError::Decode(err.to_string()))),
    }
}

struct StreamState {
    body: BoxStream<'static, Result<Vec<u8>, ServiceError>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, ServiceError>>,
    finished: bool,
}

/// Adapts a raw body stream into text chunks.
///
/// The stream ends after the first error.
pub(crate) fn text_chunks(body: BoxStream<'static, Result<Vec<u8>, ServiceError>>) -> TextChunkStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let decoded = state.decoder.push(&bytes);
                    state.pending.extend(decoded);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::{text_chunks, SseDecoder};
    use crate::textgen::ServiceError;
    use futures::stream::{self, StreamExt};

    fn event(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":\"{text}\"}}]}}}}]}}\r\n\r\n"
        )
    }

    #[test]
    fn decoder_handles_lines_split_across_chunks() {
        let payload = event("Hola");
        let (head, tail) = payload.split_at(17);
        let mut decoder = SseDecoder::default();

        assert!(decoder.push(head.as_bytes()).is_empty());
        let items = decoder.push(tail.as_bytes());
        assert_eq!(items, vec![Ok("Hola".to_string())]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn decoder_reports_malformed_events() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b"data: {not json}\n");
        assert!(matches!(items.as_slice(), [Err(ServiceError::Decode(_))]));
    }

    #[tokio::test]
    async fn stream_yields_chunks_and_stops_after_error() {
        let body = stream::iter(vec![
            Ok(format!("{}{}", event("uno "), event("dos")).into_bytes()),
            Err(ServiceError::Transport("reset".to_string())),
            Ok(event("tres").into_bytes()),
        ])
        .boxed();

        let items: Vec<_> = text_chunks(body).collect().await;
        assert_eq!(
            items,
            vec![
                Ok("uno ".to_string()),
                Ok("dos".to_string()),
                Err(ServiceError::Transport("reset".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn stream_decodes_trailing_event_without_newline() {
        let trailing = event("fin");
        let body = stream::iter(vec![Ok(trailing.trim_end().as_bytes().to_vec())]).boxed();
        let items: Vec<_> = text_chunks(body).collect().await;
        assert_eq!(items, vec![Ok("fin".to_string())]);
    }
}
