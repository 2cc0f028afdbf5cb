//! Streaming chunk translation for server-sent-event style provider framing.

use crate::error::BackendError;
use futures::stream::{self, BoxStream, StreamExt};

/// A uniform chunk sequence ending on provider EOF or deadline, regardless
/// of which provider-specific wire framing produced it.
pub type TextChunkStream = BoxStream<'static, Result<String, BackendError>>;

/// Parses a raw SSE body (`data: <json>\n\n` frames, sentinel `data: [DONE]`)
/// into a stream of decoded text chunks. `extract` pulls the text field out
/// of each frame's JSON payload, since chat/completions/proxy frames shape
/// that payload differently.
pub fn parse_sse_lines<F>(body: String, extract: F) -> TextChunkStream
where
    F: Fn(&serde_json::Value) -> Option<String> + Send + Sync + 'static,
{
    let chunks: Vec<Result<String, BackendError>> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:").map(str::trim))
        .filter(|payload| !payload.is_empty())
        .take_while(|payload| *payload != "[DONE]")
        .map(|payload| {
            serde_json::from_str::<serde_json::Value>(payload)
                .map_err(|e| BackendError::DecodeError(e.to_string()))
                .and_then(|value| {
                    extract(&value).ok_or_else(|| {
                        BackendError::DecodeError("SSE frame missing text field".into())
                    })
                })
        })
        .collect();

    stream::iter(chunks).boxed()
}

/// Wraps an already-buffered full response as a one-chunk stream, for
/// adapters with no native streaming protocol.
pub fn single_chunk(text: String) -> TextChunkStream {
    stream::iter(vec![Ok(text)]).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn parses_frames_up_to_done_sentinel() {
        let body = "data: {\"text\":\"he\"}\n\ndata: {\"text\":\"llo\"}\n\ndata: [DONE]\n\n".to_string();
        let mut stream = parse_sse_lines(body, |v| v.get("text").and_then(|t| t.as_str()).map(String::from));

        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.push(chunk.unwrap());
        }
        assert_eq!(out, vec!["he".to_string(), "llo".to_string()]);
    }

    #[tokio::test]
    async fn malformed_frame_surfaces_decode_error() {
        let body = "data: not json\n\n".to_string();
        let mut stream = parse_sse_lines(body, |_| None);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(BackendError::DecodeError(_))));
    }
}
