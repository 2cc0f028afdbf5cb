//! Wraps a backend's [`TextChunkStream`] so the request-level metric
//! started for a streaming call still gets an end record, without
//! requiring the caller to drain the whole stream through dispatcher
//! code. A streaming `generate` bypasses the queue entirely (§4.8), so
//! there is no worker to record the completion on the caller's behalf;
//! this stream does it itself, once, whether it runs to completion,
//! errors mid-stream, or is simply dropped early by the caller.

use futures::stream::Stream;
use llm_backend::{BackendError, TextChunkStream};
use llm_metrics::MetricsRecorder;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

pub struct MeteredGenerateStream {
    inner: TextChunkStream,
    metrics: Arc<MetricsRecorder>,
    request_id: Option<String>,
    started: Instant,
    tokens_so_far: u32,
    finished: bool,
}

impl MeteredGenerateStream {
    pub fn new(inner: TextChunkStream, metrics: Arc<MetricsRecorder>, request_id: String) -> Self {
        Self {
            inner,
            metrics,
            request_id: Some(request_id),
            started: Instant::now(),
            tokens_so_far: 0,
            finished: false,
        }
    }

    /// Fires the (at most once) completion record on a detached task,
    /// since `record_end` is async and `poll_next`/`drop` are not.
    fn finish(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(request_id) = self.request_id.take() {
            let metrics = Arc::clone(&self.metrics);
            let latency_ms = self.started.elapsed().as_secs_f64() * 1000.0;
            let tokens = self.tokens_so_far;
            tokio::spawn(async move {
                let _ = metrics
                    .record_end(&request_id, success, latency_ms, Some(tokens.max(1)), None)
                    .await;
            });
        }
    }
}

impl Stream for MeteredGenerateStream {
    type Item = Result<String, BackendError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let poll = Pin::new(&mut self.inner).poll_next(cx);
        match &poll {
            Poll::Ready(Some(Ok(chunk))) => {
                self.tokens_so_far += (chunk.split_whitespace().count() as f32 * 1.3).ceil() as u32;
            }
            Poll::Ready(Some(Err(_))) => self.finish(false),
            Poll::Ready(None) => self.finish(true),
            Poll::Pending => {}
        }
        poll
    }
}

impl Drop for MeteredGenerateStream {
    fn drop(&mut self) {
        // A caller that stops polling before EOF (request cancelled,
        // connection dropped) still needs its start record closed out;
        // treat that as a failed completion.
        self.finish(false);
    }
}
