//! Request spans.
//!
//! # Responsibilities
//! - Create a span per admitted operation with a request ID
//! - Report duration and outcome to the observability sink exactly once

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::observability::metrics::ObservabilitySink;

/// Timing span for one request.
///
/// Dropping a span that was never ended reports a failure.
pub struct RequestSpan {
    operation: String,
    request_id: Uuid,
    started: Instant,
    span: tracing::Span,
    sink: Arc<dyn ObservabilitySink>,
    ended: bool,
}

impl RequestSpan {
    /// Open a span for `operation` with a fresh request id.
    pub fn start(operation: &str, sink: Arc<dyn ObservabilitySink>) -> Self {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", operation = %operation, request_id = %request_id);
        Self {
            operation: operation.to_string(),
            request_id,
            started: Instant::now(),
            span,
            sink,
            ended: false,
        }
    }

    /// Random v4 id attached to every log line of the request.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Operation name passed to `start`.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The tracing span to instrument the handler with.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Time since `start`.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Report the outcome to the sink. Dropping without calling this reports a failure.
    pub fn end(mut self, success: bool) {
        self.finish(success);
    }

    fn finish(&mut self, success: bool) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.sink
            .request_completed(&self.operation, self.started.elapsed(), success);
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        self.finish(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, bool)>>);

    impl ObservabilitySink for Recorder {
        fn request_completed(&self, operation: &str, _duration: Duration, success: bool) {
            self.0.lock().unwrap().push((operation.to_string(), success));
        }
    }

    #[test]
    fn reports_once_on_end() {
        let recorder = Arc::new(Recorder::default());
        let span = RequestSpan::start("invoke", recorder.clone());
        span.end(true);

        assert_eq!(*recorder.0.lock().unwrap(), vec![("invoke".to_string(), true)]);
    }

    #[test]
    fn drop_without_end_is_failure() {
        let recorder = Arc::new(Recorder::default());
        let span = RequestSpan::start("invoke", recorder.clone());
        assert_eq!(span.operation(), "invoke");
        drop(span);

        assert_eq!(*recorder.0.lock().unwrap(), vec![("invoke".to_string(), false)]);
    }
}
