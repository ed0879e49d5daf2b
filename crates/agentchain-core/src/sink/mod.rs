//! Result sinks beyond the SQLite step-output store.

pub mod jsonl;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServerError;
use crate::workflow::ports::ResultSink;

pub use jsonl::{JsonlResultSink, OutputLine};

/// Fans one output out to several sinks. Every sink is tried; the first
/// error (if any) is returned after all of them ran.
#[derive(Clone, Default)]
pub struct ResultSinks {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl ResultSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ResultSink for ResultSinks {
    async fn record_step_output(&self, owner_id: &str, step_id: &str, output: &Value) -> Result<(), ServerError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.record_step_output(owner_id, step_id, output).await {
                tracing::warn!("[ResultSink] Sink failed for step {}: {}", step_id, err);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResultSink for Counting {
        async fn record_step_output(&self, _: &str, _: &str, _: &Value) -> Result<(), ServerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ServerError::Internal("nope".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_starve_the_others() {
        let bad = Arc::new(Counting { fail: true, calls: AtomicUsize::new(0) });
        let good = Arc::new(Counting { fail: false, calls: AtomicUsize::new(0) });
        let sinks = ResultSinks::new().with(bad.clone()).with(good.clone());

        let result = sinks.record_step_output("o", "s", &json!({})).await;
        assert!(result.is_err());
        assert_eq!(bad.calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_fan_out_is_ok() {
        assert!(ResultSinks::new().record_step_output("o", "s", &json!(null)).await.is_ok());
    }
}
