//! Structured logging for workflow events

use solana_sdk::pubkey::Pubkey;

use crate::observability::TraceContext;

/// Structured logger carrying the correlation id of one workflow run
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn for_trace(trace: &TraceContext) -> Self {
        Self::new(trace.correlation_id().to_string())
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_phase(&self, phase: &str, mint: &Pubkey) {
        tracing::info!(
            context_id = %self.context_id,
            phase = %phase,
            mint = %mint,
            "Workflow phase entered"
        );
    }

    pub fn log_bundle_submitted(&self, span: &TraceContext, entries: usize, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            trace_id = %span.trace_id,
            span_id = %span.span_id,
            operation = %span.operation,
            entries = %entries,
            latency_ms = %latency_ms,
            "Bundle accepted by relay"
        );
    }

    pub fn log_bundle_rejected(&self, span: &TraceContext, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            trace_id = %span.trace_id,
            span_id = %span.span_id,
            operation = %span.operation,
            error = %error,
            "Bundle submission failed"
        );
    }

    pub fn log_balance_observed(&self, owner: &Pubkey, amount: u64) {
        tracing::info!(
            context_id = %self.context_id,
            owner = %owner,
            amount = %amount,
            "Token balance observed"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            context_id = %self.context_id,
            message = %message,
            "Error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_uses_correlation_id() {
        let trace = TraceContext::new("launch");
        let logger = StructuredLogger::for_trace(&trace);
        assert_eq!(logger.context_id(), trace.correlation_id().as_str());

        // Smoke: logging without a subscriber must not panic
        logger.log_phase("CreateAndSeedBuy", &Pubkey::new_unique());
        logger.log_bundle_submitted(&trace.child_span("bundle"), 3, 12);
    }
}
