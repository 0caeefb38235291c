/*!
 * Tracing Setup
 * Subscriber configuration and timed spans for collection work
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize tracing for a binary
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - CLOCKWORK_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("CLOCKWORK_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_line_number(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .init();
        info!("tracing initialized");
    }
}

/// Timed span around a batch of collection work
///
/// Logs the elapsed time on drop, as a warning past `slow_ms`.
pub struct CollectionSpan {
    span: tracing::Span,
    start: Instant,
    phase: &'static str,
    slow_ms: u128,
}

impl CollectionSpan {
    pub fn new(phase: &'static str, slow_ms: u128) -> Self {
        let span = span!(
            Level::DEBUG,
            "collection",
            phase = phase,
            duration_us = tracing::field::Empty,
            blocks = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            phase,
            slow_ms,
        }
    }

    /// Record the live block count at the end of the phase
    pub fn record_blocks(&self, count: usize) {
        self.span.record("blocks", count);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for CollectionSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros());

        if duration.as_millis() > self.slow_ms {
            warn!(
                phase = self.phase,
                duration_ms = duration.as_millis(),
                slow = true,
                "slow collection phase"
            );
        } else {
            debug!(
                phase = self.phase,
                duration_us = duration.as_micros(),
                "collection phase completed"
            );
        }
    }
}

/// Helper to open a collection span
#[inline]
pub fn span_collection(phase: &'static str) -> CollectionSpan {
    CollectionSpan::new(phase, 100)
}
