//! Prometheus metrics for the crawl pipeline.
//!
//! This module provides metrics for:
//! - Listing refresh and identifier resolution
//! - Producer (payload fetches, published batches)
//! - Consumer (ingested rows)
//! - Source requests

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Listing & Resolution
// =============================================================================

/// Listing records seen during a refresh, by result.
pub static LISTING_RECORDS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "showcrawl_listing_records_total",
            "Listing records processed during refresh",
        ),
        &["result"], // "new", "updated", "unchanged", "error"
    )
    .unwrap()
});

/// External identifier lookups by result.
pub static RESOLVE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "showcrawl_resolve_attempts_total",
            "External identifier lookups",
        ),
        &["result"], // "found", "not_found", "error"
    )
    .unwrap()
});

// =============================================================================
// Producer
// =============================================================================

/// Payload fetches by result.
pub static PAYLOAD_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("showcrawl_payload_fetches_total", "Payload fetches"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

/// Batches published to the queue.
pub static BATCHES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "showcrawl_batches_published_total",
        "Batches published to the queue",
    )
    .unwrap()
});

// =============================================================================
// Consumer
// =============================================================================

/// Payload items handled by the consumer, by outcome.
pub static ITEMS_INGESTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("showcrawl_items_ingested_total", "Payload items ingested"),
        &["outcome"], // "inserted", "duplicate", "error"
    )
    .unwrap()
});

/// Batches fully handled and acknowledged.
pub static BATCHES_CONSUMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "showcrawl_batches_consumed_total",
        "Batches consumed and acknowledged",
    )
    .unwrap()
});

// =============================================================================
// Source
// =============================================================================

/// Source request duration.
pub static SOURCE_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "showcrawl_source_request_duration_seconds",
            "Duration of requests to the listing source",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation", "status"], // operation: "listing", "detail", "payload"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(LISTING_RECORDS.clone()),
        Box::new(RESOLVE_ATTEMPTS.clone()),
        Box::new(PAYLOAD_FETCHES.clone()),
        Box::new(BATCHES_PUBLISHED.clone()),
        Box::new(ITEMS_INGESTED.clone()),
        Box::new(BATCHES_CONSUMED.clone()),
        Box::new(SOURCE_REQUEST_DURATION.clone()),
    ]
}
