//! Prometheus collectors for the engine.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn register<C: prometheus::core::Collector + Clone + 'static>(c: C) -> C {
    // ignore error if already registered
    let _ = REGISTRY.register(Box::new(c.clone()));
    c
}

pub static LEDGER_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register(IntGauge::new("stakewatch_ledger_records", "Records held in the merged ledger").expect("gauge"))
});

pub static LEDGER_EXHAUSTED: Lazy<IntGauge> = Lazy::new(|| {
    register(IntGauge::new("stakewatch_ledger_exhausted", "1 once the action feed is exhausted").expect("gauge"))
});

pub static LEDGER_GENERATION: Lazy<IntGauge> = Lazy::new(|| {
    register(IntGauge::new("stakewatch_ledger_generation", "Accumulator reset generation").expect("gauge"))
});

pub static PAGES_MERGED: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new("stakewatch_pages_merged_total", "Action pages merged").expect("counter"))
});

pub static RECORDS_DUPLICATE: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new("stakewatch_records_duplicate_total", "Records dropped as already seen").expect("counter"))
});

pub static RECORDS_MALFORMED: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new("stakewatch_records_malformed_total", "Records dropped as unparseable").expect("counter"))
});

pub static PAGES_STALE: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new("stakewatch_pages_stale_total", "Pages discarded from a reset generation").expect("counter"))
});

pub static FETCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("stakewatch_fetch_failures_total", "Failed fetches per data class"),
            &["class"],
        )
        .expect("counter vec"),
    )
});

/// Force registration so an early scrape lists every series
pub fn init() {
    Lazy::force(&LEDGER_SIZE);
    Lazy::force(&LEDGER_EXHAUSTED);
    Lazy::force(&LEDGER_GENERATION);
    Lazy::force(&PAGES_MERGED);
    Lazy::force(&RECORDS_DUPLICATE);
    Lazy::force(&RECORDS_MALFORMED);
    Lazy::force(&PAGES_STALE);
    Lazy::force(&FETCH_FAILURES);
}

/// Text exposition of the registry
pub fn render() -> String {
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buf) {
        tracing::warn!("metrics encode failed: {}", e);
    }
    String::from_utf8(buf).unwrap_or_default()
}
