//! Wrapper around the `prometheus` crate that stores metrics behind
//! `Result` so a failed registration (e.g. a duplicate name in tests)
//! degrades to a no-op instead of a panic.
//!
//! Metrics are declared as statics in a `metrics.rs` module of the crate
//! that owns them and touched through the helpers here:
//!
//! ```ignore
//! pub static CACHE_HITS: LazyLock<Result<IntCounter>> =
//!     LazyLock::new(|| try_create_int_counter("cache_hits_total", "Cache hits"));
//!
//! metrics::inc_counter(&CACHE_HITS);
//! ```

pub use prometheus::{
    Error, Histogram, HistogramTimer, IntCounter, IntGauge, histogram_opts, opts,
};
use prometheus::{HistogramVec, IntCounterVec, default_registry};

pub type Result<T> = std::result::Result<T, Error>;

/// Create and register an `IntCounter` with the default registry.
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(opts!(name, help))?;
    default_registry().register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Create and register an `IntGauge` with the default registry.
pub fn try_create_int_gauge(name: &str, help: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(opts!(name, help))?;
    default_registry().register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Create and register a `Histogram` with the default registry.
pub fn try_create_histogram(name: &str, help: &str) -> Result<Histogram> {
    let histogram = Histogram::with_opts(histogram_opts!(name, help))?;
    default_registry().register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Create and register a labelled counter vec with the default registry.
pub fn try_create_int_counter_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntCounterVec> {
    let counter_vec = IntCounterVec::new(opts!(name, help), label_names)?;
    default_registry().register(Box::new(counter_vec.clone()))?;
    Ok(counter_vec)
}

/// Create and register a labelled histogram vec with the default registry.
pub fn try_create_histogram_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<HistogramVec> {
    let histogram_vec = HistogramVec::new(histogram_opts!(name, help), label_names)?;
    default_registry().register(Box::new(histogram_vec.clone()))?;
    Ok(histogram_vec)
}

pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

pub fn inc_counter_by(counter: &Result<IntCounter>, value: u64) {
    if let Ok(counter) = counter {
        counter.inc_by(value);
    }
}

pub fn inc_counter_vec(counter_vec: &Result<IntCounterVec>, labels: &[&str]) {
    if let Ok(counter_vec) = counter_vec {
        counter_vec.with_label_values(labels).inc()
    }
}

pub fn set_gauge(gauge: &Result<IntGauge>, value: i64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

pub fn start_timer(histogram: &Result<Histogram>) -> Option<HistogramTimer> {
    histogram.as_ref().ok().map(|h| h.start_timer())
}

pub fn observe(histogram: &Result<Histogram>, value: f64) {
    if let Ok(histogram) = histogram {
        histogram.observe(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_err_not_panic() {
        let first = try_create_int_counter("metrics_test_counter", "help");
        assert!(first.is_ok());
        let second = try_create_int_counter("metrics_test_counter", "help");
        assert!(second.is_err());
        // Operating on the failed handle is a no-op.
        inc_counter(&second);
    }

    #[test]
    fn counter_increments() {
        let counter = try_create_int_counter("metrics_test_incrementing", "help");
        inc_counter(&counter);
        inc_counter_by(&counter, 2);
        assert_eq!(counter.unwrap().get(), 3);
    }
}
