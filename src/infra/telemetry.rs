use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "pressroom_cache_fresh_hit_total",
            Unit::Count,
            "Total number of lookups answered by a fresh entry."
        );
        describe_counter!(
            "pressroom_cache_stale_hit_total",
            Unit::Count,
            "Total number of lookups answered by an expired entry."
        );
        describe_counter!(
            "pressroom_cache_miss_total",
            Unit::Count,
            "Total number of lookups with no entry."
        );
        describe_counter!(
            "pressroom_cache_evict_total",
            Unit::Count,
            "Total number of entries evicted due to capacity."
        );
        describe_counter!(
            "pressroom_store_exhausted_total",
            Unit::Count,
            "Total number of store calls rejected for quota exhaustion."
        );
        describe_counter!(
            "pressroom_store_error_total",
            Unit::Count,
            "Total number of store calls that failed for other reasons."
        );
        describe_counter!(
            "pressroom_refresh_total",
            Unit::Count,
            "Total number of background article refreshes, by outcome."
        );
        describe_gauge!(
            "pressroom_quota_reads_used",
            Unit::Count,
            "Document reads consumed against the current day's quota."
        );
        describe_histogram!(
            "pressroom_revalidation_ms",
            Unit::Milliseconds,
            "Periodic collection revalidation latency in milliseconds."
        );
    });
}
