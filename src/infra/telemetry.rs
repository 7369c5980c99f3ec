use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const CACHE_HIT_TOTAL: &str = "murmur_cache_hit_total";
pub const CACHE_MISS_TOTAL: &str = "murmur_cache_miss_total";
pub const CACHE_EXPIRED_TOTAL: &str = "murmur_cache_expired_total";
pub const CACHE_EVICT_TOTAL: &str = "murmur_cache_evict_total";

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
            CACHE_HIT_TOTAL,
            Unit::Count,
            "Total number of page-cache hits."
        );
        describe_counter!(
            CACHE_MISS_TOTAL,
            Unit::Count,
            "Total number of page-cache misses, expired entries included."
        );
        describe_counter!(
            CACHE_EXPIRED_TOTAL,
            Unit::Count,
            "Total number of page-cache entries dropped after their time window."
        );
        describe_counter!(
            CACHE_EVICT_TOTAL,
            Unit::Count,
            "Total number of page-cache evictions due to capacity."
        );
    });
}
