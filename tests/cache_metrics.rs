mod support;

use std::collections::HashMap;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use murmur::cache::CacheConfig;
use support::TestApp;

#[tokio::test]
async fn index_requests_count_hits_misses_and_evictions() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = TestApp::with_cache(CacheConfig {
        enabled: true,
        ttl: Duration::from_secs(20),
        capacity: 1,
    });

    app.get("/", None).await;
    app.get("/", None).await;
    app.get("/?page=2", None).await;

    let counters: HashMap<String, u64> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| match value {
            DebugValue::Counter(count) => Some((composite_key.key().name().to_string(), count)),
            _ => None,
        })
        .collect();

    assert_eq!(counters.get("murmur_cache_miss_total"), Some(&2));
    assert_eq!(counters.get("murmur_cache_hit_total"), Some(&1));
    assert_eq!(counters.get("murmur_cache_evict_total"), Some(&1));
}
