//! Pre-run round trip check against the cache region

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::client::CacheClient;
use crate::{BenchError, Result, SMOKE_KEY};

/// Put a small record and read it back; the values must be equal.
pub fn smoke_test(client: &dyn CacheClient) -> Result<()> {
    let expected = json!({ "test": "value" });

    client
        .put(SMOKE_KEY, &expected)
        .map_err(|e| BenchError::operation(SMOKE_KEY, e))?;
    let actual = client
        .get(SMOKE_KEY)
        .map_err(|e| BenchError::operation(SMOKE_KEY, e))?;

    match actual {
        Some(value) if value == expected => {
            info!("smoke test passed");
            Ok(())
        }
        Some(value) => Err(BenchError::SmokeTest(format!(
            "expected {} but read back {}",
            expected, value
        ))),
        None => Err(BenchError::SmokeTest(format!(
            "key '{}' missing after put",
            SMOKE_KEY
        ))),
    }
}

/// Run [`smoke_test`] on the blocking pool so slow puts never stall a
/// runtime worker
pub async fn smoke_test_blocking(client: Arc<dyn CacheClient>) -> Result<()> {
    tokio::task::spawn_blocking(move || smoke_test(client.as_ref()))
        .await
        .map_err(|e| BenchError::Stage(format!("smoke test task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, MemoryRegion, Payload, PutCallback};
    use serde_json::Value;
    use std::time::Duration;

    /// Client that forgets everything
    struct ForgetfulClient;

    impl CacheClient for ForgetfulClient {
        fn put(&self, _key: &str, _value: &Value) -> std::result::Result<(), ClientError> {
            Ok(())
        }
        fn put_with_callback(&self, _key: String, _value: Payload, callback: PutCallback) {
            callback(Ok(()));
        }
        fn get(&self, _key: &str) -> std::result::Result<Option<Value>, ClientError> {
            Ok(None)
        }
    }

    /// Client that mangles stored values
    struct MutatingClient;

    impl CacheClient for MutatingClient {
        fn put(&self, _key: &str, _value: &Value) -> std::result::Result<(), ClientError> {
            Ok(())
        }
        fn put_with_callback(&self, _key: String, _value: Payload, callback: PutCallback) {
            callback(Ok(()));
        }
        fn get(&self, _key: &str) -> std::result::Result<Option<Value>, ClientError> {
            Ok(Some(json!({ "test": "other" })))
        }
    }

    #[tokio::test]
    async fn test_smoke_passes_on_memory_region() {
        let region = MemoryRegion::new("exampleRegion").unwrap();
        smoke_test(&region).unwrap();
        assert_eq!(region.get(SMOKE_KEY).unwrap(), Some(json!({ "test": "value" })));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_blocking_smoke_leaves_runtime_free() {
        let region: Arc<dyn CacheClient> = Arc::new(
            MemoryRegion::new("exampleRegion")
                .unwrap()
                .with_latency(Duration::from_millis(200), Duration::from_millis(200)),
        );

        // On a single-threaded runtime the ticker only advances if the slow
        // put runs elsewhere
        let ticker = tokio::spawn(async {
            let mut ticks = 0u32;
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                ticks += 1;
            }
            ticks
        });

        smoke_test_blocking(Arc::clone(&region)).await.unwrap();
        assert_eq!(ticker.await.unwrap(), 10);
        assert!(region.get(SMOKE_KEY).unwrap().is_some());
    }

    #[test]
    fn test_smoke_fails_when_value_missing() {
        let err = smoke_test(&ForgetfulClient).unwrap_err();
        assert!(matches!(err, BenchError::SmokeTest(ref msg) if msg.contains("missing")));
    }

    #[test]
    fn test_smoke_fails_when_value_differs() {
        let err = smoke_test(&MutatingClient).unwrap_err();
        assert!(matches!(err, BenchError::SmokeTest(ref msg) if msg.contains("other")));
    }
}
