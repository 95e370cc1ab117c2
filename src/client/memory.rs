//! In-process cache region
//!
//! Puts land in a concurrent map. Asynchronous puts complete on spawned
//! tokio tasks, optionally after a random delay, so completions arrive out
//! of dispatch order the way they do against a remote server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use super::{CacheClient, ClientError, Payload, PutCallback};
use crate::{BenchError, Result};

/// Cache region backed by a concurrent hash map
#[derive(Debug)]
pub struct MemoryRegion {
    name: String,
    entries: Arc<DashMap<String, Value>>,
    latency: Option<(Duration, Duration)>,
    fail_at: Option<usize>,
    puts: AtomicUsize,
    handle: Handle,
}

impl MemoryRegion {
    /// Create an empty region. Must be called from within a tokio runtime.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            BenchError::Config(format!("in-memory region requires a tokio runtime: {}", e))
        })?;

        Ok(Self {
            name: name.into(),
            entries: Arc::new(DashMap::new()),
            latency: None,
            fail_at: None,
            puts: AtomicUsize::new(0),
            handle,
        })
    }

    /// Delay every put by a random duration in `min..=max`
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = Some((min, max.max(min)));
        self
    }

    /// Fail the `n`th put (1-based, counting both put forms)
    pub fn with_failure_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Region name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the region holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total puts accepted so far, successful or not
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn sample_latency(&self) -> Option<Duration> {
        self.latency.map(|(min, max)| {
            if min == max {
                min
            } else {
                let micros = rand::thread_rng().gen_range(min.as_micros()..=max.as_micros());
                Duration::from_micros(micros as u64)
            }
        })
    }

    /// Register a put and decide whether it is the injected failure
    fn admit(&self, key: &str) -> std::result::Result<(), ClientError> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at == Some(n) {
            debug!(region = %self.name, key, put = n, "injecting put failure");
            return Err(ClientError::new(
                "CacheServerException",
                format!("injected failure on put #{}", n),
            ));
        }
        Ok(())
    }
}

impl CacheClient for MemoryRegion {
    /// Sleeps the calling thread for the simulated latency
    fn put(&self, key: &str, value: &Value) -> std::result::Result<(), ClientError> {
        if let Some(delay) = self.sample_latency() {
            std::thread::sleep(delay);
        }
        self.admit(key)?;
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn put_with_callback(&self, key: String, value: Payload, callback: PutCallback) {
        let delay = self.sample_latency();
        let admitted = self.admit(&key);
        let entries = Arc::clone(&self.entries);

        self.handle.spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match admitted {
                Ok(()) => {
                    entries.insert(key, Value::clone(&value));
                    callback(Ok(()));
                }
                Err(err) => callback(Err(err)),
            }
        });
    }

    fn get(&self, key: &str) -> std::result::Result<Option<Value>, ClientError> {
        trace!(region = %self.name, key, "get");
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn clear(&self) -> std::result::Result<(), ClientError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_put_then_get_returns_equal_value() {
        let region = MemoryRegion::new("exampleRegion").unwrap();
        region.put("k", &json!({ "a": 1 })).unwrap();

        assert_eq!(region.get("k").unwrap(), Some(json!({ "a": 1 })));
        assert_eq!(region.get("missing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_with_callback_completes() {
        let region = MemoryRegion::new("exampleRegion")
            .unwrap()
            .with_latency(Duration::from_micros(10), Duration::from_micros(200));
        let (tx, rx) = oneshot::channel();

        region.put_with_callback(
            "k".to_string(),
            Arc::new(json!("v")),
            Box::new(move |res| {
                let _ = tx.send(res);
            }),
        );

        assert!(rx.await.unwrap().is_ok());
        assert_eq!(region.get("k").unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_injected_failure_hits_only_nth_put() {
        let region = MemoryRegion::new("exampleRegion").unwrap().with_failure_at(2);
        let value = json!(1);

        assert!(region.put("a", &value).is_ok());
        let err = region.put("b", &value).unwrap_err();
        assert_eq!(err.name, "CacheServerException");
        assert!(region.put("c", &value).is_ok());

        assert_eq!(region.put_count(), 3);
        assert_eq!(region.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_empties_region() {
        let region = MemoryRegion::new("exampleRegion").unwrap();
        region.put("a", &json!(1)).unwrap();
        assert!(!region.is_empty());

        region.clear().unwrap();
        assert!(region.is_empty());
    }

    #[test]
    fn test_new_outside_runtime_is_config_error() {
        let err = MemoryRegion::new("exampleRegion").unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }
}
