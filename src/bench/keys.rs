//! Cache key generation
//!
//! Keys are a fixed random prefix followed by a monotonic counter. The
//! counter is shared by every stage of a run so keys never repeat and no
//! put overwrites an entry written earlier in the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Default length of a randomly generated key prefix
pub const DEFAULT_PREFIX_LEN: usize = 8;

/// Shared key sequence for one benchmark run.
///
/// Cloning yields a handle onto the same counter.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: Arc<str>,
    counter: Arc<AtomicU64>,
}

impl KeyGenerator {
    /// Create a sequence with an explicit prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Arc::from(prefix.into()),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a sequence with a random alphanumeric prefix of `len` characters
    pub fn random(len: usize) -> Self {
        let prefix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self::new(prefix)
    }

    /// Produce the next key
    pub fn next_key(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", self.prefix, n)
    }

    /// Key prefix shared by all keys of this sequence
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of keys handed out so far
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::random(DEFAULT_PREFIX_LEN)
    }
}
