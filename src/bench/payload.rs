//! Benchmark payloads
//!
//! Two payload shapes are benchmarked: a structured record and a long
//! random string. Both are opaque `serde_json::Value`s to the stage code.

use std::path::Path;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::client::Payload;
use crate::{BenchError, Result};

/// Default size of the random string payload
pub const DEFAULT_STRING_PAYLOAD_LEN: usize = 15 * 1024;

const SPECIAL_CHARS: &[u8] = b"!@#$%^&*()_+-=[]{};:,./<>?|~";

/// Payload shape a stage writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Structured record
    Object,
    /// Long random string
    String,
}

impl PayloadKind {
    /// Label used in stage reports
    pub fn label(&self) -> &'static str {
        match self {
            PayloadKind::Object => "object",
            PayloadKind::String => "string",
        }
    }
}

/// Holds one value of each payload shape for the lifetime of a run
#[derive(Debug, Clone)]
pub struct PayloadProvider {
    object: Payload,
    string: Payload,
}

impl PayloadProvider {
    /// Build a provider from explicit values
    pub fn new(object: Value, string: Value) -> Self {
        Self {
            object: Arc::new(object),
            string: Arc::new(string),
        }
    }

    /// Generate a random record and a random string of `string_len` characters
    pub fn generate(string_len: usize) -> Self {
        let mut rng = SmallRng::from_entropy();
        let object = random_object(&mut rng);
        let string = Value::String(random_string(&mut rng, string_len));
        Self::new(object, string)
    }

    /// Like [`generate`](Self::generate) but with the record read from a JSON file
    pub fn with_object_file(path: &Path, string_len: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!(
                "Failed to read object payload {}: {}",
                path.display(),
                e
            ))
        })?;
        let object: Value = serde_json::from_str(&content).map_err(|e| {
            BenchError::Config(format!(
                "Failed to parse object payload {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut rng = SmallRng::from_entropy();
        let string = Value::String(random_string(&mut rng, string_len));
        Ok(Self::new(object, string))
    }

    /// Payload for the given shape
    pub fn get(&self, kind: PayloadKind) -> Payload {
        match kind {
            PayloadKind::Object => Arc::clone(&self.object),
            PayloadKind::String => Arc::clone(&self.string),
        }
    }
}

/// Random string of letters, digits and punctuation
fn random_string<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| {
            if rng.gen_ratio(1, 8) {
                SPECIAL_CHARS[rng.gen_range(0..SPECIAL_CHARS.len())] as char
            } else {
                rng.sample(Alphanumeric) as char
            }
        })
        .collect()
}

fn random_word<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random record with scalar, array and nested fields
fn random_object<R: Rng>(rng: &mut R) -> Value {
    let mut attributes = Map::new();
    for _ in 0..8 {
        attributes.insert(random_word(rng, 6), Value::from(rng.gen_range(0..10_000)));
    }

    let tags: Vec<Value> = (0..5).map(|_| Value::String(random_word(rng, 10))).collect();

    json!({
        "id": rng.gen::<u32>(),
        "name": random_word(rng, 16),
        "active": rng.gen_bool(0.5),
        "score": rng.gen_range(0.0..100.0),
        "tags": tags,
        "attributes": attributes,
        "address": {
            "street": random_word(rng, 20),
            "city": random_word(rng, 12),
            "zip": random_word(rng, 5),
        },
    })
}
