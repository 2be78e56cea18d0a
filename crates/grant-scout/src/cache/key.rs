//! Deterministic cache keys for tool invocations.
//!
//! Small parameter sets produce readable `prefix:k=v_k=v` keys; anything
//! larger or deeply nested collapses to a short SHA-256 digest. Equal
//! parameter maps always yield equal keys regardless of insertion order.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const SIMPLE_PARAM_LIMIT: usize = 3;
const SIMPLE_KEY_MAX_LEN: usize = 100;
const HASH_HEX_LEN: usize = 16;

/// Registration failures for tool prefixes.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyError {
    PrefixTaken { prefix: String, tool: String },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::PrefixTaken { prefix, tool } => {
                write!(f, "prefix '{prefix}' is already registered to tool '{tool}'")
            }
        }
    }
}

impl std::error::Error for KeyError {}

/// Maps tool names to short key prefixes and renders cache keys.
#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    prefixes: BTreeMap<String, String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self {
            prefixes: BTreeMap::new(),
        }
    }

    /// Generator preloaded with the prefixes of the built-in tools.
    pub fn with_default_prefixes() -> Self {
        let mut generator = Self::new();
        for (tool, prefix) in [
            ("opportunity_discovery", "od"),
            ("agency_landscape", "al"),
            ("funding_trend_scanner", "fts"),
            ("opportunity_density", "oden"),
            ("eligibility_checker", "ec"),
            ("strategic_advisor", "sa"),
        ] {
            // Defaults are distinct by construction.
            let _ = generator.register(tool, prefix);
        }
        generator
    }

    /// Register a tool prefix. Re-registering the same pair is a no-op;
    /// claiming another tool's prefix is rejected.
    pub fn register(&mut self, tool: &str, prefix: &str) -> Result<(), KeyError> {
        if let Some((existing_tool, _)) = self
            .prefixes
            .iter()
            .find(|(t, p)| p.as_str() == prefix && t.as_str() != tool)
        {
            return Err(KeyError::PrefixTaken {
                prefix: prefix.to_string(),
                tool: existing_tool.clone(),
            });
        }
        self.prefixes.insert(tool.to_string(), prefix.to_string());
        Ok(())
    }

    /// Registered prefix, or the first three characters of the tool name.
    fn prefix_for<'a>(&'a self, tool: &'a str) -> &'a str {
        self.prefixes
            .get(tool)
            .map(String::as_str)
            .unwrap_or_else(|| tool.get(..3).unwrap_or(tool))
    }

    /// Readable key for small flat parameter sets, falling back to [`hash`]
    /// when there are too many parameters or the rendering grows too long.
    ///
    /// [`hash`]: CacheKeyGenerator::hash
    pub fn simple(&self, tool: &str, params: &Map<String, Value>) -> String {
        let meaningful: BTreeMap<&str, &Value> = params
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.as_str(), v))
            .collect();

        if meaningful.len() > SIMPLE_PARAM_LIMIT {
            return self.hash(tool, params);
        }

        let rendered: Vec<String> = meaningful
            .iter()
            .map(|(k, v)| format!("{}={}", k, sanitize(&render_scalar(v))))
            .collect();

        let key = format!("{}:{}", self.prefix_for(tool), rendered.join("_"));
        if key.len() > SIMPLE_KEY_MAX_LEN {
            return self.hash(tool, params);
        }
        key
    }

    /// Digest-based key. Parameters are normalized (keys sorted, arrays
    /// sorted, scalars stringified) before hashing so logically equal inputs
    /// collide on purpose.
    pub fn hash(&self, tool: &str, params: &Map<String, Value>) -> String {
        let normalized = normalize(&Value::Object(params.clone()));
        let envelope = Value::Object(Map::from_iter([
            ("params".to_string(), normalized),
            ("tool".to_string(), Value::String(tool.to_string())),
        ]));

        // serde_json renders object keys in map order, which is sorted here.
        let payload = envelope.to_string();
        let digest = Sha256::digest(payload.as_bytes());
        let hex = hex::encode(digest);

        format!("{}:{}", self.prefix_for(tool), &hex[..HASH_HEX_LEN])
    }

    /// Simple key suffixed with a time bucket so entries roll over together
    /// every `bucket_seconds`.
    pub fn temporal(
        &self,
        tool: &str,
        params: &Map<String, Value>,
        bucket_seconds: u64,
        now: DateTime<Utc>,
    ) -> String {
        let bucket_seconds = bucket_seconds.max(1);
        let bucket = now.timestamp().max(0) as u64 / bucket_seconds;
        format!("{}:t{}", self.simple(tool, params), bucket)
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::with_default_prefixes()
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sanitize(raw: &str) -> String {
    raw.replace([' ', '/'], "_")
}

/// Canonicalize a JSON value for hashing: scalars become strings, arrays are
/// normalized then sorted by their rendering, object keys are sorted.
fn normalize(value: &Value) -> Value {
    match value {
        Value::Null => Value::String("null".to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::String(s) => Value::String(s.clone()),
        Value::Array(items) => {
            let mut normalized: Vec<Value> = items.iter().map(normalize).collect();
            normalized.sort_by_key(|v| v.to_string());
            Value::Array(normalized)
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), normalize(v)))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn simple_key_sorts_params_and_sanitizes_values() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let p = params(json!({"status": "posted/open", "agency": "National Science"}));
        let key = gen.simple("opportunity_discovery", &p);
        assert_eq!(key, "od:agency=National_Science_status=posted_open");
    }

    #[test]
    fn simple_key_skips_null_params() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let p = params(json!({"agency": "NSF", "category": null}));
        assert_eq!(gen.simple("agency_landscape", &p), "al:agency=NSF");
    }

    #[test]
    fn too_many_params_fall_back_to_hash() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let p = params(json!({"a": 1, "b": 2, "c": 3, "d": 4}));
        let key = gen.simple("opportunity_discovery", &p);
        assert!(key.starts_with("od:"));
        let suffix = &key["od:".len()..];
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn oversized_rendering_falls_back_to_hash() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let p = params(json!({"query": "x".repeat(200)}));
        let key = gen.simple("opportunity_discovery", &p);
        assert_eq!(key.len(), "od:".len() + 16);
    }

    #[test]
    fn hash_is_insensitive_to_key_and_array_order() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let a = params(json!({"agencies": ["NSF", "NIH"], "status": "posted"}));
        let b = params(json!({"status": "posted", "agencies": ["NIH", "NSF"]}));
        assert_eq!(
            gen.hash("opportunity_discovery", &a),
            gen.hash("opportunity_discovery", &b)
        );
    }

    #[test]
    fn hash_distinguishes_tools() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let p = params(json!({"status": "posted"}));
        assert_ne!(
            gen.hash("opportunity_discovery", &p),
            gen.hash("agency_landscape", &p)
        );
    }

    #[test]
    fn temporal_key_changes_across_buckets() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let p = params(json!({"agency": "NSF"}));
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let within = t0 + chrono::Duration::seconds(120);
        let next = t0 + chrono::Duration::seconds(3600);

        let k0 = gen.temporal("funding_trend_scanner", &p, 3600, t0);
        assert_eq!(k0, gen.temporal("funding_trend_scanner", &p, 3600, within));
        assert_ne!(k0, gen.temporal("funding_trend_scanner", &p, 3600, next));
        assert!(k0.starts_with("fts:agency=NSF:t"));
    }

    #[test]
    fn unknown_tool_falls_back_to_name_stem() {
        let gen = CacheKeyGenerator::with_default_prefixes();
        let p = params(json!({"q": "ai"}));
        assert_eq!(gen.simple("custom_tool", &p), "cus:q=ai");
        assert_eq!(gen.simple("xy", &p), "xy:q=ai");
    }

    #[test]
    fn register_rejects_prefix_collisions() {
        let mut gen = CacheKeyGenerator::with_default_prefixes();
        let err = gen.register("other_tool", "od").unwrap_err();
        assert!(matches!(err, KeyError::PrefixTaken { .. }));

        // Re-registering the same mapping is fine.
        assert!(gen.register("opportunity_discovery", "od").is_ok());
    }
}
