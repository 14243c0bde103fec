//! Deterministic cache keys derived from call arguments.
//!
//! Arguments are serialised as `{"args": [...], "kwargs": [[name, value], ...]}`
//! with named arguments sorted by name, then hashed with SHA-256. Positional
//! order is significant; named order is not. The fixed-length hex digest
//! bounds key size regardless of argument size.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of the stable serialisation of `positional` and `named`.
pub fn cache_key(positional: &[Value], named: &BTreeMap<String, Value>) -> String {
    let kwargs: Vec<(&String, &Value)> = named.iter().collect();
    let payload = serde_json::json!({
        "args": positional,
        "kwargs": kwargs,
    });
    // serde_json's default map keeps keys sorted, so nested objects are stable too.
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Key for a call with positional arguments only.
pub fn positional_key(positional: &[Value]) -> String {
    cache_key(positional, &BTreeMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deterministic() {
        let k1 = positional_key(&[json!("http://localhost:11434")]);
        let k2 = positional_key(&[json!("http://localhost:11434")]);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
    }

    #[test]
    fn differs_on_input() {
        let k1 = positional_key(&[json!("http://a:11434")]);
        let k2 = positional_key(&[json!("http://b:11434")]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn positional_order_matters() {
        let k1 = positional_key(&[json!("a"), json!("b")]);
        let k2 = positional_key(&[json!("b"), json!("a")]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn named_order_does_not_matter() {
        let mut first = BTreeMap::new();
        first.insert("host".to_string(), json!("h"));
        first.insert("limit".to_string(), json!(10));

        let mut second = BTreeMap::new();
        second.insert("limit".to_string(), json!(10));
        second.insert("host".to_string(), json!("h"));

        assert_eq!(cache_key(&[], &first), cache_key(&[], &second));
    }

    #[test]
    fn positional_and_named_are_distinct() {
        let mut named = BTreeMap::new();
        named.insert("host".to_string(), json!("h"));
        assert_ne!(positional_key(&[json!("h")]), cache_key(&[], &named));
    }
}
