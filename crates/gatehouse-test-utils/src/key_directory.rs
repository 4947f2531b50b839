//! JSON builders for the provider's key discovery document.
//!
//! Integration tests serve these documents from a mocked endpoint so the
//! key directory client fetches material matching the fixture keypair.

use crate::crypto_fixtures::fixture_public_components;
use serde_json::{json, Value};

/// Discovery-document entry backed by the fixture keypair.
pub fn signing_key_json(kid: &str) -> Value {
    let (n, e) = fixture_public_components();
    json!({
        "kty": "RSA",
        "use": "sig",
        "kid": kid,
        "n": n,
        "e": e,
        "alg": "RS256",
    })
}

/// Full discovery document with one fixture-key entry per kid.
pub fn key_directory_json(kids: &[&str]) -> Value {
    let keys: Vec<Value> = kids.iter().map(|kid| signing_key_json(kid)).collect();
    json!({ "keys": keys })
}

/// Discovery document built from explicit entries, for rotation and
/// malformed-entry scenarios.
pub fn key_directory_from_entries(entries: Vec<Value>) -> Value {
    json!({ "keys": entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_holds_one_entry_per_kid() {
        let document = key_directory_json(&["key-1", "key-2"]);

        let keys = document["keys"].as_array().expect("keys array");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0]["kid"], "key-1");
        assert_eq!(keys[1]["kid"], "key-2");
        assert_eq!(keys[0]["kty"], "RSA");
    }

    #[test]
    fn test_entries_share_fixture_components() {
        let a = signing_key_json("key-1");
        let b = signing_key_json("key-2");
        assert_eq!(a["n"], b["n"]);
        assert_ne!(a["kid"], b["kid"]);
    }

    #[test]
    fn test_directory_from_entries_keeps_shape() {
        let document = key_directory_from_entries(vec![json!({ "kty": "RSA" })]);
        assert_eq!(document["keys"].as_array().expect("keys array").len(), 1);
    }
}
