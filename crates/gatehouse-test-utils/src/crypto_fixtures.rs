//! RSA signing fixtures for testing.
//!
//! A process-wide 2048-bit keypair is generated once per test binary and
//! reused, so every token signed during a run verifies against the same
//! public components. A second, unrelated keypair is available for
//! wrong-key scenarios.
//!
//! Key material is exposed as PEM strings and base64url `(n, e)` tuples
//! rather than library types, so this crate never links against the
//! library under test and unit-test builds stay unified.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::OnceLock;

/// PKCS#1 PEM of the process-wide signing key. Tokens built by
/// `TestTokenBuilder` are signed with this key.
pub fn fixture_private_key_pem() -> &'static str {
    static PEM: OnceLock<String> = OnceLock::new();
    PEM.get_or_init(generate_private_key_pem).as_str()
}

/// PKCS#1 PEM of a keypair unrelated to the fixture key.
pub fn unrelated_private_key_pem() -> &'static str {
    static PEM: OnceLock<String> = OnceLock::new();
    PEM.get_or_init(generate_private_key_pem).as_str()
}

fn generate_private_key_pem() -> String {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).expect("private key");
    key.to_pkcs1_pem(LineEnding::LF)
        .expect("private key pem")
        .to_string()
}

/// Base64url RSA public components `(n, e)` of the fixture key.
pub fn fixture_public_components() -> (String, String) {
    public_components_of(fixture_private_key_pem())
}

/// Base64url RSA public components of a keypair unrelated to the fixture
/// key; tokens signed with the fixture key do NOT verify against these.
pub fn unrelated_public_components() -> (String, String) {
    public_components_of(unrelated_private_key_pem())
}

fn public_components_of(pem: &str) -> (String, String) {
    let private_key = RsaPrivateKey::from_pkcs1_pem(pem).expect("private key");
    let public_key = RsaPublicKey::from(&private_key);
    (
        URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_key_is_stable_within_process() {
        assert_eq!(fixture_private_key_pem(), fixture_private_key_pem());
        assert_eq!(fixture_public_components(), fixture_public_components());
    }

    #[test]
    fn test_unrelated_key_differs_from_fixture() {
        let (fixture_n, _) = fixture_public_components();
        let (unrelated_n, _) = unrelated_public_components();
        assert_ne!(fixture_n, unrelated_n);
    }

    #[test]
    fn test_components_are_base64url() {
        let (n, e) = fixture_public_components();
        assert!(URL_SAFE_NO_PAD.decode(&n).is_ok());
        // Standard RSA public exponent 65537.
        assert_eq!(e, "AQAB");
    }
}
