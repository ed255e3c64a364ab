//! Credential encryption seam. The RSA primitive is external to the engine.

use anyhow::{Context, Result};
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};

/// `encrypt(plaintext, modulus, exponent) -> ciphertext`, with the key given
/// as hex strings exactly as the SSO page publishes them.
pub trait CredentialEncryptor: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], modulus_hex: &str, exponent_hex: &str) -> Result<Vec<u8>>;
}

/// PKCS#1 v1.5 encryption via the `rsa` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pkcs1v15Encryptor;

fn parse_hex_uint(s: &str) -> Result<BigUint> {
    let s = s.trim();
    let padded;
    let even = if s.len() % 2 == 1 {
        padded = format!("0{s}");
        padded.as_str()
    } else {
        s
    };
    let bytes = hex::decode(even).with_context(|| format!("invalid hex key component ({} chars)", s.len()))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

impl CredentialEncryptor for Pkcs1v15Encryptor {
    fn encrypt(&self, plaintext: &[u8], modulus_hex: &str, exponent_hex: &str) -> Result<Vec<u8>> {
        let n = parse_hex_uint(modulus_hex).context("modulus")?;
        let e = parse_hex_uint(exponent_hex).context("exponent")?;
        let key = RsaPublicKey::new(n, e).context("build RSA public key")?;
        let mut rng = rand::rngs::OsRng;
        key.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)
            .context("RSA encrypt")
    }
}
