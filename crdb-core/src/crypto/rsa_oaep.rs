/*
    rsa_oaep.rs - RSA-OAEP crypto method

    Key material is a PKCS#1 DER private key; encryption uses the
    embedded public key. The on-the-wire identifier keeps the historical
    `rsa-<bits>-sha1` spelling, and OAEP keeps SHA-1 because the
    identifier promises it.

    Parsing a DER key per operation is expensive, so parsed keys are
    cached under a fingerprint of the material.
*/

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::errors::{CryptoError, CryptoResult};
use super::CryptoMethod;
use crate::resource::ResourceKey;

/// RSA-OAEP crypto method for one modulus size.
pub struct RsaOaepMethod {
    bits: usize,
    type_id: String,

    /// fingerprint -> parsed private key
    keyring: RwLock<HashMap<String, Arc<RsaPrivateKey>>>,
}

impl RsaOaepMethod {
    /// Build a method for the given modulus size in bits (1024, 2048,
    /// 4096 are what the server registers).
    pub fn new(bits: usize) -> CryptoResult<Self> {
        if bits < 1024 {
            return Err(CryptoError::InvalidKey);
        }

        Ok(RsaOaepMethod {
            bits,
            type_id: format!("rsa-{}-sha1", bits),
            keyring: RwLock::new(HashMap::new()),
        })
    }

    fn fingerprint(material: &[u8]) -> String {
        hex::encode(Sha256::digest(material))
    }

    /// Fetch the parsed private key for this material, parsing and
    /// caching on first sight.
    fn private_key(&self, key: &ResourceKey) -> CryptoResult<Arc<RsaPrivateKey>> {
        let material = key.material().ok_or(CryptoError::InvalidKey)?;
        let fingerprint = Self::fingerprint(&material);

        if let Some(cached) = self
            .keyring
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&fingerprint)
        {
            return Ok(cached.clone());
        }

        let mut parsed =
            RsaPrivateKey::from_pkcs1_der(&material).map_err(|_| CryptoError::InvalidKey)?;
        parsed
            .precompute()
            .map_err(|e| CryptoError::Backend(e.to_string()))?;
        let parsed = Arc::new(parsed);

        self.keyring
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(fingerprint, parsed.clone());

        Ok(parsed)
    }

    #[cfg(test)]
    fn cached_keys(&self) -> usize {
        self.keyring
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl CryptoMethod for RsaOaepMethod {
    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn generate_key(&self) -> CryptoResult<ResourceKey> {
        let private = RsaPrivateKey::new(&mut OsRng, self.bits)
            .map_err(|e| CryptoError::Backend(e.to_string()))?;

        let der = private
            .to_pkcs1_der()
            .map_err(|e| CryptoError::Backend(e.to_string()))?;
        let key = ResourceKey::new(&self.type_id, der.as_bytes());

        // Warm the cache so the first operation skips the re-parse.
        self.private_key(&key)?;

        Ok(key)
    }

    fn encrypt(&self, key: &ResourceKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let private = self.private_key(key)?;
        let public = RsaPublicKey::from(private.as_ref());

        public
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), data)
            .map_err(|e| CryptoError::Backend(e.to_string()))
    }

    fn decrypt(&self, key: &ResourceKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let private = self.private_key(key)?;

        private
            .decrypt(Oaep::new::<Sha1>(), data)
            .map_err(|_| CryptoError::InvalidData)
    }
}
