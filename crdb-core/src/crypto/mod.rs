/*
    Crypto subsystem - authenticated encryption providers

    Every provider exposes generate-key / encrypt / decrypt plus the
    self-describing type id stored as the prefix of a resource key.
    Ciphertext is self-authenticating; a wrong key or a flipped byte is
    detected before any plaintext escapes.
*/

pub mod aes_cbc;
pub mod errors;
pub mod rsa_oaep;

pub use aes_cbc::{AesCbcMethod, AES_128_KEY_SIZE, AES_192_KEY_SIZE, AES_256_KEY_SIZE};
pub use errors::{CryptoError, CryptoResult};
pub use rsa_oaep::RsaOaepMethod;

use crate::resource::ResourceKey;

/// A registered cryptographic method.
pub trait CryptoMethod: Send + Sync {
    /// Self-describing identifier, e.g. `aes-256-cbc`.
    fn type_id(&self) -> &str;

    /// Generate fresh key material wrapped in a resource key.
    fn generate_key(&self) -> CryptoResult<ResourceKey>;

    /// Encrypt a plaintext under the supplied key.
    fn encrypt(&self, key: &ResourceKey, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypt and authenticate a ciphertext under the supplied key.
    fn decrypt(&self, key: &ResourceKey, data: &[u8]) -> CryptoResult<Vec<u8>>;
}
