/*
    aes_cbc.rs - AES-CBC with HMAC-SHA256, encrypt-then-MAC

    Key material is two concatenated halves of the nominal size: the
    cipher key and the MAC key. The envelope is IV || ciphertext || MAC
    where the MAC covers IV || ciphertext. The second half of the key
    material is used directly as the MAC key to keep the on-disk
    envelope stable.
*/

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use super::errors::{CryptoError, CryptoResult};
use super::CryptoMethod;
use crate::resource::ResourceKey;

/// AES-128 cipher key size in bytes
pub const AES_128_KEY_SIZE: usize = 16;
/// AES-192 cipher key size in bytes
pub const AES_192_KEY_SIZE: usize = 24;
/// AES-256 cipher key size in bytes
pub const AES_256_KEY_SIZE: usize = 32;

const IV_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;
const MAC_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// AES-CBC + HMAC-SHA256 crypto method for one nominal key size.
pub struct AesCbcMethod {
    cipher_key_size: usize,
    type_id: String,
}

impl AesCbcMethod {
    /// Build a method for a 16, 24 or 32 byte cipher key. Any other
    /// size is rejected.
    pub fn new(cipher_key_size: usize) -> CryptoResult<Self> {
        if cipher_key_size != AES_128_KEY_SIZE
            && cipher_key_size != AES_192_KEY_SIZE
            && cipher_key_size != AES_256_KEY_SIZE
        {
            return Err(CryptoError::InvalidKey);
        }

        Ok(AesCbcMethod {
            cipher_key_size,
            type_id: format!("aes-{}-cbc", cipher_key_size * 8),
        })
    }

    /// Total key material length: cipher key plus MAC key.
    fn material_size(&self) -> usize {
        self.cipher_key_size * 2
    }

    fn split_material<'a>(&self, material: &'a [u8]) -> CryptoResult<(&'a [u8], &'a [u8])> {
        if material.len() != self.material_size() {
            return Err(CryptoError::InvalidKey);
        }
        Ok(material.split_at(self.cipher_key_size))
    }

    fn cbc_encrypt(&self, cipher_key: &[u8], iv: &[u8], data: &[u8]) -> CryptoResult<Vec<u8>> {
        let out = match self.cipher_key_size {
            AES_128_KEY_SIZE => cbc::Encryptor::<Aes128>::new_from_slices(cipher_key, iv)
                .map_err(|_| CryptoError::InvalidKey)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
            AES_192_KEY_SIZE => cbc::Encryptor::<Aes192>::new_from_slices(cipher_key, iv)
                .map_err(|_| CryptoError::InvalidKey)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
            _ => cbc::Encryptor::<Aes256>::new_from_slices(cipher_key, iv)
                .map_err(|_| CryptoError::InvalidKey)?
                .encrypt_padded_vec_mut::<Pkcs7>(data),
        };
        Ok(out)
    }

    fn cbc_decrypt(&self, cipher_key: &[u8], iv: &[u8], data: &[u8]) -> CryptoResult<Vec<u8>> {
        let result = match self.cipher_key_size {
            AES_128_KEY_SIZE => cbc::Decryptor::<Aes128>::new_from_slices(cipher_key, iv)
                .map_err(|_| CryptoError::InvalidKey)?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            AES_192_KEY_SIZE => cbc::Decryptor::<Aes192>::new_from_slices(cipher_key, iv)
                .map_err(|_| CryptoError::InvalidKey)?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
            _ => cbc::Decryptor::<Aes256>::new_from_slices(cipher_key, iv)
                .map_err(|_| CryptoError::InvalidKey)?
                .decrypt_padded_vec_mut::<Pkcs7>(data),
        };
        result.map_err(|_| CryptoError::InvalidData)
    }
}

impl CryptoMethod for AesCbcMethod {
    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn generate_key(&self) -> CryptoResult<ResourceKey> {
        let mut material = vec![0u8; self.material_size()];
        OsRng.fill_bytes(&mut material);
        Ok(ResourceKey::new(&self.type_id, &material))
    }

    fn encrypt(&self, key: &ResourceKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let material = key.material().ok_or(CryptoError::InvalidKey)?;
        let (cipher_key, mac_key) = self.split_material(&material)?;

        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = self.cbc_encrypt(cipher_key, &iv, data)?;

        let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len() + MAC_SIZE);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);

        let mut mac =
            HmacSha256::new_from_slice(mac_key).map_err(|_| CryptoError::InvalidKey)?;
        mac.update(&out);
        out.extend_from_slice(&mac.finalize().into_bytes());

        Ok(out)
    }

    fn decrypt(&self, key: &ResourceKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let material = key.material().ok_or(CryptoError::InvalidKey)?;
        let (cipher_key, mac_key) = self.split_material(&material)?;

        // Minimum envelope: IV, at least one block, the MAC.
        if data.len() < IV_SIZE + BLOCK_SIZE + MAC_SIZE {
            return Err(CryptoError::InvalidData);
        }
        if (data.len() - MAC_SIZE) % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidData);
        }

        let (signed, tag) = data.split_at(data.len() - MAC_SIZE);

        let mut mac =
            HmacSha256::new_from_slice(mac_key).map_err(|_| CryptoError::InvalidKey)?;
        mac.update(signed);
        mac.verify_slice(tag).map_err(|_| CryptoError::InvalidData)?;

        let (iv, ciphertext) = signed.split_at(IV_SIZE);
        self.cbc_decrypt(cipher_key, iv, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> AesCbcMethod {
        AesCbcMethod::new(AES_256_KEY_SIZE).unwrap()
    }

    #[test]
    fn test_type_ids() {
        assert_eq!(
            AesCbcMethod::new(AES_128_KEY_SIZE).unwrap().type_id(),
            "aes-128-cbc"
        );
        assert_eq!(
            AesCbcMethod::new(AES_192_KEY_SIZE).unwrap().type_id(),
            "aes-192-cbc"
        );
        assert_eq!(
            AesCbcMethod::new(AES_256_KEY_SIZE).unwrap().type_id(),
            "aes-256-cbc"
        );
    }

    #[test]
    fn test_rejects_odd_key_size() {
        assert!(AesCbcMethod::new(20).is_err());
        assert!(AesCbcMethod::new(0).is_err());
    }

    #[test]
    fn test_generated_key_shape() {
        let method = method();
        let key = method.generate_key().unwrap();
        assert_eq!(key.crypto_id(), "aes-256-cbc");
        assert_eq!(key.material().unwrap().len(), 64);
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        for size in [AES_128_KEY_SIZE, AES_192_KEY_SIZE, AES_256_KEY_SIZE] {
            let method = AesCbcMethod::new(size).unwrap();
            let key = method.generate_key().unwrap();

            let plaintext = b"the quick brown fox";
            let ciphertext = method.encrypt(&key, plaintext).unwrap();
            assert_ne!(&ciphertext[..], &plaintext[..]);

            let decrypted = method.decrypt(&key, &ciphertext).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_empty_plaintext_round_trip() {
        let method = method();
        let key = method.generate_key().unwrap();

        let ciphertext = method.encrypt(&key, b"").unwrap();
        assert_eq!(method.decrypt(&key, &ciphertext).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_unique_ivs_give_distinct_ciphertexts() {
        let method = method();
        let key = method.generate_key().unwrap();

        let a = method.encrypt(&key, b"same input").unwrap();
        let b = method.encrypt(&key, b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_flipped_byte_fails_authentication() {
        let method = method();
        let key = method.generate_key().unwrap();
        let ciphertext = method.encrypt(&key, b"sensitive").unwrap();

        for position in 0..ciphertext.len() {
            let mut tampered = ciphertext.clone();
            tampered[position] ^= 0x01;
            assert_eq!(
                method.decrypt(&key, &tampered),
                Err(CryptoError::InvalidData),
                "byte {} survived tampering",
                position
            );
        }
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let method = method();
        let key = method.generate_key().unwrap();
        let other = method.generate_key().unwrap();

        let ciphertext = method.encrypt(&key, b"secret").unwrap();
        assert_eq!(
            method.decrypt(&other, &ciphertext),
            Err(CryptoError::InvalidData)
        );
    }

    #[test]
    fn test_wrong_key_length_is_invalid_key() {
        let method = method();
        let short = ResourceKey::new("aes-256-cbc", &[0u8; 32]);
        assert_eq!(
            method.encrypt(&short, b"data"),
            Err(CryptoError::InvalidKey)
        );
        assert_eq!(
            method.decrypt(&short, &[0u8; 64]),
            Err(CryptoError::InvalidKey)
        );
    }

    #[test]
    fn test_short_ciphertext_is_invalid_data() {
        let method = method();
        let key = method.generate_key().unwrap();
        assert_eq!(
            method.decrypt(&key, &[0u8; 63]),
            Err(CryptoError::InvalidData)
        );
    }

    #[test]
    fn test_misaligned_ciphertext_is_invalid_data() {
        let method = method();
        let key = method.generate_key().unwrap();
        assert_eq!(
            method.decrypt(&key, &[0u8; 65]),
            Err(CryptoError::InvalidData)
        );
    }
}
