//! Symmetric layer of the stealth protocol
//!
//! AES-128-CBC without padding over a fixed 32-byte (two block) plaintext.
//! Key and IV are both sliced from the packed ECDH shared point:
//!
//! ```text
//! pack(shared) = [ key (16) | iv (16) ]
//! ```

use std::fmt;

use aes::Aes128;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use shade_keychain::{ECPoint, pack_point};

use crate::error::StealthError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;

/// Plaintext and ciphertext length
pub const BLOCK_PAIR_LEN: usize = 32;

/// AES key and IV derived from a shared point
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl SymmetricKey {
    pub fn new(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        Self { key, iv }
    }

    /// First 16 packed bytes are the key, the next 16 the IV
    pub fn from_shared_point(shared: &ECPoint) -> Self {
        let packed = pack_point(shared);
        let mut key = [0u8; KEY_LEN];
        let mut iv = [0u8; IV_LEN];
        key.copy_from_slice(&packed[..KEY_LEN]);
        iv.copy_from_slice(&packed[KEY_LEN..KEY_LEN + IV_LEN]);
        Self { key, iv }
    }

    /// Build from 32 raw bytes laid out as key || iv
    pub fn from_bytes(bytes: &[u8; KEY_LEN + IV_LEN]) -> Self {
        let mut key = [0u8; KEY_LEN];
        let mut iv = [0u8; IV_LEN];
        key.copy_from_slice(&bytes[..KEY_LEN]);
        iv.copy_from_slice(&bytes[KEY_LEN..]);
        Self { key, iv }
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Encrypt exactly two AES blocks
pub fn encrypt_block_pair(
    plaintext: &[u8; BLOCK_PAIR_LEN],
    key: &SymmetricKey,
) -> Result<[u8; BLOCK_PAIR_LEN], StealthError> {
    let mut buf = *plaintext;
    Aes128CbcEnc::new(&key.key.into(), &key.iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, BLOCK_PAIR_LEN)
        .map_err(|_| StealthError::Cipher)?;
    Ok(buf)
}

/// Decrypt exactly two AES blocks.
///
/// There is no authentication: a wrong key yields garbage, not an error.
pub fn decrypt_block_pair(
    ciphertext: &[u8; BLOCK_PAIR_LEN],
    key: &SymmetricKey,
) -> Result<[u8; BLOCK_PAIR_LEN], StealthError> {
    let mut buf = *ciphertext;
    Aes128CbcDec::new(&key.key.into(), &key.iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| StealthError::Cipher)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng, rngs::StdRng};

    fn random_key(rng: &mut impl RngCore) -> SymmetricKey {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        SymmetricKey::from_bytes(&bytes)
    }

    #[test]
    fn test_encrypt_decrypt() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..16 {
            let key = random_key(&mut rng);
            let mut plaintext = [0u8; 32];
            rng.fill_bytes(&mut plaintext);

            let ciphertext = encrypt_block_pair(&plaintext, &key).unwrap();
            assert_ne!(ciphertext, plaintext);
            assert_eq!(decrypt_block_pair(&ciphertext, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_wrong_key_garbles() {
        let mut rng = StdRng::seed_from_u64(1);
        let key = random_key(&mut rng);
        let other = random_key(&mut rng);
        let plaintext = [7u8; 32];

        let ciphertext = encrypt_block_pair(&plaintext, &key).unwrap();
        assert_ne!(decrypt_block_pair(&ciphertext, &other).unwrap(), plaintext);
    }

    #[test]
    fn test_cbc_chains_blocks() {
        let key = SymmetricKey::new([1u8; 16], [2u8; 16]);
        let ciphertext = encrypt_block_pair(&[0u8; 32], &key).unwrap();
        // Identical plaintext blocks must not produce identical ciphertext blocks
        assert_ne!(ciphertext[..16], ciphertext[16..]);
    }

    #[test]
    fn test_key_slices_packed_point() {
        let point = shade_keychain::base_point();
        let packed = pack_point(&point);
        let key = SymmetricKey::from_shared_point(&point);
        let mut expected = [0u8; 32];
        expected.copy_from_slice(&packed);
        assert_eq!(key, SymmetricKey::from_bytes(&expected));
    }

    #[test]
    fn test_debug_redacts() {
        let key = SymmetricKey::new([9u8; 16], [9u8; 16]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(<redacted>)");
    }
}
