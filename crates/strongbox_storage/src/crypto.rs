//! Encryption at rest using AES-256 in CFB mode.
//!
//! ## Format
//!
//! Every encrypted payload is `iv (16 bytes) || cfb(plaintext)`. CFB turns
//! the block cipher into a stream cipher, so the ciphertext is exactly
//! [`IV_SIZE`] bytes longer than the plaintext and needs no padding. The
//! layout is bit-compatible with full-block (CFB-128) implementations.
//!
//! ## Security Model
//!
//! - A fresh IV is drawn from the OS random source for every encryption
//! - Keys are zeroized on drop and redacted from `Debug` output
//! - Confidentiality only: there is no authentication tag, so a modified
//!   ciphertext decrypts to modified plaintext without an error. Callers
//!   that need integrity must add a MAC on top.

use crate::error::{StorageError, StorageResult};
use aes::Aes256;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use std::io::{self, Read};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the initialization vector in bytes.
pub const IV_SIZE: usize = 16;

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;
type Aes256CfbBufDec = cfb_mode::BufDecryptor<Aes256>;

/// Encryption key for AES-256-CFB.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    bytes: [u8; KEY_SIZE],
}

impl CipherKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] unless `bytes` is exactly
    /// [`KEY_SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StorageError::InvalidKey {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a password using HKDF-SHA256.
    ///
    /// HKDF is not a password hash; use it only when the input already has
    /// high entropy, such as a random passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the password is empty.
    pub fn derive_from_password(password: &[u8], salt: &[u8]) -> StorageResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        if password.is_empty() {
            return Err(StorageError::InvalidKey {
                expected: KEY_SIZE,
                actual: 0,
            });
        }

        let hk = Hkdf::<Sha256>::new(Some(salt), password);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(b"strongbox-storage-key-v1", &mut bytes)
            .map_err(|_| StorageError::InvalidKey {
                expected: KEY_SIZE,
                actual: 0,
            })?;
        Ok(Self { bytes })
    }

    /// Encrypts `plaintext` under a fresh random IV.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the OS random source fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut iv = [0u8; IV_SIZE];
        OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|e| StorageError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        self.encrypt_with_iv(&iv, plaintext)
    }

    fn encrypt_with_iv(&self, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut out = vec![0u8; IV_SIZE + plaintext.len()];
        let (head, body) = out.split_at_mut(IV_SIZE);
        head.copy_from_slice(iv);
        body.copy_from_slice(plaintext);

        Aes256CfbEnc::new_from_slices(&self.bytes, iv)
            .map_err(|_| self.length_error())?
            .encrypt(body);
        Ok(out)
    }

    /// Decrypts a payload produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Truncated`] if `ciphertext` is shorter than
    /// the IV.
    pub fn decrypt(&self, ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        self.decrypt_in_place(ciphertext.to_vec())
    }

    /// Decrypts an owned payload, reusing its allocation for the plaintext.
    ///
    /// # Errors
    ///
    /// Same as [`decrypt`](Self::decrypt).
    pub fn decrypt_in_place(&self, mut data: Vec<u8>) -> StorageResult<Vec<u8>> {
        if data.len() < IV_SIZE {
            return Err(StorageError::Truncated {
                expected: IV_SIZE,
                actual: data.len(),
            });
        }

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&data[..IV_SIZE]);
        data.drain(..IV_SIZE);

        Aes256CfbDec::new_from_slices(&self.bytes, &iv)
            .map_err(|_| self.length_error())?
            .decrypt(&mut data);
        Ok(data)
    }

    fn length_error(&self) -> StorageError {
        StorageError::InvalidKey {
            expected: KEY_SIZE,
            actual: self.bytes.len(),
        }
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts `plaintext` with a raw key.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if the key is empty or not
/// [`KEY_SIZE`] bytes.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> StorageResult<Vec<u8>> {
    CipherKey::from_bytes(key)?.encrypt(plaintext)
}

/// Decrypts `ciphertext` with a raw key.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for a bad key and
/// [`StorageError::Truncated`] if the input is shorter than the IV.
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
    CipherKey::from_bytes(key)?.decrypt(ciphertext)
}

/// Streaming decryption of an encrypted payload.
///
/// The IV is read when the reader is created; after that every `read`
/// decrypts exactly the bytes it returns.
pub struct DecryptingReader<R> {
    inner: R,
    cipher: Aes256CfbBufDec,
}

impl<R: Read> DecryptingReader<R> {
    /// Reads the IV from `inner` and prepares the keystream.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Truncated`] if `inner` ends before a full IV,
    /// or [`StorageError::Io`] if reading fails.
    pub fn new(key: &CipherKey, mut inner: R) -> StorageResult<Self> {
        let mut iv = [0u8; IV_SIZE];
        let mut filled = 0;
        while filled < IV_SIZE {
            match inner.read(&mut iv[filled..]) {
                Ok(0) => {
                    return Err(StorageError::Truncated {
                        expected: IV_SIZE,
                        actual: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let cipher =
            Aes256CfbBufDec::new_from_slices(&key.bytes, &iv).map_err(|_| key.length_error())?;
        Ok(Self { inner, cipher })
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.decrypt(&mut buf[..n]);
        Ok(n)
    }
}

impl<R> std::fmt::Debug for DecryptingReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptingReader")
            .field("cipher", &"Aes256Cfb")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn generate_key() {
        let key1 = CipherKey::generate();
        let key2 = CipherKey::generate();
        assert_ne!(key1.bytes, key2.bytes);
    }

    #[test]
    fn key_wrong_size() {
        assert!(matches!(
            CipherKey::from_bytes(&[]),
            Err(StorageError::InvalidKey { expected: KEY_SIZE, actual: 0 })
        ));
        assert!(CipherKey::from_bytes(&[0u8; 16]).is_err());
        assert!(CipherKey::from_bytes(&[0u8; 64]).is_err());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = CipherKey::from_bytes(&[0x41u8; KEY_SIZE]).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("65"));
    }

    #[test]
    fn cfb128_known_answer() {
        // NIST SP 800-38A, F.3.17 CFB128-AES256.Encrypt, first block.
        let key = CipherKey::from_bytes(&hex(
            "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4",
        ))
        .unwrap();
        let iv: [u8; IV_SIZE] = hex("000102030405060708090a0b0c0d0e0f").try_into().unwrap();
        let plaintext = hex("6bc1bee22e409f96e93d7e117393172a");

        let out = key.encrypt_with_iv(&iv, &plaintext).unwrap();
        assert_eq!(&out[..IV_SIZE], &iv);
        assert_eq!(&out[IV_SIZE..], hex("dc7e84bfda79164b7ecd8486985d3860").as_slice());
        assert_eq!(key.decrypt(&out).unwrap(), plaintext);
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = CipherKey::generate();
        let plaintext = b"Hello, strongbox!";

        let ciphertext = key.encrypt(plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + IV_SIZE);
        assert_ne!(&ciphertext[IV_SIZE..], plaintext);
        assert_eq!(key.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn encrypt_produces_different_ciphertext() {
        let key = CipherKey::generate();
        let ct1 = key.encrypt(b"same data").unwrap();
        let ct2 = key.encrypt(b"same data").unwrap();
        assert_ne!(ct1[..IV_SIZE], ct2[..IV_SIZE]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn wrong_key_yields_garbage_not_error() {
        let key1 = CipherKey::generate();
        let key2 = CipherKey::generate();

        let ciphertext = key1.encrypt(b"secret payload").unwrap();
        let decrypted = key2.decrypt(&ciphertext).unwrap();
        assert_ne!(decrypted, b"secret payload");
    }

    #[test]
    fn decrypt_truncated_fails() {
        let key = CipherKey::generate();
        assert!(matches!(
            key.decrypt(&[0u8; 10]),
            Err(StorageError::Truncated { expected: IV_SIZE, actual: 10 })
        ));
    }

    #[test]
    fn empty_plaintext() {
        let key = CipherKey::generate();
        let ciphertext = key.encrypt(b"").unwrap();
        assert_eq!(ciphertext.len(), IV_SIZE);
        assert!(key.decrypt(&ciphertext).unwrap().is_empty());
    }

    #[test]
    fn raw_key_functions_validate_key() {
        assert!(matches!(
            encrypt(&[], b"x"),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            decrypt(&[1u8; 31], &[0u8; 32]),
            Err(StorageError::InvalidKey { .. })
        ));

        let raw = [7u8; KEY_SIZE];
        let ciphertext = encrypt(&raw, b"payload").unwrap();
        assert_eq!(decrypt(&raw, &ciphertext).unwrap(), b"payload");
    }

    #[test]
    fn derive_key_from_password() {
        let key1 = CipherKey::derive_from_password(b"pass", b"salt").unwrap();
        let key2 = CipherKey::derive_from_password(b"pass", b"salt").unwrap();
        assert_eq!(key1.bytes, key2.bytes);

        let key3 = CipherKey::derive_from_password(b"pass", b"other").unwrap();
        assert_ne!(key1.bytes, key3.bytes);

        assert!(CipherKey::derive_from_password(b"", b"salt").is_err());
    }

    #[test]
    fn streaming_reader_matches_one_shot() {
        let key = CipherKey::generate();
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let ciphertext = key.encrypt(&plaintext).unwrap();

        let mut reader = DecryptingReader::new(&key, ciphertext.as_slice()).unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 7];
        loop {
            let n = reader.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, plaintext);
    }

    #[test]
    fn streaming_reader_rejects_short_input() {
        let key = CipherKey::generate();
        let result = DecryptingReader::new(&key, &[0u8; 5][..]);
        assert!(matches!(
            result,
            Err(StorageError::Truncated { actual: 5, .. })
        ));
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_data_and_length(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = CipherKey::from_bytes(&[0x5Au8; KEY_SIZE]).unwrap();
            let ciphertext = key.encrypt(&data).unwrap();
            prop_assert_eq!(ciphertext.len(), data.len() + IV_SIZE);
            prop_assert_eq!(key.decrypt_in_place(ciphertext).unwrap(), data);
        }
    }
}
