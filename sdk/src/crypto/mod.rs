//! Authenticated stream encryption.
//!
//! An encrypted frame is laid out as
//!
//! - nonce (128 bits), random for every encryption
//! - ciphertext, same length as the plaintext (AES-128 in CTR mode)
//! - tag (256 bits), HMAC-SHA256 of the ciphertext
//!
//! Both keys come from a single SHA-256 digest of the passphrase: the first
//! half is the AES key, the second half is the HMAC key. The nonce isn't
//! covered by the tag; a modified nonce yields a different keystream, and the
//! tag over the ciphertext is still checked before any plaintext is released.
//!
//! Decryption verifies the tag over the whole ciphertext before decrypting, so
//! the ciphertext is buffered (in memory up to a limit, then in a temporary file).

mod io;

pub use io::{DecryptingReader, EncryptingWriter};

use {
    aes::Aes128,
    ctr::{Ctr128BE, cipher::KeyIvInit},
    hmac::{Hmac, Mac},
    sha2::{Digest, Sha256},
    tartarus_protocol::{Error, KEY_LEN, NONCE_LEN, Passphrase, Result, TAG_LEN},
};

type Aes128Ctr = Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

#[expect(clippy::as_conversions, reason = "constant is tiny")]
const TAG_LEN_U64: u64 = TAG_LEN as u64;

/// Key material for one encrypt or decrypt call.
struct FrameKeys {
    cipher_key: [u8; KEY_LEN],
    mac_key: [u8; KEY_LEN],
}

impl FrameKeys {
    fn derive(passphrase: &Passphrase) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let (cipher_part, mac_part) = digest.split_at(KEY_LEN);
        let mut cipher_key = [0; KEY_LEN];
        cipher_key.copy_from_slice(cipher_part);
        let mut mac_key = [0; KEY_LEN];
        mac_key.copy_from_slice(mac_part);
        Self {
            cipher_key,
            mac_key,
        }
    }

    fn cipher(&self, nonce: &[u8; NONCE_LEN]) -> Aes128Ctr {
        Aes128Ctr::new(&self.cipher_key.into(), &(*nonce).into())
    }

    fn mac(&self) -> Result<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .map_err(|err| Error::invalid_parameter(format!("invalid integrity key: {err}")))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::indexing_slicing, reason = "test")]
mod tests {
    use {super::*, ctr::cipher::StreamCipher};

    #[test]
    fn keys_are_split_from_one_digest() {
        let keys = FrameKeys::derive(&Passphrase::new("correct").unwrap());
        let digest = Sha256::digest(b"correct");
        assert_eq!(keys.cipher_key[..], digest[..KEY_LEN]);
        assert_eq!(keys.mac_key[..], digest[KEY_LEN..]);
        assert_ne!(keys.cipher_key, keys.mac_key);
    }

    #[test]
    fn keystream_depends_on_nonce() {
        let keys = FrameKeys::derive(&Passphrase::new("correct").unwrap());
        let mut first = [0u8; 64];
        let mut second = [0u8; 64];
        keys.cipher(&[1; NONCE_LEN]).apply_keystream(&mut first);
        keys.cipher(&[2; NONCE_LEN]).apply_keystream(&mut second);
        assert_ne!(first, second);
    }
}
