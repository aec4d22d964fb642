pub(crate) mod cipher_aead_aes_gcm;
pub(crate) mod cipher_aes_cm_hmac_sha1;

use bytes::Bytes;

use crate::header::Header;
use shared::error::Result;

/// Cipher represents a implementation of one
/// SRTP specific ciphers.
pub(crate) trait Cipher {
    /// Get authenticated tag length.
    fn auth_tag_len(&self) -> usize;

    /// Encrypt the payload of a marshaled RTP packet.
    fn encrypt_rtp(&mut self, plaintext: &[u8], header: &Header, roc: u32) -> Result<Bytes>;

    /// Decrypt an SRTP packet, verifying its authentication tag.
    fn decrypt_rtp(&mut self, encrypted: &[u8], header: &Header, roc: u32) -> Result<Bytes>;
}
