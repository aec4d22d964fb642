use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use bytes::{BufMut, Bytes, BytesMut};

use super::Cipher;
use crate::header::Header;
use crate::key_derivation::*;
use crate::protection_profile::ProtectionProfile;
use shared::error::{Error, Result};

const RTP_ENCRYPTION_NONCE_LEN: usize = 12;

/// AEAD Cipher based on AES, RFC 7714.
pub(crate) struct CipherAeadAesGcm {
    profile: ProtectionProfile,
    srtp_cipher: Aes128Gcm,
    srtp_session_salt: Vec<u8>,
}

impl CipherAeadAesGcm {
    /// Create a new AEAD instance.
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<CipherAeadAesGcm> {
        let srtp_session_key = aes_cm_key_derivation(
            LABEL_SRTP_ENCRYPTION,
            master_key,
            master_salt,
            master_key.len(),
        )?;

        let srtp_cipher =
            Aes128Gcm::new_from_slice(&srtp_session_key).map_err(|_| Error::ErrInvalidKeyLength)?;

        let srtp_session_salt = aes_cm_key_derivation(
            LABEL_SRTP_SALT,
            master_key,
            master_salt,
            master_salt.len(),
        )?;

        Ok(CipherAeadAesGcm {
            profile,
            srtp_cipher,
            srtp_session_salt,
        })
    }

    /// The 12-octet IV used by AES-GCM SRTP is formed by first concatenating
    /// 2 octets of zeroes, the 4-octet SSRC, the 4-octet rollover counter
    /// (ROC), and the 2-octet sequence number (SEQ).  The resulting 12-octet
    /// value is then XORed to the 12-octet salt to form the 12-octet IV.
    ///
    /// https://tools.ietf.org/html/rfc7714#section-8.1
    pub(crate) fn rtp_initialization_vector(
        &self,
        header: &Header,
        roc: u32,
    ) -> [u8; RTP_ENCRYPTION_NONCE_LEN] {
        let mut iv = [0u8; RTP_ENCRYPTION_NONCE_LEN];
        iv[2..6].copy_from_slice(&header.ssrc.to_be_bytes());
        iv[6..10].copy_from_slice(&roc.to_be_bytes());
        iv[10..12].copy_from_slice(&header.sequence_number.to_be_bytes());

        for (v, s) in iv.iter_mut().zip(&self.srtp_session_salt) {
            *v ^= *s;
        }

        iv
    }
}

impl Cipher for CipherAeadAesGcm {
    fn auth_tag_len(&self) -> usize {
        self.profile.aead_auth_tag_len()
    }

    fn encrypt_rtp(&mut self, plaintext: &[u8], header: &Header, roc: u32) -> Result<Bytes> {
        let nonce = self.rtp_initialization_vector(header, roc);

        let encrypted = self
            .srtp_cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext[header.header_len..],
                    aad: &plaintext[..header.header_len],
                },
            )
            .map_err(|e| Error::OtherSrtpErr(e.to_string()))?;

        let mut writer = BytesMut::with_capacity(header.header_len + encrypted.len());
        writer.put_slice(&plaintext[..header.header_len]);
        writer.put_slice(&encrypted);

        Ok(writer.freeze())
    }

    fn decrypt_rtp(&mut self, ciphertext: &[u8], header: &Header, roc: u32) -> Result<Bytes> {
        if ciphertext.len() < header.header_len + self.auth_tag_len() {
            return Err(Error::ErrTooShortRtp(
                ciphertext.len(),
                header.header_len + self.auth_tag_len(),
            ));
        }

        let nonce = self.rtp_initialization_vector(header, roc);
        let decrypted = self
            .srtp_cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext[header.header_len..],
                    aad: &ciphertext[..header.header_len],
                },
            )
            .map_err(|_| Error::ErrFailedToVerifyAuthTag)?;

        let mut writer = BytesMut::with_capacity(header.header_len + decrypted.len());
        writer.put_slice(&ciphertext[..header.header_len]);
        writer.put_slice(&decrypted);

        Ok(writer.freeze())
    }
}
