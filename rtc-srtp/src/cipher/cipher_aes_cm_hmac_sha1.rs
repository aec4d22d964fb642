use aes::Aes128;
use bytes::{BufMut, Bytes, BytesMut};
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use super::Cipher;
use crate::header::Header;
use crate::key_derivation::*;
use crate::protection_profile::ProtectionProfile;
use shared::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;
type Aes128Ctr = ctr::Ctr128BE<Aes128>;

pub(crate) struct CipherAesCmHmacSha1 {
    profile: ProtectionProfile,
    srtp_session_key: Vec<u8>,
    srtp_session_salt: Vec<u8>,
    srtp_session_auth: HmacSha1,
}

impl CipherAesCmHmacSha1 {
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<Self> {
        let srtp_session_key = aes_cm_key_derivation(
            LABEL_SRTP_ENCRYPTION,
            master_key,
            master_salt,
            master_key.len(),
        )?;
        let srtp_session_salt = aes_cm_key_derivation(
            LABEL_SRTP_SALT,
            master_key,
            master_salt,
            master_salt.len(),
        )?;
        let auth_key = aes_cm_key_derivation(
            LABEL_SRTP_AUTHENTICATION_TAG,
            master_key,
            master_salt,
            profile.auth_key_len(),
        )?;

        let srtp_session_auth =
            HmacSha1::new_from_slice(&auth_key).map_err(|_| Error::ErrInvalidKeyLength)?;

        Ok(CipherAesCmHmacSha1 {
            profile,
            srtp_session_key,
            srtp_session_salt,
            srtp_session_auth,
        })
    }

    /// https://tools.ietf.org/html/rfc3711#section-4.2
    /// In the case of SRTP, M SHALL consist of the Authenticated
    /// Portion of the packet (as specified in Figure 1) concatenated with
    /// the ROC, M = Authenticated Portion || ROC;
    ///
    /// The pre-defined authentication transform for SRTP is HMAC-SHA1
    /// [RFC2104].  With HMAC-SHA1, the SRTP_PREFIX_LENGTH (Figure 3) SHALL
    /// be 0.  For SRTP (respectively SRTCP), the HMAC SHALL be applied to
    /// the session authentication key and M as specified above, i.e.,
    /// HMAC(k_a, M).  The HMAC output SHALL then be truncated to the n_tag
    /// left-most bits.
    fn generate_srtp_auth_tag(&self, buf: &[u8], roc: u32) -> Vec<u8> {
        let mut signer = self.srtp_session_auth.clone();

        signer.update(buf);
        signer.update(&roc.to_be_bytes());

        let mut tag = signer.finalize().into_bytes().to_vec();
        tag.truncate(self.profile.rtp_auth_tag_len());
        tag
    }

    fn apply_keystream(&self, payload: &mut [u8], header: &Header, roc: u32) -> Result<()> {
        let counter = generate_counter(
            header.sequence_number,
            roc,
            header.ssrc,
            &self.srtp_session_salt,
        );
        let mut stream = Aes128Ctr::new_from_slices(&self.srtp_session_key, &counter)
            .map_err(|_| Error::ErrInvalidKeyLength)?;
        stream.apply_keystream(payload);
        Ok(())
    }
}

impl Cipher for CipherAesCmHmacSha1 {
    fn auth_tag_len(&self) -> usize {
        self.profile.rtp_auth_tag_len()
    }

    fn encrypt_rtp(&mut self, plaintext: &[u8], header: &Header, roc: u32) -> Result<Bytes> {
        let mut writer = BytesMut::with_capacity(plaintext.len() + self.auth_tag_len());

        // Copy the header unencrypted.
        writer.extend_from_slice(plaintext);

        // Encrypt the payload
        self.apply_keystream(&mut writer[header.header_len..], header, roc)?;

        // Generate the auth tag.
        let auth_tag = self.generate_srtp_auth_tag(&writer, roc);
        writer.put_slice(&auth_tag);

        Ok(writer.freeze())
    }

    fn decrypt_rtp(&mut self, encrypted: &[u8], header: &Header, roc: u32) -> Result<Bytes> {
        if encrypted.len() < header.header_len + self.auth_tag_len() {
            return Err(Error::ErrTooShortRtp(
                encrypted.len(),
                header.header_len + self.auth_tag_len(),
            ));
        }

        let cipher_text = &encrypted[..encrypted.len() - self.auth_tag_len()];
        let actual_tag = &encrypted[encrypted.len() - self.auth_tag_len()..];

        // Generate the auth tag we expect to see from the ciphertext.
        let expected_tag = self.generate_srtp_auth_tag(cipher_text, roc);

        // See if the auth tag actually matches.
        // We use a constant time comparison to prevent timing attacks.
        if actual_tag.ct_eq(&expected_tag).unwrap_u8() != 1 {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let mut writer = BytesMut::from(cipher_text);
        self.apply_keystream(&mut writer[header.header_len..], header, roc)?;

        Ok(writer.freeze())
    }
}
