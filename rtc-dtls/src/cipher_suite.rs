use std::fmt;

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::prf::prf_encryption_keys;
use crate::record_layer_header::{RECORD_LAYER_HEADER_SIZE, RecordLayerHeader};
use shared::error::{Error, Result};

/// CipherSuiteID is an ID for our supported CipherSuites
/// Supported Cipher Suites
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherSuiteId {
    // AES-128-GCM-SHA256
    Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256 = 0xc02b,
    Tls_Ecdhe_Rsa_With_Aes_128_Gcm_Sha256 = 0xc02f,

    Unsupported,
}

impl fmt::Display for CipherSuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256 => {
                write!(f, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256")
            }
            CipherSuiteId::Tls_Ecdhe_Rsa_With_Aes_128_Gcm_Sha256 => {
                write!(f, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256")
            }
            _ => write!(f, "Unsupported CipherSuiteID"),
        }
    }
}

impl From<u16> for CipherSuiteId {
    fn from(val: u16) -> Self {
        match val {
            0xc02b => CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256,
            0xc02f => CipherSuiteId::Tls_Ecdhe_Rsa_With_Aes_128_Gcm_Sha256,
            _ => CipherSuiteId::Unsupported,
        }
    }
}

pub(crate) fn default_cipher_suites() -> Vec<CipherSuiteId> {
    vec![
        CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256,
        CipherSuiteId::Tls_Ecdhe_Rsa_With_Aes_128_Gcm_Sha256,
    ]
}

const CRYPTO_GCM_TAG_LENGTH: usize = 16;
const CRYPTO_GCM_NONCE_LENGTH: usize = 12;
const CRYPTO_GCM_EXPLICIT_NONCE_LENGTH: usize = 8;
const GCM_KEY_LENGTH: usize = 16;
const GCM_IMPLICIT_IV_LENGTH: usize = 4;

/// CryptoGcm provides an API to Encrypt/Decrypt DTLS 1.2 Packets
pub(crate) struct CryptoGcm {
    local_gcm: Aes128Gcm,
    remote_gcm: Aes128Gcm,
    local_write_iv: Vec<u8>,
    remote_write_iv: Vec<u8>,
}

impl CryptoGcm {
    /// Expands the master secret into the record keys for one side of the connection.
    pub(crate) fn new(
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<Self> {
        let keys = prf_encryption_keys(
            master_secret,
            client_random,
            server_random,
            GCM_KEY_LENGTH,
            GCM_IMPLICIT_IV_LENGTH,
        )?;

        let (local_key, local_write_iv, remote_key, remote_write_iv) = if is_client {
            (
                keys.client_write_key,
                keys.client_write_iv,
                keys.server_write_key,
                keys.server_write_iv,
            )
        } else {
            (
                keys.server_write_key,
                keys.server_write_iv,
                keys.client_write_key,
                keys.client_write_iv,
            )
        };

        let local_gcm =
            Aes128Gcm::new_from_slice(&local_key).map_err(|_| Error::ErrInvalidKeyLength)?;
        let remote_gcm =
            Aes128Gcm::new_from_slice(&remote_key).map_err(|_| Error::ErrInvalidKeyLength)?;

        Ok(CryptoGcm {
            local_gcm,
            remote_gcm,
            local_write_iv,
            remote_write_iv,
        })
    }

    /// Builds the additional data of RFC 5246 Section 6.2.3.3:
    /// seq_num(epoch + uint48) + type + version + length.
    fn generate_aead_additional_data(h: &RecordLayerHeader, payload_len: usize) -> Vec<u8> {
        let mut additional_data = vec![0u8; 13];
        additional_data[..2].copy_from_slice(&h.epoch.to_be_bytes());
        additional_data[2..8].copy_from_slice(&h.sequence_number.to_be_bytes()[2..]);
        additional_data[8] = h.content_type as u8;
        additional_data[9] = h.protocol_version.major;
        additional_data[10] = h.protocol_version.minor;
        additional_data[11..].copy_from_slice(&(payload_len as u16).to_be_bytes());
        additional_data
    }

    /// Encrypts the record body; the returned record carries a fresh header.
    pub(crate) fn encrypt(&self, header: &RecordLayerHeader, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; CRYPTO_GCM_NONCE_LENGTH];
        nonce[..GCM_IMPLICIT_IV_LENGTH].copy_from_slice(&self.local_write_iv);
        rand::rng().fill(&mut nonce[GCM_IMPLICIT_IV_LENGTH..]);

        let additional_data = Self::generate_aead_additional_data(header, plaintext.len());
        let encrypted = self
            .local_gcm
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &additional_data,
                },
            )
            .map_err(|e| Error::OtherDtlsErr(e.to_string()))?;

        let mut h = *header;
        h.content_len = (CRYPTO_GCM_EXPLICIT_NONCE_LENGTH + encrypted.len()) as u16;

        let mut r = Vec::with_capacity(RECORD_LAYER_HEADER_SIZE + h.content_len as usize);
        h.marshal(&mut r)?;
        r.extend_from_slice(&nonce[GCM_IMPLICIT_IV_LENGTH..]);
        r.extend_from_slice(&encrypted);

        Ok(r)
    }

    /// Decrypts a full record, returning the plaintext body.
    pub(crate) fn decrypt(&self, r: &[u8]) -> Result<Vec<u8>> {
        let h = RecordLayerHeader::unmarshal(r)?;
        if r.len() < RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH + CRYPTO_GCM_TAG_LENGTH
        {
            return Err(Error::ErrBufferShort);
        }

        let mut nonce = [0u8; CRYPTO_GCM_NONCE_LENGTH];
        nonce[..GCM_IMPLICIT_IV_LENGTH].copy_from_slice(&self.remote_write_iv);
        nonce[GCM_IMPLICIT_IV_LENGTH..].copy_from_slice(
            &r[RECORD_LAYER_HEADER_SIZE..RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH],
        );

        let out = &r[RECORD_LAYER_HEADER_SIZE + CRYPTO_GCM_EXPLICIT_NONCE_LENGTH..];
        let additional_data =
            Self::generate_aead_additional_data(&h, out.len() - CRYPTO_GCM_TAG_LENGTH);

        self.remote_gcm
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: out,
                    aad: &additional_data,
                },
            )
            .map_err(|e| Error::OtherDtlsErr(format!("decrypt: {e}")))
    }
}
