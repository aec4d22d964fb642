//! X.509 certificate used to authenticate the DTLS handshake.
//!
//! Only the certificate's fingerprint reaches the wire through this crate: it is
//! announced in every answer with `a=fingerprint`. The handshake itself is driven
//! outside the crate and reports its outcome through
//! [`handle_dtls_handshake_complete`](crate::peer_connection::RTCPeerConnection::handle_dtls_handshake_complete).

use std::time::{Duration, SystemTime};

use rcgen::{CertificateParams, KeyPair};
use sha2::{Digest, Sha256};

use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use shared::error::{Error, Result};
use shared::util::math_rand_alpha;

const DEFAULT_CERTIFICATE_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Certificate represents a X.509 certificate used to authenticate WebRTC communications.
#[derive(Clone, Debug)]
pub struct RTCCertificate {
    pub(crate) certificate: Vec<Vec<u8>>,
    pub(crate) private_key_der: Vec<u8>,
    pub(crate) expires: SystemTime,
}

impl PartialEq for RTCCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.certificate == other.certificate
    }
}

impl RTCCertificate {
    fn from_params(params: CertificateParams, key_pair: KeyPair) -> Result<Self> {
        let x509_cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::ErrCertificate(e.to_string()))?;

        Ok(Self {
            certificate: vec![x509_cert.der().to_vec()],
            private_key_der: key_pair.serialize_der(),
            expires: SystemTime::now() + DEFAULT_CERTIFICATE_LIFETIME,
        })
    }

    /// Generates a self-signed certificate for `key_pair` with a random common name.
    pub fn from_key_pair(key_pair: KeyPair) -> Result<Self> {
        if !(key_pair.is_compatible(&rcgen::PKCS_ED25519)
            || key_pair.is_compatible(&rcgen::PKCS_ECDSA_P256_SHA256))
        {
            return Err(Error::ErrCertificate("unsupported key pair".to_owned()));
        }

        let params = CertificateParams::new(vec![math_rand_alpha(16)])
            .map_err(|e| Error::ErrCertificate(e.to_string()))?;
        RTCCertificate::from_params(params, key_pair)
    }

    /// Generates an ECDSA P-256 certificate, the default for peer connections that
    /// were not configured with one.
    pub fn generate() -> Result<Self> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
            .map_err(|e| Error::ErrCertificate(e.to_string()))?;
        RTCCertificate::from_key_pair(key_pair)
    }

    /// expires returns the timestamp after which this certificate is no longer valid.
    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    /// DER encoded certificate chain, leaf first.
    pub fn certificate_der(&self) -> &[Vec<u8>] {
        &self.certificate
    }

    /// get_fingerprints returns certificate fingerprints, one of which
    /// is computed with the digest algorithm used in the certificate signature.
    pub fn get_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        let mut fingerprints = Vec::new();

        for c in &self.certificate {
            let mut h = Sha256::new();
            h.update(c);
            let hashed = h.finalize();
            let values: Vec<String> = hashed.iter().map(|x| format!("{x:02x}")).collect();

            fingerprints.push(RTCDtlsFingerprint {
                algorithm: "sha-256".to_owned(),
                value: values.join(":"),
            });
        }

        fingerprints
    }
}
