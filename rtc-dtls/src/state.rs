use serde::{Deserialize, Serialize};

use crate::cipher_suite::CipherSuiteId;
use crate::extension_use_srtp::SrtpProtectionProfile;
use crate::prf::prf_p_hash;
use crate::record_layer_header::MAX_SEQUENCE_NUMBER;
use shared::crypto::KeyingMaterialExporter;
use shared::error::{Error, Result};
use shared::replay_detector::{ReplayDetectorState, SlidingWindowDetector};

pub const HANDSHAKE_RANDOM_LENGTH: usize = 32;
pub const MASTER_SECRET_LENGTH: usize = 48;

pub(crate) static INVALID_KEYING_LABELS: &[&str] = &[
    "client finished",
    "server finished",
    "master secret",
    "key expansion",
];

/// State holds the dtls connection state. It is everything needed to resume
/// the connection without a new handshake.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub(crate) local_epoch: u16,
    pub(crate) remote_epoch: u16,
    pub(crate) local_sequence_number: Vec<u64>, // uint48
    pub(crate) local_random: [u8; HANDSHAKE_RANDOM_LENGTH],
    pub(crate) remote_random: [u8; HANDSHAKE_RANDOM_LENGTH],
    pub(crate) master_secret: Vec<u8>,
    pub(crate) cipher_suite_id: Option<CipherSuiteId>,
    pub(crate) srtp_protection_profile: SrtpProtectionProfile,
    pub(crate) peer_certificates: Vec<Vec<u8>>,
    pub(crate) is_client: bool,
    /// Replay window of the current remote epoch.
    pub(crate) remote_replay: Option<ReplayDetectorState>,
}

impl State {
    /// Builds the state a finished handshake leaves behind: both sides at epoch 1
    /// with fresh record counters.
    pub fn established(
        is_client: bool,
        cipher_suite_id: CipherSuiteId,
        srtp_protection_profile: SrtpProtectionProfile,
        master_secret: Vec<u8>,
        local_random: [u8; HANDSHAKE_RANDOM_LENGTH],
        remote_random: [u8; HANDSHAKE_RANDOM_LENGTH],
    ) -> Result<Self> {
        let state = State {
            local_epoch: 1,
            remote_epoch: 1,
            local_sequence_number: vec![0, 0],
            local_random,
            remote_random,
            master_secret,
            cipher_suite_id: Some(cipher_suite_id),
            srtp_protection_profile,
            peer_certificates: vec![],
            is_client,
            remote_replay: None,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn with_peer_certificates(mut self, peer_certificates: Vec<Vec<u8>>) -> Self {
        self.peer_certificates = peer_certificates;
        self
    }

    /// Checks the state is one a finished handshake can produce.
    pub fn validate(&self) -> Result<()> {
        if self.local_epoch == 0 || self.remote_epoch == 0 {
            return Err(Error::ErrHandshakeInProgress);
        }
        match self.cipher_suite_id {
            None => return Err(Error::CipherSuiteUnset),
            Some(CipherSuiteId::Unsupported) => return Err(Error::ErrInvalidCipherSuite),
            Some(_) => {}
        }
        if self.master_secret.len() != MASTER_SECRET_LENGTH {
            return Err(Error::ErrDtlsStateInvalid(format!(
                "master secret must be {MASTER_SECRET_LENGTH} bytes, got {}",
                self.master_secret.len()
            )));
        }
        if self.local_sequence_number.len() <= self.local_epoch as usize {
            return Err(Error::ErrDtlsStateInvalid(format!(
                "no sequence number for local epoch {}",
                self.local_epoch
            )));
        }
        if self
            .local_sequence_number
            .iter()
            .any(|seq| *seq > MAX_SEQUENCE_NUMBER + 1)
        {
            return Err(Error::ErrDtlsStateInvalid(
                "sequence number exceeds 48 bits".to_owned(),
            ));
        }
        if let Some(replay) = &self.remote_replay {
            if SlidingWindowDetector::from_state(replay).is_none() {
                return Err(Error::ErrDtlsStateInvalid(
                    "malformed replay window".to_owned(),
                ));
            }
        }
        Ok(())
    }

    pub fn local_epoch(&self) -> u16 {
        self.local_epoch
    }

    pub fn remote_epoch(&self) -> u16 {
        self.remote_epoch
    }

    /// Next record sequence number of the given local epoch.
    pub fn local_sequence_number(&self, epoch: u16) -> Option<u64> {
        self.local_sequence_number.get(epoch as usize).copied()
    }

    pub fn remote_replay(&self) -> Option<&ReplayDetectorState> {
        self.remote_replay.as_ref()
    }

    pub fn cipher_suite_id(&self) -> Option<CipherSuiteId> {
        self.cipher_suite_id
    }

    pub fn srtp_protection_profile(&self) -> SrtpProtectionProfile {
        self.srtp_protection_profile
    }

    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub(crate) fn client_random(&self) -> &[u8] {
        if self.is_client {
            &self.local_random
        } else {
            &self.remote_random
        }
    }

    pub(crate) fn server_random(&self) -> &[u8] {
        if self.is_client {
            &self.remote_random
        } else {
            &self.local_random
        }
    }

    pub fn marshal_binary(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::ErrDtlsStateInvalid(e.to_string()))
    }

    /// Decodes a state produced by [`State::marshal_binary`] and validates it.
    pub fn unmarshal_binary(data: &[u8]) -> Result<Self> {
        let state: State =
            bincode::deserialize(data).map_err(|e| Error::ErrDtlsStateInvalid(e.to_string()))?;
        state.validate()?;
        Ok(state)
    }
}

impl KeyingMaterialExporter for State {
    /// ExportKeyingMaterial returns length bytes of exported key material in a new
    /// slice as defined in RFC 5705.
    /// This allows protocols to use DTLS for key establishment, but
    /// then use some of the keying material for their own purposes
    fn export_keying_material(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>> {
        if self.local_epoch == 0 {
            return Err(Error::HandshakeInProgress);
        } else if !context.is_empty() {
            return Err(Error::ContextUnsupported);
        } else if INVALID_KEYING_LABELS.contains(&label) {
            return Err(Error::ReservedExportKeyingMaterial);
        }

        if self.cipher_suite_id.is_none() {
            return Err(Error::CipherSuiteUnset);
        }

        let mut seed = label.as_bytes().to_vec();
        seed.extend_from_slice(self.client_random());
        seed.extend_from_slice(self.server_random());

        prf_p_hash(&self.master_secret, &seed, length)
    }
}
