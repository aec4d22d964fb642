#[cfg(test)]
mod context_test;

pub mod srtp;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cipher::Cipher;
use crate::cipher::cipher_aead_aes_gcm::CipherAeadAesGcm;
use crate::cipher::cipher_aes_cm_hmac_sha1::CipherAesCmHmacSha1;
use crate::option::ContextOption;
use crate::protection_profile::ProtectionProfile;
use shared::error::{Error, Result};
use shared::replay_detector::{ReplayDetectorState, SlidingWindowDetector};

pub const MAX_ROC: u32 = u32::MAX;
pub const MAX_SEQUENCE_NUMBER: u16 = u16::MAX;
/// Largest 48-bit SRTP packet index, ROC || SEQ.
pub const MAX_SRTP_INDEX: u64 = ((MAX_ROC as u64) << 16) | MAX_SEQUENCE_NUMBER as u64;

/// SrtpSsrcState is the exportable keystream position of one SSRC: the
/// highest packet index processed so far and, for inbound flows, the
/// replay window.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrtpSsrcState {
    pub index: u64,
    pub rollover_has_processed: bool,
    pub replay: Option<ReplayDetectorState>,
}

impl SrtpSsrcState {
    pub fn rollover_counter(&self) -> u32 {
        (self.index >> 16) as u32
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::ErrSrtpStateInvalid(e.to_string()))
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        bincode::deserialize(buf).map_err(|e| Error::ErrSrtpStateInvalid(e.to_string()))
    }
}

pub(crate) struct SsrcState {
    ssrc: u32,
    index: u64,
    rollover_has_processed: bool,
    replay_detector: Option<SlidingWindowDetector>,
}

impl SsrcState {
    fn new(ssrc: u32, replay_detector: Option<SlidingWindowDetector>) -> Self {
        SsrcState {
            ssrc,
            index: 0,
            rollover_has_processed: false,
            replay_detector,
        }
    }

    /// https://tools.ietf.org/html/rfc3711#appendix-A
    /// Returns the guessed rollover counter, the distance from the current
    /// index and whether the guess overflowed the ROC.
    pub(crate) fn next_rollover_count(&self, sequence_number: u16) -> (u32, i64, bool) {
        let local_roc = (self.index >> 16) as u32;
        let local_seq = self.index as u16;

        let mut guess_roc = local_roc;
        let mut difference = 0i64;

        if self.rollover_has_processed {
            let half = (MAX_SEQUENCE_NUMBER as i64 + 1) / 2;
            let seq = sequence_number as i64 - local_seq as i64;

            if (local_seq as i64) < half {
                if seq > half && local_roc > 0 {
                    // Packet from the previous rollover period.
                    guess_roc = local_roc - 1;
                    difference = seq - (MAX_SEQUENCE_NUMBER as i64 + 1);
                } else {
                    difference = seq;
                }
            } else if local_seq as i64 - half > sequence_number as i64 {
                guess_roc = local_roc.wrapping_add(1);
                difference = seq + MAX_SEQUENCE_NUMBER as i64 + 1;
            } else {
                difference = seq;
            }
        }

        (
            guess_roc,
            difference,
            guess_roc == 0 && local_roc == MAX_ROC,
        )
    }

    /// The index only moves forward, so late packets never rewind the keystream position.
    pub(crate) fn update_rollover_count(&mut self, sequence_number: u16, difference: i64) {
        if !self.rollover_has_processed {
            self.index |= sequence_number as u64;
            self.rollover_has_processed = true;
        } else if difference > 0 {
            self.index += difference as u64;
        }
    }
}

/// Context represents a SRTP cryptographic context.
/// Context can only be used for one-way operations.
/// it must either used ONLY for encryption or ONLY for decryption.
pub struct Context {
    cipher: Box<dyn Cipher + Send>,
    srtp_ssrc_states: BTreeMap<u32, SsrcState>,
    new_srtp_replay_detector: Option<ContextOption>,
}

impl Context {
    /// CreateContext creates a new SRTP Context
    pub fn new(
        master_key: &[u8],
        master_salt: &[u8],
        profile: ProtectionProfile,
        srtp_ctx_opt: Option<ContextOption>,
    ) -> Result<Context> {
        let key_len = profile.key_len();
        let salt_len = profile.salt_len();

        if master_key.len() != key_len {
            return Err(Error::SrtpMasterKeyLength(key_len, master_key.len()));
        } else if master_salt.len() != salt_len {
            return Err(Error::SrtpSaltLength(salt_len, master_salt.len()));
        }

        let cipher: Box<dyn Cipher + Send> = match profile {
            ProtectionProfile::Aes128CmHmacSha1_32 | ProtectionProfile::Aes128CmHmacSha1_80 => {
                Box::new(CipherAesCmHmacSha1::new(profile, master_key, master_salt)?)
            }
            ProtectionProfile::AeadAes128Gcm => {
                Box::new(CipherAeadAesGcm::new(profile, master_key, master_salt)?)
            }
        };

        Ok(Context {
            cipher,
            srtp_ssrc_states: BTreeMap::new(),
            new_srtp_replay_detector: srtp_ctx_opt,
        })
    }

    fn get_srtp_ssrc_state(&mut self, ssrc: u32) -> &mut SsrcState {
        let replay_detector = &self.new_srtp_replay_detector;
        self.srtp_ssrc_states
            .entry(ssrc)
            .or_insert_with(|| SsrcState::new(ssrc, replay_detector.as_ref().map(|f| f())))
    }

    /// Returns the keystream position of every SSRC this context has seen
    /// or been seeded with, ordered by SSRC.
    pub fn get_srtp_state(&self) -> BTreeMap<u32, SrtpSsrcState> {
        self.srtp_ssrc_states
            .iter()
            .map(|(ssrc, s)| {
                (
                    *ssrc,
                    SrtpSsrcState {
                        index: s.index,
                        rollover_has_processed: s.rollover_has_processed,
                        replay: s.replay_detector.as_ref().map(|d| d.state()),
                    },
                )
            })
            .collect()
    }

    /// Seeds per-SSRC state captured from another context with the same keys.
    /// Replay windows are only restored when this context does replay
    /// protection; a missing window gets a fresh one.
    pub fn set_srtp_state(&mut self, states: &BTreeMap<u32, SrtpSsrcState>) -> Result<()> {
        for (ssrc, state) in states {
            if state.index > MAX_SRTP_INDEX {
                return Err(Error::ErrSrtpStateInvalid(format!(
                    "ssrc {ssrc}: index {} exceeds 48 bits",
                    state.index
                )));
            }

            let replay_detector = match (&self.new_srtp_replay_detector, &state.replay) {
                (None, _) => None,
                (Some(_), Some(replay)) => Some(
                    SlidingWindowDetector::from_state(replay).ok_or_else(|| {
                        Error::ErrSrtpStateInvalid(format!("ssrc {ssrc}: malformed replay window"))
                    })?,
                ),
                (Some(f), None) => Some(f()),
            };

            self.srtp_ssrc_states.insert(
                *ssrc,
                SsrcState {
                    ssrc: *ssrc,
                    index: state.index,
                    rollover_has_processed: state.rollover_has_processed,
                    replay_detector,
                },
            );
        }

        Ok(())
    }
}
