use bytes::Bytes;
use log::trace;

use super::*;
use crate::header::Header;
use shared::replay_detector::ReplayDetector;

impl Context {
    pub fn decrypt_rtp_with_header(&mut self, encrypted: &[u8], header: &Header) -> Result<Bytes> {
        let (roc, diff) = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (roc, diff, _) = state.next_rollover_count(header.sequence_number);
            let index = ((roc as u64) << 16) | header.sequence_number as u64;
            if let Some(replay_detector) = &mut state.replay_detector {
                if !replay_detector.check(index) {
                    return Err(Error::SrtpSsrcDuplicated(
                        header.ssrc,
                        header.sequence_number,
                    ));
                }
            }
            (roc, diff)
        };

        let dst = self.cipher.decrypt_rtp(encrypted, header, roc)?;

        let state = self.get_srtp_ssrc_state(header.ssrc);
        if let Some(replay_detector) = &mut state.replay_detector {
            replay_detector.accept();
        }
        state.update_rollover_count(header.sequence_number, diff);

        Ok(dst)
    }

    /// DecryptRTP decrypts a RTP packet with an encrypted payload
    pub fn decrypt_rtp(&mut self, encrypted: &[u8]) -> Result<Bytes> {
        let header = Header::unmarshal(encrypted)?;
        self.decrypt_rtp_with_header(encrypted, &header)
    }

    pub fn encrypt_rtp_with_header(&mut self, plaintext: &[u8], header: &Header) -> Result<Bytes> {
        let roc = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (roc, diff, ovf) = state.next_rollover_count(header.sequence_number);
            if ovf {
                // ... when 2^48 SRTP packets or 2^31 SRTCP packets have been secured with the same key
                // (whichever occurs before), the key management MUST be called to provide new master key(s)
                // (previously stored and used keys MUST NOT be used again), or the session MUST be terminated.
                // https://www.rfc-editor.org/rfc/rfc3711#section-9.2
                return Err(Error::ErrExceededMaxPackets(header.ssrc));
            }
            state.update_rollover_count(header.sequence_number, diff);
            trace!(
                "srtp encrypt ssrc={} seq={} roc={}",
                state.ssrc, header.sequence_number, roc
            );
            roc
        };

        self.cipher.encrypt_rtp(plaintext, header, roc)
    }

    /// EncryptRTP encrypts a marshaled RTP packet, appending the auth tag.
    pub fn encrypt_rtp(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        let header = Header::unmarshal(plaintext)?;
        self.encrypt_rtp_with_header(plaintext, &header)
    }
}
