use super::*;

use sha2::{Digest, Sha256};

use crate::media_stream::track_local::TrackLocal;
use crate::rtp_transceiver::rtp_codec::RTPCodecType;

impl RTCPeerConnection {
    pub(super) fn sender_ssrcs(&self) -> Vec<SSRC> {
        self.get_senders().iter().map(|s| s.ssrc()).collect()
    }

    /// Random SSRC no sender of this connection uses yet.
    pub(super) fn generate_ssrc(&self) -> SSRC {
        let used = self.sender_ssrcs();
        loop {
            let ssrc = rand::random::<u32>();
            if ssrc != 0 && !used.contains(&ssrc) {
                return ssrc;
            }
        }
    }

    pub(super) fn new_sender(
        &mut self,
        track: Arc<TrackLocalStaticRTP>,
        ssrc_override: Option<SSRC>,
    ) -> Result<RTCRtpSender> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        let ssrc = match ssrc_override {
            Some(ssrc) if self.sender_ssrcs().contains(&ssrc) => {
                return Err(Error::ErrDuplicateSsrc(ssrc));
            }
            Some(ssrc) => ssrc,
            None => self.generate_ssrc(),
        };

        RTCRtpSender::new(track, ssrc)
    }

    pub(super) fn push_transceiver(
        &mut self,
        sender: RTCRtpSender,
        direction: RTCRtpTransceiverDirection,
    ) -> RTCRtpTransceiver {
        let kind = sender.track().kind();
        debug!(
            "added {kind} transceiver {direction} with ssrc {}",
            sender.ssrc()
        );

        let t = RTCRtpTransceiver::new(kind, Some(sender), direction);
        self.rtp_transceivers.push(t.clone());
        t
    }

    /// Index of the transceiver a remote media section lands on: the one already
    /// carrying `mid`, else the first unmatched one of `kind`, else a new
    /// receive-only transceiver.
    pub(super) fn match_transceiver(&mut self, mid: &str, kind: RTPCodecType) -> usize {
        if let Some(i) = self
            .rtp_transceivers
            .iter()
            .position(|t| t.mid() == Some(mid))
        {
            return i;
        }
        if let Some(i) = self
            .rtp_transceivers
            .iter()
            .position(|t| t.is_unmatched() && t.kind() == kind)
        {
            return i;
        }

        self.rtp_transceivers.push(RTCRtpTransceiver::new(
            kind,
            None,
            RTCRtpTransceiverDirection::Recvonly,
        ));
        self.rtp_transceivers.len() - 1
    }

    pub(super) fn validate_peer_certificate(&self, state: &State) -> Result<()> {
        let Some(peer_certificate) = state.peer_certificates().first() else {
            return Ok(());
        };
        let remote = self
            .remote_fingerprint
            .as_ref()
            .ok_or(Error::ErrSessionDescriptionNoFingerprint)?;
        if !remote.algorithm.eq_ignore_ascii_case("sha-256") {
            return Err(Error::ErrCertificate(format!(
                "unsupported fingerprint algorithm {}",
                remote.algorithm
            )));
        }

        let digest = Sha256::digest(peer_certificate);
        let value: Vec<String> = digest.iter().map(|b| format!("{b:02x}")).collect();
        if !value.join(":").eq_ignore_ascii_case(&remote.value) {
            return Err(Error::ErrCertificate(
                "remote certificate does not match the announced fingerprint".to_owned(),
            ));
        }
        Ok(())
    }

    pub(super) fn set_signaling_state(&mut self, state: RTCSignalingState) {
        if self.signaling_state != state {
            debug!("signaling state changed: {} -> {}", self.signaling_state, state);
            self.signaling_state = state;
        }
    }

    /// Mirrors the agent's state and re-aggregates the connection state.
    pub(crate) fn update_ice_connection_state(&mut self) {
        let ice_connection_state = self.ice_transport.state();
        if self.ice_connection_state != ice_connection_state {
            log::info!("ICE connection state changed: {ice_connection_state}");
            self.ice_connection_state = ice_connection_state;
            self.events
                .push_back(RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(
                    ice_connection_state,
                ));
        }
        self.update_connection_state();
    }

    /// Update the PeerConnectionState given the state of relevant transports
    /// <https://www.w3.org/TR/webrtc/#rtcpeerconnectionstate-enum>
    pub(crate) fn update_connection_state(&mut self) {
        let connection_state = RTCPeerConnectionState::aggregate(
            self.is_closed,
            self.ice_connection_state,
            self.dtls_transport.state(),
        );
        if self.peer_connection_state == connection_state {
            return;
        }

        log::info!("peer connection state changed: {connection_state}");
        self.peer_connection_state = connection_state;

        self.events
            .push_back(RTCPeerConnectionEvent::OnConnectionStateChangeEvent(
                connection_state,
            ));
    }
}
