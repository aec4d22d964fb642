#[cfg(test)]
mod peer_connection_test;

pub mod certificate;
pub mod configuration;
pub mod event;
mod internal;
pub mod sdp;
pub mod state;
pub mod transport;

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use log::{debug, trace};

use ::dtls::state::State;
use ::ice::agent::agent_config::AgentConfig;
use ::ice::connection_state::ConnectionState;
use srtp::context::SrtpSsrcState;

use crate::media_stream::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::event::{RTCPeerConnectionEvent, RTCTrackEvent};
use crate::peer_connection::sdp::sdp_type::RTCSdpType;
use crate::peer_connection::sdp::session_description::RTCSessionDescription;
use crate::peer_connection::sdp::{
    AnswerParams, MediaSectionAnswer, extract_fingerprint, extract_ice_details, media_sections,
    populate_sdp,
};
use crate::peer_connection::state::signaling_state::{StateChangeOp, check_next_signaling_state};
use crate::peer_connection::state::{
    RTCIceConnectionState, RTCPeerConnectionState, RTCSignalingState,
};
use crate::peer_connection::transport::dtls::RTCDtlsTransport;
use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::dtls::role::{DEFAULT_DTLS_ROLE_ANSWER, RTCDtlsRole};
use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;
use crate::peer_connection::transport::ice::RTCIceTransport;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::rtp_sender::RTCRtpSender;
use crate::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit, SSRC};
use shared::TaggedBytesMut;
use shared::error::{Error, Result, flatten_errs};

/// PeerConnection represents a WebRTC connection that establishes a
/// peer-to-peer communications with another PeerConnection instance in a
/// browser, or to another endpoint implementing the required protocols.
///
/// It always answers. A connection built from a [`SettingEngine`] that carries
/// a DTLS connection state starts out connected and continues that session.
///
/// The connection owns no socket. The driver binds the host candidate, reports
/// it with [`add_local_candidate`](Self::add_local_candidate), feeds received
/// datagrams to [`handle_read`](Self::handle_read) and sends whatever
/// [`poll_write`](Self::poll_write) returns.
///
/// [`SettingEngine`]: configuration::setting_engine::SettingEngine
pub struct RTCPeerConnection {
    //////////////////////////////////////////////////
    // PeerConnection WebRTC Spec Interface Definition
    //////////////////////////////////////////////////
    configuration: RTCConfiguration,

    local_description: Option<RTCSessionDescription>,
    remote_description: Option<RTCSessionDescription>,
    last_answer: String,

    signaling_state: RTCSignalingState,
    ice_connection_state: RTCIceConnectionState,
    peer_connection_state: RTCPeerConnectionState,
    is_closed: bool,

    events: VecDeque<RTCPeerConnectionEvent>,
    read_outs: VecDeque<Bytes>,

    //////////////////////////////////////////////////
    // PeerConnection Internal State Machine
    //////////////////////////////////////////////////
    pub(super) rtp_transceivers: Vec<RTCRtpTransceiver>,
    pub(super) ice_transport: RTCIceTransport,
    pub(super) dtls_transport: RTCDtlsTransport,
    remote_fingerprint: Option<RTCDtlsFingerprint>,
    resumed: bool,
}

impl RTCPeerConnection {
    /// creates a PeerConnection with the configuration. When the setting engine
    /// carries a DTLS connection state the transports are restored from it.
    pub fn new(mut configuration: RTCConfiguration) -> Result<Self> {
        if configuration.certificates.is_empty() {
            configuration.certificates = vec![RTCCertificate::generate()?];
        } else {
            let now = SystemTime::now();
            for cert in &configuration.certificates {
                if cert.expires() < now {
                    return Err(Error::ErrCertificate("certificate expired".to_owned()));
                }
            }
        }

        let setting_engine = &configuration.setting_engine;
        let ice_transport = RTCIceTransport::new(AgentConfig {
            local_ufrag: setting_engine.candidates.username_fragment.clone(),
            local_pwd: setting_engine.candidates.password.clone(),
            credentials_restored: setting_engine.candidates.credentials_restored,
            port_min: setting_engine.ephemeral_udp.0,
            port_max: setting_engine.ephemeral_udp.1,
            is_controlling: false,
            lite: setting_engine.candidates.ice_lite,
        })?;
        let dtls_transport = RTCDtlsTransport::new(
            configuration.certificates.clone(),
            setting_engine.srtp_protection_profiles.clone(),
            setting_engine.replay_protection.dtls,
            setting_engine.replay_protection.srtp,
        )?;
        let resumption = setting_engine.resumption.clone();

        let mut pc = Self {
            configuration,

            local_description: None,
            remote_description: None,
            last_answer: String::new(),

            signaling_state: RTCSignalingState::Stable,
            ice_connection_state: RTCIceConnectionState::New,
            peer_connection_state: RTCPeerConnectionState::New,
            is_closed: false,

            events: VecDeque::new(),
            read_outs: VecDeque::new(),

            rtp_transceivers: vec![],
            ice_transport,
            dtls_transport,
            remote_fingerprint: None,
            resumed: false,
        };

        if let Some(state) = resumption.dtls_connection_state {
            pc.dtls_transport.restore(state, &resumption.srtp_state)?;
            pc.ice_transport.agent().restore_selected_local()?;
            pc.resumed = true;
            pc.update_ice_connection_state();
        }

        Ok(pc)
    }

    /// Reports whether this connection continues a captured session.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn get_configuration(&self) -> &RTCConfiguration {
        &self.configuration
    }

    /// add_track adds a Track to the PeerConnection under a random SSRC.
    pub fn add_track(&mut self, track: Arc<TrackLocalStaticRTP>) -> Result<RTCRtpSender> {
        let sender = self.new_sender(track, None)?;
        self.push_transceiver(sender.clone(), RTCRtpTransceiverDirection::Sendrecv);
        Ok(sender)
    }

    /// add_transceiver_from_track creates a new transceiver sending `track`. With
    /// `init.ssrc_override` the sender keeps that SSRC, otherwise a random unused
    /// one is picked.
    pub fn add_transceiver_from_track(
        &mut self,
        track: Arc<TrackLocalStaticRTP>,
        init: RTCRtpTransceiverInit,
    ) -> Result<RTCRtpTransceiver> {
        let direction = match init.direction {
            RTCRtpTransceiverDirection::Unspecified => RTCRtpTransceiverDirection::Sendrecv,
            d => d,
        };
        let sender = self.new_sender(track, init.ssrc_override)?;
        Ok(self.push_transceiver(sender, direction))
    }

    /// set_remote_description sets the offer of the remote peer. Media sections
    /// are matched to transceivers by kind; sections nothing matches get a
    /// receive-only transceiver.
    pub fn set_remote_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        let parsed = description.parsed()?;
        let next_state = check_next_signaling_state(
            self.signaling_state,
            StateChangeOp::SetRemote,
            description.sdp_type,
        )?;

        let (remote_ufrag, remote_pwd, candidates) = extract_ice_details(&parsed)?;
        let remote_fingerprint = extract_fingerprint(&parsed)?;

        for section in media_sections(&parsed) {
            let index = self.match_transceiver(&section.mid, section.kind);
            let t = &mut self.rtp_transceivers[index];
            t.set_mid(section.mid.clone());

            let negotiated = t.direction().intersect(section.direction.reverse());
            t.set_current_direction(negotiated);
            if negotiated.has_send()
                && let Some(sender) = t.sender_mut()
            {
                sender.set_negotiated();
            }

            let mut new_tracks = vec![];
            if negotiated.has_recv() {
                for ssrc in &section.ssrcs {
                    if !t.remote_ssrcs().contains(ssrc) {
                        new_tracks.push(RTCTrackEvent {
                            kind: section.kind,
                            ssrc: *ssrc,
                            mid: section.mid.clone(),
                        });
                    }
                }
            }
            t.set_remote_ssrcs(section.ssrcs);

            for track in new_tracks {
                debug!("remote {} track with ssrc {} on mid {}", track.kind, track.ssrc, track.mid);
                self.events.push_back(RTCPeerConnectionEvent::OnTrack(track));
            }
        }

        self.ice_transport
            .set_remote_credentials(remote_ufrag, remote_pwd)?;
        for c in candidates {
            self.ice_transport.agent().add_remote_candidate(c.address)?;
        }

        if !self.resumed {
            let role = RTCDtlsRole::answering(RTCDtlsRole::from(&parsed));
            self.dtls_transport.set_role(role);
        }

        description.parsed = Some(parsed);
        self.remote_fingerprint = Some(remote_fingerprint);
        self.remote_description = Some(description);
        self.set_signaling_state(next_state);

        Ok(())
    }

    /// remote_description returns the description last applied with
    /// set_remote_description.
    pub fn remote_description(&self) -> Option<&RTCSessionDescription> {
        self.remote_description.as_ref()
    }

    /// create_answer generates the answer to the remote offer.
    pub fn create_answer(&mut self) -> Result<RTCSessionDescription> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        let remote = self
            .remote_description
            .as_ref()
            .ok_or(Error::ErrNoRemoteDescription)?;
        if self.signaling_state != RTCSignalingState::HaveRemoteOffer
            && self.signaling_state != RTCSignalingState::HaveLocalPranswer
        {
            return Err(Error::ErrIncorrectSignalingState);
        }

        let remote_sections = media_sections(&remote.parsed()?);
        let mut sections = vec![];
        for section in &remote_sections {
            if let Some(t) = self
                .rtp_transceivers
                .iter()
                .find(|t| t.mid() == Some(section.mid.as_str()))
            {
                sections.push(MediaSectionAnswer {
                    kind: t.kind(),
                    mid: section.mid.as_str(),
                    direction: t.current_direction(),
                    sender: t.sender(),
                });
            }
        }

        let (ice_ufrag, ice_pwd) = self.ice_transport.get_local_user_credentials();
        let fingerprints = self.dtls_transport.get_local_fingerprints();
        let dtls_role = match self.dtls_transport.role() {
            RTCDtlsRole::Client | RTCDtlsRole::Server => self.dtls_transport.role(),
            _ => DEFAULT_DTLS_ROLE_ANSWER,
        };

        let d = populate_sdp(
            &sections,
            &AnswerParams {
                ice_ufrag: &ice_ufrag,
                ice_pwd: &ice_pwd,
                ice_lite: self.configuration.setting_engine.candidates.ice_lite,
                candidate: self
                    .ice_transport
                    .local_candidate()
                    .ok_or(Error::ErrNoLocalCandidate)?,
                fingerprints: &fingerprints,
                dtls_role,
            },
        );

        let answer = RTCSessionDescription {
            sdp_type: RTCSdpType::Answer,
            sdp: d.marshal(),
            parsed: Some(d),
        };
        self.last_answer.clone_from(&answer.sdp);

        Ok(answer)
    }

    /// set_local_description applies the local answer. An answer without SDP
    /// takes the one create_answer returned last.
    pub fn set_local_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        if description.sdp.is_empty() {
            match description.sdp_type {
                RTCSdpType::Answer | RTCSdpType::Pranswer => {
                    description.sdp.clone_from(&self.last_answer);
                }
                _ => return Err(Error::ErrIncorrectSignalingState),
            }
        }

        let next_state = check_next_signaling_state(
            self.signaling_state,
            StateChangeOp::SetLocal,
            description.sdp_type,
        )?;
        description.parsed = Some(description.unmarshal()?);
        self.local_description = Some(description);
        self.set_signaling_state(next_state);

        // the handshake is driven from here on
        if !self.resumed && self.dtls_transport.state() == RTCDtlsTransportState::New {
            self.dtls_transport
                .set_state(RTCDtlsTransportState::Connecting);
            self.update_connection_state();
        }

        Ok(())
    }

    /// local_description returns the description last applied with
    /// set_local_description.
    pub fn local_description(&self) -> Option<&RTCSessionDescription> {
        self.local_description.as_ref()
    }

    /// Senders of every transceiver that is not stopped.
    pub fn get_senders(&self) -> Vec<RTCRtpSender> {
        self.rtp_transceivers
            .iter()
            .filter(|t| !t.stopped())
            .filter_map(|t| t.sender().cloned())
            .collect()
    }

    pub fn get_transceivers(&self) -> &[RTCRtpTransceiver] {
        &self.rtp_transceivers
    }

    pub fn ice_transport(&self) -> &RTCIceTransport {
        &self.ice_transport
    }

    pub fn dtls_transport(&self) -> &RTCDtlsTransport {
        &self.dtls_transport
    }

    /// Fingerprint of the remote certificate announced in the remote description.
    pub fn remote_fingerprint(&self) -> Option<&RTCDtlsFingerprint> {
        self.remote_fingerprint.as_ref()
    }

    pub fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state
    }

    pub fn ice_connection_state(&self) -> RTCIceConnectionState {
        self.ice_connection_state
    }

    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.peer_connection_state
    }

    /// Next queued event, oldest first.
    pub fn poll_event(&mut self) -> Option<RTCPeerConnectionEvent> {
        self.events.pop_front()
    }

    /// Per-SSRC SRTP positions of every inbound flow and of the outbound flows
    /// of this connection's senders.
    pub fn get_srtp_state(&self) -> Result<BTreeMap<u32, SrtpSsrcState>> {
        self.dtls_transport.get_srtp_state(&self.sender_ssrcs())
    }

    /// add_local_candidate reports the address the driver bound the host
    /// candidate to. It has to lie in the setting engine's ephemeral port range.
    pub fn add_local_candidate(&mut self, local_addr: SocketAddr) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.ice_transport.add_local_candidate(local_addr)
    }

    /// The ICE agent selected the pair with `remote`.
    pub fn handle_ice_candidate_pair_selected(&mut self, remote: SocketAddr) -> Result<()> {
        self.ice_transport
            .agent()
            .set_selected_candidate_pair(remote)?;
        self.update_ice_connection_state();
        Ok(())
    }

    /// The ICE agent reported a new connection state.
    pub fn handle_ice_connection_state_change(&mut self, state: ConnectionState) {
        if self.ice_transport.agent().set_connection_state(state) {
            self.update_ice_connection_state();
        }
    }

    /// The DTLS handshake finished with `state`. The peer certificate, when the
    /// state carries one, must match the fingerprint of the remote description.
    pub fn handle_dtls_handshake_complete(&mut self, state: State) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        if let Err(err) = self.validate_peer_certificate(&state) {
            self.handle_dtls_failure(&err.to_string());
            return Err(err);
        }

        self.dtls_transport.complete_handshake(state)?;
        self.update_connection_state();
        Ok(())
    }

    /// The DTLS handshake failed.
    pub fn handle_dtls_failure(&mut self, reason: &str) {
        log::warn!("dtls transport failed: {reason}");
        self.dtls_transport
            .set_state(RTCDtlsTransportState::Failed);
        self.update_connection_state();
    }

    /// Handles one datagram received on the host candidate. STUN goes to the ICE
    /// agent; DTLS and SRTP are only taken from the remote of the selected pair.
    /// Decrypted RTP packets are queued for [`poll_read`](Self::poll_read).
    pub fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        if msg.message.is_empty() {
            trace!("drop invalid packet due to zero length");
            return Ok(());
        }

        if shared::util::match_stun(&msg.message) {
            let result = self.ice_transport.handle_read(msg);
            self.update_ice_connection_state();
            return result;
        }

        if !self
            .ice_transport
            .validate_non_stun_traffic(msg.transport.peer_addr)
        {
            return Ok(());
        }

        if shared::util::match_dtls(&msg.message) {
            let application_data = self.dtls_transport.handle_read(&msg.message)?;
            if !application_data.is_empty() {
                trace!("dropping {} dtls application records", application_data.len());
            }
            self.update_connection_state();
        } else if shared::util::match_srtp(&msg.message) {
            let pkt = self.read_rtp(&msg.message)?;
            self.read_outs.push_back(pkt);
        } else {
            trace!(
                "dropping {} bytes from {}: neither dtls nor srtp",
                msg.message.len(),
                msg.transport.peer_addr
            );
        }
        Ok(())
    }

    /// Next decrypted RTP packet, oldest first.
    pub fn poll_read(&mut self) -> Option<Bytes> {
        self.read_outs.pop_front()
    }

    /// Next datagram to send on the host candidate.
    pub fn poll_write(&mut self) -> Option<TaggedBytesMut> {
        self.ice_transport.poll_transmit()
    }

    /// Decrypts one inbound SRTP packet.
    pub fn read_rtp(&mut self, packet: &[u8]) -> Result<Bytes> {
        self.dtls_transport.decrypt_rtp(packet)
    }

    /// Queues one RTP packet on the outbound flow `ssrc`. SSRC and payload type
    /// are rewritten to the flow's before the packet is encrypted.
    pub fn write_rtp(&mut self, ssrc: SSRC, packet: &[u8]) -> Result<usize> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        let sender = self
            .rtp_transceivers
            .iter()
            .filter(|t| !t.stopped())
            .filter_map(|t| t.sender())
            .find(|s| s.ssrc() == ssrc)
            .ok_or(Error::ErrSsrcNotFound(ssrc))?;
        if !sender.is_negotiated() {
            return Err(Error::ErrNoMediaSectionForTrack(sender.kind().to_string()));
        }
        let payload_type = sender.payload_type();

        let mut buf = packet.to_vec();
        srtp::header::rewrite_ssrc(&mut buf, ssrc)?;
        buf[1] = (buf[1] & 0x80) | (payload_type & 0x7f);

        let encrypted = self.dtls_transport.encrypt_rtp(&buf)?;
        self.ice_transport.send(BytesMut::from(&encrypted[..]))
    }

    /// close ends the PeerConnection. Senders are unbound from their tracks and,
    /// when a pair is selected, a DTLS close_notify is queued for the remote.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed {
            return Ok(());
        }
        self.is_closed = true;
        self.set_signaling_state(RTCSignalingState::Closed);

        let mut close_errs = vec![];
        for t in &mut self.rtp_transceivers {
            if let Err(err) = t.stop() {
                close_errs.push(err);
            }
        }

        for pkt in self.dtls_transport.stop() {
            if let Err(err) = self.ice_transport.send(pkt) {
                trace!("close_notify not sent: {err}");
            }
        }
        if let Err(err) = self.ice_transport.agent().close() {
            close_errs.push(err);
        }

        self.update_ice_connection_state();
        self.update_connection_state();

        flatten_errs(close_errs)
    }
}
