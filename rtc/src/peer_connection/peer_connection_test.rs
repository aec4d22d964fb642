use ::dtls::cipher_suite::CipherSuiteId;
use ::dtls::extension_use_srtp::SrtpProtectionProfile;
use ::dtls::state::MASTER_SECRET_LENGTH;
use stun::agent::TransactionId;
use stun::attributes::ATTR_USERNAME;
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::{BINDING_REQUEST, Message};
use stun::textattrs::Username;

use super::*;
use crate::peer_connection::configuration::RTCConfigurationBuilder;
use crate::peer_connection::configuration::setting_engine::SettingEngine;
use crate::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};

const CLIENT_RANDOM: [u8; 32] = [0x0c; 32];
const SERVER_RANDOM: [u8; 32] = [0x05; 32];
const SENDER_ADDR: &str = "127.0.0.1:50000";
const RECEIVER_ADDR: &str = "127.0.0.1:50001";

fn established(is_client: bool) -> Result<State> {
    let (local_random, remote_random) = if is_client {
        (CLIENT_RANDOM, SERVER_RANDOM)
    } else {
        (SERVER_RANDOM, CLIENT_RANDOM)
    };
    State::established(
        is_client,
        CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256,
        SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm,
        (0..MASTER_SECRET_LENGTH as u8).collect(),
        local_random,
        remote_random,
    )
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn new_pc(s: SettingEngine) -> Result<RTCPeerConnection> {
    RTCPeerConnection::new(RTCConfigurationBuilder::new().with_setting_engine(s).build())
}

/// Peer connection with its host candidate on `local`.
fn host_pc(s: SettingEngine, local: &str) -> Result<RTCPeerConnection> {
    let mut pc = new_pc(s)?;
    pc.add_local_candidate(addr(local))?;
    Ok(pc)
}

/// Offer a browser would send, with one audio and one video section.
fn offer_sdp(setup: &str, direction: &str, candidate: Option<SocketAddr>) -> String {
    let candidate = match candidate {
        Some(addr) => format!(
            "a=candidate:1 1 udp 2130706431 {} {} typ host\r\n",
            addr.ip(),
            addr.port()
        ),
        None => String::new(),
    };

    format!(
        "v=0\r
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r
s=-\r
t=0 0\r
a=group:BUNDLE 0 1\r
a=fingerprint:sha-256 0F:74:31:25:CB:A2:13:EC:28:6F:6D:2C:61:FF:5D:C2:BC:B9:DB:3D:98:14:8D:1A:BB:EA:33:0C:A4:60:A8:8E\r
m=audio 9 UDP/TLS/RTP/SAVPF 111\r
c=IN IP4 0.0.0.0\r
a=setup:{setup}\r
a=mid:0\r
a=ice-ufrag:Wvtq\r
a=ice-pwd:XhA5yM0pwu7CmTRbx9XSY7Kb\r
{candidate}a=rtpmap:111 opus/48000/2\r
a={direction}\r
a=ssrc:1001 cname:stream\r
m=video 9 UDP/TLS/RTP/SAVPF 96\r
c=IN IP4 0.0.0.0\r
a=setup:{setup}\r
a=mid:1\r
a=rtpmap:96 VP8/90000\r
a={direction}\r
a=ssrc:2002 cname:stream\r
"
    )
}

fn negotiate(pc: &mut RTCPeerConnection, offer: String) -> Result<RTCSessionDescription> {
    pc.set_remote_description(RTCSessionDescription::offer(offer)?)?;
    let answer = pc.create_answer()?;
    pc.set_local_description(answer.clone())?;
    Ok(answer)
}

fn tracks() -> (Arc<TrackLocalStaticRTP>, Arc<TrackLocalStaticRTP>) {
    (
        Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability::vp8(),
            "video".to_owned(),
            "pion".to_owned(),
        )),
        Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability::opus(),
            "audio".to_owned(),
            "pion".to_owned(),
        )),
    )
}

fn rtp_packet(seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0x80, 0x80 | 100, 0, 0, 0, 0, 0, 1, 0xde, 0xad, 0xbe, 0xef];
    pkt[2..4].copy_from_slice(&seq.to_be_bytes());
    pkt.extend_from_slice(payload);
    pkt
}

/// Hands every datagram `from` queued to `to`, then returns what `to` decrypted.
fn deliver(from: &mut RTCPeerConnection, to: &mut RTCPeerConnection) -> Result<Vec<Bytes>> {
    while let Some(t) = from.poll_write() {
        to.handle_read(TaggedBytesMut::udp(
            t.transport.peer_addr,
            t.transport.local_addr,
            &t.message,
        ))?;
    }

    let mut pkts = vec![];
    while let Some(pkt) = to.poll_read() {
        pkts.push(pkt);
    }
    Ok(pkts)
}

/// Connectivity check the remote "Wvtq" sends to a peer with `ufrag`/`pwd`.
fn binding_request(ufrag: &str, pwd: &str) -> Vec<u8> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, format!("{ufrag}:Wvtq"))),
        Box::new(MessageIntegrity::new_short_term_integrity(pwd.to_owned())),
        Box::new(FINGERPRINT),
    ])
    .unwrap();
    m.raw
}

fn drain_events(pc: &mut RTCPeerConnection) -> Vec<RTCPeerConnectionEvent> {
    let mut events = vec![];
    while let Some(event) = pc.poll_event() {
        events.push(event);
    }
    events
}

#[test]
fn test_answer_broadcaster_offer() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut pc = host_pc(SettingEngine::default(), SENDER_ADDR)?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
    assert_eq!(pc.connection_state(), RTCPeerConnectionState::New);

    let answer = negotiate(&mut pc, offer_sdp("actpass", "sendonly", None))?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
    assert_eq!(pc.dtls_transport().role(), RTCDtlsRole::Client);
    assert_eq!(pc.connection_state(), RTCPeerConnectionState::Connecting);

    assert!(answer.sdp.contains("a=setup:active\r\n"), "{}", answer.sdp);
    assert_eq!(answer.sdp.matches("a=recvonly\r\n").count(), 2);
    assert!(!answer.sdp.contains("a=ssrc:"));

    let transceivers = pc.get_transceivers();
    assert_eq!(transceivers.len(), 2);
    assert_eq!(transceivers[0].kind(), RTPCodecType::Audio);
    assert_eq!(transceivers[0].mid(), Some("0"));
    assert_eq!(transceivers[1].remote_ssrcs(), &[2002]);
    assert!(pc.get_senders().is_empty());

    let tracks: Vec<RTCTrackEvent> = drain_events(&mut pc)
        .into_iter()
        .filter_map(|e| match e {
            RTCPeerConnectionEvent::OnTrack(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(
        tracks,
        vec![
            RTCTrackEvent {
                kind: RTPCodecType::Audio,
                ssrc: 1001,
                mid: "0".to_owned(),
            },
            RTCTrackEvent {
                kind: RTPCodecType::Video,
                ssrc: 2002,
                mid: "1".to_owned(),
            },
        ]
    );

    pc.close()?;
    Ok(())
}

#[test]
fn test_answer_viewer_offer() -> Result<()> {
    let (video, audio) = tracks();
    let mut pc = host_pc(SettingEngine::default(), SENDER_ADDR)?;

    let video_sender = pc.add_track(Arc::clone(&video))?;
    let audio_sender = pc.add_track(Arc::clone(&audio))?;
    assert!(video_sender.get_parameters().encodings.is_empty());

    let answer = negotiate(&mut pc, offer_sdp("active", "recvonly", None))?;
    assert_eq!(pc.dtls_transport().role(), RTCDtlsRole::Server);
    assert!(answer.sdp.contains("a=setup:passive\r\n"));
    assert_eq!(answer.sdp.matches("a=sendonly\r\n").count(), 2);
    assert!(
        answer
            .sdp
            .contains(&format!("a=ssrc:{} cname:pion\r\n", video_sender.ssrc()))
    );

    let senders = pc.get_senders();
    assert_eq!(senders.len(), 2);
    for sender in &senders {
        let params = sender.get_parameters();
        assert_eq!(params.encodings.len(), 1);
        assert_eq!(params.encodings[0].ssrc, sender.ssrc());
    }
    assert_eq!(senders[1].ssrc(), audio_sender.ssrc());
    assert_eq!(video.bindings()?.len(), 1);

    pc.close()?;
    assert!(video.bindings()?.is_empty(), "close must unbind senders");
    assert!(pc.get_senders().is_empty());
    assert_eq!(pc.connection_state(), RTCPeerConnectionState::Closed);
    assert_eq!(pc.signaling_state(), RTCSignalingState::Closed);

    Ok(())
}

#[test]
fn test_signaling_errors() -> Result<()> {
    let mut pc = host_pc(SettingEngine::default(), SENDER_ADDR)?;

    assert_eq!(pc.create_answer().err(), Some(Error::ErrNoRemoteDescription));
    assert_eq!(
        pc.set_local_description(RTCSessionDescription {
            sdp_type: RTCSdpType::Answer,
            sdp: String::new(),
            parsed: None,
        })
        .err(),
        Some(Error::ErrIncorrectSignalingState)
    );

    let answer_as_remote = RTCSessionDescription::answer(offer_sdp("actpass", "sendonly", None))?;
    assert_eq!(
        pc.set_remote_description(answer_as_remote).err(),
        Some(Error::ErrIncorrectSignalingState)
    );

    let missing_ufrag = offer_sdp("actpass", "sendonly", None).replace("a=ice-ufrag:Wvtq\r\n", "");
    assert_eq!(
        pc.set_remote_description(RTCSessionDescription::offer(missing_ufrag)?)
            .err(),
        Some(Error::ErrSessionDescriptionMissingIceUfrag)
    );

    pc.close()?;
    assert_eq!(
        pc.set_remote_description(RTCSessionDescription::offer(offer_sdp(
            "actpass", "sendonly", None
        ))?)
        .err(),
        Some(Error::ErrConnectionClosed)
    );
    Ok(())
}

#[test]
fn test_duplicate_ssrc_override() -> Result<()> {
    let (video, audio) = tracks();
    let mut pc = host_pc(SettingEngine::default(), SENDER_ADDR)?;

    let init = RTCRtpTransceiverInit {
        direction: RTCRtpTransceiverDirection::Sendonly,
        ssrc_override: Some(1234),
    };
    let t = pc.add_transceiver_from_track(video, init)?;
    assert_eq!(t.sender().map(|s| s.ssrc()), Some(1234));
    assert_eq!(t.direction(), RTCRtpTransceiverDirection::Sendonly);

    assert_eq!(
        pc.add_transceiver_from_track(audio, init).err(),
        Some(Error::ErrDuplicateSsrc(1234))
    );
    Ok(())
}

#[test]
fn test_peer_certificate_must_match_fingerprint() -> Result<()> {
    let mut pc = host_pc(SettingEngine::default(), SENDER_ADDR)?;
    negotiate(&mut pc, offer_sdp("actpass", "sendonly", None))?;

    let state = established(true)?.with_peer_certificates(vec![vec![1, 2, 3]]);
    assert!(matches!(
        pc.handle_dtls_handshake_complete(state),
        Err(Error::ErrCertificate(_))
    ));
    assert_eq!(pc.connection_state(), RTCPeerConnectionState::Failed);
    Ok(())
}

/// Two answering peer connections wired to each other. `sender`
/// sends video on a negotiated flow, `receiver` receives it.
fn connected_pair() -> Result<(RTCPeerConnection, RTCPeerConnection, SSRC)> {
    let (video, _) = tracks();
    let mut sender = host_pc(SettingEngine::default(), SENDER_ADDR)?;
    let mut receiver = host_pc(SettingEngine::default(), RECEIVER_ADDR)?;
    let sender_addr = sender.ice_transport().local_addr()?;
    let receiver_addr = receiver.ice_transport().local_addr()?;

    let ssrc = sender.add_track(video)?.ssrc();
    negotiate(
        &mut sender,
        offer_sdp("actpass", "recvonly", Some(receiver_addr)),
    )?;
    negotiate(
        &mut receiver,
        offer_sdp("active", "sendonly", Some(sender_addr)),
    )?;

    sender.handle_ice_candidate_pair_selected(receiver_addr)?;
    receiver.handle_ice_candidate_pair_selected(sender_addr)?;
    sender.handle_dtls_handshake_complete(established(true)?)?;
    receiver.handle_dtls_handshake_complete(established(false)?)?;

    assert_eq!(sender.connection_state(), RTCPeerConnectionState::Connected);
    assert_eq!(receiver.connection_state(), RTCPeerConnectionState::Connected);

    Ok((sender, receiver, ssrc))
}

#[test]
fn test_write_read_rtp() -> Result<()> {
    let (mut sender, mut receiver, ssrc) = connected_pair()?;

    assert_eq!(
        sender.write_rtp(ssrc + 1, &rtp_packet(1, b"x")).err(),
        Some(Error::ErrSsrcNotFound(ssrc + 1))
    );

    sender.write_rtp(ssrc, &rtp_packet(1, b"hello"))?;
    let pkts = deliver(&mut sender, &mut receiver)?;
    assert_eq!(pkts.len(), 1);
    let pkt = &pkts[0];

    let header = srtp::header::Header::unmarshal(pkt)?;
    assert_eq!(header.ssrc, ssrc);
    assert_eq!(header.sequence_number, 1);
    assert_eq!(pkt[1], 0x80 | 96, "payload type is rewritten, marker kept");
    assert_eq!(&pkt[header.header_len..], b"hello");

    let states = receiver.get_srtp_state()?;
    assert_eq!(states.get(&ssrc).map(|s| s.index), Some(1));
    assert!(sender.get_srtp_state()?.contains_key(&ssrc));

    Ok(())
}

#[test]
fn test_media_from_unselected_remote_is_dropped() -> Result<()> {
    let (mut sender, mut receiver, ssrc) = connected_pair()?;

    sender.write_rtp(ssrc, &rtp_packet(1, b"spoofed"))?;
    let t = sender.poll_write().ok_or(Error::ErrNoCandidatePairs)?;
    receiver.handle_read(TaggedBytesMut::udp(
        addr(RECEIVER_ADDR),
        addr("127.0.0.1:40666"),
        &t.message,
    ))?;
    assert!(receiver.poll_read().is_none());

    // the same datagram from the selected remote is taken
    receiver.handle_read(TaggedBytesMut::udp(
        addr(RECEIVER_ADDR),
        addr(SENDER_ADDR),
        &t.message,
    ))?;
    assert!(receiver.poll_read().is_some());

    Ok(())
}

#[test]
fn test_remote_close_notify_closes_connection() -> Result<()> {
    let (mut sender, mut receiver, _) = connected_pair()?;
    drain_events(&mut receiver);

    sender.close()?;
    assert!(deliver(&mut sender, &mut receiver)?.is_empty());

    assert_eq!(
        receiver.dtls_transport().state(),
        RTCDtlsTransportState::Closed
    );
    assert_eq!(receiver.connection_state(), RTCPeerConnectionState::Closed);
    assert!(drain_events(&mut receiver).contains(
        &RTCPeerConnectionEvent::OnConnectionStateChangeEvent(RTCPeerConnectionState::Closed)
    ));

    Ok(())
}

#[test]
fn test_resume_continues_srtp_and_dtls() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let (mut sender, mut receiver, ssrc) = connected_pair()?;
    sender.write_rtp(ssrc, &rtp_packet(1, b"before"))?;
    assert_eq!(deliver(&mut sender, &mut receiver)?.len(), 1);

    // capture everything a restarted process needs, then drop the process state
    let (ufrag, pwd) = sender.ice_transport().get_local_user_credentials();
    let port = sender.ice_transport().get_selected_local_address()?.port();
    let dtls_state = sender.dtls_transport().connection_state()?;
    let srtp_state = sender.get_srtp_state()?;
    let remote = sender.remote_description().cloned().ok_or(Error::ErrNoRemoteDescription)?;
    drop(sender);

    let mut s = SettingEngine::default();
    s.set_ice_credentials(ufrag.clone(), pwd.clone());
    s.set_ephemeral_udp_port_range(port, port)?;
    s.set_dtls_connection_state(dtls_state);
    s.set_srtp_state(srtp_state);
    let mut resumed = new_pc(s)?;
    assert_eq!(
        resumed.add_local_candidate(addr("127.0.0.1:50002")),
        Err(Error::ErrPortUnavailable(port))
    );
    resumed.add_local_candidate(addr(SENDER_ADDR))?;

    assert!(resumed.is_resumed());
    assert_eq!(resumed.connection_state(), RTCPeerConnectionState::Connected);
    assert_eq!(
        resumed.ice_transport().get_local_user_credentials(),
        (ufrag.clone(), pwd.clone())
    );
    assert_eq!(resumed.ice_transport().local_addr()?.port(), port);

    let (video, _) = tracks();
    resumed.add_transceiver_from_track(
        video,
        RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Sendonly,
            ssrc_override: Some(ssrc),
        },
    )?;
    let answer = negotiate(&mut resumed, remote.sdp)?;
    assert!(answer.sdp.contains("a=setup:active\r\n"), "restored role is kept");
    assert_eq!(resumed.connection_state(), RTCPeerConnectionState::Connected);

    // no remote is known until the peer sends something
    assert_eq!(
        resumed.write_rtp(ssrc, &rtp_packet(2, b"after")).err(),
        Some(Error::ErrNoCandidatePairs)
    );
    resumed.handle_read(TaggedBytesMut::udp(
        addr(SENDER_ADDR),
        addr(RECEIVER_ADDR),
        &binding_request(&ufrag, &pwd),
    ))?;
    assert_eq!(
        resumed
            .ice_transport()
            .get_selected_candidate_pair()
            .map(|p| p.remote.address),
        Some(addr(RECEIVER_ADDR))
    );
    // the binding success is consumed by the receiver's agent
    assert!(deliver(&mut resumed, &mut receiver)?.is_empty());

    resumed.write_rtp(ssrc, &rtp_packet(2, b"after"))?;
    let pkts = deliver(&mut resumed, &mut receiver)?;
    assert!(pkts[0].ends_with(b"after"));

    // the receiver's replay window survived on its side, the index on ours
    resumed.write_rtp(ssrc, &rtp_packet(1, b"replayed"))?;
    assert!(deliver(&mut resumed, &mut receiver).is_err());

    // DTLS record counters continue too: the close_notify is accepted
    resumed.close()?;
    assert!(deliver(&mut resumed, &mut receiver)?.is_empty());
    assert_eq!(
        receiver.dtls_transport().state(),
        RTCDtlsTransportState::Closed
    );

    Ok(())
}
