#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use dtls::cipher_suite::CipherSuiteId;
use dtls::extension_use_srtp::SrtpProtectionProfile;
use dtls::state::{MASTER_SECRET_LENGTH, State};
use rtc_resume::reconstructor::BroadcastTracks;
use rtc_resume::registry::config::RegistryConfigBuilder;
use rtc_resume::registry::{SessionHandle, SessionRegistry};
use rtc::media_stream::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use rtc::peer_connection::RTCPeerConnection;
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::setting_engine::SettingEngine;
use rtc::peer_connection::sdp::session_description::RTCSessionDescription;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc::peer_connection::transport::dtls::role::RTCDtlsRole;
use rtc::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use rtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use rtc::rtp_transceiver::{RTCRtpTransceiverInit, SSRC};
use shared::error::{Error, Result};
use stun::agent::TransactionId;
use stun::attributes::ATTR_USERNAME;
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::{BINDING_REQUEST, Message};
use stun::textattrs::Username;

const CLIENT_RANDOM: [u8; 32] = [0x0c; 32];
const SERVER_RANDOM: [u8; 32] = [0x05; 32];

/// SSRCs the remote browser announces in its offers.
pub const REMOTE_AUDIO_SSRC: SSRC = 1001;
pub const REMOTE_VIDEO_SSRC: SSRC = 2002;
/// ICE username fragment the remote browser announces in its offers.
pub const REMOTE_UFRAG: &str = "Wvtq";

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn loopback() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// What a finished handshake leaves behind on either side of one DTLS association.
pub fn established(is_client: bool) -> Result<State> {
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

pub fn new_pc() -> Result<RTCPeerConnection> {
    RTCPeerConnection::new(
        RTCConfigurationBuilder::new()
            .with_setting_engine(SettingEngine::default())
            .build(),
    )
}

/// `pc` with its host candidate bound on loopback.
pub fn session(pc: RTCPeerConnection) -> Result<Arc<SessionHandle>> {
    SessionHandle::bind(pc, loopback())
}

pub fn free_port() -> Result<u16> {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(socket.local_addr()?.port())
}

/// Offer of a browser with one section per entry of `kinds`, in order.
pub fn offer_sdp(
    setup: &str,
    direction: &str,
    candidate: Option<SocketAddr>,
    kinds: &[RTPCodecType],
) -> String {
    let mids: Vec<String> = (0..kinds.len()).map(|i| i.to_string()).collect();
    let mut sdp = format!(
        "v=0\r
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r
s=-\r
t=0 0\r
a=group:BUNDLE {}\r
a=fingerprint:sha-256 0F:74:31:25:CB:A2:13:EC:28:6F:6D:2C:61:FF:5D:C2:BC:B9:DB:3D:98:14:8D:1A:BB:EA:33:0C:A4:60:A8:8E\r
a=ice-ufrag:Wvtq\r
a=ice-pwd:XhA5yM0pwu7CmTRbx9XSY7Kb\r
",
        mids.join(" ")
    );

    for (i, kind) in kinds.iter().enumerate() {
        let (pt, rtpmap, ssrc) = match kind {
            RTPCodecType::Audio => (111, "opus/48000/2", REMOTE_AUDIO_SSRC),
            _ => (96, "VP8/90000", REMOTE_VIDEO_SSRC),
        };
        sdp += &format!(
            "m={kind} 9 UDP/TLS/RTP/SAVPF {pt}\r
c=IN IP4 0.0.0.0\r
a=setup:{setup}\r
a=mid:{i}\r
a=rtpmap:{pt} {rtpmap}\r
a={direction}\r
a=ssrc:{ssrc} cname:stream\r
"
        );
        if i == 0
            && let Some(addr) = candidate
        {
            sdp += &format!(
                "a=candidate:1 1 udp 2130706431 {} {} typ host\r\n",
                addr.ip(),
                addr.port()
            );
        }
    }
    sdp
}

pub fn audio_video() -> Vec<RTPCodecType> {
    vec![RTPCodecType::Audio, RTPCodecType::Video]
}

pub fn negotiate(pc: &mut RTCPeerConnection, offer: String) -> Result<()> {
    pc.set_remote_description(RTCSessionDescription::offer(offer)?)?;
    let answer = pc.create_answer()?;
    pc.set_local_description(answer)
}

/// Plays the protocol drivers: the pair with `remote` is selected and the DTLS
/// handshake finishes in the negotiated role.
pub fn connect(pc: &mut RTCPeerConnection, remote: SocketAddr) -> Result<()> {
    pc.handle_ice_candidate_pair_selected(remote)?;
    let is_client = pc.dtls_transport().role() == RTCDtlsRole::Client;
    pc.handle_dtls_handshake_complete(established(is_client)?)?;
    if pc.connection_state() != RTCPeerConnectionState::Connected {
        return Err(Error::ErrSessionNotConnected(
            pc.connection_state().to_string(),
        ));
    }
    Ok(())
}

pub fn rtp_packet(seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0x80, 100, 0, 0, 0, 0, 0, 1, 0xde, 0xad, 0xbe, 0xef];
    pkt[2..4].copy_from_slice(&seq.to_be_bytes());
    pkt.extend_from_slice(payload);
    pkt
}

/// Receives one datagram on the socket of `handle` and hands it over. Returns the
/// first RTP packet it carried.
pub fn recv(handle: &SessionHandle) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; 1500];
    handle
        .socket()
        .set_read_timeout(Some(Duration::from_secs(5)))?;
    let (n, from) = handle.socket().recv_from(&mut buf)?;
    Ok(handle
        .handle_read(from, &buf[..n])?
        .first()
        .map(|pkt| pkt.to_vec()))
}

/// Connectivity check the browser sends to a session with local credentials
/// `ufrag`/`pwd`.
pub fn binding_request(ufrag: &str, pwd: &str) -> Result<Message> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, format!("{ufrag}:{REMOTE_UFRAG}"))),
        Box::new(MessageIntegrity::new_short_term_integrity(pwd.to_owned())),
        Box::new(FINGERPRINT),
    ])
    .map_err(|err| Error::Other(err.to_string()))?;
    Ok(m)
}

/// Sends a connectivity check from `from` to the session at `to`, the way a
/// browser's consent check reaches a rebuilt session first.
pub fn check(from: &UdpSocket, to: SocketAddr, ufrag: &str, pwd: &str) -> Result<Message> {
    let request = binding_request(ufrag, pwd)?;
    from.send_to(&request.raw, to)?;
    Ok(request)
}

pub fn registry(dir: &tempfile::TempDir) -> SessionRegistry {
    SessionRegistry::new(
        RegistryConfigBuilder::new()
            .with_snapshot_path(dir.path().join("peerConnections.bin"))
            .build(),
    )
}

/// A viewer session of the relay and the browser it sends to, connected. The relay
/// sends both broadcast tracks.
pub fn viewer_pair(tracks: &BroadcastTracks) -> Result<(Arc<SessionHandle>, Arc<SessionHandle>)> {
    let relay = session(new_pc()?)?;
    let browser = session(new_pc()?)?;
    let (relay_addr, browser_addr) = (relay.local_addr(), browser.local_addr());

    {
        let mut pc = relay.lock()?;
        pc.add_track(Arc::clone(&tracks.video))?;
        pc.add_track(Arc::clone(&tracks.audio))?;
        negotiate(
            &mut pc,
            offer_sdp("actpass", "recvonly", Some(browser_addr), &audio_video()),
        )?;
        connect(&mut pc, browser_addr)?;
    }
    {
        let mut pc = browser.lock()?;
        negotiate(
            &mut pc,
            offer_sdp("active", "sendonly", Some(relay_addr), &audio_video()),
        )?;
        connect(&mut pc, relay_addr)?;
    }
    Ok((relay, browser))
}

/// A broadcaster session of the relay and the browser that sends video into it on
/// the SSRC its offer announced.
pub fn broadcaster_pair() -> Result<(Arc<SessionHandle>, Arc<SessionHandle>)> {
    let relay = session(new_pc()?)?;
    let browser = session(new_pc()?)?;
    let (relay_addr, browser_addr) = (relay.local_addr(), browser.local_addr());

    let camera = Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability::vp8(),
        "camera".to_owned(),
        "browser".to_owned(),
    ));

    {
        let mut pc = relay.lock()?;
        negotiate(
            &mut pc,
            offer_sdp("active", "sendonly", Some(browser_addr), &audio_video()),
        )?;
        connect(&mut pc, browser_addr)?;
    }
    {
        let mut pc = browser.lock()?;
        pc.add_transceiver_from_track(
            camera,
            RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Sendonly,
                ssrc_override: Some(REMOTE_VIDEO_SSRC),
            },
        )?;
        negotiate(
            &mut pc,
            offer_sdp("actpass", "recvonly", Some(relay_addr), &[RTPCodecType::Video]),
        )?;
        connect(&mut pc, relay_addr)?;
    }
    Ok((relay, browser))
}
