
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace, warn};
use rtc::peer_connection::RTCPeerConnection;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc::rtp_transceiver::rtp_codec::RTPCodecType;
use srtp::context::SrtpSsrcState;

use crate::snapshot::{MediaBinding, MediaRole, SessionSnapshot, TransportCredentials};
use shared::error::{Error, Result};

/// Projects a connected session into a snapshot record. The session is only read.
///
/// Fails with an integrity error when the session is not Connected, when no candidate
/// pair is selected, when DTLS has not finished or when a sender has no negotiated
/// encoding.
pub fn extract(pc: &RTCPeerConnection) -> Result<SessionSnapshot> {
    let state = pc.connection_state();
    if state != RTCPeerConnectionState::Connected {
        return Err(Error::ErrSessionNotConnected(state.to_string()));
    }

    let remote = pc
        .remote_description()
        .ok_or(Error::ErrNoRemoteDescription)?;

    let ice = pc.ice_transport();
    let port = ice.get_selected_local_address()?.port();
    let (ufrag, pwd) = ice.get_local_user_credentials();

    let dtls_state = pc.dtls_transport().connection_state()?.marshal_binary()?;
    let binding = media_binding(pc, remote.is_receive_only()?)?;

    let key_space = stream_key_space(pc, &binding);
    let states = pc.get_srtp_state()?;
    let undeclared = undeclared_ssrcs(&states, &key_space);
    if !undeclared.is_empty() {
        // a resumed session starts these flows over at rollover counter zero
        warn!(
            "srtp state of ssrcs {undeclared:?} is not captured: the remote description does not announce them"
        );
    }
    let srtp_state = project_srtp_state(states, &key_space)?;

    let snapshot = SessionSnapshot {
        remote_description: remote.sdp.clone(),
        credentials: TransportCredentials { port, ufrag, pwd },
        dtls_state,
        srtp_state,
        binding,
    };
    snapshot.validate()?;

    debug!(
        "extracted {} session on port {} with {} srtp flows",
        snapshot.binding.role,
        port,
        snapshot.srtp_state.len()
    );
    Ok(snapshot)
}

/// SSRCs whose SRTP state a snapshot of `pc` must carry: the outbound flows of
/// `binding` and the inbound flows the remote description announced.
pub fn stream_key_space(pc: &RTCPeerConnection, binding: &MediaBinding) -> BTreeSet<u32> {
    let mut key_space: BTreeSet<u32> = binding.outbound_ssrcs().into_iter().collect();
    for t in pc.get_transceivers() {
        if !t.stopped() && t.current_direction().has_recv() {
            key_space.extend(t.remote_ssrcs().iter().copied());
        }
    }
    key_space
}

fn media_binding(pc: &RTCPeerConnection, receive_only: bool) -> Result<MediaBinding> {
    let mut binding = MediaBinding {
        role: if receive_only {
            MediaRole::Viewer
        } else {
            MediaRole::Broadcaster
        },
        ..Default::default()
    };

    for sender in pc.get_senders() {
        let kind = sender.kind();
        let params = sender.get_parameters();
        let encoding = params
            .encodings
            .first()
            .ok_or_else(|| Error::ErrSenderHasNoEncodings(kind.to_string()))?;

        match kind {
            RTPCodecType::Audio => binding.audio_ssrc = encoding.ssrc,
            RTPCodecType::Video => binding.video_ssrc = encoding.ssrc,
            RTPCodecType::Unspecified => {
                return Err(Error::ErrSenderHasNoEncodings(kind.to_string()));
            }
        }
    }

    Ok(binding)
}

/// SSRCs that carried SRTP but lie outside `key_space`, such as flows of a remote
/// that only signals MIDs.
fn undeclared_ssrcs(states: &BTreeMap<u32, SrtpSsrcState>, key_space: &BTreeSet<u32>) -> Vec<u32> {
    states
        .keys()
        .filter(|ssrc| !key_space.contains(ssrc))
        .copied()
        .collect()
}

/// Keeps exactly the SSRCs of `key_space`. Flows that never carried a packet have no
/// entry yet and get the initial state.
fn project_srtp_state(
    mut states: BTreeMap<u32, SrtpSsrcState>,
    key_space: &BTreeSet<u32>,
) -> Result<BTreeMap<u32, Vec<u8>>> {
    let mut projected = BTreeMap::new();
    for ssrc in key_space {
        let state = match states.remove(ssrc) {
            Some(state) => state,
            None => {
                trace!("ssrc {ssrc} has not carried a packet yet");
                SrtpSsrcState::default()
            }
        };
        projected.insert(*ssrc, state.serialize()?);
    }
    Ok(projected)
}
