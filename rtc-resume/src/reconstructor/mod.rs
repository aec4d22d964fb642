use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use log::{debug, info};
use rtc::media_stream::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use rtc::peer_connection::RTCPeerConnection;
use rtc::peer_connection::configuration::RTCConfigurationBuilder;
use rtc::peer_connection::configuration::setting_engine::SettingEngine;
use rtc::peer_connection::sdp::session_description::RTCSessionDescription;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use rtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use rtc::rtp_transceiver::{RTCRtpTransceiverInit, SSRC};

use crate::extractor::stream_key_space;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::snapshot::{MediaRole, SessionId, SessionSnapshot, SnapshotAggregate};
use shared::error::{Error, Result};

/// The two tracks every viewer receives.
#[derive(Debug, Clone)]
pub struct BroadcastTracks {
    pub video: Arc<TrackLocalStaticRTP>,
    pub audio: Arc<TrackLocalStaticRTP>,
}

impl Default for BroadcastTracks {
    fn default() -> Self {
        Self {
            video: Arc::new(TrackLocalStaticRTP::new(
                RTCRtpCodecCapability::vp8(),
                "video".to_owned(),
                "webrtc-rs".to_owned(),
            )),
            audio: Arc::new(TrackLocalStaticRTP::new(
                RTCRtpCodecCapability::opus(),
                "audio".to_owned(),
                "webrtc-rs".to_owned(),
            )),
        }
    }
}

/// Rebuilds sessions from snapshot records. A rebuilt session listens on the recorded
/// port with the recorded credentials and continues the recorded DTLS and SRTP state,
/// so the remote peer keeps talking to it as if nothing happened.
pub struct Reconstructor {
    tracks: BroadcastTracks,
    bind_ip: IpAddr,
}

impl Reconstructor {
    pub fn new(tracks: BroadcastTracks) -> Self {
        Self {
            tracks,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }

    /// Address the rebuilt host candidates bind to. (default is 0.0.0.0)
    pub fn with_bind_ip(mut self, bind_ip: IpAddr) -> Self {
        self.bind_ip = bind_ip;
        self
    }

    pub fn tracks(&self) -> &BroadcastTracks {
        &self.tracks
    }

    /// Setting engine pre-seeded with everything `snapshot` recorded about the
    /// transports.
    pub fn setting_engine(&self, snapshot: &SessionSnapshot) -> Result<SettingEngine> {
        snapshot.validate()?;
        let dtls_state = snapshot
            .dtls_connection_state()
            .map_err(|e| Error::ErrSnapshotInvalid(e.to_string()))?;
        let srtp_state = snapshot
            .srtp_ssrc_states()
            .map_err(|e| Error::ErrSnapshotInvalid(e.to_string()))?;

        let mut s = SettingEngine::default();
        s.set_srtp_protection_profiles(vec![dtls_state.srtp_protection_profile()]);
        s.set_ice_credentials(
            snapshot.credentials.ufrag.clone(),
            snapshot.credentials.pwd.clone(),
        );
        s.set_ephemeral_udp_port_range(snapshot.credentials.port, snapshot.credentials.port)?;
        s.set_dtls_connection_state(dtls_state);
        s.set_srtp_state(srtp_state);
        Ok(s)
    }

    /// Rebuilds the session `snapshot` was taken from, bound to the recorded port. The
    /// returned session is Connected; the answer it generates is never sent anywhere.
    pub fn reconstruct(&self, snapshot: &SessionSnapshot) -> Result<Arc<SessionHandle>> {
        let s = self.setting_engine(snapshot)?;
        let pc =
            RTCPeerConnection::new(RTCConfigurationBuilder::new().with_setting_engine(s).build())?;
        let handle = SessionHandle::bind(pc, self.bind_ip)?;

        let result = {
            let mut pc = handle.lock()?;
            self.renegotiate(&mut pc, snapshot)
        };
        if let Err(err) = result {
            if let Err(close_err) = handle.close() {
                debug!("closing half rebuilt session: {close_err}");
            }
            return Err(err);
        }

        info!(
            "rebuilt {} session on {}",
            snapshot.binding.role,
            handle.local_addr()
        );
        Ok(handle)
    }

    fn renegotiate(&self, pc: &mut RTCPeerConnection, snapshot: &SessionSnapshot) -> Result<()> {
        let binding = &snapshot.binding;
        if binding.role == MediaRole::Viewer {
            self.add_flow(pc, &self.tracks.video, binding.video_ssrc)?;
            self.add_flow(pc, &self.tracks.audio, binding.audio_ssrc)?;
        }

        pc.set_remote_description(RTCSessionDescription::offer(
            snapshot.remote_description.clone(),
        )?)?;
        let answer = pc.create_answer()?;
        pc.set_local_description(answer)?;

        let expected = stream_key_space(pc, binding);
        let recorded: BTreeSet<u32> = snapshot.srtp_state.keys().copied().collect();
        if expected != recorded {
            return Err(Error::ErrStreamKeyStateMismatch(format!(
                "negotiated {expected:?}, recorded {recorded:?}"
            )));
        }

        let state = pc.connection_state();
        if state != RTCPeerConnectionState::Connected {
            return Err(Error::ErrSessionNotConnected(state.to_string()));
        }
        Ok(())
    }

    fn add_flow(
        &self,
        pc: &mut RTCPeerConnection,
        track: &Arc<TrackLocalStaticRTP>,
        ssrc: SSRC,
    ) -> Result<()> {
        if ssrc == 0 {
            return Ok(());
        }
        pc.add_transceiver_from_track(
            Arc::clone(track),
            RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Sendonly,
                ssrc_override: Some(ssrc),
            },
        )?;
        Ok(())
    }
}

/// Startup half of the cycle: rebuilds every session of an aggregate and hands it to
/// the registry.
pub struct Resumer {
    reconstructor: Reconstructor,
}

impl Resumer {
    pub fn new(reconstructor: Reconstructor) -> Self {
        Self { reconstructor }
    }

    pub fn reconstructor(&self) -> &Reconstructor {
        &self.reconstructor
    }

    /// Rebuilds all sessions of `aggregate` and registers them as Connected. The first
    /// failure aborts: a session that can not be rebuilt means the aggregate can not be
    /// trusted.
    pub fn resume_all(
        &self,
        aggregate: &SnapshotAggregate,
        registry: &SessionRegistry,
    ) -> Result<Vec<Arc<SessionHandle>>> {
        let mut handles = Vec::with_capacity(aggregate.len());
        for (i, snapshot) in aggregate.sessions.iter().enumerate() {
            let handle = self.reconstructor.reconstruct(snapshot).inspect_err(|err| {
                log::error!("session {i} of {} can not be rebuilt: {err}", aggregate.len());
            })?;
            registry.insert_restored(Arc::clone(&handle))?;
            handles.push(handle);
        }

        info!("resumed {} sessions", handles.len());
        Ok(handles)
    }

    /// Loads the registry's snapshot file and resumes what it holds.
    pub fn resume_from_store(&self, registry: &SessionRegistry) -> Result<Vec<SessionId>> {
        match registry.store().load()? {
            Some(aggregate) => Ok(self
                .resume_all(&aggregate, registry)?
                .iter()
                .map(|h| h.id())
                .collect()),
            None => Ok(vec![]),
        }
    }
}
