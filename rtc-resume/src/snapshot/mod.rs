#[cfg(test)]
mod snapshot_test;

pub mod codec;

use std::collections::BTreeMap;
use std::fmt;

use dtls::state::State;
use serde::{Deserialize, Serialize};
use srtp::context::SrtpSsrcState;

use shared::error::{Error, Result};

/// Identifies a session inside one process run. Not persisted.
pub type SessionId = u64;

/// Local half of the ICE transport: the port the host candidate is bound to and the
/// credentials the remote's connectivity checks are authenticated with.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportCredentials {
    pub port: u16,
    pub ufrag: String,
    pub pwd: String,
}

/// What the remote peer does with the session's media.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaRole {
    /// Sends media into the process.
    #[default]
    Broadcaster,
    /// Receives the shared tracks.
    Viewer,
}

impl fmt::Display for MediaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaRole::Broadcaster => write!(f, "broadcaster"),
            MediaRole::Viewer => write!(f, "viewer"),
        }
    }
}

/// Outbound flows of a session. An SSRC of 0 means the flow does not exist.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaBinding {
    pub audio_ssrc: u32,
    pub video_ssrc: u32,
    pub role: MediaRole,
}

impl MediaBinding {
    /// Non-zero SSRCs, video first.
    pub fn outbound_ssrcs(&self) -> Vec<u32> {
        [self.video_ssrc, self.audio_ssrc]
            .into_iter()
            .filter(|ssrc| *ssrc != 0)
            .collect()
    }
}

/// Everything needed to rebuild one session.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The offer the session was negotiated with, as received.
    pub remote_description: String,
    pub credentials: TransportCredentials,
    /// `dtls::state::State` in its binary form.
    pub dtls_state: Vec<u8>,
    /// `srtp::context::SrtpSsrcState` in its binary form, per SSRC.
    pub srtp_state: BTreeMap<u32, Vec<u8>>,
    pub binding: MediaBinding,
}

impl SessionSnapshot {
    /// Checks the invariants every record must satisfy before a session is rebuilt
    /// from it.
    pub fn validate(&self) -> Result<()> {
        if self.remote_description.is_empty() {
            return Err(Error::ErrSnapshotInvalid(
                "empty remote description".to_owned(),
            ));
        }
        if self.credentials.port == 0 {
            return Err(Error::ErrSnapshotInvalid("port 0".to_owned()));
        }
        if self.credentials.ufrag.is_empty() || self.credentials.pwd.is_empty() {
            return Err(Error::ErrSnapshotInvalid(
                "empty ice credentials".to_owned(),
            ));
        }
        if self.dtls_state.is_empty() {
            return Err(Error::ErrSnapshotInvalid("empty dtls state".to_owned()));
        }
        if self.binding.audio_ssrc != 0 && self.binding.audio_ssrc == self.binding.video_ssrc {
            return Err(Error::ErrSnapshotInvalid(format!(
                "audio and video share ssrc {}",
                self.binding.audio_ssrc
            )));
        }
        if self.binding.role == MediaRole::Broadcaster && !self.binding.outbound_ssrcs().is_empty()
        {
            return Err(Error::ErrSnapshotInvalid(
                "broadcaster with outbound flows".to_owned(),
            ));
        }
        for ssrc in self.binding.outbound_ssrcs() {
            if !self.srtp_state.contains_key(&ssrc) {
                return Err(Error::ErrStreamKeyStateMismatch(format!(
                    "outbound ssrc {ssrc} has no srtp state"
                )));
            }
        }
        Ok(())
    }

    pub fn dtls_connection_state(&self) -> Result<State> {
        State::unmarshal_binary(&self.dtls_state)
    }

    pub fn srtp_ssrc_states(&self) -> Result<BTreeMap<u32, SrtpSsrcState>> {
        self.srtp_state
            .iter()
            .map(|(ssrc, raw)| Ok((*ssrc, SrtpSsrcState::deserialize(raw)?)))
            .collect()
    }
}

/// All snapshot records of one checkpoint. Replaces the previous aggregate as a whole.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAggregate {
    pub sessions: Vec<SessionSnapshot>,
}

impl SnapshotAggregate {
    pub fn new(sessions: Vec<SessionSnapshot>) -> Self {
        Self { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
