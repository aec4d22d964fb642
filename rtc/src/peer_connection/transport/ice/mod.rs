use std::net::SocketAddr;

use bytes::BytesMut;

use ::ice::agent::Agent;
use ::ice::agent::agent_config::AgentConfig;
use ::ice::candidate::Candidate;
use ::ice::candidate::candidate_pair::CandidatePair;

use crate::peer_connection::state::RTCIceConnectionState;
use shared::TaggedBytesMut;
use shared::error::Result;

/// ICETransport allows an application access to information about the ICE
/// transport over which packets are sent and received.
pub struct RTCIceTransport {
    pub(crate) agent: Agent,
}

impl RTCIceTransport {
    pub(crate) fn new(config: AgentConfig) -> Result<Self> {
        Ok(Self {
            agent: Agent::new(config)?,
        })
    }

    /// Returns the local ufrag and pwd.
    pub fn get_local_user_credentials(&self) -> (String, String) {
        self.agent.get_local_user_credentials()
    }

    pub fn get_remote_user_credentials(&self) -> (String, String) {
        self.agent.get_remote_user_credentials()
    }

    /// get_selected_candidate_pair returns the selected candidate pair on which packets are sent
    /// if there is no selected pair None is returned
    pub fn get_selected_candidate_pair(&self) -> Option<CandidatePair> {
        self.agent.get_selected_candidate_pair()
    }

    /// Local endpoint of the selected pair. Fails with `ErrNoCandidatePairs` before a
    /// pair has been selected.
    pub fn get_selected_local_address(&self) -> Result<SocketAddr> {
        self.agent.get_selected_local_address()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.agent.local_addr()
    }

    pub fn local_candidate(&self) -> Option<&Candidate> {
        self.agent.local_candidate()
    }

    pub fn state(&self) -> RTCIceConnectionState {
        self.agent.connection_state().into()
    }

    pub(crate) fn set_remote_credentials(&mut self, ufrag: String, pwd: String) -> Result<()> {
        self.agent.set_remote_credentials(ufrag, pwd)
    }

    pub(crate) fn agent(&mut self) -> &mut Agent {
        &mut self.agent
    }

    pub(crate) fn add_local_candidate(&mut self, local_addr: SocketAddr) -> Result<()> {
        self.agent.add_local_candidate(local_addr)
    }

    /// Feeds a STUN message received on the host candidate to the agent.
    pub(crate) fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        self.agent.handle_read(msg)
    }

    pub(crate) fn validate_non_stun_traffic(&self, remote: SocketAddr) -> bool {
        self.agent.validate_non_stun_traffic(remote)
    }

    pub(crate) fn send(&mut self, buf: BytesMut) -> Result<usize> {
        self.agent.send(buf)
    }

    pub(crate) fn poll_transmit(&mut self) -> Option<TaggedBytesMut> {
        self.agent.poll_transmit()
    }
}
