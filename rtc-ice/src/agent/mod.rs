
pub mod agent_config;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use agent_config::*;
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use shared::error::*;
use shared::{TaggedBytesMut, TransportContext, TransportProtocol};
use stun::attributes::*;
use stun::fingerprint::*;
use stun::integrity::*;
use stun::message::*;
use stun::textattrs::*;
use stun::xoraddr::*;

use crate::candidate::candidate_pair::{CandidatePair, CandidatePairState};
use crate::candidate::{Candidate, CandidateType};
use crate::connection_state::ConnectionState;
use crate::rand::*;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct UfragPwd {
    pub(crate) local_ufrag: String,
    pub(crate) local_pwd: String,
    pub(crate) remote_ufrag: String,
    pub(crate) remote_pwd: String,
}

fn assert_inbound_username(m: &Message, expected_username: &str) -> Result<()> {
    let mut username = Username::new(ATTR_USERNAME, String::new());
    username
        .get_from(m)
        .map_err(|err| Error::OtherIceErr(err.to_string()))?;

    if username.to_string() != expected_username {
        return Err(Error::Other(format!(
            "{:?} expected({}) actual({})",
            Error::ErrMismatchUsername,
            expected_username,
            username,
        )));
    }

    Ok(())
}

fn assert_inbound_message_integrity(m: &mut Message, key: &[u8]) -> Result<()> {
    let message_integrity_attr = MessageIntegrity(key.to_vec());
    message_integrity_attr
        .check(m)
        .map_err(|err| Error::OtherIceErr(err.to_string()))
}

/// Represents the ICE agent of one session: its credentials, its single host
/// candidate and the selected candidate pair. The agent never touches a socket;
/// datagrams go in through [`handle_read`](Self::handle_read) and
/// [`validate_non_stun_traffic`](Self::validate_non_stun_traffic), and come out of
/// [`poll_transmit`](Self::poll_transmit).
pub struct Agent {
    pub(crate) is_controlling: bool,
    pub(crate) lite: bool,
    pub(crate) restored: bool,

    pub(crate) connection_state: ConnectionState,
    pub(crate) ufrag_pwd: UfragPwd,

    pub(crate) port_min: u16,
    pub(crate) port_max: u16,
    pub(crate) local_candidate: Option<Candidate>,
    pub(crate) remote_candidates: Vec<Candidate>,
    pub(crate) selected_pair: Option<CandidatePair>,

    pub(crate) transmits: VecDeque<TaggedBytesMut>,
}

impl Agent {
    /// Creates a new Agent.
    pub fn new(config: AgentConfig) -> Result<Self> {
        if config.port_max < config.port_min {
            return Err(Error::ErrEndPortLessThanStart);
        }

        let (local_ufrag, local_pwd) = validate_credentials(
            config.local_ufrag,
            config.local_pwd,
            config.credentials_restored,
        )?;

        Ok(Self {
            is_controlling: config.is_controlling,
            lite: config.lite,
            restored: false,

            connection_state: ConnectionState::New,
            ufrag_pwd: UfragPwd {
                local_ufrag,
                local_pwd,
                ..Default::default()
            },

            port_min: config.port_min,
            port_max: config.port_max,
            local_candidate: None,
            remote_candidates: vec![],
            selected_pair: None,

            transmits: VecDeque::new(),
        })
    }

    /// Returns the local user credentials.
    pub fn get_local_user_credentials(&self) -> (String, String) {
        (
            self.ufrag_pwd.local_ufrag.clone(),
            self.ufrag_pwd.local_pwd.clone(),
        )
    }

    /// Returns the remote user credentials.
    pub fn get_remote_user_credentials(&self) -> (String, String) {
        (
            self.ufrag_pwd.remote_ufrag.clone(),
            self.ufrag_pwd.remote_pwd.clone(),
        )
    }

    /// Sets the credentials of the remote agent.
    pub fn set_remote_credentials(&mut self, remote_ufrag: String, remote_pwd: String) -> Result<()> {
        if remote_ufrag.is_empty() {
            return Err(Error::ErrSessionDescriptionMissingIceUfrag);
        } else if remote_pwd.is_empty() {
            return Err(Error::ErrSessionDescriptionMissingIcePwd);
        }

        self.ufrag_pwd.remote_ufrag = remote_ufrag;
        self.ufrag_pwd.remote_pwd = remote_pwd;
        Ok(())
    }

    /// Adds the host candidate on `address`, the transport address the caller's
    /// socket is bound to. The port must lie in the configured range; with a single
    /// port configured it must be exactly that port.
    pub fn add_local_candidate(&mut self, address: SocketAddr) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }

        let port = address.port();
        if (self.port_min, self.port_max) != (0, 0)
            && !(self.port_min..=self.port_max).contains(&port)
        {
            let expected = if self.port_min == self.port_max {
                self.port_min
            } else {
                port
            };
            return Err(Error::ErrPortUnavailable(expected));
        }

        match &self.local_candidate {
            Some(c) if c.address == address => return Ok(()),
            Some(c) => return Err(Error::ErrLocalCandidateExists(c.to_string())),
            None => {}
        }

        let c = Candidate::new(CandidateType::Host, address);
        debug!("[{}]: host candidate {}", self.get_name(), c);
        self.local_candidate = Some(c);
        Ok(())
    }

    /// Returns the transport address of the host candidate.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }
        self.local_candidate
            .map(|c| c.address)
            .ok_or(Error::ErrNoLocalCandidate)
    }

    pub fn local_candidate(&self) -> Option<&Candidate> {
        self.local_candidate.as_ref()
    }

    /// Adds a new remote candidate.
    pub fn add_remote_candidate(&mut self, address: SocketAddr) -> Result<()> {
        if self.connection_state.is_terminal() {
            return Err(Error::ErrClosed);
        }
        if self.find_remote_candidate(address).is_none() {
            self.remote_candidates
                .push(Candidate::new(CandidateType::Host, address));
        }
        Ok(())
    }

    /// Returns the selected pair or none if there is no selected pair.
    pub fn get_selected_candidate_pair(&self) -> Option<CandidatePair> {
        self.selected_pair
    }

    /// Selects the pair formed by the host candidate and `remote`. A remote address that
    /// was never signaled becomes a peer reflexive candidate.
    pub fn set_selected_candidate_pair(&mut self, remote: SocketAddr) -> Result<()> {
        if self.connection_state.is_terminal() {
            return Err(Error::ErrClosed);
        }
        let local = self.local_candidate.ok_or(Error::ErrNoLocalCandidate)?;

        let remote_candidate = match self.find_remote_candidate(remote) {
            Some(c) => c,
            None => {
                let c = Candidate::new(CandidateType::PeerReflexive, remote);
                debug!(
                    "[{}]: adding a new peer-reflexive candidate: {}",
                    self.get_name(),
                    remote
                );
                self.remote_candidates.push(c);
                c
            }
        };

        let mut pair = CandidatePair::new(local, remote_candidate, self.is_controlling);
        pair.state = CandidatePairState::Succeeded;
        pair.nominated = true;

        trace!("[{}]: Set selected candidate pair: {}", self.get_name(), pair);
        self.selected_pair = Some(pair);
        self.set_connection_state(ConnectionState::Connected);

        Ok(())
    }

    /// Returns the local address of the selected pair. A restored agent reports its
    /// pinned endpoint before the remote has been learned.
    pub fn get_selected_local_address(&self) -> Result<SocketAddr> {
        match &self.selected_pair {
            Some(pair) => Ok(pair.local.address),
            None if self.restored => self.local_addr(),
            None => Err(Error::ErrNoCandidatePairs),
        }
    }

    /// Marks a reconstructed agent as connected. The remote half of the pair is
    /// learned from the first connectivity check that authenticates with the
    /// restored credentials.
    pub fn restore_selected_local(&mut self) -> Result<()> {
        if self.connection_state.is_terminal() {
            return Err(Error::ErrClosed);
        }

        self.restored = true;
        info!(
            "[{}]: restored credentials of ufrag {}",
            self.get_name(),
            self.ufrag_pwd.local_ufrag
        );
        self.set_connection_state(ConnectionState::Connected);
        Ok(())
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Handles one STUN datagram. Binding requests that carry our USERNAME and a
    /// MESSAGE-INTEGRITY keyed with our password are answered; an agent without a
    /// selected pair selects the one the request arrived on.
    pub fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }

        let mut m = Message::new();
        m.unmarshal_binary(&msg.message)
            .map_err(|err| Error::OtherIceErr(err.to_string()))?;

        self.handle_inbound(&mut m, msg.transport.local_addr, msg.transport.peer_addr);
        Ok(())
    }

    /// Processes STUN traffic from a remote candidate.
    pub(crate) fn handle_inbound(
        &mut self,
        m: &mut Message,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
    ) {
        if m.typ.method != METHOD_BINDING || m.typ.class != CLASS_REQUEST {
            trace!(
                "[{}]: unhandled STUN from {} to {} class({}) method({})",
                self.get_name(),
                remote_addr,
                local_addr,
                m.typ.class,
                m.typ.method
            );
            return;
        }

        {
            let ufrag_pwd = &self.ufrag_pwd;
            let username = ufrag_pwd.local_ufrag.clone() + ":" + ufrag_pwd.remote_ufrag.as_str();
            if let Err(err) = assert_inbound_username(m, &username) {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            } else if let Err(err) =
                assert_inbound_message_integrity(m, ufrag_pwd.local_pwd.as_bytes())
            {
                warn!(
                    "[{}]: discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            }
        }

        trace!(
            "[{}]: inbound STUN (Request) from {} to {}",
            self.get_name(),
            remote_addr,
            local_addr
        );

        if self.selected_pair.is_none() {
            if let Err(err) = self.set_selected_candidate_pair(remote_addr) {
                warn!(
                    "[{}]: can not select pair with {}: {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            }
        }

        self.send_binding_success(m, local_addr, remote_addr);
    }

    pub(crate) fn send_binding_success(
        &mut self,
        m: &Message,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
    ) {
        let (ip, port) = (remote_addr.ip(), remote_addr.port());
        let local_pwd = self.ufrag_pwd.local_pwd.clone();

        let (out, result) = {
            let mut out = Message::new();
            let result = out.build(&[
                Box::new(m.clone()),
                Box::new(BINDING_SUCCESS),
                Box::new(XorMappedAddress { ip, port }),
                Box::new(MessageIntegrity::new_short_term_integrity(local_pwd)),
                Box::new(FINGERPRINT),
            ]);
            (out, result)
        };

        if let Err(err) = result {
            warn!(
                "[{}]: Failed to handle inbound ICE from: {} to: {} error: {}",
                self.get_name(),
                remote_addr,
                local_addr,
                err
            );
        } else {
            self.queue(local_addr, remote_addr, BytesMut::from(&out.raw[..]));
        }
    }

    /// Processes non STUN traffic from a remote candidate, and returns true if it
    /// arrived on the selected pair.
    pub fn validate_non_stun_traffic(&self, remote_addr: SocketAddr) -> bool {
        match self.selected_pair {
            Some(pair) if pair.remote.address == remote_addr => true,
            _ => {
                trace!(
                    "[{}]: discarded packet from unknown remote {}",
                    self.get_name(),
                    remote_addr
                );
                false
            }
        }
    }

    /// Queues `payload` for the remote side of the selected pair.
    pub fn send(&mut self, payload: BytesMut) -> Result<usize> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }
        let pair = self.selected_pair.ok_or(Error::ErrNoCandidatePairs)?;

        let n = payload.len();
        self.queue(pair.local.address, pair.remote.address, payload);
        Ok(n)
    }

    fn queue(&mut self, local_addr: SocketAddr, peer_addr: SocketAddr, message: BytesMut) {
        self.transmits.push_back(TaggedBytesMut {
            now: Instant::now(),
            transport: TransportContext {
                local_addr,
                peer_addr,
                transport_protocol: TransportProtocol::UDP,
            },
            message,
        });
    }

    /// Returns the next datagram to send.
    pub fn poll_transmit(&mut self) -> Option<TaggedBytesMut> {
        self.transmits.pop_front()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Moves the agent to `new_state`. Returns whether the state changed; Failed and
    /// Closed are never left.
    pub fn set_connection_state(&mut self, new_state: ConnectionState) -> bool {
        if self.connection_state == new_state {
            return false;
        }
        if self.connection_state.is_terminal() {
            warn!(
                "[{}]: ignored transition {} -> {}",
                self.get_name(),
                self.connection_state,
                new_state
            );
            return false;
        }

        // Connection has gone to failed, release the selected pair
        if new_state == ConnectionState::Failed {
            self.selected_pair = None;
            self.remote_candidates.clear();
        }

        info!(
            "[{}]: Setting new connection state: {}",
            self.get_name(),
            new_state
        );
        self.connection_state = new_state;
        true
    }

    /// Cleans up the Agent. Datagrams queued before the call can still be polled.
    pub fn close(&mut self) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }
        self.selected_pair = None;
        self.connection_state = ConnectionState::Closed;
        info!("[{}]: closed", self.get_name());
        Ok(())
    }

    fn find_remote_candidate(&self, address: SocketAddr) -> Option<Candidate> {
        self.remote_candidates
            .iter()
            .find(|c| c.address == address)
            .copied()
    }

    pub(crate) fn get_name(&self) -> &str {
        if self.is_controlling {
            "controlling"
        } else {
            "controlled"
        }
    }
}

/// RFC 8445 §5.3: at least 24 bits of ufrag and 128 bits of pwd. Empty values are
/// generated.
fn validate_credentials(
    mut ufrag: String,
    mut pwd: String,
    restored: bool,
) -> Result<(String, String)> {
    if restored {
        if ufrag.is_empty() {
            return Err(Error::ErrLocalUfragInsufficientBits);
        }
        if pwd.is_empty() {
            return Err(Error::ErrLocalPwdInsufficientBits);
        }
        return Ok((ufrag, pwd));
    }

    if ufrag.is_empty() {
        ufrag = generate_ufrag();
    }
    if pwd.is_empty() {
        pwd = generate_pwd();
    }

    if ufrag.len() * 8 < 24 {
        return Err(Error::ErrLocalUfragInsufficientBits);
    }
    if pwd.len() * 8 < 128 {
        return Err(Error::ErrLocalPwdInsufficientBits);
    }

    Ok((ufrag, pwd))
}
