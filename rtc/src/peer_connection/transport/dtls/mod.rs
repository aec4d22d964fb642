pub mod fingerprint;
pub mod role;
pub mod state;

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use log::{debug, info};

use ::dtls::config::{ConfigBuilder, HandshakeConfig};
use ::dtls::conn::DTLSConn;
use ::dtls::extension_use_srtp::SrtpProtectionProfile;
use ::dtls::state::State;
use srtp::context::{Context, SrtpSsrcState};
use srtp::option::srtp_replay_protection;
use srtp::protection_profile::ProtectionProfile;

use crate::peer_connection::certificate::RTCCertificate;
use fingerprint::RTCDtlsFingerprint;
use role::RTCDtlsRole;
use shared::error::{Error, Result};
use state::RTCDtlsTransportState;

pub(crate) const DEFAULT_SRTP_REPLAY_PROTECTION_WINDOW: usize = 64;

pub(crate) fn default_srtp_protection_profiles() -> Vec<SrtpProtectionProfile> {
    vec![SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm]
}

/// DTLSTransport allows an application access to information about the DTLS
/// transport over which RTP packets are sent and received, and owns the SRTP
/// contexts keyed from it.
pub struct RTCDtlsTransport {
    pub(crate) state: RTCDtlsTransportState,
    pub(crate) dtls_role: RTCDtlsRole,
    pub(crate) certificates: Vec<RTCCertificate>,
    pub(crate) handshake_config: HandshakeConfig,
    pub(crate) conn: Option<DTLSConn>,

    pub(crate) srtp_session: Option<Context>,
    pub(crate) remote_srtp_session: Option<Context>,
    srtp_replay_protection_window: usize,
}

impl RTCDtlsTransport {
    pub(crate) fn new(
        certificates: Vec<RTCCertificate>,
        srtp_protection_profiles: Vec<SrtpProtectionProfile>,
        dtls_replay_protection_window: usize,
        srtp_replay_protection_window: usize,
    ) -> Result<Self> {
        let srtp_protection_profiles = if srtp_protection_profiles.is_empty() {
            default_srtp_protection_profiles()
        } else {
            srtp_protection_profiles
        };

        let handshake_config = ConfigBuilder::default()
            .with_srtp_protection_profiles(srtp_protection_profiles)
            .with_replay_protection_window(dtls_replay_protection_window)
            .build()?;

        Ok(Self {
            state: RTCDtlsTransportState::New,
            dtls_role: RTCDtlsRole::Unspecified,
            certificates,
            handshake_config,
            conn: None,

            srtp_session: None,
            remote_srtp_session: None,
            srtp_replay_protection_window: if srtp_replay_protection_window == 0 {
                DEFAULT_SRTP_REPLAY_PROTECTION_WINDOW
            } else {
                srtp_replay_protection_window
            },
        })
    }

    /// state returns the current dtls_transport transport state.
    pub fn state(&self) -> RTCDtlsTransportState {
        self.state
    }

    pub fn role(&self) -> RTCDtlsRole {
        self.dtls_role
    }

    /// Fingerprints of the local certificates, as announced in `a=fingerprint`.
    pub fn get_local_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        self.certificates
            .iter()
            .flat_map(|c| c.get_fingerprints())
            .collect()
    }

    /// Returns the completed DTLS state with the current record counters. Fails with
    /// `ErrHandshakeInProgress` until a handshake has completed or a state was restored.
    pub fn connection_state(&self) -> Result<State> {
        self.conn
            .as_ref()
            .ok_or(Error::ErrHandshakeInProgress)?
            .connection_state()
    }

    pub fn srtp_protection_profile(&self) -> Option<SrtpProtectionProfile> {
        self.conn
            .as_ref()
            .filter(|c| c.is_handshake_completed())
            .map(|c| c.selected_srtp_protection_profile())
    }

    pub(crate) fn set_role(&mut self, role: RTCDtlsRole) {
        self.dtls_role = role;
    }

    pub(crate) fn set_state(&mut self, state: RTCDtlsTransportState) {
        if self.state != state {
            debug!("dtls transport state changed: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Installs the state of a handshake that just finished and keys SRTP from it.
    pub(crate) fn complete_handshake(&mut self, state: State) -> Result<()> {
        if self.state != RTCDtlsTransportState::New
            && self.state != RTCDtlsTransportState::Connecting
        {
            return Err(Error::ErrInvalidDTLSStart);
        }
        if state.is_client() != self.dtls_role.is_client() {
            return Err(Error::ErrDtlsStateInvalid(format!(
                "handshake finished as {}, negotiated role is {}",
                if state.is_client() { "client" } else { "server" },
                self.dtls_role
            )));
        }

        let mut conn = DTLSConn::new(self.handshake_config.clone(), state.is_client(), None)?;
        conn.complete_handshake(state)?;
        self.conn = Some(conn);

        self.start_srtp(&BTreeMap::new())?;
        self.set_state(RTCDtlsTransportState::Connected);
        Ok(())
    }

    /// Continues a captured DTLS session without a handshake. SRTP contexts are keyed
    /// from the restored master secret and seeded with `srtp_state`.
    pub(crate) fn restore(
        &mut self,
        state: State,
        srtp_state: &BTreeMap<u32, SrtpSsrcState>,
    ) -> Result<()> {
        self.dtls_role = if state.is_client() {
            RTCDtlsRole::Client
        } else {
            RTCDtlsRole::Server
        };
        self.conn = Some(DTLSConn::new(
            self.handshake_config.clone(),
            state.is_client(),
            Some(state),
        )?);

        self.start_srtp(srtp_state)?;
        info!(
            "restored dtls session as {} with {} srtp flows",
            self.dtls_role,
            srtp_state.len()
        );
        self.set_state(RTCDtlsTransportState::Connected);
        Ok(())
    }

    fn start_srtp(&mut self, srtp_state: &BTreeMap<u32, SrtpSsrcState>) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(Error::ErrHandshakeInProgress)?;
        let profile = match conn.selected_srtp_protection_profile() {
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80 => {
                ProtectionProfile::Aes128CmHmacSha1_80
            }
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32 => {
                ProtectionProfile::Aes128CmHmacSha1_32
            }
            SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm => ProtectionProfile::AeadAes128Gcm,
            p => return Err(Error::ErrNoSuchSrtpProfile(p as u16)),
        };

        let state = conn.connection_state()?;
        let mut srtp_config = srtp::config::Config {
            profile,
            remote_rtp_options: Some(srtp_replay_protection(self.srtp_replay_protection_window)),
            ..Default::default()
        };
        srtp_config.extract_session_keys_from_dtls(&state, state.is_client())?;

        let mut srtp_session = Context::new(
            &srtp_config.keys.local_master_key,
            &srtp_config.keys.local_master_salt,
            srtp_config.profile,
            srtp_config.local_rtp_options.take(),
        )?;
        let mut remote_srtp_session = Context::new(
            &srtp_config.keys.remote_master_key,
            &srtp_config.keys.remote_master_salt,
            srtp_config.profile,
            srtp_config.remote_rtp_options.take(),
        )?;

        srtp_session.set_srtp_state(srtp_state)?;
        remote_srtp_session.set_srtp_state(srtp_state)?;

        self.srtp_session = Some(srtp_session);
        self.remote_srtp_session = Some(remote_srtp_session);
        Ok(())
    }

    /// Per-SSRC keystream positions: inbound flows from the remote context, outbound
    /// flows listed in `local_ssrcs` from the local one.
    pub(crate) fn get_srtp_state(&self, local_ssrcs: &[u32]) -> Result<BTreeMap<u32, SrtpSsrcState>> {
        let local = self.srtp_session.as_ref().ok_or(Error::ErrSrtpNotReady)?;
        let remote = self
            .remote_srtp_session
            .as_ref()
            .ok_or(Error::ErrSrtpNotReady)?;

        let mut states = remote.get_srtp_state();
        for (ssrc, state) in local.get_srtp_state() {
            if local_ssrcs.contains(&ssrc) {
                states.insert(ssrc, state);
            }
        }
        Ok(states)
    }

    pub(crate) fn encrypt_rtp(&mut self, packet: &[u8]) -> Result<Bytes> {
        self.srtp_session
            .as_mut()
            .ok_or(Error::ErrSrtpNotReady)?
            .encrypt_rtp(packet)
    }

    pub(crate) fn decrypt_rtp(&mut self, packet: &[u8]) -> Result<Bytes> {
        self.remote_srtp_session
            .as_mut()
            .ok_or(Error::ErrSrtpNotReady)?
            .decrypt_rtp(packet)
    }

    /// Feeds a datagram of DTLS records to the connection. A close_notify from the
    /// remote closes the transport.
    pub(crate) fn handle_read(&mut self, buf: &[u8]) -> Result<Vec<BytesMut>> {
        let conn = self.conn.as_mut().ok_or(Error::ErrHandshakeInProgress)?;
        conn.read(buf)?;

        let mut application_data = vec![];
        while let Some(data) = conn.incoming_application_data() {
            application_data.push(data);
        }
        if conn.is_closed() {
            self.set_state(RTCDtlsTransportState::Closed);
        }
        Ok(application_data)
    }

    /// Stops the transport and returns the records, close_notify included, that still
    /// have to be sent.
    pub(crate) fn stop(&mut self) -> Vec<BytesMut> {
        let mut outgoing = vec![];
        if let Some(conn) = &mut self.conn {
            conn.close();
            while let Some(pkt) = conn.outgoing_raw_packet() {
                outgoing.push(pkt);
            }
        }
        self.srtp_session = None;
        self.remote_srtp_session = None;
        self.set_state(RTCDtlsTransportState::Closed);
        outgoing
    }
}
