
use std::collections::VecDeque;
use std::fmt;

use bytes::BytesMut;
use log::*;

use crate::cipher_suite::CryptoGcm;
use crate::config::HandshakeConfig;
use crate::extension_use_srtp::SrtpProtectionProfile;
use crate::record_layer_header::*;
use crate::state::State;
use crate::{find_matching_cipher_suite, find_matching_srtp_profile};
use shared::error::*;
use shared::replay_detector::*;

const ALERT_LEVEL_WARNING: u8 = 1;
const ALERT_LEVEL_FATAL: u8 = 2;
const ALERT_DESCRIPTION_CLOSE_NOTIFY: u8 = 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Errored,
    Preparing,
    Finished,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HandshakeState::Errored => write!(f, "Errored"),
            HandshakeState::Preparing => write!(f, "Preparing"),
            HandshakeState::Finished => write!(f, "Finished"),
        }
    }
}

pub(crate) fn srv_cli_str(is_client: bool) -> &'static str {
    if is_client { "client" } else { "server" }
}

/// DTLSConn is the record layer of a DTLS connection whose handshake is
/// driven elsewhere. Once it holds a finished [`State`] it protects
/// application data, numbers outgoing records and rejects replayed ones.
pub struct DTLSConn {
    is_client: bool,
    maximum_transmission_unit: usize,
    replay_protection_window: usize,
    replay_detector: Vec<SlidingWindowDetector>,
    incoming_decrypted_packets: VecDeque<BytesMut>,
    outgoing_packets: VecDeque<BytesMut>,

    state: State,
    crypto: Option<CryptoGcm>,

    current_handshake_state: HandshakeState,
    cfg: HandshakeConfig,
    closed: bool,
}

impl DTLSConn {
    /// Creates a connection. With an `initial_state` the handshake is
    /// considered finished and record counters continue from the state.
    pub fn new(
        handshake_config: HandshakeConfig,
        is_client: bool,
        initial_state: Option<State>,
    ) -> Result<Self> {
        let mut conn = Self {
            is_client,
            maximum_transmission_unit: handshake_config.maximum_transmission_unit,
            replay_protection_window: handshake_config.replay_protection_window,
            replay_detector: vec![],
            incoming_decrypted_packets: VecDeque::new(),
            outgoing_packets: VecDeque::new(),

            state: State {
                is_client,
                ..Default::default()
            },
            crypto: None,

            current_handshake_state: HandshakeState::Preparing,
            cfg: handshake_config,
            closed: false,
        };

        if let Some(state) = initial_state {
            conn.install_state(state)?;
            debug!(
                "[handshake:{}] resumed at local epoch {} seq {:?}",
                srv_cli_str(conn.is_client),
                conn.state.local_epoch,
                conn.state.local_sequence_number(conn.state.local_epoch),
            );
        }

        Ok(conn)
    }

    /// Installs the state produced by a finished handshake.
    pub fn complete_handshake(&mut self, state: State) -> Result<()> {
        if self.current_handshake_state == HandshakeState::Finished {
            return Err(Error::OtherDtlsErr(
                "handshake already completed".to_owned(),
            ));
        }

        if let Err(err) = self.install_state(state) {
            self.current_handshake_state = HandshakeState::Errored;
            return Err(err);
        }

        debug!(
            "[handshake:{}] -> {}",
            srv_cli_str(self.is_client),
            self.current_handshake_state
        );
        Ok(())
    }

    fn install_state(&mut self, mut state: State) -> Result<()> {
        state.validate()?;

        if state.is_client != self.is_client {
            return Err(Error::ErrDtlsStateInvalid(format!(
                "state belongs to a {}, connection is a {}",
                srv_cli_str(state.is_client),
                srv_cli_str(self.is_client)
            )));
        }

        if let Some(cipher_suite_id) = state.cipher_suite_id {
            if find_matching_cipher_suite(&[cipher_suite_id], &self.cfg.local_cipher_suites)
                .is_none()
            {
                return Err(Error::ErrInvalidCipherSuite);
            }
        }

        if !self.cfg.local_srtp_protection_profiles.is_empty()
            && find_matching_srtp_profile(
                &[state.srtp_protection_profile],
                &self.cfg.local_srtp_protection_profiles,
            )
            .is_none()
        {
            return Err(Error::ErrDtlsStateInvalid(format!(
                "srtp protection profile {} is not configured",
                state.srtp_protection_profile
            )));
        }

        let crypto = CryptoGcm::new(
            &state.master_secret,
            state.client_random(),
            state.server_random(),
            state.is_client,
        )?;

        self.replay_detector.clear();
        while self.replay_detector.len() <= state.remote_epoch as usize {
            self.replay_detector.push(SlidingWindowDetector::new(
                self.replay_protection_window,
                MAX_SEQUENCE_NUMBER,
            ));
        }
        if let Some(replay) = state.remote_replay.take() {
            let detector = SlidingWindowDetector::from_state(&replay).ok_or_else(|| {
                Error::ErrDtlsStateInvalid("malformed replay window".to_owned())
            })?;
            self.replay_detector[state.remote_epoch as usize] = detector;
        }

        self.state = state;
        self.crypto = Some(crypto);
        self.current_handshake_state = HandshakeState::Finished;
        Ok(())
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.current_handshake_state == HandshakeState::Finished
    }

    /// connection_state returns the DTLS details of the connection, with the
    /// current record counters and replay window.
    pub fn connection_state(&self) -> Result<State> {
        if !self.is_handshake_completed() {
            return Err(Error::ErrHandshakeInProgress);
        }

        let mut state = self.state.clone();
        state.remote_replay = self
            .replay_detector
            .get(state.remote_epoch as usize)
            .map(|d| d.state());
        Ok(state)
    }

    /// selected_srtp_protection_profile returns the selected SRTPProtectionProfile
    pub fn selected_srtp_protection_profile(&self) -> SrtpProtectionProfile {
        self.state.srtp_protection_profile
    }

    /// Reserves the sequence number of the next outgoing record.
    pub fn next_record_sequence(&mut self) -> Result<(u16, u64)> {
        let epoch = self.state.local_epoch;
        let seq = self
            .state
            .local_sequence_number
            .get_mut(epoch as usize)
            .ok_or(Error::ErrHandshakeInProgress)?;

        if *seq > MAX_SEQUENCE_NUMBER {
            // RFC 6347 Section 4.1.0
            // The implementation must either abandon an association or rehandshake
            // prior to allowing the sequence number to wrap.
            return Err(Error::OtherDtlsErr(
                "sequence number overflow".to_owned(),
            ));
        }
        let current = *seq;
        *seq += 1;

        Ok((epoch, current))
    }

    /// Runs replay protection for a record already authenticated by the caller.
    pub fn accept_record(&mut self, epoch: u16, sequence_number: u64) -> Result<()> {
        if epoch != self.state.remote_epoch {
            return Err(Error::ErrDtlsRecordEpochMismatch(epoch));
        }
        let detector = self
            .replay_detector
            .get_mut(epoch as usize)
            .ok_or(Error::ErrDtlsRecordEpochMismatch(epoch))?;
        if !detector.check(sequence_number) {
            return Err(Error::ErrDtlsRecordReplayed(epoch, sequence_number));
        }
        detector.accept();
        Ok(())
    }

    // Write writes p to the DTLS connection
    pub fn write(&mut self, p: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnClosed);
        }
        if !self.is_handshake_completed() {
            return Err(Error::ErrHandshakeInProgress);
        }

        for chunk in p.chunks(self.maximum_transmission_unit.max(1)) {
            self.write_record(ContentType::ApplicationData, chunk)?;
        }
        Ok(())
    }

    fn write_record(&mut self, content_type: ContentType, body: &[u8]) -> Result<()> {
        let (epoch, sequence_number) = self.next_record_sequence()?;
        let header = RecordLayerHeader {
            content_type,
            content_len: body.len() as u16,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch,
            sequence_number,
        };

        let crypto = self.crypto.as_ref().ok_or(Error::ErrHandshakeInProgress)?;
        let raw = crypto.encrypt(&header, body)?;
        trace!(
            "[{}] send record epoch={} seq={} len={}",
            srv_cli_str(self.is_client),
            epoch,
            sequence_number,
            raw.len()
        );
        self.outgoing_packets.push_back(BytesMut::from(&raw[..]));
        Ok(())
    }

    pub fn outgoing_raw_packet(&mut self) -> Option<BytesMut> {
        self.outgoing_packets.pop_front()
    }

    /// Read processes one datagram of DTLS records. Records that are
    /// replayed, from another epoch or fail authentication are discarded
    /// silently as RFC 6347 Section 4.1.2.7 requires.
    pub fn read(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnClosed);
        }
        if !self.is_handshake_completed() {
            return Err(Error::ErrHandshakeInProgress);
        }

        for record in unpack_datagram(buf) {
            self.handle_incoming_record(record);
        }
        Ok(())
    }

    fn handle_incoming_record(&mut self, record: &[u8]) {
        let h = match RecordLayerHeader::unmarshal(record) {
            Ok(h) => h,
            Err(err) => {
                debug!("{}: discarded broken packet: {}", srv_cli_str(self.is_client), err);
                return;
            }
        };

        if h.epoch != self.state.remote_epoch {
            debug!(
                "{}: discarded packet of epoch {} (current {})",
                srv_cli_str(self.is_client),
                h.epoch,
                self.state.remote_epoch,
            );
            return;
        }

        // Anti-replay protection
        let Some(detector) = self.replay_detector.get_mut(h.epoch as usize) else {
            return;
        };
        if !detector.check(h.sequence_number) {
            debug!(
                "{}: discarded duplicated packet (epoch: {}, seq: {})",
                srv_cli_str(self.is_client),
                h.epoch,
                h.sequence_number,
            );
            return;
        }

        let Some(crypto) = &self.crypto else {
            return;
        };
        let body = match crypto.decrypt(record) {
            Ok(body) => body,
            Err(err) => {
                debug!("{}: decrypt failed: {}", srv_cli_str(self.is_client), err);
                return;
            }
        };
        self.replay_detector[h.epoch as usize].accept();

        match h.content_type {
            ContentType::ApplicationData => {
                self.incoming_decrypted_packets
                    .push_back(BytesMut::from(&body[..]));
            }
            ContentType::Alert => {
                if body.len() >= 2
                    && (body[0] == ALERT_LEVEL_FATAL || body[1] == ALERT_DESCRIPTION_CLOSE_NOTIFY)
                {
                    debug!(
                        "{}: <- alert level={} description={}",
                        srv_cli_str(self.is_client),
                        body[0],
                        body[1]
                    );
                    self.closed = true;
                }
            }
            content_type => {
                trace!(
                    "{}: ignored {:?} record after handshake",
                    srv_cli_str(self.is_client),
                    content_type
                );
            }
        }
    }

    // Read reads data from the connection.
    pub fn incoming_application_data(&mut self) -> Option<BytesMut> {
        self.incoming_decrypted_packets.pop_front()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // Close closes the connection.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.is_handshake_completed() {
            // Discard error from notify() to return non-error on the first user call of Close()
            // even if the underlying connection is already closed.
            let _ = self.write_record(
                ContentType::Alert,
                &[ALERT_LEVEL_WARNING, ALERT_DESCRIPTION_CLOSE_NOTIFY],
            );
        }
        self.closed = true;
    }
}
