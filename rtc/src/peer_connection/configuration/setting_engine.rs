//! Advanced configuration engine for WebRTC peer connections.
//!
//! Besides the usual transport knobs, the `SettingEngine` is how a restarted
//! process continues a live session: every piece of transport state the
//! peer connection exposes can be seeded back here before it is created.
//!
//! # Examples
//!
//! ## Continuing a session on its old endpoint
//!
//! ```
//! use rtc::peer_connection::configuration::setting_engine::SettingEngine;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut setting_engine = SettingEngine::default();
//!
//! // the remote keeps sending connectivity checks with these credentials
//! setting_engine.set_ice_credentials("abc".to_owned(), "xyz".to_owned());
//!
//! // and keeps sending media to this port
//! setting_engine.set_ephemeral_udp_port_range(50000, 50000)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuring replay protection
//!
//! ```
//! use rtc::peer_connection::configuration::setting_engine::SettingEngine;
//!
//! let mut setting_engine = SettingEngine::default();
//! setting_engine.set_dtls_replay_protection_window(128);
//! setting_engine.set_srtp_replay_protection_window(256);
//! ```

use std::collections::BTreeMap;

use dtls::extension_use_srtp::SrtpProtectionProfile;
use dtls::state::State;
use srtp::context::SrtpSsrcState;

use shared::error::{Error, Result};

/// Equal to UDP MTU
pub(crate) const RECEIVE_MTU: usize = 1460;

/// ICE candidate configuration.
#[derive(Default, Clone)]
pub struct Candidates {
    /// Enable ICE Lite mode (only respond to connectivity checks, don't initiate).
    pub ice_lite: bool,

    /// Static ICE username fragment (ufrag) for reproducible sessions.
    pub username_fragment: String,

    /// Static ICE password for reproducible sessions.
    pub password: String,

    /// Credentials were captured from a live session rather than chosen. They
    /// are kept verbatim, whatever their length.
    pub credentials_restored: bool,
}

/// Replay attack protection window sizes. Zero selects the default window.
#[derive(Default, Copy, Clone)]
pub struct ReplayProtection {
    /// DTLS replay protection window size (in packets).
    pub dtls: usize,

    /// SRTP replay protection window size (in packets).
    pub srtp: usize,
}

/// Transport state captured from a live session.
#[derive(Default, Clone)]
pub struct Resumption {
    pub dtls_connection_state: Option<State>,
    pub srtp_state: BTreeMap<u32, SrtpSsrcState>,
}

/// SettingEngine allows influencing behavior in ways that are not
/// supported by the WebRTC API. This allows us to support additional
/// use-cases without deviating from the WebRTC API elsewhere.
#[derive(Default, Clone)]
pub struct SettingEngine {
    pub(crate) candidates: Candidates,
    pub(crate) replay_protection: ReplayProtection,
    pub(crate) srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    pub(crate) ephemeral_udp: (u16, u16),
    pub(crate) resumption: Resumption,
}

impl SettingEngine {
    /// set_ice_credentials sets a staic uFrag/uPwd to be used by the ICE agent.
    /// They are taken as restored credentials and bypass the entropy checks
    /// applied to chosen ones.
    pub fn set_ice_credentials(&mut self, username_fragment: String, password: String) {
        self.candidates.username_fragment = username_fragment;
        self.candidates.password = password;
        self.candidates.credentials_restored = true;
    }

    /// set_ephemeral_udp_port_range limits the pool of ephemeral ports that
    /// ICE UDP connections can allocate from. Equal bounds pin the host
    /// candidate to exactly that port.
    pub fn set_ephemeral_udp_port_range(&mut self, port_min: u16, port_max: u16) -> Result<()> {
        if port_max < port_min {
            return Err(Error::ErrEndPortLessThanStart);
        }

        self.ephemeral_udp = (port_min, port_max);
        Ok(())
    }

    /// ephemeral_udp_port_range is the range the host candidate must be
    /// bound in. `(0, 0)` leaves the choice to the operating system.
    pub fn ephemeral_udp_port_range(&self) -> (u16, u16) {
        self.ephemeral_udp
    }

    /// set_lite configures whether or not the ice agent should be a lite agent
    pub fn set_lite(&mut self, lite: bool) {
        self.candidates.ice_lite = lite;
    }

    /// set_dtls_connection_state makes the peer connection continue the given
    /// DTLS session instead of running a handshake.
    pub fn set_dtls_connection_state(&mut self, state: State) {
        self.resumption.dtls_connection_state = Some(state);
    }

    /// set_srtp_state seeds the per-SSRC SRTP positions of a resumed session.
    /// It only takes effect together with a DTLS connection state.
    pub fn set_srtp_state(&mut self, srtp_state: BTreeMap<u32, SrtpSsrcState>) {
        self.resumption.srtp_state = srtp_state;
    }

    /// set_srtp_protection_profiles allows the user to override the default SRTP Protection Profiles
    /// The default srtp protection profiles are provided by the function `default_srtp_protection_profiles`
    pub fn set_srtp_protection_profiles(&mut self, profiles: Vec<SrtpProtectionProfile>) {
        self.srtp_protection_profiles = profiles
    }

    /// set_dtls_replay_protection_window sets a replay attack protection window size of DTLS connection.
    pub fn set_dtls_replay_protection_window(&mut self, n: usize) {
        self.replay_protection.dtls = n;
    }

    /// set_srtp_replay_protection_window sets a replay attack protection window size of SRTP session.
    pub fn set_srtp_replay_protection_window(&mut self, n: usize) {
        self.replay_protection.srtp = n;
    }

    pub fn is_resumed(&self) -> bool {
        self.resumption.dtls_connection_state.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_set_ephemeral_udp_port_range() -> Result<()> {
        let mut s = SettingEngine::default();
        assert_eq!(s.ephemeral_udp, (0, 0));

        assert_eq!(
            s.set_ephemeral_udp_port_range(3000, 2999),
            Err(Error::ErrEndPortLessThanStart)
        );
        assert_eq!(s.ephemeral_udp, (0, 0));

        s.set_ephemeral_udp_port_range(50000, 50000)?;
        assert_eq!(s.ephemeral_udp_port_range(), (50000, 50000));
        Ok(())
    }

    #[test]
    fn test_set_ice_credentials_marks_restored() {
        let mut s = SettingEngine::default();
        assert!(!s.candidates.credentials_restored);

        s.set_ice_credentials("abc".to_owned(), "xyz".to_owned());
        assert_eq!(s.candidates.username_fragment, "abc");
        assert_eq!(s.candidates.password, "xyz");
        assert!(s.candidates.credentials_restored);
    }

    #[test]
    fn test_resumption_requires_dtls_state() {
        let mut s = SettingEngine::default();
        s.set_srtp_state(BTreeMap::from([(1, SrtpSsrcState::default())]));
        assert!(!s.is_resumed());

        s.set_dtls_connection_state(State::default());
        assert!(s.is_resumed());
    }
}
