use crate::cipher_suite::{CipherSuiteId, default_cipher_suites};
use crate::extension_use_srtp::SrtpProtectionProfile;
use shared::error::{Error, Result};

// Default replay protection window is specified by RFC 6347 Section 4.1.2.6
pub(crate) const DEFAULT_REPLAY_PROTECTION_WINDOW: usize = 64;
pub(crate) const DEFAULT_MTU: usize = 1200; // bytes

/// ConfigBuilder is used to configure a DTLS client or server.
/// After a Config is passed to a DTLS function it must not be modified.
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    cipher_suites: Vec<CipherSuiteId>,
    srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    mtu: usize,
    replay_protection_window: usize,
}

impl ConfigBuilder {
    /// cipher_suites is a list of supported cipher suites.
    /// If cipher_suites is nil, a default list is used
    pub fn with_cipher_suites(mut self, cipher_suites: Vec<CipherSuiteId>) -> Self {
        self.cipher_suites = cipher_suites;
        self
    }

    /// srtp_protection_profiles are the supported protection profiles
    /// Clients will send this via use_srtp and assert that the server properly responds
    /// Servers will assert that clients send one of these profiles and will respond as needed
    pub fn with_srtp_protection_profiles(
        mut self,
        srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    ) -> Self {
        self.srtp_protection_profiles = srtp_protection_profiles;
        self
    }

    /// mtu is the maximum transmission unit of the records this connection writes.
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// replay_protection_window is the size of the replay attack protection window.
    /// Duplication of the sequence number is checked in this window size.
    /// Packet with sequence number older than this value compared to the latest
    /// accepted packet will be discarded. (default is 64)
    pub fn with_replay_protection_window(mut self, replay_protection_window: usize) -> Self {
        self.replay_protection_window = replay_protection_window;
        self
    }

    pub fn build(self) -> Result<HandshakeConfig> {
        let local_cipher_suites = if self.cipher_suites.is_empty() {
            default_cipher_suites()
        } else {
            self.cipher_suites
        };
        if local_cipher_suites.contains(&CipherSuiteId::Unsupported) {
            return Err(Error::ErrInvalidCipherSuite);
        }
        if self
            .srtp_protection_profiles
            .contains(&SrtpProtectionProfile::Unsupported)
        {
            return Err(Error::ErrNoSuchSrtpProfile(0));
        }

        Ok(HandshakeConfig {
            local_cipher_suites,
            local_srtp_protection_profiles: self.srtp_protection_profiles,
            maximum_transmission_unit: if self.mtu == 0 {
                DEFAULT_MTU
            } else {
                self.mtu
            },
            replay_protection_window: if self.replay_protection_window == 0 {
                DEFAULT_REPLAY_PROTECTION_WINDOW
            } else {
                self.replay_protection_window
            },
        })
    }
}

#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    pub(crate) local_cipher_suites: Vec<CipherSuiteId>,
    pub(crate) local_srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    pub(crate) maximum_transmission_unit: usize,
    pub(crate) replay_protection_window: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        HandshakeConfig {
            local_cipher_suites: default_cipher_suites(),
            local_srtp_protection_profiles: vec![],
            maximum_transmission_unit: DEFAULT_MTU,
            replay_protection_window: DEFAULT_REPLAY_PROTECTION_WINDOW,
        }
    }
}

impl HandshakeConfig {
    pub fn srtp_protection_profiles(&self) -> &[SrtpProtectionProfile] {
        &self.local_srtp_protection_profiles
    }

    pub fn replay_protection_window(&self) -> usize {
        self.replay_protection_window
    }
}
