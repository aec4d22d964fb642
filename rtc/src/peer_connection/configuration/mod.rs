pub mod setting_engine;

use crate::peer_connection::certificate::RTCCertificate;
use setting_engine::SettingEngine;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// A Configuration defines how peer-to-peer communication via PeerConnection
/// is established or re-established.
///
/// ## Specifications
///
/// * [W3C]
///
/// [W3C]: https://w3c.github.io/webrtc-pc/#rtcconfiguration-dictionary
#[derive(Default, Clone)]
pub struct RTCConfiguration {
    /// ice_servers is accepted for API compatibility. Only host candidates are
    /// gathered, so the servers are never contacted.
    pub(crate) ice_servers: Vec<String>,

    /// certificates describes a set of certificates that the PeerConnection
    /// uses to authenticate. If this value is absent, then a certificate is
    /// generated for each PeerConnection instance.
    pub(crate) certificates: Vec<RTCCertificate>,

    /// setting_engine carries the non-standard transport knobs, including the
    /// state a resumed session is seeded with.
    pub(crate) setting_engine: SettingEngine,
}

impl RTCConfiguration {
    pub fn ice_servers(&self) -> &[String] {
        &self.ice_servers
    }

    pub fn certificates(&self) -> &[RTCCertificate] {
        &self.certificates
    }

    pub fn setting_engine(&self) -> &SettingEngine {
        &self.setting_engine
    }
}

#[derive(Default)]
pub struct RTCConfigurationBuilder {
    pub(crate) ice_servers: Vec<String>,
    pub(crate) certificates: Vec<RTCCertificate>,
    pub(crate) setting_engine: SettingEngine,
}

impl RTCConfigurationBuilder {
    pub fn new() -> Self {
        RTCConfigurationBuilder::default()
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<String>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_certificates(mut self, certificates: Vec<RTCCertificate>) -> Self {
        self.certificates = certificates;
        self
    }

    pub fn with_setting_engine(mut self, setting_engine: SettingEngine) -> Self {
        self.setting_engine = setting_engine;
        self
    }

    pub fn build(self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self.ice_servers,
            certificates: self.certificates,
            setting_engine: self.setting_engine,
        }
    }
}
