#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod cipher_suite;
pub mod config;
pub mod conn;
pub mod extension_use_srtp;
pub mod prf;
pub mod record_layer_header;
pub mod state;

use cipher_suite::CipherSuiteId;
use extension_use_srtp::SrtpProtectionProfile;

pub(crate) fn find_matching_srtp_profile(
    a: &[SrtpProtectionProfile],
    b: &[SrtpProtectionProfile],
) -> Option<SrtpProtectionProfile> {
    a.iter().find(|a_profile| b.contains(a_profile)).copied()
}

pub(crate) fn find_matching_cipher_suite(
    a: &[CipherSuiteId],
    b: &[CipherSuiteId],
) -> Option<CipherSuiteId> {
    a.iter().find(|a_suite| b.contains(a_suite)).copied()
}
