//! Transports under a peer connection: ICE for connectivity, DTLS for keys.

pub mod dtls;
pub mod ice;
