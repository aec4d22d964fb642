//! # RTC - Sans-I/O WebRTC peer connection with resumable transports
//!
//! A host-only, answer-side WebRTC peer connection. The connection never touches a
//! socket: the caller binds the host candidate, feeds received datagrams in and sends
//! what the connection queues. STUN connectivity checks are answered inside; a DTLS
//! handshake driver lives outside and reports through the `handle_*` hooks on
//! [`RTCPeerConnection`](peer_connection::RTCPeerConnection).
//!
//! ```no_run
//! use std::net::UdpSocket;
//! use rtc::peer_connection::RTCPeerConnection;
//! use shared::TaggedBytesMut;
//!
//! # fn drive(pc: &mut RTCPeerConnection) -> Result<(), Box<dyn std::error::Error>> {
//! let socket = UdpSocket::bind("0.0.0.0:0")?;
//! let local_addr = socket.local_addr()?;
//! pc.add_local_candidate(local_addr)?;
//!
//! let mut buf = vec![0u8; 1500];
//! loop {
//!     let (n, peer_addr) = socket.recv_from(&mut buf)?;
//!     pc.handle_read(TaggedBytesMut::udp(local_addr, peer_addr, &buf[..n]))?;
//!
//!     while let Some(rtp) = pc.poll_read() {
//!         println!("received {} bytes of RTP", rtp.len());
//!     }
//!     while let Some(msg) = pc.poll_write() {
//!         socket.send_to(&msg.message, msg.transport.peer_addr)?;
//!     }
//! }
//! # }
//! ```
//!
//! Every piece of transport state that a restarted process needs to continue a live
//! session has an accessor on the peer connection, and every such piece can be seeded
//! back through [`SettingEngine`](peer_connection::configuration::setting_engine::SettingEngine):
//!
//! ```no_run
//! use rtc::peer_connection::RTCPeerConnection;
//! use rtc::peer_connection::configuration::RTCConfigurationBuilder;
//! use rtc::peer_connection::configuration::setting_engine::SettingEngine;
//!
//! # fn example(old: &RTCPeerConnection) -> Result<(), Box<dyn std::error::Error>> {
//! let (ufrag, pwd) = old.ice_transport().get_local_user_credentials();
//! let port = old.ice_transport().get_selected_local_address()?.port();
//!
//! let mut s = SettingEngine::default();
//! s.set_ice_credentials(ufrag, pwd);
//! s.set_ephemeral_udp_port_range(port, port)?;
//! s.set_dtls_connection_state(old.dtls_transport().connection_state()?);
//! s.set_srtp_state(old.get_srtp_state()?);
//!
//! let pc = RTCPeerConnection::new(
//!     RTCConfigurationBuilder::new().with_setting_engine(s).build(),
//! )?;
//! // the new host candidate has to be bound on `port` again
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod media_stream;
pub mod peer_connection;
pub mod rtp_transceiver;
