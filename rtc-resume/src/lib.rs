//! # Resume - checkpoint and restore of live peer connections
//!
//! Captures enough of every connected [`RTCPeerConnection`](rtc::peer_connection::RTCPeerConnection)
//! (ICE credentials and port, DTLS connection state, per-SSRC SRTP positions) that a
//! restarted process can rebuild each session without the remote peer noticing.
//!
//! The pieces, leaves first:
//!
//! * [`extractor`] projects a connected session into a [`SessionSnapshot`](snapshot::SessionSnapshot).
//! * [`store`] persists the [`SnapshotAggregate`](snapshot::SnapshotAggregate) atomically.
//! * [`reconstructor`] rebuilds sessions from snapshot records at startup.
//! * [`registry`] owns the live sessions and decides when to checkpoint.
//!
//! Each [`SessionHandle`](registry::SessionHandle) owns the socket of its host
//! candidate. The caller reads it, hands every datagram to
//! [`SessionHandle::handle_read`](registry::SessionHandle::handle_read) and feeds the
//! session's events to [`SessionRegistry::handle_session_events`](registry::SessionRegistry::handle_session_events).

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod extractor;
pub mod reconstructor;
pub mod registry;
pub mod snapshot;
pub mod store;
