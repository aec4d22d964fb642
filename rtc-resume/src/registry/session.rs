use std::fmt;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use log::{debug, trace, warn};
use rtc::peer_connection::RTCPeerConnection;
use rtc::rtp_transceiver::SSRC;

use crate::snapshot::SessionId;
use shared::TaggedBytesMut;
use shared::error::{Error, Result};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A peer connection together with the socket of its host candidate. The
/// registry and the task reading the socket share it; the peer connection has
/// its own lock.
pub struct SessionHandle {
    id: SessionId,
    socket: UdpSocket,
    local_addr: SocketAddr,
    pc: Mutex<RTCPeerConnection>,
    pub(super) failed: AtomicBool,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("failed", &self.is_failed())
            .finish()
    }
}

impl SessionHandle {
    /// Binds the host candidate of `pc` on `ip`, inside the ephemeral port range of
    /// its setting engine. A pinned port that is taken fails with
    /// `ErrPortUnavailable`.
    pub fn bind(pc: RTCPeerConnection, ip: IpAddr) -> Result<Arc<Self>> {
        let (port_min, port_max) = pc
            .get_configuration()
            .setting_engine()
            .ephemeral_udp_port_range();
        let socket = bind_in_port_range(ip, port_min, port_max)?;
        Self::new(pc, socket)
    }

    /// Wraps `pc` and the socket its host candidate lives on.
    pub fn new(mut pc: RTCPeerConnection, socket: UdpSocket) -> Result<Arc<Self>> {
        let local_addr = socket.local_addr()?;
        pc.add_local_candidate(local_addr)?;

        Ok(Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            socket,
            local_addr,
            pc: Mutex::new(pc),
            failed: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Locks the peer connection. Do not hold the guard across calls into the
    /// registry or into other methods of this handle.
    pub fn lock(&self) -> Result<MutexGuard<'_, RTCPeerConnection>> {
        Ok(self.pc.lock()?)
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Hands one datagram received from `from` to the peer connection and returns
    /// the RTP packets it decrypted. Whatever the connection queued in response,
    /// connectivity check answers included, is sent before returning.
    pub fn handle_read(&self, from: SocketAddr, buf: &[u8]) -> Result<Vec<Bytes>> {
        let mut pc = self.lock()?;
        let result = pc.handle_read(TaggedBytesMut::udp(self.local_addr, from, buf));

        let pkts: Vec<Bytes> = std::iter::from_fn(|| pc.poll_read()).collect();
        self.write_outs(&mut pc);
        result.map(|_| pkts)
    }

    /// Encrypts and sends one RTP packet on the outbound flow `ssrc`.
    pub fn write_rtp(&self, ssrc: SSRC, packet: &[u8]) -> Result<usize> {
        let mut pc = self.lock()?;
        let n = pc.write_rtp(ssrc, packet)?;
        self.write_outs(&mut pc);
        Ok(n)
    }

    /// Closes the peer connection and sends its close_notify.
    pub fn close(&self) -> Result<()> {
        let mut pc = self.lock()?;
        let result = pc.close();
        self.write_outs(&mut pc);
        result
    }

    /// Sends everything the peer connection has queued. Returns the number of
    /// datagrams sent.
    pub fn flush(&self) -> Result<usize> {
        let mut pc = self.lock()?;
        Ok(self.write_outs(&mut pc))
    }

    fn write_outs(&self, pc: &mut RTCPeerConnection) -> usize {
        let mut sent = 0;
        while let Some(msg) = pc.poll_write() {
            match self.socket.send_to(&msg.message, msg.transport.peer_addr) {
                Ok(_) => sent += 1,
                Err(err) => warn!(
                    "session {}: send to {} failed: {err}",
                    self.id, msg.transport.peer_addr
                ),
            }
        }
        trace!("session {}: sent {sent} datagrams", self.id);
        sent
    }
}

/// Binds a UDP socket on `ip` with a port in `port_min..=port_max`. `(0, 0)` lets
/// the operating system pick; a single port must be exactly that port.
pub fn bind_in_port_range(ip: IpAddr, port_min: u16, port_max: u16) -> Result<UdpSocket> {
    if port_max < port_min {
        return Err(Error::ErrEndPortLessThanStart);
    }
    if (port_min, port_max) == (0, 0) {
        return Ok(UdpSocket::bind(SocketAddr::new(ip, 0))?);
    }

    let port_min = port_min.max(1);
    for port in port_min..=port_max {
        match UdpSocket::bind(SocketAddr::new(ip, port)) {
            Ok(socket) => {
                debug!("bound host candidate on {ip}:{port}");
                return Ok(socket);
            }
            Err(err) if port_min == port_max => {
                warn!("pinned port {port} on {ip} is unavailable: {err}");
                return Err(Error::ErrPortUnavailable(port));
            }
            Err(err) => trace!("{ip}:{port} is unavailable: {err}"),
        }
    }
    Err(Error::ErrPortSpaceExhausted)
}
