
pub mod checkpoint;
pub mod config;
mod session;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use log::{debug, error, info, trace, warn};
use rtc::media_stream::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use rtc::peer_connection::event::RTCPeerConnectionEvent;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc::rtp_transceiver::SSRC;
use rtc::rtp_transceiver::rtp_codec::RTPCodecType;

use crate::extractor::extract;
use crate::snapshot::{SessionId, SnapshotAggregate};
use crate::store::SnapshotStore;
use checkpoint::{CheckpointHealth, CheckpointScheduler, CheckpointTrigger};
use config::RegistryConfig;
use shared::error::{Error, Result};

pub use session::{SessionHandle, bind_in_port_range};

/// One negotiated outbound media flow of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutboundFlow {
    pub kind: RTPCodecType,
    pub ssrc: SSRC,
}

pub type OnSessionFailedHdlrFn = Box<dyn Fn(SessionId) + Send + Sync>;

/// The set of live sessions and the checkpoints that persist it.
///
/// Membership changes checkpoint right away; [`handle_timeout`](Self::handle_timeout)
/// adds the periodic one. The session list lock is only held to change or copy the
/// list, snapshots are taken under each session's own lock afterwards. Checkpoints
/// run one at a time, so the file always holds the newest snapshot.
pub struct SessionRegistry {
    config: RegistryConfig,
    store: SnapshotStore,
    sessions: Mutex<Vec<Arc<SessionHandle>>>,
    checkpoint_lock: Mutex<()>,
    scheduler: Mutex<CheckpointScheduler>,
    health: Mutex<CheckpointHealth>,
    on_session_failed_handler: Mutex<Option<Arc<OnSessionFailedHdlrFn>>>,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let store = SnapshotStore::new(config.snapshot_path.clone());
        let scheduler = CheckpointScheduler::new(config.checkpoint_interval, Instant::now());
        Self {
            config,
            store,
            sessions: Mutex::new(vec![]),
            checkpoint_lock: Mutex::new(()),
            scheduler: Mutex::new(scheduler),
            health: Mutex::new(CheckpointHealth::default()),
            on_session_failed_handler: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// on_session_failed sets a handler that is called once for every session that
    /// reaches the Failed state or is closed by the remote, after it has left the
    /// registry.
    pub fn on_session_failed(&self, f: OnSessionFailedHdlrFn) -> Result<()> {
        *self.on_session_failed_handler.lock()? = Some(Arc::new(f));
        Ok(())
    }

    /// Adds a session whose handshake has completed and checkpoints. Registering a
    /// session twice is a no-op.
    pub fn register(&self, handle: Arc<SessionHandle>) -> Result<()> {
        if handle.is_failed() {
            debug!("session {} failed before registration", handle.id());
            return Ok(());
        }

        let id = handle.id();
        if !self.insert(handle)? {
            return Ok(());
        }
        info!("session {id} registered");
        self.checkpoint(CheckpointTrigger::SessionConnected)
    }

    /// Adds a reconstructed session. Its state is already on disk, so there is no
    /// checkpoint.
    pub(crate) fn insert_restored(&self, handle: Arc<SessionHandle>) -> Result<()> {
        let id = handle.id();
        if self.insert(handle)? {
            info!("session {id} restored");
        }
        Ok(())
    }

    fn insert(&self, handle: Arc<SessionHandle>) -> Result<bool> {
        let mut sessions = self.sessions.lock()?;
        if sessions.iter().any(|s| s.id() == handle.id()) {
            return Ok(false);
        }
        sessions.push(handle);
        Ok(true)
    }

    /// Removes a session and checkpoints so it is not restored again. Returns the
    /// removed session.
    pub fn deregister(&self, id: SessionId) -> Result<Option<Arc<SessionHandle>>> {
        let removed = self.remove(id)?;
        if removed.is_some() {
            info!("session {id} deregistered");
            self.checkpoint(CheckpointTrigger::SessionFailed)?;
        }
        Ok(removed)
    }

    fn remove(&self, id: SessionId) -> Result<Option<Arc<SessionHandle>>> {
        let mut sessions = self.sessions.lock()?;
        Ok(sessions
            .iter()
            .position(|s| s.id() == id)
            .map(|i| sessions.remove(i)))
    }

    /// Tears down a failed session: it leaves the registry, its peer connection is
    /// closed, the failure handler runs and a checkpoint drops it from disk. Only the
    /// first call per session has an effect.
    pub fn fail_session(&self, handle: &Arc<SessionHandle>) -> Result<()> {
        if handle.failed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        warn!("session {} failed", handle.id());

        let was_registered = self.remove(handle.id())?.is_some();
        if let Err(err) = handle.close() {
            debug!("closing failed session {}: {err}", handle.id());
        }

        let handler = self.on_session_failed_handler.lock()?.clone();
        if let Some(f) = handler {
            f(handle.id());
        }

        if was_registered {
            self.checkpoint(CheckpointTrigger::SessionFailed)?;
        }
        Ok(())
    }

    /// Drains the events queued on the session and acts on connection state changes:
    /// Connected registers the session, Failed and Closed tear it down. All other
    /// events are returned to the caller. The caller must not hold the session lock.
    pub fn handle_session_events(
        &self,
        handle: &Arc<SessionHandle>,
    ) -> Result<Vec<RTCPeerConnectionEvent>> {
        let events: Vec<RTCPeerConnectionEvent> = {
            let mut pc = handle.lock()?;
            std::iter::from_fn(|| pc.poll_event()).collect()
        };

        let mut unhandled = vec![];
        for event in events {
            match event {
                RTCPeerConnectionEvent::OnConnectionStateChangeEvent(
                    RTCPeerConnectionState::Connected,
                ) => self.register(Arc::clone(handle))?,
                RTCPeerConnectionEvent::OnConnectionStateChangeEvent(
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed,
                ) => self.fail_session(handle)?,
                event => {
                    trace!("session {}: {:?}", handle.id(), event);
                    unhandled.push(event);
                }
            }
        }
        Ok(unhandled)
    }

    pub fn get(&self, id: SessionId) -> Result<Option<Arc<SessionHandle>>> {
        Ok(self
            .sessions
            .lock()?
            .iter()
            .find(|s| s.id() == id)
            .cloned())
    }

    pub fn session_ids(&self) -> Result<Vec<SessionId>> {
        Ok(self.sessions.lock()?.iter().map(|s| s.id()).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.sessions.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.sessions.lock()?.is_empty())
    }

    /// Negotiated outbound flows of a registered session.
    pub fn outbound_flows(&self, id: SessionId) -> Result<Vec<OutboundFlow>> {
        let handle = self.get(id)?.ok_or(Error::ErrSessionNotFound(id))?;
        let pc = handle.lock()?;
        Ok(pc
            .get_senders()
            .iter()
            .filter(|s| s.is_negotiated())
            .map(|s| OutboundFlow {
                kind: s.kind(),
                ssrc: s.ssrc(),
            })
            .collect())
    }

    /// Sends `packet` on every outbound flow of `track` that belongs to a registered
    /// session. Flows of sessions still connecting are skipped.
    pub fn broadcast(&self, track: &TrackLocalStaticRTP, packet: &[u8]) -> Result<usize> {
        let sessions = self.sessions.lock()?.clone();

        let mut owners: HashMap<SSRC, Arc<SessionHandle>> = HashMap::new();
        for handle in sessions {
            let ssrcs: Vec<SSRC> = handle.lock()?.get_senders().iter().map(|s| s.ssrc()).collect();
            for ssrc in ssrcs {
                owners.insert(ssrc, Arc::clone(&handle));
            }
        }

        track.write_rtp(packet, |binding, pkt| match owners.get(&binding.ssrc()) {
            Some(handle) => handle.write_rtp(binding.ssrc(), pkt),
            None => Ok(0),
        })
    }

    /// Extracts every Connected session. Sessions in a transient state (Disconnected)
    /// are left out of this aggregate; any extraction error is an integrity violation.
    pub fn snapshot_all(&self) -> Result<SnapshotAggregate> {
        let sessions = self.sessions.lock()?.clone();

        let mut records = Vec::with_capacity(sessions.len());
        for handle in sessions {
            let pc = handle.lock()?;
            match pc.connection_state() {
                RTCPeerConnectionState::Connected => records.push(extract(&pc)?),
                state => debug!("session {} is {state}, not captured", handle.id()),
            }
        }
        Ok(SnapshotAggregate::new(records))
    }

    /// Snapshots all sessions and saves the aggregate. Integrity violations are
    /// returned; persistence failures are logged, recorded in [`health`](Self::health)
    /// and retried by the next checkpoint.
    pub fn checkpoint(&self, trigger: CheckpointTrigger) -> Result<()> {
        // a snapshot older than the one on disk must never be saved over it
        let _checkpoint = self.checkpoint_lock.lock()?;
        let aggregate = self.snapshot_all()?;

        match self.store.save(&aggregate) {
            Ok(()) => {
                self.health.lock()?.record_success(SystemTime::now());
                debug!("checkpoint ({trigger}): {} sessions", aggregate.len());
            }
            Err(err) if err.is_integrity_violation() => return Err(err),
            Err(err) => {
                let failures = self.health.lock()?.record_failure(err.to_string());
                if failures > self.config.max_consecutive_failures {
                    error!("checkpoint ({trigger}) failed {failures} times in a row: {err}");
                } else {
                    warn!("checkpoint ({trigger}) failed: {err}");
                }
            }
        }
        Ok(())
    }

    pub fn health(&self) -> Result<CheckpointHealth> {
        Ok(self.health.lock()?.clone())
    }

    /// When the periodic checkpoint is due next.
    pub fn poll_timeout(&self) -> Result<Instant> {
        Ok(self.scheduler.lock()?.poll_timeout())
    }

    /// Runs the periodic checkpoint if it is due at `now`.
    pub fn handle_timeout(&self, now: Instant) -> Result<()> {
        let trigger = self.scheduler.lock()?.handle_timeout(now);
        match trigger {
            Some(trigger) => self.checkpoint(trigger),
            None => Ok(()),
        }
    }
}
