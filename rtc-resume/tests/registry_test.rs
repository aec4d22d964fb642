mod common;

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use rtc::peer_connection::event::RTCPeerConnectionEvent;
use rtc::peer_connection::state::RTCPeerConnectionState;
use rtc_resume::reconstructor::BroadcastTracks;
use rtc_resume::registry::SessionHandle;
use rtc_resume::registry::checkpoint::CheckpointTrigger;
use rtc_resume::snapshot::MediaRole;
use rtc_resume::snapshot::codec::unmarshal;
use shared::error::{Error, Result};

fn viewer(tracks: &BroadcastTracks) -> Result<Arc<SessionHandle>> {
    let (relay, _browser) = viewer_pair(tracks)?;
    Ok(relay)
}

fn is_registry_event(event: &RTCPeerConnectionEvent) -> bool {
    matches!(
        event,
        RTCPeerConnectionEvent::OnConnectionStateChangeEvent(
            RTCPeerConnectionState::Connected
                | RTCPeerConnectionState::Failed
                | RTCPeerConnectionState::Closed
        )
    )
}

#[test]
fn test_connected_event_registers_session() -> Result<()> {
    init_log();
    let dir = tempfile::tempdir()?;
    let registry = registry(&dir);
    let tracks = BroadcastTracks::default();
    let handle = viewer(&tracks)?;

    let unhandled = registry.handle_session_events(&handle)?;
    assert!(!unhandled.iter().any(is_registry_event), "{unhandled:?}");
    // the intermediate states are left to the caller
    assert!(unhandled.contains(&RTCPeerConnectionEvent::OnConnectionStateChangeEvent(
        RTCPeerConnectionState::Connecting
    )));
    assert_eq!(registry.session_ids()?, vec![handle.id()]);

    let aggregate = registry
        .store()
        .load()?
        .ok_or(Error::OtherPeerConnectionErr("nothing checkpointed".to_owned()))?;
    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate.sessions[0].binding.role, MediaRole::Viewer);
    assert_eq!(
        aggregate.sessions[0].credentials.port,
        handle.local_addr().port()
    );
    Ok(())
}

#[test]
fn test_remote_close_deregisters_session() -> Result<()> {
    init_log();
    let dir = tempfile::tempdir()?;
    let registry = registry(&dir);
    let tracks = BroadcastTracks::default();
    let (relay, browser) = viewer_pair(&tracks)?;
    registry.handle_session_events(&relay)?;
    assert_eq!(registry.session_ids()?, vec![relay.id()]);

    let failures = Arc::new(AtomicUsize::new(0));
    {
        let failures = Arc::clone(&failures);
        registry.on_session_failed(Box::new(move |_| {
            failures.fetch_add(1, Ordering::SeqCst);
        }))?;
    }

    // the browser hangs up with a close_notify
    browser.close()?;
    assert_eq!(recv(&relay)?, None);
    assert_eq!(
        relay.lock()?.connection_state(),
        RTCPeerConnectionState::Closed
    );

    let unhandled = registry.handle_session_events(&relay)?;
    assert!(!unhandled.iter().any(is_registry_event), "{unhandled:?}");
    registry.handle_session_events(&relay)?;

    assert!(relay.is_failed());
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(registry.is_empty()?);
    assert_eq!(registry.store().load()?.map(|a| a.len()), Some(0));
    assert!(tracks.video.bindings()?.is_empty());
    Ok(())
}

#[test]
fn test_checkpoint_without_traffic_is_idempotent() -> Result<()> {
    init_log();
    let dir = tempfile::tempdir()?;
    let registry = registry(&dir);
    let tracks = BroadcastTracks::default();
    registry.register(viewer(&tracks)?)?;

    let first = fs::read(registry.store().path())?;
    registry.checkpoint(CheckpointTrigger::Timer)?;
    let second = fs::read(registry.store().path())?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_failed_session_leaves_the_next_aggregate() -> Result<()> {
    init_log();
    let dir = tempfile::tempdir()?;
    let registry = registry(&dir);
    let tracks = BroadcastTracks::default();
    let doomed = viewer(&tracks)?;
    let survivor = viewer(&tracks)?;
    registry.register(Arc::clone(&doomed))?;
    registry.register(Arc::clone(&survivor))?;
    assert_eq!(registry.store().load()?.map(|a| a.len()), Some(2));

    let failures = Arc::new(AtomicUsize::new(0));
    {
        let failures = Arc::clone(&failures);
        registry.on_session_failed(Box::new(move |_| {
            failures.fetch_add(1, Ordering::SeqCst);
        }))?;
    }

    doomed.lock()?.handle_dtls_failure("fatal alert");
    registry.handle_session_events(&doomed)?;
    registry.handle_session_events(&doomed)?;
    registry.fail_session(&doomed)?;

    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(registry.session_ids()?, vec![survivor.id()]);
    assert_eq!(
        doomed.lock()?.connection_state(),
        RTCPeerConnectionState::Closed
    );

    let aggregate = registry
        .store()
        .load()?
        .ok_or(Error::OtherPeerConnectionErr("nothing checkpointed".to_owned()))?;
    assert_eq!(aggregate.len(), 1);
    assert_eq!(
        aggregate.sessions[0].credentials.port,
        survivor.local_addr().port()
    );

    // only the survivor still receives the broadcast
    assert_eq!(tracks.video.bindings()?.len(), 1);
    Ok(())
}

#[test]
fn test_concurrent_checkpoints_leave_a_valid_file() -> Result<()> {
    init_log();
    let dir = tempfile::tempdir()?;
    let registry = Arc::new(registry(&dir));
    let tracks = BroadcastTracks::default();

    let mut handles = vec![];
    for _ in 0..3 {
        let handle = viewer(&tracks)?;
        registry.register(Arc::clone(&handle))?;
        handles.push(handle);
    }

    const WORKERS: usize = 4;
    const ROUNDS: usize = 20;
    let barrier = Arc::new(Barrier::new(WORKERS + 1));
    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<()> {
                barrier.wait();
                for _ in 0..ROUNDS {
                    registry.checkpoint(CheckpointTrigger::Timer)?;
                }
                Ok(())
            })
        })
        .collect();

    barrier.wait();
    assert!(registry.deregister(handles[0].id())?.is_some());
    for worker in workers {
        worker
            .join()
            .map_err(|_| Error::OtherPeerConnectionErr("worker panicked".to_owned()))??;
    }

    // no checkpoint that started before the deregistration is saved after it
    let aggregate = unmarshal(&fs::read(registry.store().path())?)?;
    assert_eq!(aggregate.len(), 2);
    assert!(aggregate.sessions.iter().all(|s| s.credentials.port != handles[0].local_addr().port()));

    registry.checkpoint(CheckpointTrigger::Shutdown)?;
    assert_eq!(registry.store().load()?.map(|a| a.len()), Some(2));

    let health = registry.health()?;
    assert!(health.is_healthy());
    assert_eq!(health.checkpoints, (3 + WORKERS * ROUNDS + 1 + 1) as u64);
    Ok(())
}
