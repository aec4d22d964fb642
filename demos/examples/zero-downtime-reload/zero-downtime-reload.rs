use anyhow::Result;
use clap::Parser;
use env_logger::Target;
use log::{debug, error, info, warn};
use resume::reconstructor::{BroadcastTracks, Reconstructor, Resumer};
use resume::registry::checkpoint::CheckpointTrigger;
use resume::registry::config::{DEFAULT_SNAPSHOT_PATH, RegistryConfigBuilder};
use resume::registry::{SessionHandle, SessionRegistry};
use rtc::media_stream::track_local::TrackLocal;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

const READ_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "zero-downtime-reload")]
#[command(author = "Rain Liu <yliu@webrtc.rs>")]
#[command(version = "0.1.0")]
#[command(about = "An example of resuming checkpointed sessions after a restart.")]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(short, long, default_value_t = format!(""))]
    output_log_file: String,
    #[arg(long, default_value_t = format!("{DEFAULT_SNAPSHOT_PATH}"))]
    snapshot_file: String,
    #[arg(long, default_value_t = 2000)]
    checkpoint_interval_ms: u64,
    #[arg(long, default_value_t = format!("0.0.0.0"))]
    bind_ip: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output_log_file = cli.output_log_file;
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;

    if cli.debug {
        env_logger::Builder::new()
            .target(if !output_log_file.is_empty() {
                Target::Pipe(Box::new(
                    OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(true)
                        .open(output_log_file)?,
                ))
            } else {
                Target::Stdout
            })
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let registry = Arc::new(SessionRegistry::new(
        RegistryConfigBuilder::new()
            .with_snapshot_path(cli.snapshot_file)
            .with_checkpoint_interval(Duration::from_millis(cli.checkpoint_interval_ms))
            .build(),
    ));
    registry.on_session_failed(Box::new(|id| {
        println!("session {id} failed and was dropped");
    }))?;

    // Any error here means the snapshot file can not be trusted: refuse to start.
    let tracks = BroadcastTracks::default();
    let resumer = Resumer::new(
        Reconstructor::new(tracks.clone()).with_bind_ip(IpAddr::from_str(&cli.bind_ip)?),
    );
    let ids = resumer.resume_from_store(&registry)?;
    println!(
        "resumed {} sessions from {}",
        ids.len(),
        registry.config().snapshot_path().display()
    );

    let (stop_tx, mut stop_rx) = tokio::sync::broadcast::channel::<()>(1);
    println!("Press Ctrl-C to stop");
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    let stopped = Arc::new(AtomicBool::new(false));
    let (media_tx, mut media_rx) = unbounded_channel::<Vec<u8>>();
    let mut readers = vec![];
    for id in ids {
        if let Some(handle) = registry.get(id)? {
            readers.push(spawn_reader(
                handle,
                Arc::clone(&registry),
                media_tx.clone(),
                Arc::clone(&stopped),
            ));
        }
    }
    drop(media_tx);

    let mut reading = !readers.is_empty();
    loop {
        let due = tokio::time::Instant::from_std(registry.poll_timeout()?);
        tokio::select! {
            _ = stop_rx.recv() => {
                println!("shutting down");
                break;
            }
            _ = tokio::time::sleep_until(due) => {
                registry.handle_timeout(Instant::now())?;
                let health = registry.health()?;
                if !health.is_healthy() {
                    warn!("checkpoints are failing: {:?}", health.last_error);
                }
            }
            pkt = media_rx.recv(), if reading => {
                let Some(pkt) = pkt else {
                    debug!("no session left to read from");
                    reading = false;
                    continue;
                };
                let track = if pkt.len() > 1
                    && (pkt[1] & 0x7f) == tracks.video.codec().default_payload_type()
                {
                    &tracks.video
                } else {
                    &tracks.audio
                };
                if let Err(err) = registry.broadcast(track, &pkt) {
                    debug!("broadcast: {err}");
                }
            }
        }
    }

    stopped.store(true, Ordering::SeqCst);
    for reader in readers {
        if let Err(err) = reader.join() {
            error!("reader thread panicked: {err:?}");
        }
    }
    // Sessions stay open: the next process picks them up from this checkpoint.
    registry.checkpoint(CheckpointTrigger::Shutdown)?;

    println!("{} sessions checkpointed", registry.len()?);
    Ok(())
}

/// Reads the host socket of one session and passes decrypted media to the main loop.
fn spawn_reader(
    handle: Arc<SessionHandle>,
    registry: Arc<SessionRegistry>,
    media_tx: UnboundedSender<Vec<u8>>,
    stopped: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(err) = read_loop(&handle, &registry, &media_tx, &stopped) {
            error!("session {} reader: {err}", handle.id());
        }
    })
}

fn read_loop(
    handle: &Arc<SessionHandle>,
    registry: &SessionRegistry,
    media_tx: &UnboundedSender<Vec<u8>>,
    stopped: &AtomicBool,
) -> Result<()> {
    let socket = handle.socket().try_clone()?;
    socket.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut buf = vec![0u8; 1500];
    while !stopped.load(Ordering::SeqCst) && !handle.is_failed() {
        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match handle.handle_read(from, &buf[..n]) {
            Ok(pkts) => {
                if pkts.into_iter().any(|pkt| media_tx.send(pkt.to_vec()).is_err()) {
                    break;
                }
            }
            Err(err) => debug!("session {}: dropped datagram from {from}: {err}", handle.id()),
        }

        for event in registry.handle_session_events(handle)? {
            info!("session {}: {event:?}", handle.id());
        }
    }
    Ok(())
}
