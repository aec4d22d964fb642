use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SNAPSHOT_PATH: &str = "peerConnections.bin";
pub(crate) const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// RegistryConfigBuilder is used to configure a [`SessionRegistry`](super::SessionRegistry).
/// Unset or zero values fall back to the defaults.
#[derive(Clone, Debug, Default)]
pub struct RegistryConfigBuilder {
    snapshot_path: Option<PathBuf>,
    checkpoint_interval: Duration,
    max_consecutive_failures: u32,
}

impl RegistryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// snapshot_path is the file the aggregate is checkpointed to and loaded from.
    /// (default is `peerConnections.bin` in the working directory)
    pub fn with_snapshot_path(mut self, snapshot_path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(snapshot_path.into());
        self
    }

    /// checkpoint_interval is the period of the timer-driven checkpoint. Membership
    /// changes checkpoint immediately regardless. (default is 2s)
    pub fn with_checkpoint_interval(mut self, checkpoint_interval: Duration) -> Self {
        self.checkpoint_interval = checkpoint_interval;
        self
    }

    /// max_consecutive_failures is how many checkpoints in a row may fail to persist
    /// before every further failure is logged as an error. (default is 5)
    pub fn with_max_consecutive_failures(mut self, max_consecutive_failures: u32) -> Self {
        self.max_consecutive_failures = max_consecutive_failures;
        self
    }

    pub fn build(self) -> RegistryConfig {
        RegistryConfig {
            snapshot_path: self
                .snapshot_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
            checkpoint_interval: if self.checkpoint_interval.is_zero() {
                DEFAULT_CHECKPOINT_INTERVAL
            } else {
                self.checkpoint_interval
            },
            max_consecutive_failures: if self.max_consecutive_failures == 0 {
                DEFAULT_MAX_CONSECUTIVE_FAILURES
            } else {
                self.max_consecutive_failures
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub(crate) snapshot_path: PathBuf,
    pub(crate) checkpoint_interval: Duration,
    pub(crate) max_consecutive_failures: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfigBuilder::default().build()
    }
}

impl RegistryConfig {
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn checkpoint_interval(&self) -> Duration {
        self.checkpoint_interval
    }

    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }
}
