use motormap_timing::SchedulerError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::sink::SinkError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The participant or operator asked to quit. Nothing of the running trial
    /// is written.
    #[error("session aborted")]
    Aborted,
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
