use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::timer::Timer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("ticket {0:?} is already registered for this trial")]
    DuplicateTicket(String),
    #[error("no ticket named {0:?} is registered")]
    UnknownTicket(String),
    #[error("tickets cannot be registered once the trial clock is running")]
    AlreadyStarted,
    #[error("the trial clock has not been started")]
    NotStarted,
}

/// A named point in trial time, in ms from trial start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub name: String,
    pub fire_time_ms: u64,
}

/// Answers "has this ticket fired yet" against one trial-start timestamp.
///
/// Tickets are registered during trial prep, the trial clock is started once,
/// and everything is cleared at trial end.
#[derive(Debug, Clone)]
pub struct EventScheduler<T: Timer> {
    timer: T,
    trial_start: Option<u64>,
    tickets: HashMap<String, Ticket>,
}

impl<T: Timer> EventScheduler<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            trial_start: None,
            tickets: HashMap::new(),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn register(&mut self, name: impl Into<String>, fire_time_ms: u64) -> Result<(), SchedulerError> {
        if self.trial_start.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }
        let name = name.into();
        if self.tickets.contains_key(&name) {
            return Err(SchedulerError::DuplicateTicket(name));
        }
        debug!("registered ticket {:?} at {} ms", name, fire_time_ms);
        self.tickets.insert(
            name.clone(),
            Ticket {
                name,
                fire_time_ms,
            },
        );
        Ok(())
    }

    /// Samples the clock once; all later queries are relative to this instant.
    pub fn start_trial(&mut self) -> u64 {
        let now = self.timer.now();
        self.trial_start = Some(now);
        now
    }

    pub fn trial_start(&self) -> Option<u64> {
        self.trial_start
    }

    pub fn ticket(&self, name: &str) -> Option<&Ticket> {
        self.tickets.get(name)
    }

    /// Elapsed trial time at `now_ns`, in whole milliseconds.
    pub fn trial_time_ms_at(&self, now_ns: u64) -> Result<u64, SchedulerError> {
        let start = self.trial_start.ok_or(SchedulerError::NotStarted)?;
        Ok(now_ns.saturating_sub(start) / 1_000_000)
    }

    pub fn trial_time_ms(&self) -> Result<u64, SchedulerError> {
        self.trial_time_ms_at(self.timer.now())
    }

    /// Whether `now_ns` is strictly before the ticket's fire time.
    pub fn before_at(&self, name: &str, now_ns: u64) -> Result<bool, SchedulerError> {
        let start = self.trial_start.ok_or(SchedulerError::NotStarted)?;
        let ticket = self
            .tickets
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownTicket(name.to_string()))?;
        Ok(now_ns.saturating_sub(start) < ticket.fire_time_ms.saturating_mul(1_000_000))
    }

    pub fn after_at(&self, name: &str, now_ns: u64) -> Result<bool, SchedulerError> {
        self.before_at(name, now_ns).map(|before| !before)
    }

    pub fn before(&self, name: &str) -> Result<bool, SchedulerError> {
        self.before_at(name, self.timer.now())
    }

    pub fn after(&self, name: &str) -> Result<bool, SchedulerError> {
        self.after_at(name, self.timer.now())
    }

    pub fn clear(&mut self) {
        self.tickets.clear();
        self.trial_start = None;
    }
}
