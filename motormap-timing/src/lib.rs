pub mod scheduler;
pub mod timer;

pub use scheduler::{EventScheduler, SchedulerError, Ticket};
pub use timer::{CalibrationStats, HighPrecisionTimer, ManualTimer, Timer};
