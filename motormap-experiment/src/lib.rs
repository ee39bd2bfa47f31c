pub mod config;
pub mod error;
pub mod outcome;
pub mod samples;
pub mod session;
pub mod sink;
pub mod state;
pub mod trial;

pub use config::{ConfigError, ScreenLayout, TaskConfig, MAX_DURATION_MS};
pub use error::SessionError;
pub use outcome::{assemble_outcome, samples_to_flush};
pub use samples::SampleLog;
pub use session::{
    block_message, FrameEvents, FrameOutput, Session, SessionEvent, SessionSummary,
};
pub use sink::{JsonLinesSink, MemorySink, ResultSink, SinkError};
pub use state::{
    CursorState, FrameInput, GatingRules, Termination, TrialProgress, TrialState,
    TrialStateMachine,
};
pub use trial::TrialFactors;
