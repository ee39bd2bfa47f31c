pub mod condition;
pub mod geometry;
pub mod outcome;
pub mod phase;
pub mod scene;

pub use condition::{Mapping, TrialCondition, TrialType};
pub use geometry::Point;
pub use outcome::{AxisSample, ErrorCode, TrialKey, TrialOutcome};
pub use phase::{BlockPhase, Phase};
pub use scene::{FeedbackMessage, Scene, TrialScene};
