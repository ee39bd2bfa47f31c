use crate::outcome::ErrorCode;

/// Text shown to the participant between or after trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackMessage {
    TooSoon,
    TooSlow,
    StickMi,
    StickCc,
    Continue,
}

impl FeedbackMessage {
    pub fn text(&self) -> &'static str {
        match self {
            FeedbackMessage::TooSoon => {
                "Too soon!\nPlease wait for the target to appear before responding."
            }
            FeedbackMessage::TooSlow => "Too slow!\nPlease try to respond faster.",
            FeedbackMessage::StickMi => {
                "Joystick moved!\n\
                 Please try to only imagine moving the stick over the target\n\
                 without actually performing the movement."
            }
            FeedbackMessage::StickCc => {
                "Joystick moved!\n\
                 Please pull the trigger as soon as you see the target, without\n\
                 moving the cursor."
            }
            FeedbackMessage::Continue => "Press any button to continue.",
        }
    }
}

impl From<ErrorCode> for FeedbackMessage {
    fn from(err: ErrorCode) -> Self {
        match err {
            ErrorCode::TooSoon => FeedbackMessage::TooSoon,
            ErrorCode::StickMi => FeedbackMessage::StickMi,
            ErrorCode::StickCc => FeedbackMessage::StickCc,
        }
    }
}

/// Geometry of the trial display, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialScene {
    pub center: (f32, f32),
    pub fixation_size: f32,
    pub fixation_thickness: f32,
    pub cursor: (f32, f32),
    pub cursor_size: f32,
    /// Present once the target is due on screen.
    pub target: Option<(f32, f32)>,
    pub target_size: f32,
}

/// Everything the render sink needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Scene {
    Blank,
    Trial(TrialScene),
    Message {
        text: String,
        anchor: (f32, f32),
        /// Secondary line, e.g. "Press any button to continue."
        footer: Option<(String, (f32, f32))>,
    },
}

impl Scene {
    pub fn message(text: impl Into<String>, anchor: (f32, f32)) -> Self {
        Scene::Message {
            text: text.into(),
            anchor,
            footer: None,
        }
    }

    pub fn with_footer(self, footer: impl Into<String>, at: (f32, f32)) -> Self {
        match self {
            Scene::Message { text, anchor, .. } => Scene::Message {
                text,
                anchor,
                footer: Some((footer.into(), at)),
            },
            other => other,
        }
    }
}
