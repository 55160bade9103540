use super::event::ButtonPress;

/// Render request handed to the chat transport: text plus an optional
/// button set. The transport owns captions, layout and localisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub buttons: Vec<ReplyButton>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyButton {
    Press(ButtonPress),
    /// External link button, e.g. the task page of a created job.
    JobLink { url: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(text: impl Into<String>, presses: Vec<ButtonPress>) -> Self {
        Self {
            text: text.into(),
            buttons: presses.into_iter().map(ReplyButton::Press).collect(),
        }
    }
}
