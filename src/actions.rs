//! User-facing actions and their trigger names.
//!
//! The original design synthesized key handlers by reflective attribute
//! lookup; here the mapping from trigger name to action is an explicit
//! enum, built once and matched at dispatch time.

/// A key-triggered notification server operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Close the oldest visible popup
    Close,
    /// Clear the queue and close every visible popup
    CloseAll,
    /// Step backward through notification history
    Previous,
    /// Step forward through notification history
    Next,
    /// Toggle paused mode (pause closes popups, resume drains the queue)
    TogglePause,
}

impl Action {
    /// All actions, for iterating when grabbing keys
    pub const ALL: [Action; 5] = [
        Action::Close,
        Action::CloseAll,
        Action::Previous,
        Action::Next,
        Action::TogglePause,
    ];

    /// Look up an action by its trigger name
    pub fn from_name(name: &str) -> Option<Action> {
        match name {
            "close" => Some(Action::Close),
            "close_all" => Some(Action::CloseAll),
            "previous" => Some(Action::Previous),
            "next" => Some(Action::Next),
            "toggle_pause" => Some(Action::TogglePause),
            _ => None,
        }
    }

    /// The trigger name used in config files and logs
    pub fn name(self) -> &'static str {
        match self {
            Action::Close => "close",
            Action::CloseAll => "close_all",
            Action::Previous => "previous",
            Action::Next => "next",
            Action::TogglePause => "toggle_pause",
        }
    }
}
