use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::ScrollDirection;
use crate::tree::NodeRecord;

#[derive(Error, Debug)]
pub enum DeviceError {
    /// Driver process failed to spawn
    #[error("failed to spawn device driver '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// Pipe to or from the driver broke
    #[error("device session I/O error: {0}")]
    SessionIO(String),

    /// Driver answered with ok=false or an unexpected payload
    #[error("device driver rejected '{command}': {error}")]
    Protocol { command: String, error: String },

    #[error("device JSON error ({context}): {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Any other failure reported by a device implementation
    #[error("device error: {0}")]
    Other(String),
}

/// Low-level action sent to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeviceAction {
    Tap { x: i32, y: i32 },
    LongTap { x: i32, y: i32 },
    InputText { x: i32, y: i32, text: String },
    Scroll {
        bounds: [[i32; 2]; 2],
        direction: ScrollDirection,
    },
    Back,
    Enter,
}

impl DeviceAction {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceAction::Tap { .. } => "tap",
            DeviceAction::LongTap { .. } => "long_tap",
            DeviceAction::InputText { .. } => "set_text",
            DeviceAction::Scroll { .. } => "scroll",
            DeviceAction::Back => "back",
            DeviceAction::Enter => "enter",
        }
    }

    /// Text typed by this action, if any.
    pub fn input(&self) -> Option<String> {
        match self {
            DeviceAction::InputText { text, .. } => Some(text.clone()),
            DeviceAction::Tap { .. }
            | DeviceAction::LongTap { .. }
            | DeviceAction::Scroll { .. }
            | DeviceAction::Back
            | DeviceAction::Enter => None,
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAction::Scroll { direction, .. } => write!(f, "scroll {}", direction),
            other => f.write_str(other.name()),
        }
    }
}

/// One observation of the device screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(alias = "records")]
    pub views: Vec<NodeRecord>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl DeviceSnapshot {
    pub fn new(views: Vec<NodeRecord>) -> Self {
        Self {
            views,
            ..Self::default()
        }
    }

    /// Reported screen height, else the root view's bottom edge.
    pub fn screen_height(&self) -> u32 {
        if self.height > 0 {
            return self.height;
        }
        self.views
            .iter()
            .find(|v| v.parent < 0)
            .map(|root| root.bounds[1][1].max(0) as u32)
            .unwrap_or(0)
    }
}

/// Transport to the device under automation. Runs are single-threaded and the
/// runtime is the only writer while a script executes.
pub trait Device {
    fn snapshot(&mut self) -> Result<DeviceSnapshot, DeviceError>;

    fn perform(&mut self, action: &DeviceAction) -> Result<(), DeviceError>;

    /// Waits for the UI to settle after an action.
    fn settle(&mut self, interval: Duration) {
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
}
