use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::tree::NodeId;

/// Why a record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceComment {
    /// Action the script asked for.
    Action,
    /// Scroll or navigation performed while searching for an element.
    Navigate,
    /// Terminal failure.
    Crashed,
    /// End of the run.
    Done,
}

/// Source statement that was executing when a record was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRef {
    pub compiled_line: usize,
    pub compiled_code: String,
    pub source_line: Option<usize>,
    pub source_code: Option<String>,
}

/// One step of the replay log. Every field is serialized, nulls included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub step: u64,
    pub timestamp_ms: u64,
    pub screen: String,
    pub screen_name: Option<String>,
    pub node_id: Option<NodeId>,
    pub action: Option<String>,
    pub input: Option<String>,
    pub element: Option<String>,
    pub locator: Option<String>,
    /// Executing statement, as compiled and as written.
    pub compiled_line: Option<usize>,
    pub compiled_code: Option<String>,
    pub source_line: Option<usize>,
    pub source_code: Option<String>,
    pub comment: TraceComment,
    pub screenshot: Option<String>,
}

impl TraceRecord {
    pub fn now(step: u64, comment: TraceComment, screen: impl Into<String>) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            step,
            screen: screen.into(),
            screen_name: None,
            node_id: None,
            action: None,
            input: None,
            element: None,
            locator: None,
            compiled_line: None,
            compiled_code: None,
            source_line: None,
            source_code: None,
            comment,
            screenshot: None,
        }
    }

    pub fn with_screen_name(mut self, name: Option<&str>) -> Self {
        self.screen_name = name.map(String::from);
        self
    }

    pub fn with_node(mut self, node: Option<NodeId>) -> Self {
        self.node_id = node;
        self
    }

    pub fn with_action(mut self, action: impl ToString) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_input(mut self, input: Option<String>) -> Self {
        self.input = input;
        self
    }

    pub fn with_element(mut self, element: Option<&str>, locator: Option<&str>) -> Self {
        self.element = element.map(String::from);
        self.locator = locator.map(String::from);
        self
    }

    pub fn with_statement(mut self, statement: Option<&StatementRef>) -> Self {
        self.compiled_line = statement.map(|s| s.compiled_line);
        self.compiled_code = statement.map(|s| s.compiled_code.clone());
        self.source_line = statement.and_then(|s| s.source_line);
        self.source_code = statement.and_then(|s| s.source_code.clone());
        self
    }

    pub fn with_screenshot(mut self, screenshot: Option<&str>) -> Self {
        self.screenshot = screenshot.map(String::from);
        self
    }
}
